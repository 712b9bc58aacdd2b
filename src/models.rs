//! Data types and associated functions and methods

use crate::operation::Operation;

use ndarray::Array2;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use validator::Validate;

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A structured query, as produced by a query interpreter
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Query {
    /// Operation name, or `all`. May be empty if the interpreter could not determine it.
    #[serde(default)]
    pub operation: String,
    /// Environmental parameter, e.g. `ocean currents`
    #[validate(length(min = 1, message = "parameter must not be empty"))]
    pub parameter: String,
    /// Optional named region
    #[serde(default)]
    pub location: Option<String>,
    /// Start and end date, both `YYYY-MM-DD`
    #[validate(length(
        equal = 2,
        message = "time_range must contain exactly a start and an end date"
    ))]
    pub time_range: Vec<String>,
    /// Original free-text query, used to recover an operation the interpreter missed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Query {
    /// Return a Query object without free text.
    pub fn new(
        operation: &str,
        parameter: &str,
        time_range: [&str; 2],
        location: Option<&str>,
    ) -> Self {
        Query {
            operation: operation.to_string(),
            parameter: parameter.to_string(),
            location: location.map(str::to_string),
            time_range: time_range.iter().map(|date| date.to_string()).collect(),
            text: None,
        }
    }

    /// Returns the location lower-cased, or `None` if absent or blank.
    pub fn normalized_location(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty())
            .map(str::to_lowercase)
    }
}

/// Source of the timestamps attached to temporal series points
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampSource {
    /// The date encoded in each file's name, at midnight UTC
    #[default]
    FileDate,
    /// The wall-clock time at which the query ran, identical for every point
    QueryTime,
}

/// One point of a temporal series
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    /// Timestamp of the frame
    #[serde(serialize_with = "serialize_rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Operation applied to the frame
    pub value: f64,
}

fn serialize_rfc3339<S: Serializer>(
    timestamp: &OffsetDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let formatted = timestamp
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

/// Result of aggregating a stack of frames
#[derive(Clone, Debug, PartialEq)]
pub struct AggregationResult {
    /// Operation applied over every sample of every frame
    pub scalar: f64,
    /// Operation applied per frame, in frame order
    pub temporal: Option<Vec<TimeSeriesPoint>>,
    /// Operation applied per pixel across frames
    pub spatial: Option<Array2<f64>>,
}

/// Why a file did not contribute to a query
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The trailing filename token is not a `YYYYMMDD` date
    UnparseableDate,
    /// No pixel of the file lies inside the region
    OutsideRegion,
    /// Every sample of the crop is missing
    AllMissing,
    /// The file could not be decoded
    Decode(String),
}

impl SkipReason {
    /// Short label, used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::UnparseableDate => "unparseable_date",
            SkipReason::OutsideRegion => "outside_region",
            SkipReason::AllMissing => "all_missing",
            SkipReason::Decode(_) => "decode",
        }
    }
}

/// A skipped file and the reason it was skipped
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

impl SkippedFile {
    /// Return a SkippedFile object.
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        SkippedFile {
            path: path.into(),
            reason,
        }
    }
}

/// Full result record of a single operation
#[derive(Clone, Debug, Serialize)]
pub struct OperationRecord {
    /// Operation applied
    pub operation: Operation,
    /// Scalar result
    pub value: f64,
    /// Unit of the parameter, empty if unknown
    pub unit: String,
    /// Parameter, as requested
    pub parameter: String,
    /// Time range, as requested
    pub time_range: Vec<String>,
    /// Region, lower-cased
    pub location: Option<String>,
    /// Visualization of the temporal series
    pub trend_graph: Option<String>,
    /// Visualization of the spatial map
    pub spatial_graph: Option<String>,
    /// Prose explanation of the value
    pub explanation: Option<String>,
    /// Number of files that contributed
    pub files_used: usize,
    /// Files that were skipped along the way
    pub skipped: Vec<SkippedFile>,
}

/// Partial record of one operation within a [AllOperationsReport]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperationSummary {
    pub value: f64,
    pub unit: String,
    pub trend_graph: Option<String>,
    pub spatial_graph: Option<String>,
}

impl From<OperationRecord> for OperationSummary {
    fn from(record: OperationRecord) -> Self {
        OperationSummary {
            value: record.value,
            unit: record.unit,
            trend_graph: record.trend_graph,
            spatial_graph: record.spatial_graph,
        }
    }
}

/// Outcome of one operation within a [AllOperationsReport]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOutcome {
    Computed(OperationSummary),
    Failed { error: String },
}

/// Outcome of every supported operation, in the order of the supported-operations table
///
/// Serialises as a map keyed by operation name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllOperationsReport {
    pub entries: Vec<(Operation, OperationOutcome)>,
}

impl AllOperationsReport {
    /// Returns the outcome of `operation`, if it was run.
    pub fn get(&self, operation: Operation) -> Option<&OperationOutcome> {
        self.entries
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, outcome)| outcome)
    }
}

impl Serialize for AllOperationsReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (operation, outcome) in &self.entries {
            map.serialize_entry(&operation.to_string(), outcome)?;
        }
        map.end()
    }
}

/// Response to a query: a single record, or one outcome per operation
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Single(Box<OperationRecord>),
    All(AllOperationsReport),
}

/// Point in time after which a query is abandoned
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    /// `None` when the deadline lies beyond what an `Instant` can represent
    at: Option<Instant>,
    seconds: u64,
}

impl Deadline {
    /// Return a Deadline `seconds` from now.
    pub fn after(seconds: u64) -> Self {
        Deadline {
            at: Instant::now().checked_add(Duration::from_secs(seconds)),
            seconds,
        }
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Length of the deadline in seconds.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }
}
