//! Query orchestration.
//!
//! The [Orchestrator] validates a query, then drives the catalog, cropper and statistic
//! engine in sequence and assembles the result record.

use crate::catalog;
use crate::config::EngineConfig;
use crate::crop::{self, CropOutcome};
use crate::error::QueryError;
use crate::explain::{ExplanationContext, Explainer, SummaryExplainer};
use crate::metrics;
use crate::models::{
    AllOperationsReport, Deadline, OperationOutcome, OperationRecord, Query, QueryResponse,
};
use crate::operation::{Operation, OperationRequest};
use crate::operations::{self, AggregateOptions};
use crate::raster::{GeoTiffSource, RasterSource};
use crate::render::{JsonRenderer, RenderError, Renderer};

use rayon::prelude::*;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use validator::Validate;

use std::time::Instant;

/// Parse the `[start, end]` dates of a time range.
///
/// # Errors
///
/// Fails with [QueryError::InvalidDateFormat] unless both dates are `YYYY-MM-DD`, where month
/// and day may drop their leading zero. Fails with [QueryError::InvalidDateRange] if the start
/// is after the end.
pub fn parse_time_range(time_range: &[String]) -> Result<(Date, Date), QueryError> {
    let format = format_description!("[year]-[month padding:none]-[day padding:none]");
    let (start, end) = match time_range {
        [start, end] => (start, end),
        _ => return Err(QueryError::InvalidDateFormat),
    };
    let start = Date::parse(start.trim(), format).map_err(|_| QueryError::InvalidDateFormat)?;
    let end = Date::parse(end.trim(), format).map_err(|_| QueryError::InvalidDateFormat)?;
    if start > end {
        return Err(QueryError::InvalidDateRange);
    }
    Ok((start, end))
}

/// Capitalise the first letter of each word, e.g. `Pacific Ocean`.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Keep a rendered payload, or log the failure and drop it.
fn payload_or_none(kind: &str, result: Result<Option<String>, RenderError>) -> Option<String> {
    match result {
        Ok(payload) => payload,
        Err(err) => {
            warn!("Failed to render {} payload: {}", kind, err);
            None
        }
    }
}

/// Query orchestrator
///
/// Holds the immutable configuration and the collaborators used to answer queries.
pub struct Orchestrator {
    config: EngineConfig,
    source: Box<dyn RasterSource>,
    renderer: Box<dyn Renderer>,
    explainer: Option<Box<dyn Explainer>>,
}

impl Orchestrator {
    /// Return a new Orchestrator with explicit collaborators.
    pub fn new(
        config: EngineConfig,
        source: Box<dyn RasterSource>,
        renderer: Box<dyn Renderer>,
        explainer: Option<Box<dyn Explainer>>,
    ) -> Self {
        Orchestrator {
            config,
            source,
            renderer,
            explainer,
        }
    }

    /// Return a new Orchestrator reading GeoTIFFs, rendering JSON payloads and explaining
    /// results with a [SummaryExplainer].
    pub fn with_defaults(config: EngineConfig) -> Self {
        Self::new(
            config,
            Box::new(GeoTiffSource),
            Box::new(JsonRenderer),
            Some(Box::new(SummaryExplainer)),
        )
    }

    /// Replace the raster source.
    pub fn with_source(mut self, source: Box<dyn RasterSource>) -> Self {
        self.source = source;
        self
    }

    /// Replace the renderer.
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the explainer, or remove it with `None`.
    pub fn with_explainer(mut self, explainer: Option<Box<dyn Explainer>>) -> Self {
        self.explainer = explainer;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answer a query: every operation if it asks for `all`, otherwise its single operation.
    pub fn run(&self, query: &Query) -> Result<QueryResponse, QueryError> {
        match query.operation.parse::<OperationRequest>() {
            Ok(OperationRequest::All) => Ok(QueryResponse::All(self.run_all_operations(query))),
            _ => self
                .run_operation(query)
                .map(|record| QueryResponse::Single(Box::new(record))),
        }
    }

    /// Run the single operation named by a query.
    ///
    /// Validation happens in a fixed order: structure, dates, operation, location, and only
    /// then the filesystem.
    #[tracing::instrument(level = "INFO", skip(self))]
    pub fn run_operation(&self, query: &Query) -> Result<OperationRecord, QueryError> {
        self.timed(query, None)
    }

    /// Run every operation of the supported-operations table over a query.
    ///
    /// The operation named by the query is ignored. A failing operation records its error
    /// message in the report without affecting the others.
    #[tracing::instrument(level = "INFO", skip(self))]
    pub fn run_all_operations(&self, query: &Query) -> AllOperationsReport {
        let run = |operation: &Operation| {
            info!("Running {}", operation);
            let outcome = match self.timed(query, Some(*operation)) {
                Ok(record) => OperationOutcome::Computed(record.into()),
                Err(err) => OperationOutcome::Failed {
                    error: err.to_string(),
                },
            };
            (*operation, outcome)
        };
        let entries: Vec<(Operation, OperationOutcome)> = if self.config.use_rayon {
            self.config.operations.par_iter().map(run).collect()
        } else {
            self.config.operations.iter().map(run).collect()
        };
        AllOperationsReport { entries }
    }

    /// Evaluate an operation and record its metrics.
    fn timed(
        &self,
        query: &Query,
        operation: Option<Operation>,
    ) -> Result<OperationRecord, QueryError> {
        let started = Instant::now();
        let result = self.evaluate(query, operation);
        let label = match (operation, &result) {
            (Some(operation), _) => operation.to_string(),
            (None, Ok(record)) => record.operation.to_string(),
            (None, Err(_)) => query
                .operation
                .parse::<Operation>()
                .map(|operation| operation.to_string())
                .unwrap_or_else(|_| "unsupported".to_string()),
        };
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind().label(),
        };
        metrics::record_query(&label, outcome, started.elapsed());
        result
    }

    /// Validate a query and compute one operation over it.
    ///
    /// `operation` overrides the operation named by the query.
    fn evaluate(
        &self,
        query: &Query,
        operation: Option<Operation>,
    ) -> Result<OperationRecord, QueryError> {
        query.validate()?;
        let (start, end) = parse_time_range(&query.time_range)?;
        let operation = match operation {
            Some(operation) => operation,
            None => query.operation.parse()?,
        };
        let location = query.normalized_location();
        let region = match &location {
            Some(name) => Some(self.config.region(name).ok_or_else(|| {
                QueryError::UnknownRegion {
                    location: name.clone(),
                }
            })?),
            None => None,
        };
        info!(
            "Performing {} on {} from {} to {} over {}",
            operation,
            query.parameter,
            start,
            end,
            location.as_deref().unwrap_or("global")
        );

        let deadline = self.config.query_timeout.map(Deadline::after);
        let resolved = catalog::resolve_files(
            &self.config.dataset_root,
            &query.parameter,
            start,
            end,
            &self.config.extension,
        )?;
        if resolved.files.is_empty() {
            metrics::record_skips(&resolved.skipped);
            return Err(QueryError::NoMatchingFiles);
        }

        let outcome = crop::crop_files(
            self.source.as_ref(),
            &resolved.files,
            region,
            deadline.as_ref(),
        )?;
        let stack = match outcome {
            CropOutcome::Frames(stack) => stack,
            CropOutcome::NoValidData(skipped) => {
                metrics::record_skips(&resolved.skipped);
                metrics::record_skips(&skipped);
                return Err(QueryError::NoValidCroppedData);
            }
        };
        let mut skipped = resolved.skipped;
        skipped.extend(stack.skipped.iter().cloned());
        metrics::record_skips(&skipped);

        let options = AggregateOptions {
            temporal: true,
            spatial: true,
            timestamps: self.config.timestamps,
            query_time: OffsetDateTime::now_utc(),
        };
        let result = operations::aggregate(&stack.frames, operation, &options)?;
        let unit = self.config.unit(&query.parameter).to_string();
        info!(
            "{} value over the selected region and time: {} {}",
            operation.title(),
            result.scalar,
            unit
        );

        let trend_graph = result.temporal.as_ref().and_then(|points| {
            payload_or_none("trend", self.renderer.render_series(operation, points))
        });
        let title = format!(
            "Spatial {} Plot - {}",
            operation.title(),
            location
                .as_deref()
                .map(title_case)
                .unwrap_or_else(|| "Global".to_string())
        );
        let spatial_graph = result.spatial.as_ref().and_then(|grid| {
            payload_or_none(
                "spatial",
                self.renderer.render_map(
                    &title,
                    grid.view(),
                    stack.lat_grid.view(),
                    stack.lon_grid.view(),
                ),
            )
        });

        let explanation = self.explainer.as_ref().and_then(|explainer| {
            let context = ExplanationContext {
                operation,
                parameter: &query.parameter,
                location: location.as_deref(),
                start: &query.time_range[0],
                end: &query.time_range[1],
                value: result.scalar,
                unit: &unit,
            };
            match explainer.explain(&context) {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!("Failed to explain result: {}", err);
                    None
                }
            }
        });

        Ok(OperationRecord {
            operation,
            value: result.scalar,
            unit,
            parameter: query.parameter.clone(),
            time_range: query.time_range.clone(),
            location,
            trend_graph,
            spatial_graph,
            explanation,
            files_used: stack.frames.len(),
            skipped,
        })
    }
}
