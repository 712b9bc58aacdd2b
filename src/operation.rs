//! Statistical operations and the reducer they share.

use crate::error::QueryError;

use ndarray::{Array1, Axis};
use ndarray_stats::{interpolate::Midpoint, QuantileExt};
use noisy_float::types::n64;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use std::str::FromStr;

/// Supported statistical operations
///
/// All operations ignore missing (NaN) samples.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    /// Arithmetic mean
    Mean,
    /// Median (midpoint of the two central values for even counts)
    Median,
    /// Population variance
    Variance,
    /// Maximum
    Max,
    /// Minimum
    Min,
    /// Maximum minus minimum
    Range,
    /// Population standard deviation
    Deviation,
}

impl Operation {
    /// Every operation, in the order of the default supported-operations table.
    pub const ALL: [Operation; 7] = [
        Operation::Mean,
        Operation::Median,
        Operation::Variance,
        Operation::Max,
        Operation::Min,
        Operation::Range,
        Operation::Deviation,
    ];

    /// Returns the operation name with its first letter capitalised, e.g. `Max`.
    pub fn title(&self) -> String {
        let name = self.to_string();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => name,
        }
    }

    /// Reduce a sequence of samples to a single value.
    ///
    /// This is the only place where operations are distinguished. The scalar, temporal and
    /// spatial paths all feed their lanes through here.
    ///
    /// Returns NaN when the sequence holds no non-missing sample.
    pub fn reduce<'a, I>(&self, samples: I) -> f64
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut valid: Array1<f64> = samples
            .into_iter()
            .copied()
            .filter(|x| !x.is_nan())
            .collect();
        if valid.is_empty() {
            return f64::NAN;
        }
        match self {
            Operation::Mean => valid.mean().unwrap_or(f64::NAN),
            Operation::Median => valid
                .quantile_axis_skipnan_mut(Axis(0), n64(0.5), &Midpoint)
                .ok()
                .and_then(|median| median.first().copied())
                .unwrap_or(f64::NAN),
            Operation::Variance => valid.var(0.0),
            Operation::Max => *valid.max_skipnan(),
            Operation::Min => *valid.min_skipnan(),
            Operation::Range => *valid.max_skipnan() - *valid.min_skipnan(),
            Operation::Deviation => valid.std(0.0),
        }
    }
}

impl FromStr for Operation {
    type Err = QueryError;

    /// Parse an operation name, ignoring case and surrounding whitespace.
    ///
    /// `trend` is a recognised word but not an aggregatable operation, so it is rejected
    /// like any unknown name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let operation = match s.trim().to_lowercase().as_str() {
            "mean" => Operation::Mean,
            "median" => Operation::Median,
            "variance" => Operation::Variance,
            "max" => Operation::Max,
            "min" => Operation::Min,
            "range" => Operation::Range,
            "deviation" => Operation::Deviation,
            _ => {
                return Err(QueryError::UnsupportedOperation {
                    operation: s.to_string(),
                })
            }
        };
        Ok(operation)
    }
}

/// What a query asks for: one operation, or every supported operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationRequest {
    /// A single operation
    Single(Operation),
    /// Every operation in the supported-operations table
    All,
}

impl FromStr for OperationRequest {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(OperationRequest::All)
        } else {
            s.parse().map(OperationRequest::Single)
        }
    }
}
