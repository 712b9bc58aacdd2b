//! Query interpretation.
//!
//! A [QueryInterpreter] turns user input into a structured [Query]. Natural-language
//! extraction is left to external implementations; [JsonQueryInterpreter] accepts a JSON
//! document and recovers a missing operation from the free text it carries.

use crate::models::Query;

use thiserror::Error;
use tracing::debug;

/// Operation keywords searched for in free text, in order of precedence
pub const OPERATION_KEYWORDS: [&str; 8] = [
    "mean",
    "median",
    "variance",
    "max",
    "min",
    "range",
    "deviation",
    "all",
];

/// Error interpreting a query
#[derive(Debug, Error)]
pub enum InterpretError {
    /// The query is not a valid JSON query document
    #[error("query is not a valid JSON query")]
    Json(#[from] serde_json::Error),

    /// Neither the query nor its text names an operation
    #[error("Could not determine the operation from the query. Please specify one of: mean, median, variance, max, min, range, deviation, all.")]
    OperationUndetermined,
}

/// Producer of structured queries
pub trait QueryInterpreter: Send + Sync {
    fn interpret(&self, text: &str) -> Result<Query, InterpretError>;
}

/// Returns the first operation keyword contained in `text`, ignoring case.
///
/// Keywords are tried in [OPERATION_KEYWORDS] order, so `"max and mean"` yields `mean`.
pub fn fallback_operation(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    OPERATION_KEYWORDS
        .iter()
        .find(|keyword| text.contains(*keyword))
        .copied()
}

/// [QueryInterpreter] parsing a JSON [Query] document
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonQueryInterpreter;

impl QueryInterpreter for JsonQueryInterpreter {
    fn interpret(&self, text: &str) -> Result<Query, InterpretError> {
        let mut query: Query = serde_json::from_str(text)?;
        if query.operation.trim().is_empty() {
            let operation = query
                .text
                .as_deref()
                .and_then(fallback_operation)
                .ok_or(InterpretError::OperationUndetermined)?;
            debug!("Recovered operation {} from query text", operation);
            query.operation = operation.to_string();
        }
        Ok(query)
    }
}
