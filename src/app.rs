//! Command line application: interpret a query, answer it and print the result.

use crate::cli::CommandLineArgs;
use crate::config::{ConfigError, EngineConfig};
use crate::error::{ErrorKind, ErrorResponse, QueryError};
use crate::interpret::{InterpretError, JsonQueryInterpreter, QueryInterpreter};
use crate::models::QueryResponse;
use crate::orchestrator::Orchestrator;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use std::process::ExitCode;

/// Error answering a query from the command line
#[derive(Debug, Error)]
pub enum AppError {
    /// Error loading configuration
    #[error("failed to load configuration")]
    Config(#[from] ConfigError),

    /// Error interpreting the query
    #[error(transparent)]
    Interpret(#[from] InterpretError),

    /// Error answering the query
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<AppError> for ErrorResponse {
    /// Convert from an `AppError` into an `ErrorResponse`.
    fn from(error: AppError) -> Self {
        match error {
            AppError::Config(_) => ErrorResponse::new(ErrorKind::Internal, &error),
            AppError::Interpret(_) => ErrorResponse::new(ErrorKind::Validation, &error),
            AppError::Query(error) => error.into(),
        }
    }
}

/// Build an orchestrator from arguments and answer their query.
pub fn answer(args: &CommandLineArgs) -> Result<QueryResponse, AppError> {
    let config = EngineConfig::from_args(args)?;
    info!("Dataset root: {}", config.dataset_root.display());
    let query = JsonQueryInterpreter.interpret(&args.query)?;
    let orchestrator = Orchestrator::with_defaults(config);
    Ok(orchestrator.run(&query)?)
}

/// Print a value as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(err) => {
            tracing::error!("Failed to serialise output: {}", err);
            false
        }
    }
}

/// Answer the query of the arguments, printing the result or an error report.
///
/// Returns a failure exit code if the query could not be answered.
pub fn run(args: &CommandLineArgs) -> ExitCode {
    match answer(args) {
        Ok(response) if print_json(&response) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(error) => {
            print_json(&ErrorResponse::from(error));
            ExitCode::FAILURE
        }
    }
}
