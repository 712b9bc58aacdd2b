//! Command Line Interface (CLI) arguments.

use crate::models::TimestampSource;

use clap::Parser;

/// rasterstat command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// Root directory holding one dataset directory per parameter [default: ~/datasets]
    #[arg(long, env = "RASTERSTAT_DATASET_ROOT")]
    pub dataset_root: Option<String>,
    /// Path to a JSON file overriding the default regions, units and operations
    #[arg(long, env = "RASTERSTAT_CONFIG")]
    pub config: Option<String>,
    /// The query to answer, as a JSON document
    #[arg(long, env = "RASTERSTAT_QUERY")]
    pub query: String,
    /// Source of the timestamps of temporal series points
    #[arg(long, value_enum, env = "RASTERSTAT_TIMESTAMPS")]
    pub timestamps: Option<TimestampSource>,
    /// Maximum time in seconds a single operation may take
    #[arg(long, env = "RASTERSTAT_QUERY_TIMEOUT")]
    pub query_timeout: Option<u64>,
    /// Whether to use Rayon to run the operations of an `all` query in parallel.
    #[arg(long, default_value_t = false, env = "RASTERSTAT_USE_RAYON")]
    pub use_rayon: bool,
    /// Whether to print Prometheus metrics to stderr on exit.
    #[arg(long, default_value_t = false, env = "RASTERSTAT_PRINT_METRICS")]
    pub print_metrics: bool,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
