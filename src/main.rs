//! This file defines the rasterstat binary entry point.

use rasterstat::app;
use rasterstat::cli;
use rasterstat::metrics;
use rasterstat::tracing;

use std::process::ExitCode;

/// Application entry point
fn main() -> ExitCode {
    let args = cli::parse();
    tracing::init_tracing();
    if let Err(err) = metrics::register_metrics() {
        ::tracing::warn!("Failed to register metrics: {}", err);
    }
    let code = app::run(&args);
    if args.print_metrics {
        match metrics::metrics_text() {
            Ok(text) => eprint!("{}", text),
            Err(err) => ::tracing::warn!("Failed to gather metrics: {}", err),
        }
    }
    code
}
