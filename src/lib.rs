//! This crate provides a raster time-series aggregation engine. It answers queries about
//! environmental parameters, such as the mean ocean current speed over the Pacific in 2020,
//! by locating the daily raster files of the parameter, cropping them to a geographic region
//! and computing NaN-aware statistics over them.
//!
//! Each query produces three results from a single shared reducer:
//!
//! * a scalar over every sample of every frame,
//! * a temporal series with one value per frame,
//! * a spatial map with one value per pixel across frames.
//!
//! The engine is built on top of a number of open source components.
//!
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays used in numerical
//!   computation, with [ndarray-stats](ndarray_stats) supplying NaN-skipping statistics.
//! * [tiff] decodes GeoTIFF rasters in pure Rust.
//! * [Serde](serde) performs (de)serialisation of JSON queries, configuration and results.
//! * [Rayon](rayon) runs the operations of an `all` query in parallel.

pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod crop;
pub mod error;
pub mod explain;
pub mod geo;
pub mod interpret;
pub mod metrics;
pub mod models;
pub mod operation;
pub mod operations;
pub mod orchestrator;
pub mod raster;
pub mod render;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
