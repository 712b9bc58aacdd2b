//! Visualization payloads.
//!
//! A [Renderer] turns the temporal series and spatial map of a result into opaque payload
//! strings. [JsonRenderer] emits JSON documents describing a line chart and a heat map,
//! leaving the drawing to the consumer.

use crate::models::TimeSeriesPoint;
use crate::operation::Operation;

use ndarray::{ArrayView2, Axis};
use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

/// Error rendering a payload
#[derive(Debug, Error)]
pub enum RenderError {
    /// Error formatting a timestamp
    #[error("error formatting timestamp")]
    Timestamp(#[from] time::error::Format),

    /// Error serialising a payload
    #[error("error serialising payload")]
    Json(#[from] serde_json::Error),
}

/// Producer of visualization payloads
///
/// `Ok(None)` means there is nothing worth drawing.
pub trait Renderer: Send + Sync {
    /// Render a temporal series of one operation.
    fn render_series(
        &self,
        operation: Operation,
        points: &[TimeSeriesPoint],
    ) -> Result<Option<String>, RenderError>;

    /// Render a spatial map with its coordinate grids.
    fn render_map(
        &self,
        title: &str,
        grid: ArrayView2<f64>,
        lat_grid: ArrayView2<f64>,
        lon_grid: ArrayView2<f64>,
    ) -> Result<Option<String>, RenderError>;
}

/// Line chart payload
#[derive(Debug, Serialize)]
struct SeriesPayload<'a> {
    title: String,
    name: Operation,
    x_label: &'a str,
    y_label: String,
    x: Vec<String>,
    y: Vec<f64>,
}

/// Heat map payload
#[derive(Debug, Serialize)]
struct MapPayload<'a> {
    title: &'a str,
    x_label: &'a str,
    y_label: &'a str,
    color_label: &'a str,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<Vec<f64>>,
}

/// [Renderer] emitting JSON chart descriptions
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_series(
        &self,
        operation: Operation,
        points: &[TimeSeriesPoint],
    ) -> Result<Option<String>, RenderError> {
        let valid: Vec<&TimeSeriesPoint> =
            points.iter().filter(|point| !point.value.is_nan()).collect();
        if valid.is_empty() {
            warn!("No valid values for trend plot");
            return Ok(None);
        }
        let x = valid
            .iter()
            .map(|point| point.timestamp.format(&Rfc3339))
            .collect::<Result<Vec<String>, _>>()?;
        let payload = SeriesPayload {
            title: format!("Daily {} Trend", operation.title()),
            name: operation,
            x_label: "Date",
            y_label: operation.title(),
            x,
            y: valid.iter().map(|point| point.value).collect(),
        };
        Ok(Some(serde_json::to_string(&payload)?))
    }

    fn render_map(
        &self,
        title: &str,
        grid: ArrayView2<f64>,
        lat_grid: ArrayView2<f64>,
        lon_grid: ArrayView2<f64>,
    ) -> Result<Option<String>, RenderError> {
        if grid.iter().all(|x| x.is_nan()) {
            warn!("No valid data for spatial plot");
            return Ok(None);
        }
        if grid.shape() != lat_grid.shape() || grid.shape() != lon_grid.shape() {
            warn!(
                "Invalid data for spatial plot. Grid: {:?}, coordinates: {:?} and {:?}",
                grid.shape(),
                lat_grid.shape(),
                lon_grid.shape()
            );
            return Ok(None);
        }
        let payload = MapPayload {
            title,
            x_label: "Longitude",
            y_label: "Latitude",
            color_label: "Value",
            x: lon_grid.row(0).to_vec(),
            y: lat_grid.column(0).to_vec(),
            z: grid.axis_iter(Axis(0)).map(|row| row.to_vec()).collect(),
        };
        Ok(Some(serde_json::to_string(&payload)?))
    }
}
