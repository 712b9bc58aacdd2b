//! Cropping of raster frames to a region.

use crate::catalog::CatalogEntry;
use crate::error::QueryError;
use crate::geo::{crop_window, BoundingBox};
use crate::models::{Deadline, SkipReason, SkippedFile};
use crate::raster::RasterSource;

use ndarray::{s, Array2};
use time::Date;
use tracing::{debug, info, warn};

use std::path::PathBuf;

/// A frame restricted to a region
#[derive(Clone, Debug, PartialEq)]
pub struct CroppedFrame {
    /// Source file
    pub path: PathBuf,
    /// Date of the source file
    pub date: Date,
    /// Cropped samples, NaN for missing
    pub data: Array2<f64>,
}

/// Accepted frames of a query, all of one shape
#[derive(Clone, Debug, PartialEq)]
pub struct CroppedStack {
    pub frames: Vec<CroppedFrame>,
    /// Latitude of each pixel of the first accepted frame
    pub lat_grid: Array2<f64>,
    /// Longitude of each pixel of the first accepted frame
    pub lon_grid: Array2<f64>,
    /// Files skipped while cropping
    pub skipped: Vec<SkippedFile>,
}

/// Result of cropping a batch of files
#[derive(Clone, Debug, PartialEq)]
pub enum CropOutcome {
    /// At least one frame was accepted
    Frames(CroppedStack),
    /// Every file was skipped; the report says why
    NoValidData(Vec<SkippedFile>),
}

/// Crop of one file, before shape checking
struct Crop {
    data: Array2<f64>,
    lats: Array2<f64>,
    lons: Array2<f64>,
}

/// Open and crop one file.
fn crop_file(
    source: &dyn RasterSource,
    entry: &CatalogEntry,
    region: Option<&BoundingBox>,
) -> Result<Crop, SkipReason> {
    let frame = source.open(&entry.path).map_err(|err| {
        warn!("Error processing file {}: {}", entry.path.display(), err);
        SkipReason::Decode(err.to_string())
    })?;
    let shape = frame.data.dim();
    let (lons, lats) = frame.transform.coordinate_grids(shape);

    let crop = match region {
        Some(bbox) => {
            let window = crop_window(lons.view(), lats.view(), bbox).ok_or_else(|| {
                info!(
                    "No data within bounding box for file {}",
                    entry.path.display()
                );
                SkipReason::OutsideRegion
            })?;
            let (rows, cols) = (window.rows, window.cols);
            Crop {
                data: frame.data.slice(s![rows.clone(), cols.clone()]).to_owned(),
                lats: lats.slice(s![rows.clone(), cols.clone()]).to_owned(),
                lons: lons.slice(s![rows, cols]).to_owned(),
            }
        }
        None => Crop {
            data: frame.data,
            lats,
            lons,
        },
    };

    if crop.data.iter().all(|x| x.is_nan()) {
        info!(
            "No valid data in cropped area for file {}",
            entry.path.display()
        );
        return Err(SkipReason::AllMissing);
    }
    Ok(crop)
}

/// Open and crop each file, skipping those that cannot contribute.
///
/// # Arguments
///
/// * `source`: Raster decoder
/// * `entries`: Files to crop, in order
/// * `region`: Region to crop to, or `None` for the whole frame
/// * `deadline`: Optional deadline, checked before each file is opened
///
/// # Errors
///
/// Fails with [QueryError::ShapeMismatch] if two accepted crops differ in shape, and with
/// [QueryError::DeadlineExceeded] if the deadline passes part way through.
#[tracing::instrument(level = "DEBUG", skip_all, fields(files = entries.len()))]
pub fn crop_files(
    source: &dyn RasterSource,
    entries: &[CatalogEntry],
    region: Option<&BoundingBox>,
    deadline: Option<&Deadline>,
) -> Result<CropOutcome, QueryError> {
    let mut frames: Vec<CroppedFrame> = Vec::with_capacity(entries.len());
    let mut grids = None;
    let mut skipped = vec![];

    for entry in entries {
        if let Some(deadline) = deadline {
            if deadline.expired() {
                return Err(QueryError::DeadlineExceeded {
                    seconds: deadline.seconds(),
                });
            }
        }
        let crop = match crop_file(source, entry, region) {
            Ok(crop) => crop,
            Err(reason) => {
                skipped.push(SkippedFile::new(entry.path.clone(), reason));
                continue;
            }
        };
        if let Some(first) = frames.first() {
            if first.data.shape() != crop.data.shape() {
                return Err(QueryError::ShapeMismatch {
                    expected: first.data.shape().to_vec(),
                    found: crop.data.shape().to_vec(),
                    path: entry.path.clone(),
                });
            }
        } else {
            grids = Some((crop.lats, crop.lons));
        }
        debug!(
            "Cropped {} to shape {:?}",
            entry.path.display(),
            crop.data.shape()
        );
        frames.push(CroppedFrame {
            path: entry.path.clone(),
            date: entry.date,
            data: crop.data,
        });
    }

    match grids {
        Some((lat_grid, lon_grid)) => Ok(CropOutcome::Frames(CroppedStack {
            frames,
            lat_grid,
            lon_grid,
            skipped,
        })),
        None => Ok(CropOutcome::NoValidData(skipped)),
    }
}
