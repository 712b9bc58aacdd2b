//! Georeferencing: affine transforms, bounding boxes and crop windows.

use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use std::ops::Range;

/// Affine pixel-to-geographic transform.
///
/// Maps a `(col, row)` index pair to `(x, y)`:
///
/// * `x = a * col + b * row + c`
/// * `y = d * col + e * row + f`
///
/// For unrotated rasters `b` and `d` are zero and `e` is negative (rows advance southwards).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// Build a north-up transform from an origin and pixel size.
    ///
    /// # Arguments
    ///
    /// * `origin`: `(x, y)` of the corner of pixel `(0, 0)`
    /// * `pixel_size`: `(width, height)` of a pixel, both positive
    pub fn north_up(origin: (f64, f64), pixel_size: (f64, f64)) -> Self {
        GeoTransform {
            a: pixel_size.0,
            b: 0.0,
            c: origin.0,
            d: 0.0,
            e: -pixel_size.1,
            f: origin.1,
        }
    }

    /// Build a transform from the GeoTIFF ModelTiepoint and ModelPixelScale tags.
    ///
    /// Only the first tie point is used. Returns `None` if either tag is too short.
    pub fn from_tiepoint_and_scale(tiepoint: &[f64], scale: &[f64]) -> Option<Self> {
        let (i, j, x, y) = match tiepoint {
            [i, j, _k, x, y, _z, ..] => (*i, *j, *x, *y),
            _ => return None,
        };
        let (sx, sy) = match scale {
            [sx, sy, ..] => (*sx, *sy),
            _ => return None,
        };
        Some(GeoTransform {
            a: sx,
            b: 0.0,
            c: x - i * sx,
            d: 0.0,
            e: -sy,
            f: y + j * sy,
        })
    }

    /// Build a transform from the 4x4 row-major GeoTIFF ModelTransformation matrix.
    ///
    /// Returns `None` if fewer than 8 values are provided.
    pub fn from_model_transformation(matrix: &[f64]) -> Option<Self> {
        match matrix {
            [a, b, _, c, d, e, _, f, ..] => Some(GeoTransform {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            }),
            _ => None,
        }
    }

    /// Apply the transform to a single index pair.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Returns the longitude and latitude of every pixel of a `(rows, cols)` grid.
    pub fn coordinate_grids(&self, shape: (usize, usize)) -> (Array2<f64>, Array2<f64>) {
        let lons = Array2::from_shape_fn(shape, |(row, col)| self.apply(col as f64, row as f64).0);
        let lats = Array2::from_shape_fn(shape, |(row, col)| self.apply(col as f64, row as f64).1);
        (lons, lats)
    }
}

/// Geographic bounding box, inclusive on every edge.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    /// Return a new BoundingBox object.
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        BoundingBox {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    /// Whether a coordinate lies inside the box.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max && lat >= self.lat_min && lat <= self.lat_max
    }

    /// Whether the minimum of each axis is no greater than its maximum.
    pub fn is_well_formed(&self) -> bool {
        self.lon_min <= self.lon_max && self.lat_min <= self.lat_max
    }
}

/// Index rectangle of a crop, as half-open row and column ranges.
#[derive(Clone, Debug, PartialEq)]
pub struct CropWindow {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl CropWindow {
    /// Shape of the cropped array.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }
}

/// Returns the smallest index rectangle covering every pixel inside `bbox`.
///
/// A row (column) is part of the rectangle span if any pixel of it lies inside the box; the
/// rectangle runs from the first to the last such row (column). Returns `None` if no pixel
/// lies inside the box.
pub fn crop_window(
    lons: ArrayView2<f64>,
    lats: ArrayView2<f64>,
    bbox: &BoundingBox,
) -> Option<CropWindow> {
    let mask = Zip::from(&lons)
        .and(&lats)
        .map_collect(|&lon, &lat| bbox.contains(lon, lat));
    let row_mask = mask.map_axis(Axis(1), |row| row.iter().any(|inside| *inside));
    let col_mask = mask.map_axis(Axis(0), |col| col.iter().any(|inside| *inside));
    let rows = first_to_last(row_mask.iter().copied())?;
    let cols = first_to_last(col_mask.iter().copied())?;
    Some(CropWindow { rows, cols })
}

/// Range from the first to one past the last `true` element.
fn first_to_last<I>(mask: I) -> Option<Range<usize>>
where
    I: Iterator<Item = bool>,
{
    let mut first = None;
    let mut last = None;
    for (index, inside) in mask.enumerate() {
        if inside {
            first.get_or_insert(index);
            last = Some(index);
        }
    }
    match (first, last) {
        (Some(first), Some(last)) => Some(first..last + 1),
        _ => None,
    }
}
