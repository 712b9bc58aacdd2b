//! Raster decoding.
//!
//! Frames are decoded through the [RasterSource] trait so that the orchestrator can be driven
//! by in-memory frames in tests. [GeoTiffSource] reads single-image GeoTIFF files with the
//! pure-Rust `tiff` crate.

use crate::geo::GeoTransform;

use ndarray::{Array2, ShapeError};
use num_traits::ToPrimitive;
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::debug;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// GeoTIFF ModelPixelScale tag
pub const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
/// GeoTIFF ModelTiepoint tag
pub const GEOTIFF_MODELTIEPOINT: u16 = 33922;
/// GeoTIFF ModelTransformation tag
pub const GEOTIFF_MODELTRANSFORMATION: u16 = 34264;
/// GDAL no-data tag, an ASCII number
pub const GDAL_NODATA: u16 = 42113;

/// Error decoding a raster file
#[derive(Debug, Error)]
pub enum RasterError {
    /// Error opening the file
    #[error("error opening raster file")]
    Io(#[from] std::io::Error),

    /// Error decoding the TIFF structure or image data
    #[error("error decoding TIFF")]
    Tiff(#[from] tiff::TiffError),

    /// The file carries neither tie point and scale nor a transformation matrix
    #[error("raster has no georeferencing")]
    MissingGeoreference,

    /// The decoder produced a sample type this crate does not convert
    #[error("unsupported raster sample type")]
    UnsupportedSampleType,

    /// Decoded sample count does not match the image dimensions
    #[error("raster of {width}x{height} decoded to {samples} samples")]
    InvalidShape {
        width: usize,
        height: usize,
        samples: usize,
    },

    /// Error building the band array
    #[error("error building raster array")]
    Shape(#[from] ShapeError),
}

/// First band of a raster, with missing samples as NaN
#[derive(Clone, Debug, PartialEq)]
pub struct RasterFrame {
    /// Samples, shape `(rows, cols)`
    pub data: Array2<f64>,
    /// Pixel-to-geographic transform
    pub transform: GeoTransform,
}

/// Source of raster frames
pub trait RasterSource: Send + Sync {
    /// Decode the first band of the raster at `path`.
    fn open(&self, path: &Path) -> Result<RasterFrame, RasterError>;
}

/// [RasterSource] reading GeoTIFF files from disk
#[derive(Clone, Copy, Debug, Default)]
pub struct GeoTiffSource;

impl RasterSource for GeoTiffSource {
    fn open(&self, path: &Path) -> Result<RasterFrame, RasterError> {
        let reader = BufReader::new(File::open(path)?);
        let frame = decode_geotiff(reader)?;
        debug!(
            "Decoded {} with shape {:?}",
            path.display(),
            frame.data.shape()
        );
        Ok(frame)
    }
}

/// Decode the first band and georeferencing of a GeoTIFF.
///
/// Multi-sample (chunky) images keep only the first sample of each pixel. Samples equal to
/// the GDAL no-data value become NaN, as do NaN samples already present in float images.
pub fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<RasterFrame, RasterError> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let transform = read_transform(&mut decoder)?;
    let nodata = read_nodata(&mut decoder)?;

    let samples = match decoder.read_image()? {
        DecodingResult::U8(data) => to_f64(&data),
        DecodingResult::U16(data) => to_f64(&data),
        DecodingResult::U32(data) => to_f64(&data),
        DecodingResult::U64(data) => to_f64(&data),
        DecodingResult::I8(data) => to_f64(&data),
        DecodingResult::I16(data) => to_f64(&data),
        DecodingResult::I32(data) => to_f64(&data),
        DecodingResult::I64(data) => to_f64(&data),
        DecodingResult::F32(data) => to_f64(&data),
        DecodingResult::F64(data) => data,
        #[allow(unreachable_patterns)]
        _ => return Err(RasterError::UnsupportedSampleType),
    };

    let pixels = width * height;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(RasterError::InvalidShape {
            width,
            height,
            samples: samples.len(),
        });
    }
    let samples_per_pixel = samples.len() / pixels;
    let band: Vec<f64> = samples
        .into_iter()
        .step_by(samples_per_pixel)
        .map(|x| match nodata {
            Some(nodata) if x == nodata => f64::NAN,
            _ => x,
        })
        .collect();
    let data = Array2::from_shape_vec((height, width), band)?;
    Ok(RasterFrame { data, transform })
}

/// Convert decoded samples to f64.
fn to_f64<T: ToPrimitive>(data: &[T]) -> Vec<f64> {
    data.iter()
        .map(|x| x.to_f64().unwrap_or(f64::NAN))
        .collect()
}

/// Read a tag as a list of doubles, if present.
fn read_f64_tag<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: u16,
) -> Result<Option<Vec<f64>>, RasterError> {
    match decoder.find_tag(Tag::from_u16_exhaustive(tag))? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform, RasterError> {
    if let Some(matrix) = read_f64_tag(decoder, GEOTIFF_MODELTRANSFORMATION)? {
        return GeoTransform::from_model_transformation(&matrix)
            .ok_or(RasterError::MissingGeoreference);
    }
    let tiepoint = read_f64_tag(decoder, GEOTIFF_MODELTIEPOINT)?;
    let scale = read_f64_tag(decoder, GEOTIFF_MODELPIXELSCALE)?;
    match (tiepoint, scale) {
        (Some(tiepoint), Some(scale)) => GeoTransform::from_tiepoint_and_scale(&tiepoint, &scale)
            .ok_or(RasterError::MissingGeoreference),
        _ => Err(RasterError::MissingGeoreference),
    }
}

/// Read the GDAL no-data value. An unparseable value is ignored.
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>, RasterError> {
    let value = match decoder.find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))? {
        Some(value) => value,
        None => return Ok(None),
    };
    let nodata = value
        .into_string()
        .ok()
        .and_then(|text| text.trim_matches(char::from(0)).trim().parse::<f64>().ok());
    if nodata.is_none() {
        debug!("Ignoring unparseable no-data value");
    }
    Ok(nodata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    use ndarray::array;
    use std::io::Cursor;
    use tiff::encoder::colortype::{Gray16, Gray32Float, RGB8};

    #[test]
    fn decode_with_tiepoint() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let transform = GeoTransform::north_up((200.0, 10.0), (1.0, 1.0));
        let bytes = test_utils::geotiff_bytes(&data, &transform, None);
        let frame = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!(data, frame.data);
        assert_eq!(transform, frame.transform);
    }

    #[test]
    fn decode_nodata_as_nan() {
        let data = array![[1.0, -9999.0], [f64::NAN, 4.0]];
        let transform = GeoTransform::north_up((0.0, 0.0), (0.5, 0.5));
        let bytes = test_utils::geotiff_bytes(&data, &transform, Some(-9999.0));
        let frame = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!(1.0, frame.data[[0, 0]]);
        assert!(frame.data[[0, 1]].is_nan());
        assert!(frame.data[[1, 0]].is_nan());
        assert_eq!(4.0, frame.data[[1, 1]]);
    }

    #[test]
    fn decode_prefers_model_transformation() {
        // The tie point and scale describe a different grid and must be ignored.
        let tiepoint = [0.0, 0.0, 0.0, -180.0, 90.0, 0.0];
        let scale = [1.0, 1.0, 0.0];
        #[rustfmt::skip]
        let matrix = [
            2.0, 0.0, 0.0, 100.0,
            0.0, -2.0, 0.0, 40.0,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        let bytes = test_utils::tiff_bytes::<Gray32Float>(
            2,
            1,
            &[1.0, 2.0],
            &[
                (GEOTIFF_MODELTIEPOINT, &tiepoint[..]),
                (GEOTIFF_MODELPIXELSCALE, &scale[..]),
                (GEOTIFF_MODELTRANSFORMATION, &matrix[..]),
            ],
        );
        let frame = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!(GeoTransform::north_up((100.0, 40.0), (2.0, 2.0)), frame.transform);
        assert_eq!(array![[1.0, 2.0]], frame.data);
    }

    #[test]
    fn decode_integer_samples() {
        let tiepoint = [0.0, 0.0, 0.0, 10.0, 20.0, 0.0];
        let scale = [0.5, 0.5, 0.0];
        let bytes = test_utils::tiff_bytes::<Gray16>(
            2,
            2,
            &[1, 2, 300, 65535],
            &[
                (GEOTIFF_MODELTIEPOINT, &tiepoint[..]),
                (GEOTIFF_MODELPIXELSCALE, &scale[..]),
            ],
        );
        let frame = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!(array![[1.0, 2.0], [300.0, 65535.0]], frame.data);
        assert_eq!(GeoTransform::north_up((10.0, 20.0), (0.5, 0.5)), frame.transform);
    }

    #[test]
    fn decode_keeps_first_band() {
        let tiepoint = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let scale = [1.0, 1.0, 0.0];
        let bytes = test_utils::tiff_bytes::<RGB8>(
            2,
            2,
            &[10, 11, 12, 20, 21, 22, 30, 31, 32, 40, 41, 42],
            &[
                (GEOTIFF_MODELTIEPOINT, &tiepoint[..]),
                (GEOTIFF_MODELPIXELSCALE, &scale[..]),
            ],
        );
        let frame = decode_geotiff(Cursor::new(bytes)).unwrap();
        assert_eq!(array![[10.0, 20.0], [30.0, 40.0]], frame.data);
    }

    #[test]
    fn decode_without_georeference() {
        let bytes = test_utils::plain_tiff_bytes(2, 2);
        match decode_geotiff(Cursor::new(bytes)) {
            Err(RasterError::MissingGeoreference) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn decode_garbage() {
        match decode_geotiff(Cursor::new(b"not a tiff".to_vec())) {
            Err(RasterError::Tiff(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        match GeoTiffSource.open(&dir.path().join("sst_20200101.tif")) {
            Err(RasterError::Io(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sst_20200101.tif");
        let data = array![[1.5, 2.5]];
        let transform = GeoTransform::north_up((180.0, 0.0), (1.0, 1.0));
        test_utils::write_geotiff(&path, &data, &transform, None);
        let frame = GeoTiffSource.open(&path).unwrap();
        assert_eq!(data, frame.data);
    }
}
