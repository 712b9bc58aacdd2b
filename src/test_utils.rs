use crate::config::EngineConfig;
use crate::geo::GeoTransform;
use crate::raster::{
    RasterError, RasterFrame, RasterSource, GDAL_NODATA, GEOTIFF_MODELPIXELSCALE,
    GEOTIFF_MODELTIEPOINT,
};

use ndarray::Array2;
use tiff::encoder::colortype::{ColorType, Gray32Float};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Encode a north-up frame as a single-band float GeoTIFF.
pub(crate) fn geotiff_bytes(
    data: &Array2<f64>,
    transform: &GeoTransform,
    nodata: Option<f64>,
) -> Vec<u8> {
    let (rows, cols) = data.dim();
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
        let mut image = encoder
            .new_image::<Gray32Float>(cols as u32, rows as u32)
            .unwrap();
        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
        let pixel_scale = [transform.a, -transform.e, 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())
            .unwrap();
        // ModelTiepoint: [I, J, K, X, Y, Z]
        let tiepoint = [0.0, 0.0, 0.0, transform.c, transform.f, 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())
            .unwrap();
        if let Some(nodata) = nodata {
            image
                .encoder()
                .write_tag(Tag::Unknown(GDAL_NODATA), nodata.to_string().as_str())
                .unwrap();
        }
        let samples: Vec<f32> = data.iter().map(|x| *x as f32).collect();
        image.write_data(&samples).unwrap();
    }
    cursor.into_inner()
}

/// Encode a float TIFF without any georeferencing tags.
pub(crate) fn plain_tiff_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
        let samples = vec![0.0f32; (width * height) as usize];
        encoder
            .write_image::<Gray32Float>(width, height, &samples)
            .unwrap();
    }
    cursor.into_inner()
}

/// Encode an image of any colour type with extra tags of doubles.
///
/// `samples` holds every sample of every pixel, interleaved.
pub(crate) fn tiff_bytes<C: ColorType>(
    width: u32,
    height: u32,
    samples: &[C::Inner],
    tags: &[(u16, &[f64])],
) -> Vec<u8>
where
    [C::Inner]: TiffValue,
{
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
        let mut image = encoder.new_image::<C>(width, height).unwrap();
        for (tag, values) in tags {
            image.encoder().write_tag(Tag::Unknown(*tag), *values).unwrap();
        }
        image.write_data(samples).unwrap();
    }
    cursor.into_inner()
}

/// Write a GeoTIFF file, creating parent directories as needed.
pub(crate) fn write_geotiff(
    path: &Path,
    data: &Array2<f64>,
    transform: &GeoTransform,
    nodata: Option<f64>,
) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, geotiff_bytes(data, transform, nodata)).unwrap();
}

/// Create an EngineConfig with default registries rooted at `root`.
pub(crate) fn test_config(root: &Path) -> EngineConfig {
    EngineConfig {
        dataset_root: root.to_path_buf(),
        ..Default::default()
    }
}

/// RasterSource serving frames from memory.
///
/// Opening a path that was never inserted fails like a missing file.
#[derive(Debug, Default)]
pub(crate) struct MemorySource {
    frames: HashMap<PathBuf, RasterFrame>,
}

impl MemorySource {
    pub(crate) fn insert(
        &mut self,
        path: impl Into<PathBuf>,
        data: Array2<f64>,
        transform: GeoTransform,
    ) {
        self.frames
            .insert(path.into(), RasterFrame { data, transform });
    }
}

impl RasterSource for MemorySource {
    fn open(&self, path: &Path) -> Result<RasterFrame, RasterError> {
        self.frames.get(path).cloned().ok_or_else(|| {
            RasterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such frame",
            ))
        })
    }
}
