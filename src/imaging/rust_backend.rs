//! Pure Rust image processing backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::ImageReader` with guessed format |
//! | EXIF orientation | `image::ImageDecoder::orientation` |
//! | Auto-rotate | `image::DynamicImage::apply_orientation` |
//! | Slide resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Tile crop | `image::DynamicImage::resize_to_fill` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, ImageBackend};
use super::calculations::fit_within;
use super::params::{FitParams, Quality, TileParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
}

/// Load and decode an image from disk, turning it upright when asked.
fn load_image(path: &Path, auto_rotate: bool) -> Result<DynamicImage, BackendError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let mut decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;
    let orientation = if auto_rotate {
        decoder.orientation().unwrap_or(Orientation::NoTransforms)
    } else {
        Orientation::NoTransforms
    };
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn encode(image: &RgbImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
        .encode_image(image)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn orientation(&self, path: &Path) -> Result<Orientation, BackendError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let mut decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;
        decoder.orientation().map_err(|e| decode_error(path, e))
    }

    fn render_fit(&self, params: &FitParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source, params.auto_rotate)?;
        let img = match fit_within(
            (img.width(), img.height()),
            (params.max_width, params.max_height),
        ) {
            Some((w, h)) => img.resize_exact(w, h, FilterType::Lanczos3),
            None => img,
        };
        encode(&img.to_rgb8(), params.quality)
    }

    fn render_tile(&self, params: &TileParams) -> Result<RgbImage, BackendError> {
        let img = load_image(&params.source, params.auto_rotate)?;
        Ok(img
            .resize_to_fill(params.width, params.height, FilterType::Lanczos3)
            .to_rgb8())
    }

    fn encode_jpeg(&self, image: &RgbImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        encode(image, quality)
    }
}
