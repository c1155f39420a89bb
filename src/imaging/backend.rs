//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the slideshow
//! needs: read orientation, render a slide, render a collage tile, and
//! encode a finished canvas.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{FitParams, Quality, TileParams};
use image::RgbImage;
use image::metadata::Orientation;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Whether the display client has to turn a picture to show it upright.
///
/// Only the pure rotations count (EXIF 3, 6 and 8); mirrored variants and
/// the identity do not.
pub fn needs_rotation(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90 | Orientation::Rotate180 | Orientation::Rotate270
    )
}

/// Trait for image processing backends.
///
/// `Sync` so collage tiles can be rendered in parallel with rayon.
pub trait ImageBackend: Sync {
    /// Embedded EXIF orientation of a file.
    fn orientation(&self, path: &Path) -> Result<Orientation, BackendError>;

    /// Decode, optionally orient, shrink to fit, and encode one slide as JPEG.
    fn render_fit(&self, params: &FitParams) -> Result<Vec<u8>, BackendError>;

    /// Decode, optionally orient, and crop-to-fill one collage tile.
    fn render_tile(&self, params: &TileParams) -> Result<RgbImage, BackendError>;

    /// Encode a finished canvas as JPEG.
    fn encode_jpeg(&self, image: &RgbImage, quality: Quality) -> Result<Vec<u8>, BackendError>;
}
