//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend, needs_rotation};
use super::calculations::{tile_origin, tile_size};
use super::params::{FitParams, Quality, TileParams};
use image::RgbImage;
use image::imageops;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// How a single slide is rendered.
#[derive(Debug, Clone)]
pub struct SlideConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub auto_rotate: bool,
    pub quality: Quality,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            auto_rotate: true,
            quality: Quality::default(),
        }
    }
}

/// Render one file as a slide JPEG.
pub fn render_slide(backend: &impl ImageBackend, source: &Path, config: &SlideConfig) -> Result<Vec<u8>> {
    backend.render_fit(&FitParams {
        source: source.to_path_buf(),
        max_width: config.max_width,
        max_height: config.max_height,
        auto_rotate: config.auto_rotate,
        quality: config.quality,
    })
}

/// Canvas and grid of a collage.
#[derive(Debug, Clone)]
pub struct CollageLayout {
    pub width: u32,
    pub height: u32,
    pub rows: u32,
    pub cols: u32,
    pub gap: u32,
    pub auto_rotate: bool,
    pub quality: Quality,
}

impl Default for CollageLayout {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            rows: 3,
            cols: 3,
            gap: 2,
            auto_rotate: true,
            quality: Quality::default(),
        }
    }
}

impl CollageLayout {
    pub fn cells(&self) -> usize {
        (self.rows * self.cols) as usize
    }
}

/// A tile to render and where it lands on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTile {
    pub params: TileParams,
    pub x: u32,
    pub y: u32,
}

/// Plan the tiles for `files` without executing anything.
///
/// Files beyond the grid capacity are ignored. The last row may be partial.
pub fn plan_collage(files: &[PathBuf], layout: &CollageLayout) -> Vec<PlannedTile> {
    let tile = tile_size((layout.width, layout.height), layout.rows, layout.cols, layout.gap);
    files
        .iter()
        .take(layout.cells())
        .enumerate()
        .map(|(i, source)| {
            let (x, y) = tile_origin(i, layout.cols, tile, layout.gap);
            PlannedTile {
                params: TileParams {
                    source: source.clone(),
                    width: tile.0,
                    height: tile.1,
                    auto_rotate: layout.auto_rotate,
                },
                x,
                y,
            }
        })
        .collect()
}

/// Compose `files` into one JPEG on a black canvas.
///
/// Tiles are decoded in parallel; any tile failure fails the collage.
pub fn compose_collage(
    backend: &impl ImageBackend,
    files: &[PathBuf],
    layout: &CollageLayout,
) -> Result<Vec<u8>> {
    let plan = plan_collage(files, layout);
    if plan
        .first()
        .is_some_and(|t| t.params.width == 0 || t.params.height == 0)
    {
        return Err(BackendError::ProcessingFailed(format!(
            "{}x{} canvas is too small for a {}x{} grid",
            layout.width, layout.height, layout.rows, layout.cols
        )));
    }

    let tiles = plan
        .par_iter()
        .map(|t| backend.render_tile(&t.params).map(|img| (img, t.x, t.y)))
        .collect::<Result<Vec<_>>>()?;

    let mut canvas = RgbImage::new(layout.width, layout.height);
    for (tile, x, y) in &tiles {
        imageops::replace(&mut canvas, tile, *x as i64, *y as i64);
    }
    debug!(tiles = tiles.len(), "collage composed");

    backend.encode_jpeg(&canvas, layout.quality)
}

/// Per-file flag telling a client to rotate the picture itself.
///
/// Unreadable files count as upright.
pub fn rotation_flags(backend: &impl ImageBackend, files: &[PathBuf]) -> Vec<bool> {
    files
        .par_iter()
        .map(|f| backend.orientation(f).map(needs_rotation).unwrap_or(false))
        .collect()
}
