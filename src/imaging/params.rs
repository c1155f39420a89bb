//! Parameter types for image operations.
//!
//! These structs describe *what* to render, not *how*. They sit between the
//! high-level [`operations`](super::operations) (which decide what to draw
//! where) and the [`backend`](super::backend) (which does the pixel work),
//! so tests can swap in a mock backend without touching layout logic.
//!
//! - [`Quality`]: JPEG quality (1–100, default 82). Clamped on construction.
//! - [`FitParams`]: one slide: decode, orient, shrink to fit a bounding box.
//! - [`TileParams`]: one collage cell: decode, orient, crop-to-fill.

use std::path::PathBuf;

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

/// Render a single slide that fits inside `max_width` × `max_height`.
///
/// Images already inside the box are never enlarged.
#[derive(Debug, Clone, PartialEq)]
pub struct FitParams {
    pub source: PathBuf,
    pub max_width: u32,
    pub max_height: u32,
    pub auto_rotate: bool,
    pub quality: Quality,
}

/// Render one collage tile covering exactly `width` × `height`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileParams {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub auto_rotate: bool,
}
