//! Overview and sequence collages built from the active album.
//!
//! Both collages share one count: `min(rows × cols, album size, configured
//! count)`. They differ in which files fill the grid:
//!
//! - **overview** spreads the picks evenly over the whole album, always
//!   starting with its first file,
//! - **sequence** continues right after the window currently on screen,
//!   wrapping around the end of the album.
//!
//! Slide rendering for `/image/:id` lives here too, so the HTTP layer has a
//! single object for all pixel work.

use crate::config::{CollageConfig, SlideshowConfig};
use crate::imaging::{
    BackendError, CollageLayout, ImageBackend, Quality, RustBackend, SlideConfig,
    compose_collage, render_slide, rotation_flags,
};
use crate::select::Selection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CollageError {
    #[error("Album has no files")]
    EmptyAlbum,
    #[error(transparent)]
    Render(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollageKind {
    Overview,
    Sequence,
}

/// Number of tiles a collage gets.
pub fn collage_count(capacity: usize, total: usize, configured: usize) -> usize {
    capacity.min(total).min(configured)
}

/// `want` indices spread evenly over `0..total`, starting at 0.
pub fn overview_indices(total: usize, want: usize) -> Vec<usize> {
    if total == 0 || want == 0 {
        return Vec::new();
    }
    if want >= total {
        return (0..total).collect();
    }
    (0..want).map(|i| i * total / want).collect()
}

/// `want` consecutive indices starting just after the displayed window,
/// wrapping modulo `total`. The start is clamped to the last file.
pub fn sequence_indices(total: usize, start_index: usize, window_size: usize, want: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    let start = (start_index + window_size).min(total - 1);
    (0..want).map(|i| (start + i) % total).collect()
}

/// Everything that turns album files into pixels.
pub struct CollageComposer<B: ImageBackend = RustBackend> {
    backend: B,
    layout: CollageLayout,
    configured_count: usize,
    slide: SlideConfig,
}

impl CollageComposer<RustBackend> {
    pub fn from_config(slideshow: &SlideshowConfig, collage: &CollageConfig) -> Self {
        Self::with_backend(RustBackend::new(), slideshow, collage)
    }
}

impl<B: ImageBackend> CollageComposer<B> {
    pub fn with_backend(backend: B, slideshow: &SlideshowConfig, collage: &CollageConfig) -> Self {
        Self {
            backend,
            layout: CollageLayout {
                width: slideshow.output_width,
                height: slideshow.output_height,
                rows: collage.rows,
                cols: collage.cols,
                gap: collage.gap,
                auto_rotate: slideshow.auto_rotate,
                quality: Quality::new(collage.quality),
            },
            configured_count: collage.configured_count(),
            slide: SlideConfig {
                max_width: slideshow.output_width,
                max_height: slideshow.output_height,
                auto_rotate: slideshow.auto_rotate,
                quality: Quality::new(slideshow.resize_quality),
            },
        }
    }

    pub fn layout(&self) -> &CollageLayout {
        &self.layout
    }

    /// Files a collage of `kind` would show for `selection`, in grid order.
    pub fn pick_files(&self, kind: CollageKind, selection: &Selection) -> Vec<PathBuf> {
        let total = selection.files.len();
        let want = collage_count(self.layout.cells(), total, self.configured_count);
        let indices = match kind {
            CollageKind::Overview => overview_indices(total, want),
            CollageKind::Sequence => {
                sequence_indices(total, selection.start_index, selection.window.len(), want)
            }
        };
        indices
            .into_iter()
            .map(|i| selection.files[i].clone())
            .collect()
    }

    /// Build a collage JPEG.
    pub fn build(&self, kind: CollageKind, selection: &Selection) -> Result<Vec<u8>, CollageError> {
        let files = self.pick_files(kind, selection);
        if files.is_empty() {
            return Err(CollageError::EmptyAlbum);
        }
        let bytes = compose_collage(&self.backend, &files, &self.layout)?;
        info!(
            kind = ?kind,
            year = %selection.year,
            event = %selection.event,
            tiles = files.len(),
            bytes = bytes.len(),
            "built collage"
        );
        Ok(bytes)
    }

    /// Render one window entry as a slide JPEG.
    pub fn slide(&self, source: &Path) -> Result<Vec<u8>, CollageError> {
        Ok(render_slide(&self.backend, source, &self.slide)?)
    }

    /// Which window entries the client should rotate itself.
    pub fn rotate_flags(&self, window: &[PathBuf]) -> Vec<bool> {
        rotation_flags(&self.backend, window)
    }
}
