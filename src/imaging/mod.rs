//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Orientation** | `ImageDecoder::orientation` (EXIF) |
//! | **Slide** | fit inside the output box, never enlarge, JPEG |
//! | **Collage tile** | `resize_to_fill` after auto-rotate |
//! | **Collage canvas** | black `RgbImage` + `imageops::replace`, JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for slide and grid geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, needs_rotation};
pub use calculations::{fit_within, tile_origin, tile_size};
pub use operations::{
    CollageLayout, SlideConfig, compose_collage, plan_collage, render_slide, rotation_flags,
};
pub use params::{FitParams, Quality, TileParams};
pub use rust_backend::RustBackend;
