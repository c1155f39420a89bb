//! Pure calculation functions for slide and collage geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Dimensions that fit `source` inside `bounds` while keeping its aspect
/// ratio, or `None` when the source already fits (no enlargement).
///
/// # Examples
/// ```
/// # use flashbacks::imaging::fit_within;
/// // 4000x3000 into 1920x1080 → height-bound
/// assert_eq!(fit_within((4000, 3000), (1920, 1080)), Some((1440, 1080)));
///
/// // Already small enough
/// assert_eq!(fit_within((800, 600), (1920, 1080)), None);
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w <= max_w && src_h <= max_h {
        return None;
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h);
    Some((w, h))
}

/// Size of one grid cell on a `canvas` split into `rows` × `cols` cells with
/// `gap` pixels between neighbours. Leftover pixels stay as background.
pub fn tile_size(canvas: (u32, u32), rows: u32, cols: u32, gap: u32) -> (u32, u32) {
    let (width, height) = canvas;
    let tile_w = width.saturating_sub(gap * cols.saturating_sub(1)) / cols.max(1);
    let tile_h = height.saturating_sub(gap * rows.saturating_sub(1)) / rows.max(1);
    (tile_w, tile_h)
}

/// Top-left pixel of tile `index`, filling the grid row by row.
pub fn tile_origin(index: usize, cols: u32, tile: (u32, u32), gap: u32) -> (u32, u32) {
    let cols = cols.max(1) as usize;
    let row = (index / cols) as u32;
    let col = (index % cols) as u32;
    (col * (tile.0 + gap), row * (tile.1 + gap))
}
