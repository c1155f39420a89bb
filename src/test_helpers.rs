//! Shared test utilities for the flashbacks test suite.
//!
//! Builds throwaway photo trees, real JPEG fixtures and GTFS archives inside
//! a `TempDir`.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_tree(&tmp.path().join("media"), &["2019/summer/a.jpg"]);
//! let engine = engine_for(tmp.path(), 6);
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use image::{ImageEncoder, RgbImage};

use crate::cache::{AlbumFileCache, CacheTree, DirectoryCache};
use crate::config::CacheConfig;
use crate::exclusion::ExclusionStore;
use crate::select::SelectionEngine;

// =========================================================================
// Photo trees
// =========================================================================

/// Create an empty file, creating parent directories as needed.
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"").unwrap();
}

/// Create every `/`-separated relative path under `root` as an empty file.
pub fn write_tree(root: &Path, files: &[&str]) {
    for rel in files {
        touch(&root.join(rel));
    }
}

/// Selection engine over `<tmp>/media`, caching into `<tmp>/cache`.
pub fn engine_for(tmp: &Path, window_size: usize) -> SelectionEngine {
    let media = tmp.join("media");
    let cache = tmp.join("cache");
    let config = CacheConfig::default();
    let tree = CacheTree::new(&media, &cache);
    SelectionEngine::new(
        &media,
        DirectoryCache::new(tree.clone(), &config),
        AlbumFileCache::new(tree, &config),
        Arc::new(ExclusionStore::load(&cache)),
        window_size,
    )
}

// =========================================================================
// JPEG fixtures
// =========================================================================

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Minimal big-endian EXIF APP1 segment carrying only an orientation tag.
fn exif_orientation_segment(orientation: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\0*");
    tiff.extend_from_slice(&8u32.to_be_bytes()); // IFD0 offset
    tiff.extend_from_slice(&1u16.to_be_bytes()); // one entry
    tiff.extend_from_slice(&0x0112u16.to_be_bytes()); // Orientation
    tiff.extend_from_slice(&3u16.to_be_bytes()); // SHORT
    tiff.extend_from_slice(&1u32.to_be_bytes()); // count
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes()); // no IFD1

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff);

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    segment.extend_from_slice(&payload);
    segment
}

/// Write a gradient JPEG of the given size.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, jpeg_bytes(width, height)).unwrap();
}

/// Write a gradient JPEG whose EXIF says it is stored with `orientation`.
pub fn write_jpeg_with_orientation(path: &Path, width: u32, height: u32, orientation: u16) {
    let plain = jpeg_bytes(width, height);
    let mut bytes = plain[..2].to_vec(); // SOI
    bytes.extend_from_slice(&exif_orientation_segment(orientation));
    bytes.extend_from_slice(&plain[2..]);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

// =========================================================================
// GTFS fixtures
// =========================================================================

/// Zip `(name, contents)` pairs into an archive at `path`.
pub fn write_gtfs_zip(path: &Path, tables: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in tables {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Two stops, two routes, one every-day service.
///
/// `S1` ("Umėdžių st.") is served at 08:00 by route `3G` and at 20:00 by
/// route `R9` (no short name); `S2` ("Stotis") only by `3G`.
pub fn sample_feed() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "stops.txt",
            "\u{feff}stop_id,stop_name,stop_lat,stop_lon\nS1,Umėdžių st.,54.7,25.2\nS2,Stotis,54.6,25.3\n",
        ),
        ("routes.txt", "route_id,route_short_name\nR1,3G\nR9,\n"),
        (
            "trips.txt",
            "route_id,service_id,trip_id,trip_headsign\nR1,ALL,T1,Centras\nR9,ALL,T2,Stotis\n",
        ),
        (
            "calendar.txt",
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\nALL,1,1,1,1,1,1,1,,\n",
        ),
        ("calendar_dates.txt", "service_id,date,exception_type\n"),
        (
            "stop_times.txt",
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,08:00:00,08:00:00,S1,1\nT1,08:10:00,08:10:00,S2,2\nT2,20:00:00,20:00:00,S1,1\n",
        ),
    ]
}
