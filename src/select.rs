//! Random album selection.
//!
//! A pick walks the tree top-down, choosing uniformly at each level:
//!
//! 1. a year folder at the media root,
//! 2. an event folder inside that year, skipping excluded `year/event` keys,
//! 3. a start index into the event's sorted file list.
//!
//! The window is the `window_size` files starting at that index, wrapping
//! around the end of the album, so it always has exactly `window_size`
//! entries, even for albums smaller than the window.
//!
//! Because each level is uniform over its own candidates, a year with few
//! events gives each of its events a higher chance per pick than a busy
//! year does. That bias is accepted.
//!
//! A year can be empty, fully excluded, or land on an event with no images,
//! so the walk is retried up to [`MAX_ATTEMPTS`] times through [`retry`].

use crate::cache::{AlbumFileCache, DirectoryCache};
use crate::exclusion::ExclusionStore;
use crate::scan::relative_to_root;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// (year, event) attempts before a pick gives up.
pub const MAX_ATTEMPTS: usize = 15;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("No top-level folders found in {0}")]
    NoTopLevelFolders(PathBuf),
    #[error("No album with images found after {0} attempts")]
    NoAvailableAlbum(usize),
}

/// One picked album and the window of files to show from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub year: String,
    pub event: String,
    pub start_index: usize,
    pub picked_at: DateTime<Utc>,
    /// `window_size` absolute paths, wrapping around the album.
    pub window: Vec<PathBuf>,
    /// `window` relative to the media root, `/`-separated.
    pub window_rel: Vec<String>,
    /// The whole album in timeline order.
    pub files: Vec<PathBuf>,
}

/// Run `attempt` up to `attempts` times.
///
/// Each call receives the 1-based attempt number and returns:
/// - `Ok(Some(value))`: done, return it,
/// - `Ok(None)`: this attempt found nothing, try again,
/// - `Err(e)`: abort immediately.
///
/// Returns `Ok(None)` when every attempt came back empty.
pub fn retry<T, E>(
    attempts: usize,
    mut attempt: impl FnMut(usize) -> Result<Option<T>, E>,
) -> Result<Option<T>, E> {
    for n in 1..=attempts {
        if let Some(value) = attempt(n)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Indices of a `size`-long window starting at `start`, wrapping modulo
/// `total`. Empty when `total` is zero.
pub fn window_indices(total: usize, start: usize, size: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    (0..size).map(|i| (start + i) % total).collect()
}

/// Pick a uniform start index and return it with the wrapped window.
pub fn pick_window<R: Rng + ?Sized>(
    files: &[PathBuf],
    size: usize,
    rng: &mut R,
) -> (usize, Vec<PathBuf>) {
    if files.is_empty() {
        return (0, Vec::new());
    }
    let start = rng.gen_range(0..files.len());
    let window = window_indices(files.len(), start, size)
        .into_iter()
        .map(|i| files[i].clone())
        .collect();
    (start, window)
}

pub struct SelectionEngine {
    media_root: PathBuf,
    dirs: DirectoryCache,
    albums: AlbumFileCache,
    exclusions: Arc<ExclusionStore>,
    window_size: usize,
}

impl SelectionEngine {
    pub fn new(
        media_root: impl Into<PathBuf>,
        dirs: DirectoryCache,
        albums: AlbumFileCache,
        exclusions: Arc<ExclusionStore>,
        window_size: usize,
    ) -> Self {
        Self {
            media_root: media_root.into(),
            dirs,
            albums,
            exclusions,
            window_size,
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn pick(&self) -> Result<Selection, SelectError> {
        self.pick_with(&mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Selection, SelectError> {
        let years = self.dirs.get(&self.media_root);
        debug!(count = years.entries.len(), from_cache = years.from_cache, "year list");
        if years.entries.is_empty() {
            return Err(SelectError::NoTopLevelFolders(self.media_root.clone()));
        }

        let picked = retry(MAX_ATTEMPTS, |attempt| {
            Ok::<_, SelectError>(self.try_pick(&years.entries, attempt, rng))
        })?;
        picked.ok_or(SelectError::NoAvailableAlbum(MAX_ATTEMPTS))
    }

    fn try_pick<R: Rng + ?Sized>(
        &self,
        years: &[String],
        attempt: usize,
        rng: &mut R,
    ) -> Option<Selection> {
        let year = &years[rng.gen_range(0..years.len())];
        let year_dir = self.media_root.join(year);

        let events = self.dirs.get(&year_dir);
        let allowed: Vec<&String> = events
            .entries
            .iter()
            .filter(|event| !self.exclusions.contains(year, event))
            .collect();
        if allowed.is_empty() {
            debug!(attempt, year = %year, total = events.entries.len(), "no eligible events in year");
            return None;
        }

        let event = allowed[rng.gen_range(0..allowed.len())];
        let album = self.albums.get(&year_dir.join(event));
        if album.entries.is_empty() {
            debug!(attempt, year = %year, event = %event, "event has no images");
            return None;
        }

        let (start_index, window) = pick_window(&album.entries, self.window_size, rng);
        let window_rel = window
            .iter()
            .map(|f| relative_to_root(&self.media_root, f))
            .collect();
        info!(
            attempt,
            year = %year,
            event = %event,
            start_index,
            files = album.entries.len(),
            from_cache = album.from_cache,
            "picked album"
        );

        Some(Selection {
            year: year.clone(),
            event: event.clone(),
            start_index,
            picked_at: Utc::now(),
            window,
            window_rel,
            files: album.entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{engine_for, write_tree};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // retry combinator
    // =========================================================================

    #[test]
    fn retry_stops_at_first_success() {
        let mut calls = 0;
        let result: Result<Option<usize>, ()> = retry(5, |n| {
            calls += 1;
            Ok((n == 3).then_some(n))
        });
        assert_eq!(result, Ok(Some(3)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn retry_exhausts_budget() {
        let mut calls = 0;
        let result: Result<Option<()>, ()> = retry(15, |_| {
            calls += 1;
            Ok(None)
        });
        assert_eq!(result, Ok(None));
        assert_eq!(calls, 15);
    }

    #[test]
    fn retry_short_circuits_on_error() {
        let mut calls = 0;
        let result: Result<Option<()>, &str> = retry(10, |n| {
            calls += 1;
            if n == 2 { Err("boom") } else { Ok(None) }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 2);
    }

    // =========================================================================
    // Windows
    // =========================================================================

    #[test]
    fn window_wraps_small_album() {
        assert_eq!(window_indices(3, 0, 6), vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(window_indices(3, 2, 6), vec![2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn window_wraps_at_album_end() {
        assert_eq!(window_indices(10, 8, 4), vec![8, 9, 0, 1]);
        assert!(window_indices(0, 0, 4).is_empty());
    }

    #[test]
    fn pick_window_always_has_requested_size() {
        let mut rng = StdRng::seed_from_u64(7);
        for m in 1..12 {
            let files: Vec<PathBuf> = (0..m).map(|i| PathBuf::from(format!("f{i}"))).collect();
            for _ in 0..20 {
                let (start, window) = pick_window(&files, 6, &mut rng);
                assert!(start < m);
                assert_eq!(window.len(), 6);
                assert_eq!(window[0], files[start]);
            }
        }
    }

    // =========================================================================
    // Engine
    // =========================================================================

    #[test]
    fn pick_returns_window_from_single_album() {
        let tmp = TempDir::new().unwrap();
        write_tree(&tmp.path().join("media"), &["2019/summer/a.jpg", "2019/summer/b.jpg", "2019/summer/c.jpg"]);
        let engine = engine_for(tmp.path(), 6);

        let sel = engine.pick_with(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(sel.year, "2019");
        assert_eq!(sel.event, "summer");
        assert_eq!(sel.files.len(), 3);
        assert_eq!(sel.window.len(), 6);
        assert_eq!(sel.window[0..3], sel.window[3..6]);
        assert!(sel.window_rel.iter().all(|r| r.starts_with("2019/summer/")));
    }

    #[test]
    fn pick_never_returns_excluded_album() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            &tmp.path().join("media"),
            &[
                "2019/summer/a.jpg",
                "2019/winter/b.jpg",
                "2020/spring/c.jpg",
                "2020/autumn/d.jpg",
            ],
        );
        let engine = engine_for(tmp.path(), 2);
        engine.exclusions.exclude("2019", "summer").unwrap();
        engine.exclusions.exclude("2020", "autumn").unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let sel = engine.pick_with(&mut rng).unwrap();
            assert!(
                !engine.exclusions.contains(&sel.year, &sel.event),
                "picked excluded {}/{}",
                sel.year,
                sel.event
            );
        }
    }

    #[test]
    fn pick_skips_empty_events() {
        let tmp = TempDir::new().unwrap();
        let media = tmp.path().join("media");
        write_tree(&media, &["2019/full/a.jpg"]);
        fs::create_dir_all(media.join("2019/empty")).unwrap();
        fs::create_dir_all(media.join("2020")).unwrap();
        let engine = engine_for(tmp.path(), 3);

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(engine.pick_with(&mut rng).unwrap().event, "full");
        }
    }

    #[test]
    fn empty_root_fails_fast() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("media")).unwrap();
        let engine = engine_for(tmp.path(), 3);
        assert!(matches!(
            engine.pick(),
            Err(SelectError::NoTopLevelFolders(_))
        ));
    }

    #[test]
    fn fully_excluded_tree_exhausts_retries() {
        let tmp = TempDir::new().unwrap();
        write_tree(&tmp.path().join("media"), &["2019/only/a.jpg"]);
        let engine = engine_for(tmp.path(), 3);
        engine.exclusions.exclude("2019", "only").unwrap();

        assert_eq!(
            engine.pick(),
            Err(SelectError::NoAvailableAlbum(MAX_ATTEMPTS))
        );
    }
}
