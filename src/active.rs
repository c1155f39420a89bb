//! The one album currently on screen.
//!
//! The manager is either ABSENT (nothing picked yet, or the last set has
//! expired) or LIVE. Reads through [`ActiveSetManager::get_or_refresh`] pick a
//! new album only when ABSENT; [`ActiveSetManager::force_refresh`] always
//! picks.
//!
//! Collage bytes and rotation flags are memoized on the [`ActiveSet`] itself,
//! in write-once cells filled after the build finishes. Two requests racing
//! on an empty cell both build; the second write is dropped.

use crate::collage::CollageKind;
use crate::select::{SelectError, Selection, SelectionEngine};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Upper bound (exclusive) of the per-set refresh jitter.
pub const JITTER_MAX_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ActiveError {
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error("Selection task failed: {0}")]
    Task(String),
}

/// When the display client should come back for the next set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshInfo {
    pub refresh_at: DateTime<Utc>,
    pub refresh_in_ms: i64,
}

#[derive(Debug)]
pub struct ActiveSet {
    pub selection: Selection,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_jitter_ms: u64,
    overview: OnceLock<Vec<u8>>,
    sequence: OnceLock<Vec<u8>>,
    rotate_flags: OnceLock<Vec<bool>>,
}

impl ActiveSet {
    pub fn new(
        selection: Selection,
        now: DateTime<Utc>,
        window: Duration,
        refresh_jitter_ms: u64,
    ) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Self {
            selection,
            generated_at: now,
            expires_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
            refresh_jitter_ms,
            overview: OnceLock::new(),
            sequence: OnceLock::new(),
            rotate_flags: OnceLock::new(),
        }
    }

    /// A set is usable strictly before its expiry.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn refresh_info(&self, now: DateTime<Utc>) -> RefreshInfo {
        let refresh_at = self.expires_at + chrono::Duration::milliseconds(self.refresh_jitter_ms as i64);
        RefreshInfo {
            refresh_at,
            refresh_in_ms: (refresh_at - now).num_milliseconds().max(0),
        }
    }

    pub fn collage_cell(&self, kind: CollageKind) -> &OnceLock<Vec<u8>> {
        match kind {
            CollageKind::Overview => &self.overview,
            CollageKind::Sequence => &self.sequence,
        }
    }

    pub fn rotate_flags_cell(&self) -> &OnceLock<Vec<bool>> {
        &self.rotate_flags
    }
}

pub struct ActiveSetManager {
    engine: Arc<SelectionEngine>,
    window: Duration,
    current: Mutex<Option<Arc<ActiveSet>>>,
}

impl ActiveSetManager {
    pub fn new(engine: Arc<SelectionEngine>, window: Duration) -> Self {
        Self {
            engine,
            window,
            current: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }

    /// The live set, picking a new one when ABSENT.
    pub async fn get_or_refresh(&self) -> Result<Arc<ActiveSet>, ActiveError> {
        if let Some(set) = self.live_at(Utc::now()) {
            return Ok(set);
        }
        self.refresh("expired").await
    }

    /// Pick a new set regardless of the current one.
    pub async fn force_refresh(&self) -> Result<Arc<ActiveSet>, ActiveError> {
        self.refresh("forced").await
    }

    /// The last set picked, even if it has expired.
    pub fn peek(&self) -> Option<Arc<ActiveSet>> {
        self.lock().clone()
    }

    fn live_at(&self, now: DateTime<Utc>) -> Option<Arc<ActiveSet>> {
        self.lock().as_ref().filter(|s| s.is_live(now)).cloned()
    }

    async fn refresh(&self, reason: &'static str) -> Result<Arc<ActiveSet>, ActiveError> {
        let engine = Arc::clone(&self.engine);
        let selection = tokio::task::spawn_blocking(move || engine.pick())
            .await
            .map_err(|e| ActiveError::Task(e.to_string()))??;

        let jitter = rand::thread_rng().gen_range(0..JITTER_MAX_MS);
        let set = Arc::new(ActiveSet::new(selection, Utc::now(), self.window, jitter));
        info!(
            reason,
            year = %set.selection.year,
            event = %set.selection.event,
            start_index = set.selection.start_index,
            expires_at = %set.expires_at,
            "active set replaced"
        );

        *self.lock() = Some(Arc::clone(&set));
        Ok(set)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<ActiveSet>>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{engine_for, write_tree};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn manager(tmp: &TempDir, window: Duration) -> ActiveSetManager {
        write_tree(
            &tmp.path().join("media"),
            &["2019/summer/a.jpg", "2019/summer/b.jpg", "2020/spring/c.jpg"],
        );
        ActiveSetManager::new(Arc::new(engine_for(tmp.path(), 6)), window)
    }

    fn fixed_selection() -> Selection {
        Selection {
            year: "2019".into(),
            event: "summer".into(),
            start_index: 0,
            picked_at: Utc::now(),
            window: vec![PathBuf::from("/m/a.jpg")],
            window_rel: vec!["2019/summer/a.jpg".into()],
            files: vec![PathBuf::from("/m/a.jpg")],
        }
    }

    #[test]
    fn set_is_live_until_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 22, 12, 0, 0).unwrap();
        let set = ActiveSet::new(fixed_selection(), now, Duration::from_secs(120), 0);
        assert!(set.is_live(now));
        assert!(set.is_live(now + chrono::Duration::seconds(119)));
        assert!(!set.is_live(now + chrono::Duration::seconds(120)));
    }

    #[test]
    fn refresh_info_adds_jitter_and_clamps() {
        let now = Utc.with_ymd_and_hms(2024, 5, 22, 12, 0, 0).unwrap();
        let set = ActiveSet::new(fixed_selection(), now, Duration::from_secs(120), 2_500);

        let info = set.refresh_info(now);
        assert_eq!(info.refresh_at, now + chrono::Duration::milliseconds(122_500));
        assert_eq!(info.refresh_in_ms, 122_500);

        let late = set.refresh_info(now + chrono::Duration::minutes(10));
        assert_eq!(late.refresh_in_ms, 0);
    }

    #[test]
    fn memo_cells_keep_first_write() {
        let now = Utc::now();
        let set = ActiveSet::new(fixed_selection(), now, Duration::from_secs(60), 0);
        assert!(set.collage_cell(CollageKind::Overview).get().is_none());

        let _ = set.collage_cell(CollageKind::Overview).set(vec![1, 2, 3]);
        let _ = set.collage_cell(CollageKind::Overview).set(vec![9]);
        assert_eq!(set.collage_cell(CollageKind::Overview).get(), Some(&vec![1, 2, 3]));
        assert!(set.collage_cell(CollageKind::Sequence).get().is_none());
    }

    #[tokio::test]
    async fn live_set_is_reused() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, Duration::from_secs(600));

        let first = manager.get_or_refresh().await.unwrap();
        let _ = first.rotate_flags_cell().set(vec![false; 6]);
        let second = manager.get_or_refresh().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.rotate_flags_cell().get().map(Vec::len), Some(6));
        assert!(first.refresh_jitter_ms < JITTER_MAX_MS);
        assert_eq!(first.selection.window.len(), 6);
    }

    #[tokio::test]
    async fn expired_set_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, Duration::ZERO);

        let first = manager.get_or_refresh().await.unwrap();
        let second = manager.get_or_refresh().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn force_refresh_always_replaces() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, Duration::from_secs(600));

        let first = manager.get_or_refresh().await.unwrap();
        let forced = manager.force_refresh().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &forced));
        assert!(Arc::ptr_eq(&forced, &manager.peek().unwrap()));
    }

    #[tokio::test]
    async fn peek_is_empty_before_first_pick() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, Duration::from_secs(600));
        assert!(manager.peek().is_none());
    }

    #[tokio::test]
    async fn selection_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("media")).unwrap();
        let manager = ActiveSetManager::new(
            Arc::new(engine_for(tmp.path(), 6)),
            Duration::from_secs(600),
        );

        let err = manager.get_or_refresh().await.unwrap_err();
        assert!(matches!(err, ActiveError::Select(SelectError::NoTopLevelFolders(_))));
        assert!(manager.peek().is_none());
    }
}
