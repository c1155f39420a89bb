//! Permanently skipped albums.
//!
//! Keys have the form `year/event`. The set only grows (via the `/exclude`
//! route), is written to `exclude.json` after every insert, and is read once
//! at startup. A missing or corrupt file starts an empty set.

use crate::cache::{read_record, write_json_atomic};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

pub const EXCLUDE_FILENAME: &str = "exclude.json";

/// Key identifying one album across the tree.
pub fn album_key(year: &str, event: &str) -> String {
    format!("{year}/{event}")
}

#[derive(Debug)]
pub struct ExclusionStore {
    path: PathBuf,
    keys: RwLock<BTreeSet<String>>,
}

impl ExclusionStore {
    /// Load `exclude.json` from `cache_dir`.
    pub fn load(cache_dir: &Path) -> Self {
        let path = cache_dir.join(EXCLUDE_FILENAME);
        let keys: BTreeSet<String> = if path.exists() {
            match read_record::<Vec<String>>(&path) {
                Some(keys) => keys.into_iter().collect(),
                None => {
                    warn!(path = %path.display(), "failed to load exclusion list, starting empty");
                    BTreeSet::new()
                }
            }
        } else {
            BTreeSet::new()
        };
        info!(count = keys.len(), "loaded album exclusions");
        Self {
            path,
            keys: RwLock::new(keys),
        }
    }

    pub fn contains(&self, year: &str, event: &str) -> bool {
        self.read().contains(&album_key(year, event))
    }

    /// Add an album and persist the whole set.
    ///
    /// The in-memory set is updated even when the write fails; the error is
    /// still returned so the caller can report it. The write lock is held
    /// through the file write so concurrent excludes persist in order.
    pub fn exclude(&self, year: &str, event: &str) -> io::Result<()> {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(album_key(year, event));
        let snapshot: Vec<&String> = keys.iter().collect();
        write_json_atomic(&self.path, &snapshot)
    }

    /// All excluded keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeSet<String>> {
        self.keys.read().unwrap_or_else(|e| e.into_inner())
    }
}
