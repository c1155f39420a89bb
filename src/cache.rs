//! TTL listing caches for the photo tree.
//!
//! Listing a NAS-hosted photo tree is slow: tens of thousands of folders
//! behind a spinning disk or an SMB mount. The selection engine only ever
//! needs three kinds of listing, so each is cached as a small JSON file in a
//! cache tree that mirrors the photo tree:
//!
//! ```text
//! <cache_root>/
//! ├── _dirs.json                     # year folders at the media root
//! ├── 2024/
//! │   ├── _dirs.json                 # event folders in 2024
//! │   └── 2024_05_22/
//! │       └── _files.json            # recursive image list of the event
//! └── ...
//! ```
//!
//! ## Records
//!
//! - `_dirs.json`: `{ "dirs": [...], "expiresAt": <epoch ms>, "updatedAt": "<rfc3339>" }`
//! - `_files.json`: `{ "files": [...], "sortKey": "filename", "expiresAt": ..., "updatedAt": ... }`
//!
//! A record is usable iff `now < expiresAt`. Anything else is a miss: a missing file,
//! corrupt JSON, an expired record or an album record with no files. A miss
//! triggers a fresh scan.
//!
//! ## TTL tiers
//!
//! | Tier | Default | Rationale |
//! |---|---|---|
//! | root → years | 30 days | new years appear rarely |
//! | year → events | 180 days | events are added in batches |
//! | event → files | 180 days | albums are mostly immutable once filed |
//!
//! ## Persistence
//!
//! Writes go to `<name>.tmp` first and are renamed over the real file, so a
//! crash mid-write never leaves a truncated record behind. A failed write
//! is logged and ignored: the scanned listing is still returned and used.

use crate::config::CacheConfig;
use crate::scan;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const DIRS_FILENAME: &str = "_dirs.json";
const FILES_FILENAME: &str = "_files.json";

/// Sort order recorded alongside album listings.
pub const FILENAME_SORT_KEY: &str = "filename";

/// Cached child-directory listing of one folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirsRecord {
    pub dirs: Vec<String>,
    pub expires_at: i64,
    pub updated_at: String,
}

/// Cached recursive image listing of one event folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilesRecord {
    pub files: Vec<PathBuf>,
    #[serde(default = "default_sort_key")]
    pub sort_key: String,
    pub expires_at: i64,
    pub updated_at: String,
}

fn default_sort_key() -> String {
    FILENAME_SORT_KEY.to_string()
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    pub entries: Vec<T>,
    pub from_cache: bool,
}

/// Maps photo-tree folders to their mirrored cache files.
#[derive(Debug, Clone)]
pub struct CacheTree {
    media_root: PathBuf,
    cache_root: PathBuf,
}

impl CacheTree {
    pub fn new(media_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            cache_root: cache_root.into(),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    fn mirror(&self, dir: &Path, filename: &str) -> PathBuf {
        let rel = dir.strip_prefix(&self.media_root).unwrap_or(dir);
        self.cache_root.join(rel).join(filename)
    }

    pub fn dirs_path(&self, dir: &Path) -> PathBuf {
        self.mirror(dir, DIRS_FILENAME)
    }

    pub fn files_path(&self, dir: &Path) -> PathBuf {
        self.mirror(dir, FILES_FILENAME)
    }
}

/// Read and parse a JSON cache file. Missing or unparseable files are `None`.
pub fn read_record<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring unreadable cache record");
            None
        }
    }
}

/// Write `value` as pretty JSON via a sibling `.tmp` file and an atomic rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}

/// [`write_json_atomic`], but failures are logged instead of returned.
pub fn persist_best_effort<T: Serialize + ?Sized>(path: &Path, value: &T) {
    if let Err(e) = write_json_atomic(path, value) {
        warn!(path = %path.display(), error = %e, "cache write failed, continuing without cache");
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> i64 {
    now.timestamp_millis()
        .saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

/// TTL-cached directory listings for the root and year tiers.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    tree: CacheTree,
    root_ttl: Duration,
    year_ttl: Duration,
}

impl DirectoryCache {
    pub fn new(tree: CacheTree, config: &CacheConfig) -> Self {
        Self {
            tree,
            root_ttl: config.root_ttl(),
            year_ttl: config.year_ttl(),
        }
    }

    pub fn get(&self, dir: &Path) -> Listing<String> {
        self.get_at(dir, Utc::now())
    }

    /// Child directories of `dir`. The media root itself uses the root TTL
    /// and drops top-level exclusions; every other folder is a year.
    pub fn get_at(&self, dir: &Path, now: DateTime<Utc>) -> Listing<String> {
        let cache_path = self.tree.dirs_path(dir);
        if let Some(record) = read_record::<DirsRecord>(&cache_path)
            && now.timestamp_millis() < record.expires_at
        {
            debug!(dir = %dir.display(), count = record.dirs.len(), "dir cache hit");
            return Listing {
                entries: record.dirs,
                from_cache: true,
            };
        }

        let is_root = dir == self.tree.media_root();
        let (dirs, ttl) = if is_root {
            (scan::list_years(dir), self.root_ttl)
        } else {
            (scan::list_dirs(dir), self.year_ttl)
        };
        debug!(dir = %dir.display(), count = dirs.len(), "dir cache miss, scanned");

        persist_best_effort(
            &cache_path,
            &DirsRecord {
                dirs: dirs.clone(),
                expires_at: expiry(now, ttl),
                updated_at: now.to_rfc3339(),
            },
        );

        Listing {
            entries: dirs,
            from_cache: false,
        }
    }
}

/// TTL-cached recursive image listings for event folders.
#[derive(Debug, Clone)]
pub struct AlbumFileCache {
    tree: CacheTree,
    ttl: Duration,
}

impl AlbumFileCache {
    pub fn new(tree: CacheTree, config: &CacheConfig) -> Self {
        Self {
            tree,
            ttl: config.album_ttl(),
        }
    }

    pub fn get(&self, album_dir: &Path) -> Listing<PathBuf> {
        self.get_at(album_dir, Utc::now())
    }

    pub fn get_at(&self, album_dir: &Path, now: DateTime<Utc>) -> Listing<PathBuf> {
        let cache_path = self.tree.files_path(album_dir);
        if let Some(record) = read_record::<FilesRecord>(&cache_path)
            && now.timestamp_millis() < record.expires_at
            && !record.files.is_empty()
        {
            debug!(album = %album_dir.display(), count = record.files.len(), "album cache hit");
            return Listing {
                entries: record.files,
                from_cache: true,
            };
        }

        let files = scan::scan_album_files(album_dir);
        debug!(album = %album_dir.display(), count = files.len(), "album cache miss, scanned");

        persist_best_effort(
            &cache_path,
            &FilesRecord {
                files: files.clone(),
                sort_key: default_sort_key(),
                expires_at: expiry(now, self.ttl),
                updated_at: now.to_rfc3339(),
            },
        );

        Listing {
            entries: files,
            from_cache: false,
        }
    }
}
