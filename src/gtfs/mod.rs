//! Departure board computed from a static GTFS feed.
//!
//! The feed archive is downloaded when missing or older than the refresh
//! threshold, then parsed into a [`Snapshot`] for one requested stop. The
//! engine keeps the last snapshot and reuses it while the stop request is
//! the same and the snapshot is younger than the refresh threshold.
//!
//! - [`csv`] reads tables with a sniffed delimiter,
//! - [`stops`] normalizes names and resolves the requested stop,
//! - [`schedule`] decides which services run and computes departures,
//! - [`archive`] owns the cached `gtfs.zip`.

pub mod archive;
pub mod csv;
pub mod schedule;
pub mod stops;

use crate::config::TransitConfig;
use archive::{ARCHIVE_FILENAME, FeedArchive, archive_age, download, needs_download};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use schedule::{Calendar, CalendarException, Departure, Route, Schedule, StopTime, Trip};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stops::{StopIndex, StopMatch};
use thiserror::Error;
use tracing::{debug, info};

pub use self::csv::Row;
pub use stops::{StopSummary, normalize};

#[derive(Error, Debug)]
pub enum GtfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Feed download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Feed download failed: HTTP {0}")]
    DownloadStatus(u16),
    #[error("Feed archive unreadable: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Feed table unreadable: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("Feed parse task failed: {0}")]
    Task(String),
}

/// Feed state for one `(stop name, stop id override)` request.
#[derive(Debug)]
pub struct Snapshot {
    pub key: String,
    pub stop: StopMatch,
    pub stops: StopIndex,
    pub schedule: Schedule,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Snapshot cache key.
pub fn snapshot_key(stop_name: &str, stop_id: Option<&str>) -> String {
    format!("{stop_name}::{}", stop_id.unwrap_or(""))
}

impl Snapshot {
    /// Parse the archive at `path` for the requested stop.
    pub fn load(
        path: &Path,
        stop_name: &str,
        stop_id: Option<&str>,
        ttl: Duration,
    ) -> Result<Self, GtfsError> {
        let mut archive = FeedArchive::open(path)?;

        let stops = StopIndex::new(csv::parse(&archive.table("stops.txt")?)?);
        let routes: Vec<Route> = csv::parse(&archive.table("routes.txt")?)?;
        let trips: Vec<Trip> = csv::parse(&archive.table("trips.txt")?)?;
        let calendars: Vec<Calendar> = csv::parse(&archive.table("calendar.txt")?)?;
        let exceptions: Vec<CalendarException> =
            csv::parse(&archive.table("calendar_dates.txt")?)?;
        info!(
            stops = stops.len(),
            routes = routes.len(),
            trips = trips.len(),
            calendar = calendars.len(),
            calendar_dates = exceptions.len(),
            "feed tables loaded"
        );

        let stop = stops.resolve(stop_name, stop_id);
        info!(
            requested = stop_name,
            override_id = stop_id,
            resolved = %stop.name,
            matches = stop.stop_ids.len(),
            first = ?stop.stop_ids.first(),
            "stop resolved"
        );

        let stop_times: Vec<StopTime> = if stop.stop_ids.is_empty() {
            Vec::new()
        } else {
            let wanted: HashSet<String> = stop.stop_ids.iter().cloned().collect();
            csv::parse_where(&archive.table("stop_times.txt")?, "stop_id", &wanted)?
        };
        debug!(rows = stop_times.len(), "stop times kept");

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Ok(Self {
            key: snapshot_key(stop_name, stop_id),
            stop,
            stops,
            schedule: Schedule::new(routes, trips, calendars, exceptions, stop_times),
            updated_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }

    /// Id departures are computed for.
    pub fn primary_stop_id(&self) -> Option<&str> {
        self.stop.stop_ids.first().map(String::as_str)
    }

    /// Departure board at local time `now`.
    pub fn board(&self, now: NaiveDateTime, limit: usize) -> Board {
        let stop_id = self.primary_stop_id();
        Board {
            stop_name: self.stop.name.clone(),
            stop_id: stop_id.map(str::to_string),
            items: stop_id
                .map(|id| self.schedule.departures(id, now, limit))
                .unwrap_or_default(),
        }
    }
}

/// Departures for one stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub stop_name: String,
    pub stop_id: Option<String>,
    pub items: Vec<Departure>,
}

pub struct GtfsEngine {
    client: reqwest::Client,
    url: String,
    archive_path: PathBuf,
    refresh: Duration,
    timezone: Option<Tz>,
    snapshot: Mutex<Option<Arc<Snapshot>>>,
}

impl GtfsEngine {
    pub fn new(config: &TransitConfig, cache_dir: &Path) -> Result<Self, GtfsError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("flashbacks/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: config.gtfs_url.clone(),
            archive_path: cache_dir.join(ARCHIVE_FILENAME),
            refresh: config.refresh_interval(),
            timezone: config.parsed_timezone(),
            snapshot: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Wall-clock time departures are measured from.
    pub fn local_now(&self) -> NaiveDateTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }

    /// Snapshot for the request, reusing the cached one when it still fits.
    pub async fn snapshot(
        &self,
        stop_name: &str,
        stop_id: Option<&str>,
    ) -> Result<Arc<Snapshot>, GtfsError> {
        let key = snapshot_key(stop_name, stop_id);
        if let Some(hit) = self.cached(&key, Utc::now()) {
            debug!(key = %key, expires_at = %hit.expires_at, "feed snapshot hit");
            return Ok(hit);
        }

        self.ensure_archive().await?;

        let path = self.archive_path.clone();
        let name = stop_name.to_string();
        let id = stop_id.map(str::to_string);
        let ttl = self.refresh;
        let snapshot = tokio::task::spawn_blocking(move || {
            Snapshot::load(&path, &name, id.as_deref(), ttl)
        })
        .await
        .map_err(|e| GtfsError::Task(e.to_string()))??;

        let snapshot = Arc::new(snapshot);
        *self.lock() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// The next `limit` departures for the request.
    pub async fn next_departures(
        &self,
        stop_name: &str,
        stop_id: Option<&str>,
        limit: usize,
    ) -> Result<Board, GtfsError> {
        let snapshot = self.snapshot(stop_name, stop_id).await?;
        Ok(snapshot.board(self.local_now(), limit))
    }

    async fn ensure_archive(&self) -> Result<(), GtfsError> {
        let age = archive_age(&self.archive_path);
        debug!(
            path = %self.archive_path.display(),
            age_secs = age.map(|a| a.as_secs()),
            refresh_secs = self.refresh.as_secs(),
            "feed archive status"
        );
        if needs_download(age, self.refresh) {
            download(&self.client, &self.url, &self.archive_path).await?;
        }
        Ok(())
    }

    fn cached(&self, key: &str, now: DateTime<Utc>) -> Option<Arc<Snapshot>> {
        self.lock()
            .as_ref()
            .filter(|s| s.key == key && now < s.expires_at)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<Snapshot>>> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{sample_feed, write_gtfs_zip};
    use tempfile::TempDir;

    fn engine(tmp: &TempDir) -> GtfsEngine {
        let config = TransitConfig {
            gtfs_url: "http://127.0.0.1:9/unreachable.zip".into(),
            ..TransitConfig::default()
        };
        GtfsEngine::new(&config, tmp.path()).unwrap()
    }

    #[test]
    fn key_includes_override() {
        assert_eq!(snapshot_key("Centras", None), "Centras::");
        assert_eq!(snapshot_key("Centras", Some("7")), "Centras::7");
    }

    #[test]
    fn snapshot_keeps_only_resolved_stop_times() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ARCHIVE_FILENAME);
        write_gtfs_zip(&path, &sample_feed());

        let snap = Snapshot::load(&path, "Umedziu st.", None, Duration::from_secs(60)).unwrap();
        assert_eq!(snap.stop.name, "Umėdžių st.");
        assert_eq!(snap.primary_stop_id(), Some("S1"));
        assert_eq!(snap.schedule.stop_time_count("S1"), 2);
        assert_eq!(snap.schedule.stop_time_count("S2"), 0);
    }

    #[test]
    fn short_rows_read_as_empty_columns() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ARCHIVE_FILENAME);
        let mut feed = sample_feed();
        for (name, contents) in feed.iter_mut() {
            match *name {
                "stops.txt" => *contents = "stop_id,stop_name,stop_lat,stop_lon\nS1,Umėdžių st.\nS2\n",
                "routes.txt" => *contents = "route_id,route_short_name\nR1,3G\nR9\n",
                "trips.txt" => {
                    *contents = "route_id,service_id,trip_id,trip_headsign\nR1,ALL,T1\nR9,ALL,T2,Stotis\n"
                }
                "stop_times.txt" => {
                    *contents = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,08:00:00,08:00:00,S1\nT2,20:00:00,20:00:00,S1,1\n"
                }
                _ => {}
            }
        }
        write_gtfs_zip(&path, &feed);

        let snap = Snapshot::load(&path, "Umėdžių st.", None, Duration::from_secs(60)).unwrap();
        assert_eq!(snap.primary_stop_id(), Some("S1"));
        assert_eq!(snap.stops.len(), 2);
        assert_eq!(snap.schedule.stop_time_count("S1"), 2);

        let board = snap.board(Local::now().naive_local(), 10);
        assert!(board.items.iter().any(|d| d.route == "3G" && d.headsign.is_empty()));
        assert!(board.items.iter().any(|d| d.route == "R9" && d.headsign == "Stotis"));
    }

    #[test]
    fn unmatched_stop_gives_empty_board() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ARCHIVE_FILENAME);
        write_gtfs_zip(&path, &sample_feed());

        let snap = Snapshot::load(&path, "Atlantis", None, Duration::from_secs(60)).unwrap();
        let board = snap.board(Local::now().naive_local(), 10);
        assert_eq!(board.stop_name, "Atlantis");
        assert_eq!(board.stop_id, None);
        assert!(board.items.is_empty());
    }

    #[tokio::test]
    async fn fresh_archive_is_not_redownloaded_and_snapshot_is_reused() {
        let tmp = TempDir::new().unwrap();
        write_gtfs_zip(&tmp.path().join(ARCHIVE_FILENAME), &sample_feed());
        let engine = engine(&tmp);

        let first = engine.snapshot("Umėdžių st.", None).await.unwrap();
        let again = engine.snapshot("Umėdžių st.", None).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let other = engine.snapshot("Umėdžių st.", Some("S2")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.stop.name, "Stotis");
    }

    #[tokio::test]
    async fn every_day_service_has_departures() {
        let tmp = TempDir::new().unwrap();
        write_gtfs_zip(&tmp.path().join(ARCHIVE_FILENAME), &sample_feed());
        let engine = engine(&tmp);

        let board = engine.next_departures("Umėdžių st.", None, 3).await.unwrap();
        assert_eq!(board.stop_id.as_deref(), Some("S1"));
        assert_eq!(board.items.len(), 3);
        assert!(board.items.windows(2).all(|w| w[0].minutes <= w[1].minutes));
        assert!(board.items.iter().all(|d| d.route == "3G" || d.route == "R9"));
    }

    #[tokio::test]
    async fn missing_archive_with_unreachable_url_errors() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        assert!(engine.snapshot("Centras", None).await.is_err());
    }
}
