//! Backend configuration module.
//!
//! Handles loading, validating, and merging `flashbacks.toml`. Stock defaults
//! are overridden by whatever the user file specifies, and command-line flags
//! (or their environment variables) override both for the handful of values
//! that differ per deployment (media root, cache dir, port).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "0.0.0.0"
//! port = 8099
//!
//! [media]
//! root = "/media"                  # Photo tree: <root>/<year>/<event>/...
//! cache_dir = "state/flashbacks-cache"
//!
//! [cache]
//! root_ttl_days = 30               # Year list at the media root
//! year_ttl_days = 180              # Event list inside a year
//! album_ttl_days = 180             # Recursive file list of an event
//!
//! [slideshow]
//! stream_count = 6                 # Slides per window
//! album_expose_sec = 0             # > 0 overrides set_window_ms
//! set_window_ms = 120000
//! auto_rotate = true
//! output_width = 1920
//! output_height = 1080
//! resize_quality = 82
//!
//! [collage]
//! rows = 3
//! cols = 3
//! count = 9                        # Tiles to sample (capped by rows * cols)
//! gap = 2
//! quality = 82
//!
//! [transit]
//! enabled = true
//! gtfs_url = "https://www.stops.lt/vilnius/vilnius/gtfs.zip"
//! refresh_hours = 24
//! stop_name = "Umėdžių st."
//! limit = 10
//! # timezone = "Europe/Vilnius"   # Defaults to the host time zone
//!
//! [weather]
//! enabled = true
//! latitude = 54.6872
//! longitude = 25.2797
//! unit = "celsius"
//! interval_min = 60
//! history_hours = 72
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Backend configuration loaded from `flashbacks.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub cache: CacheConfig,
    pub slideshow: SlideshowConfig,
    pub collage: CollageConfig,
    pub transit: TransitConfig,
    pub weather: WeatherConfig,
}

impl BackendConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slideshow.stream_count == 0 {
            return Err(ConfigError::Validation(
                "slideshow.stream_count must be at least 1".into(),
            ));
        }
        if self.slideshow.output_width == 0 || self.slideshow.output_height == 0 {
            return Err(ConfigError::Validation(
                "slideshow.output_width/output_height must be non-zero".into(),
            ));
        }
        if self.slideshow.resize_quality > 100 || self.collage.quality > 100 {
            return Err(ConfigError::Validation(
                "JPEG quality values must be 0-100".into(),
            ));
        }
        if self.collage.rows == 0 || self.collage.cols == 0 {
            return Err(ConfigError::Validation(
                "collage.rows and collage.cols must be non-zero".into(),
            ));
        }
        let gaps_w = self.collage.gap.saturating_mul(self.collage.cols - 1);
        let gaps_h = self.collage.gap.saturating_mul(self.collage.rows - 1);
        if gaps_w >= self.slideshow.output_width || gaps_h >= self.slideshow.output_height {
            return Err(ConfigError::Validation(
                "collage.gap leaves no room for tiles".into(),
            ));
        }
        if self.slideshow.album_expose_sec == 0 && self.slideshow.set_window_ms == 0 {
            return Err(ConfigError::Validation(
                "one of slideshow.album_expose_sec or slideshow.set_window_ms must be set".into(),
            ));
        }
        if let Some(tz) = &self.transit.timezone
            && tz.parse::<chrono_tz::Tz>().is_err()
        {
            return Err(ConfigError::Validation(format!(
                "transit.timezone is not a known IANA zone: {tz}"
            )));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8099,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Where photos live and where derived state is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Photo tree root: `<root>/<year>/<event>/**/*.jpg`.
    pub root: PathBuf,
    /// Cache root. Listing caches mirror the photo tree below it; the
    /// exclusion list, GTFS archive and weather history sit at its top.
    pub cache_dir: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/media"),
            cache_dir: PathBuf::from("state/flashbacks-cache"),
        }
    }
}

/// TTLs for each listing tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub root_ttl_days: u64,
    pub year_ttl_days: u64,
    pub album_ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_ttl_days: 30,
            year_ttl_days: 180,
            album_ttl_days: 180,
        }
    }
}

impl CacheConfig {
    pub fn root_ttl(&self) -> Duration {
        days(self.root_ttl_days)
    }

    pub fn year_ttl(&self) -> Duration {
        days(self.year_ttl_days)
    }

    pub fn album_ttl(&self) -> Duration {
        days(self.album_ttl_days)
    }
}

fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}

/// Slide window and single-image rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlideshowConfig {
    /// Number of slides in a window (`/image/0` .. `/image/{n-1}`).
    pub stream_count: usize,
    /// How long one album stays on screen, in seconds. Takes precedence
    /// over `set_window_ms` when non-zero.
    pub album_expose_sec: u64,
    pub set_window_ms: u64,
    /// Apply embedded EXIF orientation before resizing.
    pub auto_rotate: bool,
    pub output_width: u32,
    pub output_height: u32,
    pub resize_quality: u32,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            stream_count: 6,
            album_expose_sec: 0,
            set_window_ms: 2 * 60 * 1000,
            auto_rotate: true,
            output_width: 1920,
            output_height: 1080,
            resize_quality: 82,
        }
    }
}

impl SlideshowConfig {
    /// Effective lifetime of an active set.
    pub fn window_duration(&self) -> Duration {
        if self.album_expose_sec > 0 {
            Duration::from_secs(self.album_expose_sec)
        } else {
            Duration::from_millis(self.set_window_ms)
        }
    }

    /// Exposure time reported to the display client, in whole seconds.
    pub fn album_expose_sec(&self) -> u64 {
        if self.album_expose_sec > 0 {
            self.album_expose_sec
        } else {
            (self.set_window_ms as f64 / 1000.0).round() as u64
        }
    }
}

/// Grid collage settings. The canvas size is shared with the slideshow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollageConfig {
    pub rows: u32,
    pub cols: u32,
    /// Tiles to sample. `None` means one per grid cell.
    pub count: Option<usize>,
    pub gap: u32,
    pub quality: u32,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            count: None,
            gap: 2,
            quality: 82,
        }
    }
}

impl CollageConfig {
    pub fn capacity(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    pub fn configured_count(&self) -> usize {
        self.count.unwrap_or_else(|| self.capacity())
    }
}

/// GTFS departure board settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransitConfig {
    pub enabled: bool,
    pub gtfs_url: String,
    /// Maximum age of the cached archive before it is downloaded again.
    pub refresh_hours: u64,
    pub stop_name: String,
    pub limit: usize,
    /// IANA zone used for "now" when computing departures. Host local
    /// time when absent.
    pub timezone: Option<String>,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gtfs_url: "https://www.stops.lt/vilnius/vilnius/gtfs.zip".to_string(),
            refresh_hours: 24,
            stop_name: "Umėdžių st.".to_string(),
            limit: 10,
            timezone: None,
        }
    }
}

impl TransitConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_hours * 60 * 60)
    }

    /// The configured zone, if any. Unknown names are rejected by
    /// [`BackendConfig::validate`], so they read as absent here.
    pub fn parsed_timezone(&self) -> Option<chrono_tz::Tz> {
        self.timezone.as_deref().and_then(|tz| tz.parse().ok())
    }
}

/// Temperature trend sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub unit: String,
    /// Poll interval in minutes. Values below 5 are raised to 5.
    pub interval_min: u64,
    pub history_hours: u64,
    pub api_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latitude: 54.6872,
            longitude: 25.2797,
            unit: "celsius".to_string(),
            interval_min: 60,
            history_hours: 72,
            api_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

impl WeatherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval_min.max(5) * 60)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.history_hours * 60 * 60)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BackendConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<BackendConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BackendConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when the
/// file is absent.
pub fn load_config(path: &Path) -> Result<BackendConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `flashbacks.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Flashbacks Configuration
# ========================
# Every key is optional; the values below are the built-in defaults.
# Unknown keys are rejected.

[server]
# Interface and port the HTTP backend listens on.
bind = "0.0.0.0"
port = 8099

[media]
# Photo tree root, laid out as <root>/<year>/<event>/**/*.jpg
root = "/media"
# Listing caches, exclude.json, gtfs.zip and weather-trends.json live here.
cache_dir = "state/flashbacks-cache"

[cache]
# How long each listing tier is trusted before the directory is rescanned.
root_ttl_days = 30
year_ttl_days = 180
album_ttl_days = 180

[slideshow]
# Number of consecutive slides served per window (/image/0 .. /image/N-1).
stream_count = 6
# Seconds an album stays on screen. When 0, set_window_ms is used instead.
album_expose_sec = 0
set_window_ms = 120000
# Honour EXIF orientation when rendering slides and collage tiles.
auto_rotate = true
# Slide and collage canvas size in pixels.
output_width = 1920
output_height = 1080
resize_quality = 82

[collage]
rows = 3
cols = 3
# Tiles sampled from the album; defaults to rows * cols.
# count = 9
# Pixel gap between tiles.
gap = 2
quality = 82

[transit]
enabled = true
gtfs_url = "https://www.stops.lt/vilnius/vilnius/gtfs.zip"
# Re-download the archive once it is older than this.
refresh_hours = 24
stop_name = "Umėdžių st."
limit = 10
# IANA time zone for departure times; host local time when unset.
# timezone = "Europe/Vilnius"

[weather]
enabled = true
latitude = 54.6872
longitude = 25.2797
unit = "celsius"
# Poll interval (minimum 5) and how much history to keep.
interval_min = 60
history_hours = 72
api_url = "https://api.open-meteo.com/v1/forecast"
"##
}
