//! Rolling temperature history from open-meteo.
//!
//! A background task polls the current temperature and apparent ("feels
//! like") temperature every `interval_min` minutes, appends a sample, drops
//! samples older than `history_hours` and writes the list to
//! `weather-trends.json`. A failed poll is logged and skipped; the next tick
//! tries again.

use crate::cache::{read_record, write_json_atomic};
use crate::config::WeatherConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const WEATHER_FILENAME: &str = "weather-trends.json";

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Weather request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Weather request failed: HTTP {0}")]
    Status(u16),
    #[error("Weather response has no current temperature")]
    MissingCurrent,
}

/// One reading. `ts` is Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub ts: i64,
    pub temp: f64,
    pub feels: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
}

/// `(temperature, feels like)` from an open-meteo forecast body.
fn current_reading(body: ForecastResponse) -> Result<(f64, f64), WeatherError> {
    let current = body.current.ok_or(WeatherError::MissingCurrent)?;
    match (current.temperature_2m, current.apparent_temperature) {
        (Some(temp), Some(feels)) => Ok((temp, feels)),
        _ => Err(WeatherError::MissingCurrent),
    }
}

/// Drop samples older than `retention` before `now_ms`.
pub fn trim(samples: &mut Vec<WeatherSample>, now_ms: i64, retention: Duration) {
    let cutoff = now_ms - retention.as_millis() as i64;
    samples.retain(|s| s.ts >= cutoff);
}

pub struct WeatherSampler {
    client: reqwest::Client,
    config: WeatherConfig,
    path: PathBuf,
    samples: Mutex<Vec<WeatherSample>>,
}

impl WeatherSampler {
    /// Load and trim the persisted history from `cache_dir`.
    pub fn new(config: &WeatherConfig, cache_dir: &Path) -> Result<Self, WeatherError> {
        let path = cache_dir.join(WEATHER_FILENAME);
        let mut samples: Vec<WeatherSample> = read_record(&path).unwrap_or_default();
        let loaded = samples.len();
        trim(&mut samples, Utc::now().timestamp_millis(), config.retention());
        info!(loaded, kept = samples.len(), "weather history loaded");

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            config: config.clone(),
            path,
            samples: Mutex::new(samples),
        })
    }

    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    /// Retained samples, trimmed against the current time.
    pub fn trends(&self) -> Vec<WeatherSample> {
        let mut samples = self.lock();
        trim(&mut samples, Utc::now().timestamp_millis(), self.config.retention());
        samples.clone()
    }

    async fn fetch(&self) -> Result<WeatherSample, WeatherError> {
        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("latitude", self.config.latitude.to_string()),
                ("longitude", self.config.longitude.to_string()),
                ("current", "temperature_2m,apparent_temperature".to_string()),
                ("temperature_unit", self.config.unit.clone()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        let (temp, feels) = current_reading(response.json().await?)?;
        Ok(WeatherSample {
            ts: Utc::now().timestamp_millis(),
            temp,
            feels,
        })
    }

    /// Append a sample, trim, and persist the history.
    pub async fn push(&self, sample: WeatherSample) {
        let snapshot = {
            let mut samples = self.lock();
            samples.push(sample);
            trim(&mut samples, Utc::now().timestamp_millis(), self.config.retention());
            samples.clone()
        };
        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || write_json_atomic(&path, &snapshot)).await;
        match written {
            Ok(Ok(())) => debug!(path = %self.path.display(), "weather history saved"),
            Ok(Err(e)) => warn!(path = %self.path.display(), error = %e, "weather history write failed"),
            Err(e) => warn!(error = %e, "weather history write task failed"),
        }
    }

    /// Poll once. Failures are logged and leave the history untouched.
    pub async fn record(&self) -> Result<(), WeatherError> {
        match self.fetch().await {
            Ok(sample) => {
                info!(temp = sample.temp, feels = sample.feels, "weather sample recorded");
                self.push(sample).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "weather sample failed");
                Err(e)
            }
        }
    }

    /// Poll now and then every interval until the runtime shuts down.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.poll_interval();
            info!(every_min = period.as_secs() / 60, "weather sampler started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = self.record().await;
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<WeatherSample>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }
}
