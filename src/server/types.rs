//! Response bodies, one record per route.

use crate::active::ActiveSet;
use crate::gtfs::{Row, StopSummary, schedule::Departure};
use crate::weather::WeatherSample;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// `2024-05-22T12:00:00.000Z`, the form display clients parse.
pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Picked {
    pub year: String,
    pub event: String,
    pub start_index: usize,
    pub picked_at: String,
}

impl Picked {
    pub fn of(set: &ActiveSet) -> Self {
        let s = &set.selection;
        Self {
            year: s.year.clone(),
            event: s.event.clone(),
            start_index: s.start_index,
            picked_at: iso(s.picked_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub generated_at: String,
    pub expires_at: i64,
    pub refresh_at: String,
    pub refresh_in_ms: i64,
    pub album_expose_sec: u64,
    pub stream_count: usize,
    pub window_rel: Vec<String>,
    pub rotate_flags: Vec<bool>,
    pub picked: Picked,
    pub files_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextResponse {
    pub generated_at: String,
    pub expires_at: i64,
    pub refresh_at: String,
    pub refresh_in_ms: i64,
    pub window_rel: Vec<String>,
    pub picked: Picked,
}

#[derive(Debug, Serialize)]
pub struct ExcludeResponse {
    pub excluded: Vec<String>,
    pub picked: Picked,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeparturesResponse {
    pub stop_name: String,
    pub stop_id: Option<String>,
    pub updated_at: String,
    pub items: Vec<Departure>,
}

#[derive(Debug, Serialize)]
pub struct StopsResponse {
    pub items: Vec<StopSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitDebugResponse {
    pub gtfs_url: String,
    pub gtfs_path: String,
    pub updated_at: String,
    pub expires_at: String,
    pub stop_name: String,
    pub stop_id: Option<String>,
    pub stop_sample: Option<Row>,
    pub stop_ids: Vec<String>,
    pub stop_times_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsResponse {
    pub updated_at: String,
    pub history_hours: u64,
    pub interval_min: u64,
    pub samples: Vec<WeatherSample>,
    pub current: Option<WeatherSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    pub path: &'static str,
    pub method: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HelpResponse {
    pub endpoints: Vec<Endpoint>,
}
