use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    error::AppError,
    state::Backend,
    types::{
        DeparturesResponse, Endpoint, ExcludeResponse, HelpResponse, NextResponse, Picked,
        StateResponse, StopsResponse, TransitDebugResponse, TrendsResponse, iso,
    },
};
use crate::{
    active::{ActiveSet, RefreshInfo},
    collage::CollageKind,
    gtfs::GtfsEngine,
};

pub const REFRESH_IN_MS: HeaderName = HeaderName::from_static("x-flashbacks-refresh-in-ms");
pub const REFRESH_AT: HeaderName = HeaderName::from_static("x-flashbacks-refresh-at");

/// Route catalogue for `/help`, limited to the mounted feature modules.
pub fn endpoints(transit: bool, weather: bool) -> Vec<Endpoint> {
    let ep = |path: &'static str, description: &'static str| Endpoint {
        path,
        method: "GET",
        description,
    };
    let mut out = vec![
        ep("/image/:id", "Serve image for stream id (0..STREAM_COUNT-1)."),
        ep("/collage/sequence", "Serve collage from next images in the same album."),
        ep(
            "/collage/overview",
            "Serve overview collage from evenly spaced images in the album.",
        ),
    ];
    if weather {
        out.push(ep("/weather/trends", "Temperature & feels-like history samples."));
    }
    if transit {
        out.push(ep("/vvt/next", "Next departures from a stop (GTFS schedule)."));
        out.push(ep("/vvt/stops", "Search stop names (GTFS)."));
        out.push(ep("/vvt/debug", "Debug GTFS cache and stop matching."));
    }
    out.extend([
        ep(
            "/state",
            "Return current set info (album, images, collages) and timing.",
        ),
        ep("/next", "Force-create next set immediately."),
        ep("/exclude", "Exclude current album and force-generate next set."),
        ep("/help", "List available endpoints."),
    ]);
    out
}

fn jpeg(bytes: Vec<u8>, refresh: Option<RefreshInfo>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    if let Some(info) = refresh {
        if let Ok(value) = HeaderValue::from_str(&info.refresh_in_ms.to_string()) {
            headers.insert(REFRESH_IN_MS, value);
        }
        if let Ok(value) = HeaderValue::from_str(&iso(info.refresh_at)) {
            headers.insert(REFRESH_AT, value);
        }
    }
    (headers, bytes).into_response()
}

pub async fn image_handler(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let stream_id = id
        .parse::<usize>()
        .ok()
        .filter(|&n| n < backend.config.slideshow.stream_count)
        .ok_or(AppError::BadStreamId)?;

    let set = backend
        .active
        .get_or_refresh()
        .await
        .map_err(|e| AppError::Image(e.to_string()))?;
    let source = set
        .selection
        .window
        .get(stream_id)
        .cloned()
        .ok_or_else(|| AppError::Image(format!("window has no slot {stream_id}")))?;

    let worker = Arc::clone(&backend);
    let bytes = tokio::task::spawn_blocking(move || worker.composer.slide(&source))
        .await
        .map_err(|e| AppError::Image(e.to_string()))?
        .map_err(|e| AppError::Image(e.to_string()))?;

    info!(
        stream_id,
        file = %set.selection.window_rel[stream_id],
        bytes = bytes.len(),
        "serve slide"
    );
    Ok(jpeg(bytes, Some(set.refresh_info(Utc::now()))))
}

/// Memoized collage bytes for the live set.
async fn collage(
    backend: &Arc<Backend>,
    kind: CollageKind,
) -> Result<(Arc<ActiveSet>, Vec<u8>), AppError> {
    let set = backend
        .active
        .get_or_refresh()
        .await
        .map_err(|e| AppError::Collage(e.to_string()))?;
    if let Some(bytes) = set.collage_cell(kind).get().cloned() {
        return Ok((set, bytes));
    }

    let (worker, target) = (Arc::clone(backend), Arc::clone(&set));
    let bytes = tokio::task::spawn_blocking(move || worker.composer.build(kind, &target.selection))
        .await
        .map_err(|e| AppError::Collage(e.to_string()))?
        .map_err(|e| AppError::Collage(e.to_string()))?;
    let _ = set.collage_cell(kind).set(bytes.clone());
    Ok((set, bytes))
}

pub async fn collage_sequence_handler(
    State(backend): State<Arc<Backend>>,
) -> Result<Response, AppError> {
    let (set, bytes) = collage(&backend, CollageKind::Sequence).await?;
    Ok(jpeg(bytes, Some(set.refresh_info(Utc::now()))))
}

pub async fn collage_overview_handler(
    State(backend): State<Arc<Backend>>,
) -> Result<Response, AppError> {
    let (_, bytes) = collage(&backend, CollageKind::Overview).await?;
    Ok(jpeg(bytes, None))
}

async fn rotate_flags(backend: &Arc<Backend>, set: &Arc<ActiveSet>) -> Result<Vec<bool>, AppError> {
    if let Some(flags) = set.rotate_flags_cell().get() {
        return Ok(flags.clone());
    }
    let (worker, target) = (Arc::clone(backend), Arc::clone(set));
    let flags =
        tokio::task::spawn_blocking(move || worker.composer.rotate_flags(&target.selection.window))
            .await
            .map_err(|e| AppError::failed("state_failed", e))?;
    let _ = set.rotate_flags_cell().set(flags.clone());
    Ok(flags)
}

pub async fn state_handler(
    State(backend): State<Arc<Backend>>,
) -> Result<Json<StateResponse>, AppError> {
    let set = backend
        .active
        .get_or_refresh()
        .await
        .map_err(|e| AppError::failed("state_failed", e))?;
    let flags = rotate_flags(&backend, &set).await?;
    let refresh = set.refresh_info(Utc::now());
    let slideshow = &backend.config.slideshow;

    Ok(Json(StateResponse {
        generated_at: iso(set.generated_at),
        expires_at: set.expires_at.timestamp_millis(),
        refresh_at: iso(refresh.refresh_at),
        refresh_in_ms: refresh.refresh_in_ms,
        album_expose_sec: slideshow.album_expose_sec(),
        stream_count: slideshow.stream_count,
        window_rel: set.selection.window_rel.clone(),
        rotate_flags: flags,
        picked: Picked::of(&set),
        files_count: set.selection.files.len(),
    }))
}

pub async fn next_handler(
    State(backend): State<Arc<Backend>>,
) -> Result<Json<NextResponse>, AppError> {
    let set = backend
        .active
        .force_refresh()
        .await
        .map_err(|e| AppError::failed("next_failed", e))?;
    let refresh = set.refresh_info(Utc::now());

    Ok(Json(NextResponse {
        generated_at: iso(set.generated_at),
        expires_at: set.expires_at.timestamp_millis(),
        refresh_at: iso(refresh.refresh_at),
        refresh_in_ms: refresh.refresh_in_ms,
        window_rel: set.selection.window_rel.clone(),
        picked: Picked::of(&set),
    }))
}

pub async fn exclude_handler(
    State(backend): State<Arc<Backend>>,
) -> Result<Json<ExcludeResponse>, AppError> {
    let current = backend.active.peek().ok_or(AppError::NoActiveSet)?;
    let (year, event) = (&current.selection.year, &current.selection.event);

    if let Err(e) = backend.exclusions.exclude(year, event) {
        warn!(year = %year, event = %event, error = %e, "exclusion list write failed");
    }
    info!(year = %year, event = %event, total = backend.exclusions.len(), "album excluded");

    let set = backend
        .active
        .force_refresh()
        .await
        .map_err(|e| AppError::ExcludeRefresh(e.to_string()))?;

    Ok(Json(ExcludeResponse {
        excluded: backend.exclusions.keys(),
        picked: Picked::of(&set),
    }))
}

/// Query strings for `/vvt/*`. Values stay strings so a malformed `limit`
/// falls back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitQuery {
    stop: Option<String>,
    stop_id: Option<String>,
    limit: Option<String>,
    q: Option<String>,
}

impl TransitQuery {
    fn stop<'a>(&'a self, backend: &'a Backend) -> &'a str {
        non_empty(&self.stop).unwrap_or(&backend.config.transit.stop_name)
    }

    fn stop_id(&self) -> Option<&str> {
        non_empty(&self.stop_id)
    }

    fn limit(&self, default: usize) -> usize {
        non_empty(&self.limit)
            .and_then(|l| l.parse().ok())
            .unwrap_or(default)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn transit(backend: &Backend) -> Result<&GtfsEngine, AppError> {
    backend
        .transit
        .as_ref()
        .ok_or_else(|| AppError::failed("vvt_failed", "transit is disabled"))
}

pub async fn departures_handler(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<TransitQuery>,
) -> Result<Json<DeparturesResponse>, AppError> {
    let engine = transit(&backend)?;
    let limit = query.limit(backend.config.transit.limit);
    let board = engine
        .next_departures(query.stop(&backend), query.stop_id(), limit)
        .await
        .map_err(|e| AppError::failed("vvt_failed", e))?;

    Ok(Json(DeparturesResponse {
        stop_name: board.stop_name,
        stop_id: board.stop_id,
        updated_at: iso(Utc::now()),
        items: board.items,
    }))
}

pub async fn stops_handler(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<TransitQuery>,
) -> Result<Json<StopsResponse>, AppError> {
    let engine = transit(&backend)?;
    let snapshot = engine
        .snapshot(query.stop(&backend), None)
        .await
        .map_err(|e| AppError::failed("vvt_failed", e))?;
    let items = snapshot
        .stops
        .search(query.q.as_deref().unwrap_or(""), query.limit(50));
    Ok(Json(StopsResponse { items }))
}

pub async fn transit_debug_handler(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<TransitQuery>,
) -> Result<Json<TransitDebugResponse>, AppError> {
    let engine = transit(&backend)?;
    let stop_name = query.stop(&backend);
    let snapshot = engine
        .snapshot(stop_name, query.stop_id())
        .await
        .map_err(|e| AppError::failed("vvt_failed", e))?;
    let stop_id = snapshot.primary_stop_id();

    Ok(Json(TransitDebugResponse {
        gtfs_url: engine.url().to_string(),
        gtfs_path: engine.archive_path().display().to_string(),
        updated_at: iso(snapshot.updated_at),
        expires_at: iso(snapshot.expires_at),
        stop_name: stop_name.to_string(),
        stop_id: stop_id.map(str::to_string),
        stop_sample: stop_id.and_then(|id| snapshot.stops.get(id)).cloned(),
        stop_ids: snapshot.stop.stop_ids.iter().take(5).cloned().collect(),
        stop_times_count: stop_id
            .map(|id| snapshot.schedule.stop_time_count(id))
            .unwrap_or(0),
    }))
}

pub async fn trends_handler(
    State(backend): State<Arc<Backend>>,
) -> Result<Json<TrendsResponse>, AppError> {
    let sampler = backend
        .weather
        .as_ref()
        .ok_or_else(|| AppError::failed("weather_failed", "weather is disabled"))?;
    let samples = sampler.trends();
    let config = sampler.config();

    Ok(Json(TrendsResponse {
        updated_at: iso(Utc::now()),
        history_hours: config.history_hours,
        interval_min: config.interval_min,
        current: samples.last().copied(),
        samples,
    }))
}

pub async fn help_handler(State(backend): State<Arc<Backend>>) -> Json<HelpResponse> {
    Json(HelpResponse {
        endpoints: endpoints(backend.transit.is_some(), backend.weather.is_some()),
    })
}
