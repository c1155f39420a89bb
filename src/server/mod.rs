//! HTTP surface of the backend.
//!
//! Every response carries `Cache-Control: no-store`. CORS allows any origin
//! and exposes the two refresh headers so the display client can schedule
//! its next fetch. `/vvt/*` and `/weather/*` exist only when their feature
//! module is enabled.

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

use std::{io, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, Method, header::CACHE_CONTROL},
    routing::get,
};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use tracing::{info, warn};

use routes::{
    REFRESH_AT, REFRESH_IN_MS, collage_overview_handler, collage_sequence_handler,
    departures_handler, exclude_handler, help_handler, image_handler, next_handler,
    state_handler, stops_handler, transit_debug_handler, trends_handler,
};
pub use state::{Backend, StartupError};

pub fn router(backend: Arc<Backend>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .expose_headers([REFRESH_IN_MS, REFRESH_AT])
        .max_age(Duration::from_secs(60 * 60));

    let mut app = Router::new()
        .route("/image/{id}", get(image_handler))
        .route("/collage/sequence", get(collage_sequence_handler))
        .route("/collage/overview", get(collage_overview_handler))
        .route("/state", get(state_handler))
        .route("/next", get(next_handler))
        .route("/exclude", get(exclude_handler))
        .route("/help", get(help_handler));

    if backend.transit.is_some() {
        app = app
            .route("/vvt/next", get(departures_handler))
            .route("/vvt/stops", get(stops_handler))
            .route("/vvt/debug", get(transit_debug_handler));
    }
    if backend.weather.is_some() {
        app = app.route("/weather/trends", get(trends_handler));
    }

    app.layer(SetResponseHeaderLayer::overriding(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    ))
    .layer(cors)
    .with_state(backend)
}

/// Start the weather sampler, bind, and serve until SIGINT or SIGTERM.
pub async fn start_server(backend: Arc<Backend>) -> io::Result<()> {
    if let Some(sampler) = &backend.weather {
        Arc::clone(sampler).spawn();
    }

    let address = backend.config.server.address();
    let app = router(Arc::clone(&backend));

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!(
        root = %backend.config.media.root.display(),
        cache_dir = %backend.config.media.cache_dir.display(),
        "Server running on {address}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
