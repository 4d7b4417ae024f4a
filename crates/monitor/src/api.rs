//! HTTP API for health checks, metrics, history export and live events

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use monitor_lib::{
    export::{series_label, to_tsv, ExportFormat, LabeledSeries},
    health::{ComponentStatus, HealthRegistry},
    ingest::{LiveFeed, TelemetryStore},
    observability::MonitorMetrics,
    Category, TelemetryError,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tracing::{debug, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub store: TelemetryStore,
    pub feed: Arc<LiveFeed>,
    pub metrics: MonitorMetrics,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        store: TelemetryStore,
        feed: Arc<LiveFeed>,
        metrics: MonitorMetrics,
    ) -> Self {
        Self {
            health_registry,
            store,
            feed,
            metrics,
        }
    }
}

/// Error body returned by the query endpoints
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        let status = match err {
            TelemetryError::UnknownCategory(_)
            | TelemetryError::CategoryNotConfigured(_)
            | TelemetryError::UnknownCadence { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Configured categories with their units and cadences
async fn categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.categories().await)
}

#[derive(Debug, Deserialize)]
struct LoggerParams {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    deltas: bool,
}

/// History or rate-of-change download for one category tier
async fn logger(
    State(state): State<Arc<AppState>>,
    Path((category, cadence_secs)): Path<(String, u64)>,
    Query(params): Query<LoggerParams>,
) -> Result<Response, ApiError> {
    let format = match params.format.as_deref() {
        Some(format) => format.parse::<ExportFormat>().map_err(ApiError::bad_request)?,
        None => ExportFormat::default(),
    };
    let category: Category = category.parse()?;
    let cadence = Duration::from_secs(cadence_secs);

    let records = if params.deltas {
        state.store.deltas(category, cadence).await?
    } else {
        state.store.history(category, cadence).await?
    };
    let unit = state.store.unit(category).await?;
    debug!(
        category = %category,
        cadence_secs,
        deltas = params.deltas,
        records = records.len(),
        "Serving history download"
    );

    let response = match format {
        ExportFormat::Labeled => {
            let label = series_label(category, &unit, params.deltas);
            Json(LabeledSeries::new(label, &records)).into_response()
        }
        ExportFormat::Tsv => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/tab-separated-values; charset=utf-8")],
            to_tsv(&records, &unit, params.deltas),
        )
            .into_response(),
    };
    Ok(response)
}

/// Server-sent stream of every ingested reading
async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.feed.subscribe();
    debug!(listener_id = subscription.id, "Live listener connected");

    let stream = ReceiverStream::new(subscription.receiver).map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().comment("unserializable event")))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/categories", get(categories))
        .route("/logger/:category/:cadence", get(logger))
        .route("/event", get(events))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
