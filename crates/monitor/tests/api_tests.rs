//! Integration tests for the monitor API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use monitor_lib::{
    alert::AlertDispatcher,
    config::{CategoryConfig, SeriesConfig, TelemetryConfig},
    health::{Component, HealthRegistry},
    ingest::{EngineConfig, LiveFeed, Reading, TelemetryEngine},
    observability::MonitorMetrics,
    series::CategoryRegistry,
    Category, Comparator,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tankmonitor::api::{create_router, AppState};
use tokio_stream::StreamExt;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    engine: TelemetryEngine,
}

fn telemetry_config() -> TelemetryConfig {
    let depth = CategoryConfig {
        unit: "litres".to_string(),
        level_low: Some(10000.0),
        level_high: None,
        rate_comparator: Comparator::LessThan,
        series: vec![
            SeriesConfig::new(10, 100, Some(-2.0)),
            SeriesConfig::new(60, 100, None),
        ],
    };

    TelemetryConfig {
        categories: BTreeMap::from([(Category::Depth, depth)]),
        ..TelemetryConfig::default()
    }
}

async fn setup_test_app() -> TestApp {
    let health_registry = HealthRegistry::new();
    health_registry.register(Component::Ingest).await;
    health_registry.register(Component::Notifier).await;

    let config = telemetry_config();
    let registry = CategoryRegistry::from_config(&config).unwrap();
    let (dispatcher, _outbox) = AlertDispatcher::channel(&config.alerts);
    let feed = Arc::new(LiveFeed::new(16));
    let (engine, _ingest, store) = TelemetryEngine::new(
        registry,
        Arc::new(dispatcher),
        feed.clone(),
        EngineConfig::default(),
    );

    let state = Arc::new(AppState::new(
        health_registry,
        store,
        feed,
        MonitorMetrics::new(),
    ));
    let router = create_router(state.clone());

    TestApp {
        router,
        state,
        engine,
    }
}

async fn ingest(app: &TestApp, samples: &[(f64, f64)]) {
    for &(timestamp, value) in samples {
        app.engine
            .process(Reading {
                category: Category::Depth,
                timestamp,
                value,
            })
            .await;
    }
}

async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["ingest"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_degraded(Component::Notifier, "webhook returned 500")
        .await;

    let (status, body) = get(app.router, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_unhealthy(Component::Ingest, "telemetry engine stopped")
        .await;

    let (status, body) = get(app.router, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_transitions() {
    let app = setup_test_app().await;

    // Not ready until startup completes
    let (status, body) = get(app.router.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    app.state.health_registry.set_ready(true).await;
    let (status, _) = get(app.router, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup_test_app().await;
    ingest(&app, &[(0.0, 12000.0)]).await;

    let (status, body) = get(app.router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("tankmonitor_samples_ingested_total"));
}

#[tokio::test]
async fn test_categories_lists_configuration() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/categories").await;
    assert_eq!(status, StatusCode::OK);

    let categories: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(categories[0]["category"], "depth");
    assert_eq!(categories[0]["unit"], "litres");
    assert_eq!(categories[0]["cadences_secs"], serde_json::json!([10, 60]));
}

#[tokio::test]
async fn test_logger_labeled_history() {
    let app = setup_test_app().await;
    ingest(&app, &[(0.0, 100.0), (30.0, 90.0), (65.0, 80.0)]).await;

    let (status, body) = get(app.router, "/logger/depth/60").await;
    assert_eq!(status, StatusCode::OK);

    let series: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(series.is_object(), "labeled export is a single series: {body}");
    assert_eq!(series["label"], "depth (litres)");
    assert_eq!(series["values"], serde_json::json!([[0.0, 100.0], [65.0, 80.0]]));
}

#[tokio::test]
async fn test_logger_accepts_nvd3_alias() {
    let app = setup_test_app().await;
    ingest(&app, &[(0.0, 100.0)]).await;

    let (status, body) = get(app.router, "/logger/depth/10?format=nvd3").await;
    assert_eq!(status, StatusCode::OK);

    let series: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(series["values"], serde_json::json!([[0.0, 100.0]]));
}

#[tokio::test]
async fn test_logger_tsv_deltas() {
    let app = setup_test_app().await;
    ingest(&app, &[(1_700_000_000.0, 50.0), (1_700_000_060.0, 42.0)]).await;

    let (status, body) = get(app.router, "/logger/depth/10?format=tsv&deltas=true").await;
    assert_eq!(status, StatusCode::OK);

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "\"Timestamp\"\t\"Rate of Change (litres/min)\"");
    assert_eq!(lines[1], "2023-11-14 22:13:50\t-8");
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn test_logger_unknown_category_is_404() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/logger/pressure/60").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["error"], "unknown category 'pressure'");
}

#[tokio::test]
async fn test_logger_unconfigured_category_is_404() {
    let app = setup_test_app().await;

    let (status, _) = get(app.router, "/logger/water_temp/60").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logger_unknown_cadence_is_404() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/logger/depth/3600").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("3600"));
}

#[tokio::test]
async fn test_logger_bad_format_is_400() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/logger/depth/60?format=csv").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("csv"));
}

#[tokio::test]
async fn test_event_stream_pushes_log_values() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/event").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.state.feed.subscriber_count(), 1);

    ingest(&app, &[(0.0, 12345.0)]).await;

    let mut stream = response.into_body().into_data_stream();
    let frame = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();

    assert!(text.starts_with("data: "));
    assert!(text.contains("\"event\":\"log_value\""));
    assert!(text.contains("\"category\":\"depth\""));
    assert!(text.contains("12345"));
}

#[tokio::test]
async fn test_disconnected_event_listener_is_pruned() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/event").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(app.state.feed.subscriber_count(), 1);
    drop(response);

    ingest(&app, &[(0.0, 12345.0)]).await;
    assert_eq!(app.state.feed.subscriber_count(), 0);
}
