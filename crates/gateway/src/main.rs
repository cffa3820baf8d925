//! PaperScout API Gateway
//!
//! The HTTP surface of the discovery pipeline.
//! Handles:
//! - Scan triggers for the primary and secondary sources
//! - Reads of the discovery catalog
//! - Trigger authentication and rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use paperscout_common::{
    config::AppConfig,
    metrics::{self, METRICS_PREFIX, SCAN_BUCKETS},
    store::{create_store, DiscoveryStore},
    telemetry::init_tracing,
};
use paperscout_discovery::Scanner;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use handlers::scan::ScanLocks;
use middleware::rate_limit::GlobalRateLimiter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DiscoveryStore>,
    pub scanner: Arc<Scanner>,
    pub scan_locks: ScanLocks,
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting PaperScout API Gateway v{}",
        paperscout_common::VERSION
    );

    let config = Arc::new(config);

    // Initialize metrics
    install_metrics_exporter(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Initialize the discovery store
    let store = create_store(&config.store).await?;

    let scanner = Scanner::from_config(&config, store.clone())?;
    if config.auth.trigger_secret.is_none() {
        tracing::warn!("No trigger secret configured, scan endpoints are open");
    }

    // Create app state
    let state = AppState {
        config: config.clone(),
        store,
        scanner: Arc::new(scanner),
        scan_locks: ScanLocks::default(),
        rate_limiter: middleware::rate_limit::from_config(&config.rate_limit)?,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve Prometheus metrics on their own port; 0 disables the exporter
fn install_metrics_exporter(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_scan_duration_seconds", METRICS_PREFIX)),
            SCAN_BUCKETS,
        )?
        .install()?;

    info!(port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Scan triggers. The last route_layer runs first: secret check, then rate limit,
    // so unauthenticated calls never spend a token.
    let scan_routes = Router::new()
        .route("/scan/primary", get(handlers::scan::scan_primary))
        .route("/scan/secondary", get(handlers::scan::scan_secondary))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_trigger_secret,
        ));

    // Compose the app
    Router::new()
        .merge(scan_routes)
        .route("/discoveries", get(handlers::discoveries::list_discoveries))
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .layer(from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use chrono::{DateTime, Utc};
    use paperscout_common::errors::{AppError, Result};
    use paperscout_common::store::MemoryStore;
    use paperscout_common::{DiscoveryRecord, SourceKind};
    use paperscout_discovery::{MockSource, ScanSettings};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "cron-secret";

    const FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
        <entry><id>http://arxiv.org/abs/1111.11111</id><title>First</title></entry>
        <entry><id>http://arxiv.org/abs/2222.22222</id><title>Second</title></entry>
    </feed>"#;

    /// Store whose reads always fail
    struct BrokenStore;

    #[async_trait]
    impl DiscoveryStore for BrokenStore {
        async fn load(&self) -> Result<Vec<DiscoveryRecord>> {
            Err(AppError::store("connection refused"))
        }

        async fn merge(&self, _new_records: Vec<DiscoveryRecord>) -> Result<usize> {
            Err(AppError::store("connection refused"))
        }

        async fn record_scan_time(&self, _kind: SourceKind, _at: DateTime<Utc>) -> Result<()> {
            Err(AppError::store("connection refused"))
        }

        async fn last_scan_time(&self, _kind: SourceKind) -> Result<Option<DateTime<Utc>>> {
            Err(AppError::store("connection refused"))
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn test_state(store: Arc<dyn DiscoveryStore>, rate_limiter: Option<Arc<GlobalRateLimiter>>) -> AppState {
        let mut config = AppConfig::default();
        config.auth.trigger_secret = Some(SECRET.to_string());

        let settings = ScanSettings {
            keywords: vec!["voice agent".to_string()],
            request_delay: Duration::ZERO,
            ..ScanSettings::default()
        };
        let scanner = Scanner::new(Arc::new(MockSource::new(FEED)), store.clone(), settings);

        AppState {
            config: Arc::new(config),
            store,
            scanner: Arc::new(scanner),
            scan_locks: ScanLocks::default(),
            rate_limiter,
        }
    }

    fn get_request(uri: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(secret) = secret {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", secret));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state(Arc::new(MemoryStore::new()), None);
        let (status, body) = send(state, get_request("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "paperscout");
    }

    #[tokio::test]
    async fn test_ready_reports_store() {
        let (status, body) = send(test_state(Arc::new(MemoryStore::new()), None), get_request("/ready", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["store"]["backend"], "memory");

        let (status, body) = send(test_state(Arc::new(BrokenStore), None), get_request("/ready", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
    }

    #[tokio::test]
    async fn test_scan_requires_secret() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(store.clone(), None);

        let (status, body) = send(state.clone(), get_request("/scan/primary", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = send(state, get_request("/scan/primary", Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert!(store.load().await.unwrap().is_empty());
        assert!(store.last_scan_time(SourceKind::Primary).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_primary_scan_then_read() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(store.clone(), None);

        let (status, body) = send(
            state.clone(),
            get_request("/scan/primary?from=20250101&to=20250107&maxResultsPerKeyword=10", Some(SECRET)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["source"], "primary");
        assert_eq!(body["dateRange"]["from"], "20250101");
        assert_eq!(body["keywordsSearched"], 1);
        assert_eq!(body["newDiscoveries"], 2);
        assert_eq!(body["totalStored"], 2);

        let (status, body) = send(state, get_request("/discoveries", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["discoveries"][0]["id"], "1111.11111");
        assert!(body["lastScan"].is_string());
        assert!(body["lastScholarScan"].is_null());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_primary_scan_validation() {
        let state = test_state(Arc::new(MemoryStore::new()), None);

        let (status, body) = send(state.clone(), get_request("/scan/primary?from=20250101", Some(SECRET))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_DATE_RANGE");

        let (status, body) = send(
            state.clone(),
            get_request("/scan/primary?from=20250107&to=20250101", Some(SECRET)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_DATE_RANGE");

        let (status, body) = send(
            state.clone(),
            get_request("/scan/primary?maxResultsPerKeyword=500", Some(SECRET)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send(state, get_request("/scan/primary?maxResultsPerKeyword=lots", Some(SECRET))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_lowered_cap_rejects_before_scanning() {
        let store = Arc::new(MemoryStore::new());
        let mut state = test_state(store.clone(), None);
        let mut config = (*state.config).clone();
        config.arxiv.max_results_cap = 20;
        state.config = Arc::new(config);

        let (status, body) = send(
            state.clone(),
            get_request("/scan/primary?maxResultsPerKeyword=50", Some(SECRET)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field"], "max_results_per_keyword");
        assert!(store.last_scan_time(SourceKind::Primary).await.unwrap().is_none());

        let (status, _) = send(state, get_request("/scan/primary?maxResultsPerKeyword=20", Some(SECRET))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_overlapping_scan_is_rejected() {
        let state = test_state(Arc::new(MemoryStore::new()), None);
        let _running = state.scan_locks.try_claim(SourceKind::Primary).unwrap();

        let (status, body) = send(state.clone(), get_request("/scan/primary", Some(SECRET))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "SCAN_IN_PROGRESS");

        // The other kind is independent
        let (status, body) = send(state, get_request("/scan/secondary", Some(SECRET))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_store_failure_on_scan() {
        let state = test_state(Arc::new(BrokenStore), None);
        let (status, body) = send(state, get_request("/scan/primary", Some(SECRET))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_discoveries_degrade_on_store_failure() {
        let state = test_state(Arc::new(BrokenStore), None);
        let (status, body) = send(state, get_request("/discoveries", None)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["discoveries"], Value::Array(vec![]));
        assert_eq!(body["total"], 0);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_scan_rate_limited() {
        let limiter = middleware::rate_limit::create_rate_limiter(1, 1).unwrap();
        let state = test_state(Arc::new(MemoryStore::new()), Some(limiter));

        let (status, _) = send(state.clone(), get_request("/scan/primary", Some(SECRET))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(state.clone(), get_request("/scan/primary", Some(SECRET))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "RATE_LIMITED");

        // Reads are not limited
        let (status, _) = send(state, get_request("/discoveries", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unauthorized_calls_do_not_spend_tokens() {
        let limiter = middleware::rate_limit::create_rate_limiter(1, 1).unwrap();
        let state = test_state(Arc::new(MemoryStore::new()), Some(limiter));

        for _ in 0..3 {
            let (status, _) = send(state.clone(), get_request("/scan/primary", None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, body) = send(state, get_request("/scan/primary", Some(SECRET))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }
}
