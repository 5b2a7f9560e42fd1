pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod validation;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tts_core::TtsManager;

use crate::config::ServerConfig;
use crate::handlers::START_TIME;
use crate::metrics::AppMetrics;

#[derive(Clone)]
pub struct AppState {
    pub tts: Arc<TtsManager>,
    pub metrics: AppMetrics,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(tts: TtsManager, config: ServerConfig) -> Self {
        Self {
            tts: Arc::new(tts),
            metrics: AppMetrics::new(),
            request_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers(Any)
        .allow_credentials(false);

    match config.cors_allowed_origins {
        Some(ref allowed) => {
            let origins: Vec<HeaderValue> = allowed.iter().filter_map(|o| o.parse().ok()).collect();
            if origins.is_empty() {
                warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
                base.allow_origin(Any)
            } else {
                info!("CORS configured for {} origin(s)", origins.len());
                base.allow_origin(AllowOrigin::list(origins))
            }
        }
        None => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            base.allow_origin(Any)
        }
    }
}

async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        response
    } else {
        next.run(request).await
    }
}

/// Build the application router over a loaded TTS manager.
pub fn router(state: AppState) -> Router {
    let _ = START_TIME.get_or_init(std::time::Instant::now);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config))
        .into_inner();

    let api = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/voices", get(handlers::voices))
        .route("/tts", post(handlers::tts_endpoint))
        .route("/tts/stream", post(handlers::tts_stream_endpoint))
        .route("/metrics", get(handlers::metrics_endpoint));

    Router::new()
        .merge(api)
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}
