//! Pulse Web Server
//!
//! Axum-based REST API for the Pulse productivity analyzer.
//!
//! - `POST /api/v1/analyze`: score a day and attach an insight (`x-cache: HIT|MISS`)
//! - `POST /api/v1/score`: score only, no generator call
//! - `GET /health`: liveness plus cache reachability
//!
//! Security features:
//! - Per-client rate limiting on `/api/*`
//! - Restrictive CORS policy
//! - Sanitized error responses

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use pulse_core::{Analyzer, CacheStore, Config, GeneratorBackend, RateLimit};

mod handlers;

/// Response header reporting whether the insight came from the cache
pub const CACHE_HEADER: &str = "x-cache";

/// Response header naming the insight source (cache, generated, fallback)
pub const INSIGHT_SOURCE_HEADER: &str = "x-insight-source";

/// How often idle rate-limit buckets are dropped
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Server configuration
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Per-client request quota on `/api/*`
    pub rate_limit: RateLimit,
}

impl ServerConfig {
    /// Take the quota from application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            rate_limit: config.rate_limit,
            ..Self::default()
        }
    }
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub server: ServerConfig,
    pub analyzer: Analyzer,
    pub cache: CacheStore,
    limiter: DefaultKeyedRateLimiter<String>,
}

impl AppState {
    pub fn new(config: Config, server: ServerConfig, analyzer: Analyzer, cache: CacheStore) -> Self {
        let limiter = build_limiter(&server.rate_limit);
        Self {
            config,
            server,
            analyzer,
            cache,
            limiter,
        }
    }

    /// Drop limiter state for clients whose quota has fully replenished
    pub fn prune_rate_limiter(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients the limiter currently tracks
    pub fn rate_limited_clients(&self) -> usize {
        self.limiter.len()
    }
}

/// Build a keyed GCRA limiter allowing `requests` per `period` in bursts
fn build_limiter(rate_limit: &RateLimit) -> DefaultKeyedRateLimiter<String> {
    let burst = NonZeroU32::new(rate_limit.requests).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(rate_limit.period / burst.get())
        .map(|q| q.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_minute(burst));
    RateLimiter::keyed(quota)
}

/// Client identity for rate limiting: the TCP peer address
///
/// Forwarded headers are not trusted. Requests without connection info
/// (in-process tests) share one bucket.
fn client_key(connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware for the API routes
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(connect_info.as_ref());

    if state.limiter.check_key(&key).is_err() {
        warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        return AppError::too_many_requests(&format!(
            "Rate limit exceeded: {}",
            state.server.rate_limit
        ))
        .into_response();
    }

    next.run(request).await
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/v1/analyze", post(handlers::analyze))
        .route("/v1/score", post(handlers::score))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Build CORS layer
    let cors = if state.server.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = state
            .server
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve_with_config(
    config: Config,
    host: &str,
    port: u16,
    server_config: ServerConfig,
) -> anyhow::Result<()> {
    let cache = CacheStore::from_config(&config.cache)?;
    let analyzer = Analyzer::from_config(&config, cache.clone())?;

    check_cache_connection(&cache).await;
    check_generator_connection(&analyzer).await;

    let state = Arc::new(AppState::new(
        config,
        server_config,
        analyzer,
        cache.clone(),
    ));
    let pruner = tokio::spawn(prune_rate_limiter_periodically(state.clone()));
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    cache.close().await;
    info!("Server stopped");

    Ok(())
}

async fn prune_rate_limiter_periodically(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
    loop {
        interval.tick().await;
        let before = state.rate_limited_clients();
        state.prune_rate_limiter();
        debug!(
            before,
            after = state.rate_limited_clients(),
            "Pruned rate limiter state"
        );
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Check and log cache connection status
async fn check_cache_connection(cache: &CacheStore) {
    if cache.ping().await {
        info!("✅ Cache connected ({})", cache.backend_name());
    } else {
        warn!(
            "⚠️  Cache not responding ({}); insights will be generated on every request",
            cache.backend_name()
        );
    }
}

/// Check and log generator connection status
async fn check_generator_connection(analyzer: &Analyzer) {
    let generator = analyzer.orchestrator().generator();
    if generator.health_check().await {
        info!(
            "✅ Generator connected: {} (model: {})",
            generator.host(),
            generator.model()
        );
    } else {
        warn!(
            "⚠️  Generator configured but not responding: {} (model: {})",
            generator.host(),
            generator.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }


    pub fn too_many_requests(msg: &str) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
