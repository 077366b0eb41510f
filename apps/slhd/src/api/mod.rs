//! # SLHD HTTP API Module
//!
//! The admin REST API, served with axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness and version
//! - `GET /dashboard/stats?year=` - Cached dashboard snapshot
//! - `GET /dashboard/timeline?year=` - Seven-stage timeline
//! - `GET /dashboard/activities?limit=` - Recent registrations and submissions
//! - `GET /stage/{year}` - Active stage and its deadline
//! - `GET /deadline/{year}` - Submission deadline
//! - `POST /deadline` - Upsert a deadline (actor from `X-Actor-Id`/`X-Actor-Role`)
//! - `GET /logs?role=&year=&page=&limit=` - Activity log
//! - `GET /logs/admin`, `GET /logs/pusdatin` - Per-audience logs
//! - `GET /logs/tracking/{year}` - Tracking history of one year
//!
//! ## Security
//!
//! CORS origins and the rate limit come from [`ServerConfig`]; the API key
//! comes from `SLHD_API_KEY` only.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env, keys_match};
pub use handlers::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, actor_from_headers, request_meta};
pub use middleware::{GlobalRateLimiter, create_rate_limiter, limiter_for};
pub use types::{
    DeadlineRequest, ErrorResponse, HealthResponse, LimitQuery, LogEntryJson, LogPageResponse,
    LogQuery, SubjectJson, YearQuery, status_for,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use moka::future::Cache;
use slhd_core::{DashboardStats, Session, SlhdError, Year};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Per-year dashboard snapshots.
pub type DashboardCache = Cache<Year, Arc<DashboardStats>>;

/// Years kept in the dashboard cache at once.
const DASHBOARD_CACHE_CAPACITY: u64 = 64;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    /// `None` when caching is disabled.
    pub dashboard_cache: Option<DashboardCache>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// State with the default configuration.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_config(session, ServerConfig::default())
    }

    #[must_use]
    pub fn with_config(session: Session, config: ServerConfig) -> Self {
        let dashboard_cache = (config.dashboard_cache_secs > 0).then(|| {
            Cache::builder()
                .max_capacity(DASHBOARD_CACHE_CAPACITY)
                .time_to_live(Duration::from_secs(config.dashboard_cache_secs))
                .build()
        });
        Self {
            session: Arc::new(RwLock::new(session)),
            dashboard_cache,
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

fn allowed_headers() -> [HeaderName; 4] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(ACTOR_ID_HEADER),
        HeaderName::from_static(ACTOR_ROLE_HEADER),
    ]
}

/// CORS layer for the configured origins.
///
/// `"*"` allows everything, a comma-separated list allows those origins,
/// and no setting (or no valid entry) falls back to localhost.
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    let Some(origins) = origins else {
        tracing::info!("CORS: no origins configured, allowing localhost only");
        return build_localhost_cors();
    };
    if origins.trim() == "*" {
        tracing::warn!("CORS: allowing ALL origins. Do not use this in production");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::info!("CORS: allowing origin {}", o);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: invalid origin '{}': {}", o, e);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::warn!("CORS: no valid origins configured, allowing localhost only");
        return build_localhost_cors();
    }
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .map(HeaderValue::from_static)
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Build the router with every endpoint and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate
/// limiting, authentication.
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED. Set {} to protect the admin API",
            API_KEY_ENV
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/dashboard/stats", get(handlers::dashboard_stats_handler))
        .route("/dashboard/timeline", get(handlers::timeline_handler))
        .route("/dashboard/activities", get(handlers::activities_handler))
        .route("/stage/{year}", get(handlers::stage_handler))
        .route("/deadline/{year}", get(handlers::deadline_handler))
        .route("/deadline", post(handlers::set_deadline_handler))
        .route("/logs", get(handlers::logs_handler))
        .route("/logs/admin", get(handlers::admin_logs_handler))
        .route("/logs/pusdatin", get(handlers::pusdatin_logs_handler))
        .route("/logs/tracking/{year}", get(handlers::tracking_logs_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    match limiter_for(config.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(config.cors_origins.as_deref()))
                .layer(DefaultBodyLimit::max(config.body_limit_bytes)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind and serve until the process is stopped.
pub async fn run_server(session: Session, config: ServerConfig) -> Result<(), SlhdError> {
    let addr = config.bind_addr();
    let router = create_router(AppState::with_config(session, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SlhdError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("SLHD HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| SlhdError::Io(format!("Server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cache_secs_disables_cache() {
        let config = ServerConfig {
            dashboard_cache_secs: 0,
            ..ServerConfig::default()
        };
        assert!(AppState::with_config(Session::new(), config).dashboard_cache.is_none());
        assert!(AppState::new(Session::new()).dashboard_cache.is_some());
    }
}
