//! API Handlers
//!
//! HTTP request handlers for the operational and read-through endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::cache::{CacheCategory, CacheMonitor, DomainEvent, InvalidationHooks, ServiceCache};
use crate::config::Config;
use crate::error::ApiError;
use crate::gateway::CatalogGateway;
use crate::models::{
    CircuitsResponse, CoursesResponse, DataResponse, EnrollmentCountResponse,
    EventAcceptedResponse, HealthResponse, InvalidatePatternRequest, InvalidateResponse,
    StatsResponse,
};
use crate::remote::{CatalogSource, HttpCatalogSource, RemoteError, KNOWN_SERVICES};
use crate::resilience::{CircuitBreakerRegistry, RateLimitTracker, ResilientCaller};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ServiceCache>,
    pub hooks: InvalidationHooks,
    pub caller: Arc<ResilientCaller>,
    pub gateway: CatalogGateway,
}

impl AppState {
    /// Wires cache, monitor and resilience state around `source`.
    pub fn new(config: &Config, source: Arc<dyn CatalogSource>) -> Self {
        let monitor = Arc::new(CacheMonitor::new());
        let cache = Arc::new(ServiceCache::new(&config.cache, monitor.clone()));
        let caller = Arc::new(ResilientCaller::from_parts(
            CircuitBreakerRegistry::new(config.circuit.clone()).with_services(KNOWN_SERVICES),
            RateLimitTracker::new(monitor),
            config.retry.clone(),
        ));
        let gateway = CatalogGateway::new(cache.clone(), caller.clone(), source);

        Self {
            hooks: InvalidationHooks::new(cache.clone()),
            cache,
            caller,
            gateway,
        }
    }

    /// Creates the state with HTTP clients for the configured sibling services.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        let source = HttpCatalogSource::from_config(&config.remote)?;
        Ok(Self::new(config, Arc::new(source)))
    }
}

fn parse_category(raw: &str) -> Result<CacheCategory, ApiError> {
    raw.parse().map_err(ApiError::UnknownCategory)
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let open = state.caller.breakers().open_count().await;
    Json(HealthResponse::from_open_circuits(open))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.cache.monitor().stats(),
        entry_counts: state.cache.entry_counts().await,
    })
}

/// Handler for POST /stats/reset
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    state.cache.monitor().reset();
    info!("Cache statistics reset");
    stats_handler(State(state)).await
}

/// Handler for GET /circuits
pub async fn circuits_handler(State(state): State<AppState>) -> Json<CircuitsResponse> {
    Json(CircuitsResponse {
        circuits: state.caller.circuit_snapshots().await,
    })
}

/// Handler for DELETE /cache/:category
pub async fn flush_category_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let category = parse_category(&category)?;
    let removed = state.cache.flush_category(category).await;
    info!(category = %category, removed, "Cache category flushed");

    Ok(Json(InvalidateResponse { category, removed }))
}

/// Handler for DELETE /cache/:category/:id
///
/// Idempotent: an absent entry answers 200 with `removed: 0`.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let category = parse_category(&category)?;
    let removed = state.hooks.invalidate(category, &id).await;

    Ok(Json(InvalidateResponse {
        category,
        removed: usize::from(removed),
    }))
}

/// Handler for POST /cache/:category/invalidate
pub async fn invalidate_pattern_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(req): Json<InvalidatePatternRequest>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let category = parse_category(&category)?;
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let removed = state.hooks.invalidate_matching(category, &req.pattern).await;
    Ok(Json(InvalidateResponse { category, removed }))
}

/// Handler for POST /events
///
/// Invalidation runs in the background; the response does not wait for it.
pub async fn event_handler(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> (StatusCode, Json<EventAcceptedResponse>) {
    let name = event.name().to_string();
    state.hooks.dispatch(event);

    (
        StatusCode::ACCEPTED,
        Json(EventAcceptedResponse {
            accepted: true,
            event: name,
        }),
    )
}

/// Handler for GET /packages/:id
pub async fn package_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<serde_json::Value>>, ApiError> {
    state
        .gateway
        .package_info(&id)
        .await
        .map(|package| Json(DataResponse::new(package)))
        .ok_or_else(|| ApiError::Unavailable(format!("package {id}")))
}

/// Handler for GET /packages/:id/courses
///
/// Degrades to an empty list when the package service is unreachable.
pub async fn package_courses_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<CoursesResponse> {
    Json(DataResponse::new(state.gateway.courses_in_package(&id).await))
}

/// Handler for GET /courses/:id/enrollments
pub async fn enrollment_count_handler(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<DataResponse<EnrollmentCountResponse>>, ApiError> {
    let count = state
        .gateway
        .enrollment_count(&course_id)
        .await
        .ok_or_else(|| ApiError::Unavailable(format!("enrollment count for course {course_id}")))?;

    Ok(Json(DataResponse::new(EnrollmentCountResponse {
        course_id,
        count,
    })))
}
