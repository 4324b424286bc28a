//! API Routes
//!
//! Configures the Axum router with the operational and read-through endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    circuits_handler, enrollment_count_handler, event_handler, flush_category_handler,
    health_handler, invalidate_handler, invalidate_pattern_handler, package_courses_handler,
    package_handler, reset_stats_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - `healthy`, or `degraded` while a circuit is open
/// - `GET /stats` / `POST /stats/reset` - Monitor counters
/// - `GET /circuits` - Circuit breaker snapshots
/// - `DELETE /cache/:category` - Flush a category
/// - `DELETE /cache/:category/:id` - Invalidate one entry
/// - `POST /cache/:category/invalidate` - Pattern invalidation
/// - `POST /events` - Domain write event
/// - `GET /packages/:id`, `GET /packages/:id/courses`, `GET /courses/:id/enrollments`
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/reset", post(reset_stats_handler))
        .route("/circuits", get(circuits_handler))
        .route("/cache/:category", delete(flush_category_handler))
        .route("/cache/:category/:id", delete(invalidate_handler))
        .route("/cache/:category/invalidate", post(invalidate_pattern_handler))
        .route("/events", post(event_handler))
        .route("/packages/:id", get(package_handler))
        .route("/packages/:id/courses", get(package_courses_handler))
        .route("/courses/:id/enrollments", get(enrollment_count_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
