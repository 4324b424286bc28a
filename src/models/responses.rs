//! Response DTOs for the operational API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheCategory, CacheStatsSnapshot};
use crate::resilience::CircuitSnapshot;

/// Response body for GET /health
///
/// `degraded` while any circuit is open; the process still serves cached data.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub open_circuits: usize,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn from_open_circuits(open_circuits: usize) -> Self {
        let status = if open_circuits == 0 { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            open_circuits,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStatsSnapshot,
    /// Live entries per category, expired-but-unswept included
    pub entry_counts: BTreeMap<CacheCategory, usize>,
}

/// Response body for cache flush and invalidation routes
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub category: CacheCategory,
    /// Number of entries removed
    pub removed: usize,
}

/// Response body for GET /circuits
#[derive(Debug, Clone, Serialize)]
pub struct CircuitsResponse {
    pub circuits: Vec<CircuitSnapshot>,
}

/// Response body for POST /events
#[derive(Debug, Clone, Serialize)]
pub struct EventAcceptedResponse {
    pub accepted: bool,
    pub event: String,
}

/// Response body wrapping read-through data, mirroring the sibling services' envelope
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Payload of GET /courses/:id/enrollments
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentCountResponse {
    pub course_id: String,
    pub count: u64,
}

/// Payload of GET /packages/:id/courses
pub type CoursesResponse = DataResponse<Vec<Value>>;
