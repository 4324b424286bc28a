//! Request and Response models for the operational API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::InvalidatePatternRequest;
pub use responses::{
    CircuitsResponse, CoursesResponse, DataResponse, EnrollmentCountResponse,
    EventAcceptedResponse, HealthResponse, InvalidateResponse, StatsResponse,
};
