//! Catalog data source backed by the package and course services.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::remote::{RemoteError, ServiceClient, ServiceTokenSigner};

pub const COURSE_SERVICE: &str = "course-service";
pub const PACKAGE_SERVICE: &str = "package-service";
pub const AUTH_SERVICE: &str = "auth-service";
pub const EMAIL_SERVICE: &str = "email-service";

/// Sibling services this process may call.
pub const KNOWN_SERVICES: [&str; 4] = [AUTH_SERVICE, COURSE_SERVICE, EMAIL_SERVICE, PACKAGE_SERVICE];

/// Remote reads the gateway caches.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_package(&self, package_id: &str) -> Result<Value, RemoteError>;

    async fn fetch_courses_in_package(&self, package_id: &str) -> Result<Vec<Value>, RemoteError>;

    async fn fetch_enrollment_count(&self, course_id: &str) -> Result<u64, RemoteError>;

    /// Enrollment totals across all courses
    async fn fetch_enrollment_summary(&self) -> Result<Value, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct EnrollmentCount {
    count: u64,
}

/// `CatalogSource` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    packages: ServiceClient,
    courses: ServiceClient,
}

impl HttpCatalogSource {
    pub fn new(packages: ServiceClient, courses: ServiceClient) -> Self {
        Self { packages, courses }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let signer = Arc::new(ServiceTokenSigner::new(
            config.service_name.clone(),
            &config.jwt_secret,
        ));
        let packages = ServiceClient::new(
            PACKAGE_SERVICE,
            config.package_service_url.clone(),
            config.request_timeout,
            signer.clone(),
        )?;
        let courses = ServiceClient::new(
            COURSE_SERVICE,
            config.course_service_url.clone(),
            config.request_timeout,
            signer,
        )?;
        Ok(Self::new(packages, courses))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_package(&self, package_id: &str) -> Result<Value, RemoteError> {
        self.packages
            .get_data(&format!("/api/packages/{package_id}"))
            .await
    }

    async fn fetch_courses_in_package(&self, package_id: &str) -> Result<Vec<Value>, RemoteError> {
        self.packages
            .get_data(&format!("/api/packages/{package_id}/courses"))
            .await
    }

    async fn fetch_enrollment_count(&self, course_id: &str) -> Result<u64, RemoteError> {
        let count: EnrollmentCount = self
            .courses
            .get_data(&format!("/api/courses/{course_id}/enrollments/count"))
            .await?;
        Ok(count.count)
    }

    async fn fetch_enrollment_summary(&self) -> Result<Value, RemoteError> {
        self.courses.get_data("/api/enrollments/summary").await
    }
}
