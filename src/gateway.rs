//! Catalog Gateway
//!
//! Read-through access to package, course and enrollment data: cache first,
//! then a guarded remote fetch whose result populates the cache. Failures
//! degrade to `None` or an empty list so callers can fall back.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::cache::{CacheCategory, CacheSlot, ServiceCache};
use crate::remote::{CatalogSource, RemoteError, COURSE_SERVICE, PACKAGE_SERVICE};
use crate::resilience::{GuardedResult, ResilientCaller};

/// Cached, guarded reads of catalog data.
#[derive(Clone)]
pub struct CatalogGateway {
    cache: Arc<ServiceCache>,
    caller: Arc<ResilientCaller>,
    source: Arc<dyn CatalogSource>,
}

impl CatalogGateway {
    pub fn new(
        cache: Arc<ServiceCache>,
        caller: Arc<ResilientCaller>,
        source: Arc<dyn CatalogSource>,
    ) -> Self {
        Self {
            cache,
            caller,
            source,
        }
    }

    pub fn cache(&self) -> &Arc<ServiceCache> {
        &self.cache
    }

    pub fn caller(&self) -> &Arc<ResilientCaller> {
        &self.caller
    }

    // == Package Info ==
    pub async fn package_info(&self, package_id: &str) -> Option<Value> {
        let source = &self.source;
        self.read_through(CacheCategory::Package, package_id.into(), PACKAGE_SERVICE, || {
            source.fetch_package(package_id)
        })
        .await
    }

    // == Courses In Package ==
    pub async fn courses_in_package(&self, package_id: &str) -> Vec<Value> {
        let source = &self.source;
        let value = self
            .read_through(CacheCategory::Courses, package_id.into(), PACKAGE_SERVICE, || async move {
                source
                    .fetch_courses_in_package(package_id)
                    .await
                    .map(Value::Array)
            })
            .await;

        match value {
            Some(Value::Array(courses)) => courses,
            _ => Vec::new(),
        }
    }

    // == Enrollment Count ==
    pub async fn enrollment_count(&self, course_id: &str) -> Option<u64> {
        let source = &self.source;
        self.read_through(CacheCategory::Enrollment, course_id.into(), COURSE_SERVICE, || async move {
            source.fetch_enrollment_count(course_id).await.map(Value::from)
        })
        .await
        .and_then(|value| value.as_u64())
    }

    /// Aggregate enrollment figures, kept in the enrollment aggregate slot so
    /// no course id can shadow them.
    pub async fn enrollment_summary(&self) -> Option<Value> {
        let source = &self.source;
        self.read_through(
            CacheCategory::Enrollment,
            CacheSlot::Aggregate,
            COURSE_SERVICE,
            || source.fetch_enrollment_summary(),
        )
        .await
    }

    // == Read Through ==
    async fn read_through<F, Fut>(
        &self,
        category: CacheCategory,
        slot: CacheSlot<'_>,
        service: &str,
        fetch: F,
    ) -> Option<Value>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Value, RemoteError>>,
    {
        if let Some(value) = self.cache.get_slot(category, slot).await {
            return Some(value);
        }

        let monitor = self.cache.monitor();
        monitor.record_api_call(category);

        let result: GuardedResult<Value> = self.caller.call(service, fetch).await;
        match result {
            Ok(value) => {
                self.cache.set_slot(category, slot, value.clone(), None).await;
                Some(value)
            }
            Err(e) => {
                monitor.record_error(category);
                warn!(
                    category = %category,
                    slot = ?slot,
                    service,
                    circuit_open = e.is_circuit_open(),
                    error = %e,
                    "Remote fetch failed, returning degraded result"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheMonitor, DomainEvent, InvalidationHooks};
    use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicU32,
        fail_with: Option<u16>,
    }

    impl CountingSource {
        fn result<T>(&self, value: T) -> Result<T, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(status) => Err(RemoteError::Http {
                    service: "test".to_string(),
                    status,
                }),
                None => Ok(value),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn fetch_package(&self, package_id: &str) -> Result<Value, RemoteError> {
            self.result(json!({"id": package_id, "price": 100}))
        }

        async fn fetch_courses_in_package(&self, _package_id: &str) -> Result<Vec<Value>, RemoteError> {
            self.result(vec![json!({"id": "c1"}), json!({"id": "c2"})])
        }

        async fn fetch_enrollment_count(&self, _course_id: &str) -> Result<u64, RemoteError> {
            self.result(12)
        }

        async fn fetch_enrollment_summary(&self) -> Result<Value, RemoteError> {
            self.result(json!({"total": 40}))
        }
    }

    fn gateway(source: Arc<CountingSource>) -> CatalogGateway {
        let monitor = Arc::new(CacheMonitor::new());
        let cache = Arc::new(ServiceCache::with_ttl(Duration::from_secs(60), monitor.clone()));
        let caller = Arc::new(ResilientCaller::new(
            CircuitBreakerConfig::default(),
            RetryPolicy::new(2, Duration::from_millis(10)),
            monitor,
        ));
        CatalogGateway::new(cache, caller, source)
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let source = Arc::new(CountingSource::default());
        let gateway = gateway(source.clone());

        let first = gateway.package_info("p1").await.unwrap();
        let second = gateway.package_info("p1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let stats = gateway.cache().monitor().stats();
        let package = stats.category(CacheCategory::Package);
        assert_eq!(package.hits, 1);
        assert_eq!(package.misses, 1);
        assert_eq!(package.api_calls, 1);
    }

    #[tokio::test]
    async fn test_courses_and_counts() {
        let source = Arc::new(CountingSource::default());
        let gateway = gateway(source);

        assert_eq!(gateway.courses_in_package("p1").await.len(), 2);
        assert_eq!(gateway.enrollment_count("c1").await, Some(12));
        assert_eq!(gateway.enrollment_summary().await, Some(json!({"total": 40})));
        assert!(gateway
            .cache()
            .get_slot(CacheCategory::Enrollment, CacheSlot::Aggregate)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_course_named_all_does_not_shadow_summary() {
        let source = Arc::new(CountingSource::default());
        let gateway = gateway(source.clone());

        assert_eq!(gateway.enrollment_summary().await, Some(json!({"total": 40})));
        assert_eq!(gateway.enrollment_count("all").await, Some(12));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.enrollment_summary().await, Some(json!({"total": 40})));
    }

    #[tokio::test]
    async fn test_summary_is_not_shadowed_by_course_named_all() {
        let source = Arc::new(CountingSource::default());
        let gateway = gateway(source.clone());

        assert_eq!(gateway.enrollment_count("all").await, Some(12));
        assert_eq!(gateway.enrollment_summary().await, Some(json!({"total": 40})));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.enrollment_count("all").await, Some(12));
        assert_eq!(gateway.cache().entry_counts().await[&CacheCategory::Enrollment], 2);
    }

    #[tokio::test]
    async fn test_course_update_refreshes_cached_listing() {
        let source = Arc::new(CountingSource::default());
        let gateway = gateway(source.clone());
        let hooks = InvalidationHooks::new(gateway.cache().clone());

        assert_eq!(gateway.courses_in_package("pkg-7").await.len(), 2);

        let event = DomainEvent::CourseUpdated {
            course_id: "c2".to_string(),
            package_id: None,
        };
        assert_eq!(hooks.handle(&event).await, 1);

        gateway.courses_in_package("pkg-7").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_degrade_and_are_not_cached() {
        let source = Arc::new(CountingSource {
            fail_with: Some(404),
            ..Default::default()
        });
        let gateway = gateway(source.clone());

        assert_eq!(gateway.package_info("missing").await, None);
        assert!(gateway.courses_in_package("missing").await.is_empty());

        // 404 is not retried
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        let stats = gateway.cache().monitor().stats();
        assert_eq!(stats.category(CacheCategory::Package).errors, 1);
        assert_eq!(gateway.cache().entry_counts().await[&CacheCategory::Package], 0);
    }
}
