//! Cache Invalidation Hooks
//!
//! Maps domain writes (payment approval, enrollment creation, catalog edits)
//! to the cache entries they make stale. Failures here never fail the write
//! that triggered them; at worst the entry lives until its TTL runs out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheCategory, CacheSlot, ServiceCache};

/// Domain writes that change cached truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    PaymentApproved { course_ids: Vec<String> },
    EnrollmentCreated { course_id: String },
    CourseUpdated {
        course_id: String,
        #[serde(default)]
        package_id: Option<String>,
    },
    PackageUpdated { package_id: String },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::PaymentApproved { .. } => "payment_approved",
            DomainEvent::EnrollmentCreated { .. } => "enrollment_created",
            DomainEvent::CourseUpdated { .. } => "course_updated",
            DomainEvent::PackageUpdated { .. } => "package_updated",
        }
    }
}

/// Entry points called after domain writes.
#[derive(Debug, Clone)]
pub struct InvalidationHooks {
    cache: Arc<ServiceCache>,
}

impl InvalidationHooks {
    pub fn new(cache: Arc<ServiceCache>) -> Self {
        Self { cache }
    }

    /// Deletes one entry. Invalidating an absent key is a no-op.
    pub async fn invalidate(&self, category: CacheCategory, id: &str) -> bool {
        self.cache.invalidate(category, id).await
    }

    /// Pattern mode: deletes every entry whose key contains `pattern`.
    pub async fn invalidate_matching(&self, category: CacheCategory, pattern: &str) -> usize {
        self.cache.invalidate_matching(category, pattern).await
    }

    // == Handle ==
    /// Applies the invalidations for `event`. Returns the number of entries removed.
    pub async fn handle(&self, event: &DomainEvent) -> usize {
        let removed = match event {
            DomainEvent::PaymentApproved { course_ids } => {
                let mut removed = 0;
                for course_id in course_ids {
                    removed += self.invalidate_count(CacheCategory::Enrollment, course_id).await;
                }
                removed + self.invalidate_summary().await
            }
            DomainEvent::EnrollmentCreated { course_id } => {
                self.invalidate_count(CacheCategory::Enrollment, course_id).await
                    + self.invalidate_summary().await
            }
            DomainEvent::CourseUpdated {
                course_id,
                package_id,
            } => {
                // Course lists are keyed by package, so find the ones listing this course
                let mut removed = self
                    .cache
                    .invalidate_where(CacheCategory::Courses, |courses| {
                        lists_course(courses, course_id)
                    })
                    .await;
                if let Some(package_id) = package_id {
                    removed += self.invalidate_count(CacheCategory::Package, package_id).await;
                    removed += self.invalidate_count(CacheCategory::Courses, package_id).await;
                }
                removed
            }
            DomainEvent::PackageUpdated { package_id } => {
                self.invalidate_count(CacheCategory::Package, package_id).await
                    + self.invalidate_count(CacheCategory::Courses, package_id).await
            }
        };

        info!(event = event.name(), removed, "Cache invalidated after domain write");
        removed
    }

    // == Dispatch ==
    /// Fire-and-forget variant for write paths that must not wait on the cache.
    pub fn dispatch(&self, event: DomainEvent) -> JoinHandle<()> {
        let hooks = self.clone();
        tokio::spawn(async move {
            let inner = tokio::spawn({
                let hooks = hooks.clone();
                let event = event.clone();
                async move { hooks.handle(&event).await }
            });
            if let Err(e) = inner.await {
                warn!(
                    event = event.name(),
                    error = %e,
                    "Cache invalidation failed, entries will expire by TTL"
                );
            }
        })
    }

    async fn invalidate_count(&self, category: CacheCategory, id: &str) -> usize {
        let removed = self.invalidate(category, id).await;
        if !removed {
            debug!(category = %category, id, "Nothing cached to invalidate");
        }
        usize::from(removed)
    }

    async fn invalidate_summary(&self) -> usize {
        let removed = self
            .cache
            .invalidate_slot(CacheCategory::Enrollment, CacheSlot::Aggregate)
            .await;
        usize::from(removed)
    }
}

/// Whether a cached course list contains `course_id`. Numeric ids match
/// their decimal form.
fn lists_course(courses: &Value, course_id: &str) -> bool {
    let Some(courses) = courses.as_array() else {
        return false;
    };
    courses.iter().any(|course| match course.get("id") {
        Some(Value::String(id)) => id == course_id,
        Some(Value::Number(id)) => id.to_string() == course_id,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheMonitor;
    use serde_json::json;
    use std::time::Duration;

    fn hooks() -> (InvalidationHooks, Arc<ServiceCache>) {
        let cache = Arc::new(ServiceCache::with_ttl(
            Duration::from_secs(60),
            Arc::new(CacheMonitor::new()),
        ));
        (InvalidationHooks::new(cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_payment_approved_drops_counts_and_aggregate() {
        let (hooks, cache) = hooks();
        cache.set(CacheCategory::Enrollment, "c1", json!(10)).await;
        cache.set(CacheCategory::Enrollment, "c2", json!(4)).await;
        cache.set(CacheCategory::Enrollment, "c3", json!(1)).await;
        cache
            .set_slot(
                CacheCategory::Enrollment,
                CacheSlot::Aggregate,
                json!({"total": 15}),
                None,
            )
            .await;

        let event = DomainEvent::PaymentApproved {
            course_ids: vec!["c1".to_string(), "c2".to_string()],
        };
        assert_eq!(hooks.handle(&event).await, 3);

        assert!(cache.get(CacheCategory::Enrollment, "c3").await.is_some());
        assert!(cache
            .get_slot(CacheCategory::Enrollment, CacheSlot::Aggregate)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_invalidating_absent_keys_is_noop() {
        let (hooks, _cache) = hooks();

        let event = DomainEvent::EnrollmentCreated {
            course_id: "missing".to_string(),
        };
        assert_eq!(hooks.handle(&event).await, 0);
        assert!(!hooks.invalidate(CacheCategory::Package, "missing").await);
    }

    #[tokio::test]
    async fn test_course_updated_without_package_drops_lists_containing_it() {
        let (hooks, cache) = hooks();
        cache
            .set(
                CacheCategory::Courses,
                "pkg-7",
                json!([{"id": "course-9", "title": "old"}]),
            )
            .await;
        cache
            .set(CacheCategory::Courses, "pkg-8", json!([{"id": "course-1"}]))
            .await;
        cache.set(CacheCategory::Package, "pkg-7", json!({})).await;

        let event = DomainEvent::CourseUpdated {
            course_id: "course-9".to_string(),
            package_id: None,
        };
        assert_eq!(hooks.handle(&event).await, 1);

        assert!(cache.get(CacheCategory::Courses, "pkg-7").await.is_none());
        assert!(cache.get(CacheCategory::Courses, "pkg-8").await.is_some());
        assert!(cache.get(CacheCategory::Package, "pkg-7").await.is_some());
    }

    #[tokio::test]
    async fn test_course_updated_with_package_drops_package_too() {
        let (hooks, cache) = hooks();
        cache
            .set(CacheCategory::Courses, "pkg-1", json!([{"id": 9}, {"id": 10}]))
            .await;
        cache.set(CacheCategory::Courses, "pkg-7", json!([])).await;
        cache.set(CacheCategory::Package, "pkg-7", json!({})).await;

        let event = DomainEvent::CourseUpdated {
            course_id: "9".to_string(),
            package_id: Some("pkg-7".to_string()),
        };
        assert_eq!(hooks.handle(&event).await, 3);
        assert_eq!(cache.entry_counts().await[&CacheCategory::Courses], 0);
    }

    #[test]
    fn test_lists_course() {
        assert!(lists_course(&json!([{"id": "a"}, {"id": "b"}]), "b"));
        assert!(lists_course(&json!([{"id": 42}]), "42"));
        assert!(!lists_course(&json!([{"id": "ab"}]), "a"));
        assert!(!lists_course(&json!({"id": "a"}), "a"));
        assert!(!lists_course(&json!([]), "a"));
    }

    #[tokio::test]
    async fn test_dispatch_runs_in_background() {
        let (hooks, cache) = hooks();
        cache.set(CacheCategory::Package, "p1", json!({})).await;
        cache.set(CacheCategory::Courses, "p1", json!([])).await;

        hooks
            .dispatch(DomainEvent::PackageUpdated {
                package_id: "p1".to_string(),
            })
            .await
            .unwrap();

        let counts = cache.entry_counts().await;
        assert_eq!(counts[&CacheCategory::Package], 0);
        assert_eq!(counts[&CacheCategory::Courses], 0);
    }

    #[test]
    fn test_event_json_shape() {
        let event: DomainEvent = serde_json::from_str(
            r#"{"type":"payment_approved","course_ids":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            DomainEvent::PaymentApproved {
                course_ids: vec!["a".to_string(), "b".to_string()]
            }
        );

        let event: DomainEvent =
            serde_json::from_str(r#"{"type":"course_updated","course_id":"c"}"#).unwrap();
        assert_eq!(
            event,
            DomainEvent::CourseUpdated {
                course_id: "c".to_string(),
                package_id: None
            }
        );
    }
}
