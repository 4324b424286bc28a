//! Configuration Module
//!
//! Loads the cache, circuit breaker, retry and remote-service settings from
//! environment variables once at startup. Nothing here is hot-reloadable.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{AdaptiveTtlPolicy, CacheCategory, EvictionPolicy};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

/// Per-category cache settings.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    /// Base TTL for entries of this category
    pub ttl: Duration,
    /// Maximum number of keys, None = unbounded
    pub max_keys: Option<usize>,
}

/// Cache settings for all categories.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub package: CategoryConfig,
    pub courses: CategoryConfig,
    pub enrollment: CategoryConfig,
    /// Policy applied when a category reaches `max_keys`
    pub eviction_policy: EvictionPolicy,
}

impl CacheConfig {
    /// Returns the settings for one category.
    pub fn category(&self, category: CacheCategory) -> &CategoryConfig {
        match category {
            CacheCategory::Package => &self.package,
            CacheCategory::Courses => &self.courses,
            CacheCategory::Enrollment => &self.enrollment,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            package: CategoryConfig {
                ttl: Duration::from_secs(600),
                max_keys: Some(1000),
            },
            courses: CategoryConfig {
                ttl: Duration::from_secs(600),
                max_keys: Some(1000),
            },
            enrollment: CategoryConfig {
                ttl: Duration::from_secs(120),
                max_keys: Some(5000),
            },
            eviction_policy: EvictionPolicy::EvictOldest,
        }
    }
}

/// Settings for outbound calls to sibling services.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Name this process signs its service tokens with
    pub service_name: String,
    /// Shared HMAC secret for service tokens
    pub jwt_secret: String,
    pub course_service_url: String,
    pub package_service_url: String,
    /// Timeout applied to every single HTTP call
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            service_name: "payment-service".to_string(),
            jwt_secret: String::new(),
            course_service_url: "http://localhost:3002".to_string(),
            package_service_url: "http://localhost:3003".to_string(),
            request_timeout: Duration::from_millis(5000),
        }
    }
}

/// Adaptive TTL evaluation settings.
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    /// Seconds between two evaluations
    pub interval: u64,
    pub policy: AdaptiveTtlPolicy,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 60,
            policy: AdaptiveTtlPolicy::default(),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port for the operational surface
    pub server_port: u16,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval: u64,
    pub cache: CacheConfig,
    pub circuit: CircuitBreakerConfig,
    pub retry: RetryPolicy,
    pub remote: RemoteConfig,
    pub adaptive: AdaptiveConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 4010)
    /// - `CACHE_CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `PACKAGE_CACHE_TTL` / `COURSES_CACHE_TTL` / `ENROLLMENT_CACHE_TTL` - TTLs in
    ///   seconds (default: 600 / 600 / 120)
    /// - `PACKAGE_CACHE_MAX_KEYS` / `COURSES_CACHE_MAX_KEYS` / `ENROLLMENT_CACHE_MAX_KEYS` -
    ///   capacity per category, 0 = unbounded (default: 1000 / 1000 / 5000)
    /// - `CACHE_EVICTION_POLICY` - `evict-oldest` or `reject-new` (default: evict-oldest)
    /// - `CIRCUIT_FAILURE_THRESHOLD` (default: 3)
    /// - `CIRCUIT_RESET_TIMEOUT_MS` (default: 30000)
    /// - `CIRCUIT_HALF_OPEN_SUCCESS_THRESHOLD` (default: 2)
    /// - `RETRY_MAX_ATTEMPTS` (default: 3)
    /// - `RETRY_INITIAL_DELAY_MS` (default: 1000)
    /// - `RETRY_NETWORK_MULTIPLIER` (default: 2.0)
    /// - `SERVICE_NAME` (default: payment-service)
    /// - `SERVICE_JWT_SECRET` (default: empty)
    /// - `COURSE_SERVICE_URL` / `PACKAGE_SERVICE_URL`
    /// - `REMOTE_TIMEOUT_MS` (default: 5000)
    /// - `ADAPTIVE_TTL_ENABLED` (default: false)
    /// - `ADAPTIVE_TTL_INTERVAL` (default: 60)
    /// - `ADAPTIVE_TTL_HIGH_LOAD_RPM` (default: 600)
    /// - `ADAPTIVE_TTL_MULTIPLIER` (default: 2.0)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache = CacheConfig {
            package: category_from_env("PACKAGE", &defaults.cache.package),
            courses: category_from_env("COURSES", &defaults.cache.courses),
            enrollment: category_from_env("ENROLLMENT", &defaults.cache.enrollment),
            eviction_policy: env_or("CACHE_EVICTION_POLICY", defaults.cache.eviction_policy),
        };

        let circuit = CircuitBreakerConfig {
            failure_threshold: env_or(
                "CIRCUIT_FAILURE_THRESHOLD",
                defaults.circuit.failure_threshold,
            ),
            reset_timeout: Duration::from_millis(env_or(
                "CIRCUIT_RESET_TIMEOUT_MS",
                defaults.circuit.reset_timeout.as_millis() as u64,
            )),
            half_open_success_threshold: env_or(
                "CIRCUIT_HALF_OPEN_SUCCESS_THRESHOLD",
                defaults.circuit.half_open_success_threshold,
            ),
        };

        let retry = RetryPolicy {
            max_attempts: env_or("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts),
            initial_delay: Duration::from_millis(env_or(
                "RETRY_INITIAL_DELAY_MS",
                defaults.retry.initial_delay.as_millis() as u64,
            )),
            network_multiplier: env_or(
                "RETRY_NETWORK_MULTIPLIER",
                defaults.retry.network_multiplier,
            ),
        };

        let remote = RemoteConfig {
            service_name: env_or("SERVICE_NAME", defaults.remote.service_name),
            jwt_secret: env_or("SERVICE_JWT_SECRET", defaults.remote.jwt_secret),
            course_service_url: env_or("COURSE_SERVICE_URL", defaults.remote.course_service_url),
            package_service_url: env_or(
                "PACKAGE_SERVICE_URL",
                defaults.remote.package_service_url,
            ),
            request_timeout: Duration::from_millis(env_or(
                "REMOTE_TIMEOUT_MS",
                defaults.remote.request_timeout.as_millis() as u64,
            )),
        };

        let adaptive = AdaptiveConfig {
            enabled: env_or("ADAPTIVE_TTL_ENABLED", defaults.adaptive.enabled),
            interval: env_or("ADAPTIVE_TTL_INTERVAL", defaults.adaptive.interval),
            policy: AdaptiveTtlPolicy {
                high_load_requests_per_minute: env_or(
                    "ADAPTIVE_TTL_HIGH_LOAD_RPM",
                    defaults.adaptive.policy.high_load_requests_per_minute,
                ),
                high_load_multiplier: env_or(
                    "ADAPTIVE_TTL_MULTIPLIER",
                    defaults.adaptive.policy.high_load_multiplier,
                ),
            },
        };

        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CACHE_CLEANUP_INTERVAL", defaults.cleanup_interval),
            cache,
            circuit,
            retry,
            remote,
            adaptive,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 4010,
            cleanup_interval: 60,
            cache: CacheConfig::default(),
            circuit: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
            remote: RemoteConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

/// Reads and parses an env var, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn category_from_env(prefix: &str, defaults: &CategoryConfig) -> CategoryConfig {
    let ttl = env_or(&format!("{prefix}_CACHE_TTL"), defaults.ttl.as_secs());
    let max_keys = env_or(
        &format!("{prefix}_CACHE_MAX_KEYS"),
        defaults.max_keys.unwrap_or(0),
    );

    CategoryConfig {
        ttl: Duration::from_secs(ttl),
        max_keys: (max_keys > 0).then_some(max_keys),
    }
}
