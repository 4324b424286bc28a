//! Adaptive TTL Task
//!
//! Samples the request counter at a fixed interval and switches every
//! category between its base TTL and the widened high-load TTL.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{AdaptiveTtlPolicy, ServiceCache, TtlProfile};

pub fn spawn_adaptive_ttl_task(
    cache: Arc<ServiceCache>,
    policy: AdaptiveTtlPolicy,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            threshold_rpm = policy.high_load_requests_per_minute,
            "Starting adaptive TTL task"
        );

        let mut profile = TtlProfile::Normal;
        let mut last_total = cache.monitor().total_requests();
        let mut last_sample = Instant::now();

        loop {
            tokio::time::sleep(interval).await;

            // A stats reset between samples makes the total go backwards
            let total = cache.monitor().total_requests();
            let requests = total.saturating_sub(last_total);
            let elapsed = last_sample.elapsed();
            last_total = total;
            last_sample = Instant::now();

            let next = policy.evaluate(requests, elapsed);
            if next != profile {
                cache.apply_ttl_profile(&policy, next).await;
                info!(?next, requests, "Adaptive TTL profile changed");
                profile = next;
            } else {
                debug!(?profile, requests, "Adaptive TTL profile unchanged");
            }
        }
    })
}
