use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::debug;
use tokio::{sync::Mutex, time::sleep};

/// Per-host politeness gate shared by all fetch workers.
///
/// Each host gets one slot timeline: `acquire` reserves the next slot under
/// the lock, then sleeps outside it, so concurrent workers never issue
/// requests closer together than `min_delay` no matter how many jobs are
/// queued.  A rate-limit response pushes the whole timeline of that host
/// forward via [`RateLimiter::cooldown`] without affecting other hosts.
pub struct RateLimiter {
    min_delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `host` is allowed to go out.
    pub async fn acquire(&self, host: &str) {
        let wait = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.entry(host.to_owned()).or_insert(now);
            let ready = (*slot).max(now);
            *slot = ready + self.min_delay;
            ready.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            debug!("Waiting {wait:?} before next request to {host}");
            sleep(wait).await;
        }
    }

    /// Suspends requests to `host` for at least `duration` from now.
    pub async fn cooldown(&self, host: &str, duration: Duration) {
        let mut slots = self.next_slot.lock().await;
        let until = Instant::now() + duration;
        let slot = slots.entry(host.to_owned()).or_insert(until);
        *slot = (*slot).max(until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consecutive_acquires_are_spaced_by_min_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(80));
        let start = Instant::now();
        limiter.acquire("example.com").await;
        limiter.acquire("example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn cooldown_applies_only_to_the_affected_host() {
        let limiter = RateLimiter::new(Duration::ZERO);
        limiter
            .cooldown("slow.example.com", Duration::from_millis(120))
            .await;

        let start = Instant::now();
        limiter.acquire("other.example.com").await;
        assert!(start.elapsed() < Duration::from_millis(60));

        let start = Instant::now();
        limiter.acquire("slow.example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn cooldown_never_shortens_an_existing_suspension() {
        let limiter = RateLimiter::new(Duration::ZERO);
        limiter.cooldown("h", Duration::from_millis(100)).await;
        limiter.cooldown("h", Duration::from_millis(10)).await;
        let start = Instant::now();
        limiter.acquire("h").await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
