//! Per-domain rate limiter.
//!
//! Token bucket keyed by domain. Workers processing different targets on the
//! same aggregator must not hammer it: each domain gets a burst allowance
//! that refills at a fixed interval. Acquisition is async and fair enough
//! for this workload (waiters poll with a short sleep rather than queueing).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket per domain: `burst` tokens, one token back every `refill`.
pub struct DomainLimiter {
    burst: u32,
    refill: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl DomainLimiter {
    pub fn new(burst: u32, refill_ms: u64) -> Self {
        Self {
            burst: burst.max(1),
            refill: Duration::from_millis(refill_ms.max(1)),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for the domain, waiting until one is available.
    pub async fn acquire(&self, domain: &str) {
        loop {
            if self.try_acquire(domain) {
                return;
            }
            tokio::time::sleep(self.refill / 4).await;
        }
    }

    /// Non-blocking variant. Refills lazily on access.
    pub fn try_acquire(&self, domain: &str) -> bool {
        let mut buckets = self.buckets.lock().expect("limiter mutex poisoned");
        let now = Instant::now();
        let bucket = buckets.entry(domain.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refills = (elapsed.as_millis() / self.refill.as_millis()) as u32;
        if refills > 0 {
            bucket.tokens = (bucket.tokens + refills).min(self.burst);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_empty() {
        let limiter = DomainLimiter::new(2, 60_000);
        assert!(limiter.try_acquire("a.com"));
        assert!(limiter.try_acquire("a.com"));
        assert!(!limiter.try_acquire("a.com"));
    }

    #[test]
    fn test_domains_are_independent() {
        let limiter = DomainLimiter::new(1, 60_000);
        assert!(limiter.try_acquire("a.com"));
        assert!(!limiter.try_acquire("a.com"));
        assert!(limiter.try_acquire("b.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_refill_over_time() {
        let limiter = DomainLimiter::new(1, 100);
        assert!(limiter.try_acquire("a.com"));
        assert!(!limiter.try_acquire("a.com"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(limiter.try_acquire("a.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = DomainLimiter::new(1, 50);
        limiter.acquire("a.com").await;
        let start = Instant::now();
        limiter.acquire("a.com").await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
