//! Per-client request rate limiting for the IPC surface

use std::collections::HashMap;
use std::time::Duration;

use crate::{ClientId, MonotonicInstant};

/// Token-bucket rate limiter keyed by IPC client.
///
/// Time is passed in by the caller so the limiter follows the same
/// monotonic clock as the rest of the service.
#[derive(Debug)]
pub struct RateLimiter {
    max_tokens: u32,
    refill_interval: Duration,
    clients: HashMap<ClientId, ClientBucket>,
}

#[derive(Debug)]
struct ClientBucket {
    tokens: u32,
    last_refill: MonotonicInstant,
}

impl RateLimiter {
    /// Allow `max_requests` per `interval` for each client
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_tokens: max_requests.max(1),
            refill_interval: interval,
            clients: HashMap::new(),
        }
    }

    /// Consume a token for `client_id` at `now`.
    ///
    /// Returns `true` if the request is allowed.
    pub fn check(&mut self, client_id: &ClientId, now: MonotonicInstant) -> bool {
        let max_tokens = self.max_tokens;
        let bucket = self
            .clients
            .entry(client_id.clone())
            .or_insert(ClientBucket {
                tokens: max_tokens,
                last_refill: now,
            });

        let elapsed = now.duration_since(bucket.last_refill);
        if !self.refill_interval.is_zero() && elapsed >= self.refill_interval {
            let intervals = elapsed
                .as_nanos()
                .checked_div(self.refill_interval.as_nanos())
                .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX));
            bucket.tokens = bucket
                .tokens
                .saturating_add(intervals.saturating_mul(max_tokens))
                .min(max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Forget a disconnected client
    pub fn remove_client(&mut self, client_id: &ClientId) {
        self.clients.remove(client_id);
    }

    /// Number of clients with live buckets
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_within_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        let client = ClientId::new();
        let now = MonotonicInstant::now();

        for _ in 0..5 {
            assert!(limiter.check(&client, now));
        }
        assert!(!limiter.check(&client, now));
    }

    #[test]
    fn test_refills_after_interval() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        let client = ClientId::new();
        let now = MonotonicInstant::now();

        assert!(limiter.check(&client, now));
        assert!(limiter.check(&client, now));
        assert!(!limiter.check(&client, now));

        let later = now + Duration::from_millis(1500);
        assert!(limiter.check(&client, later));
        assert!(limiter.check(&client, later));
        assert!(!limiter.check(&client, later));
    }

    #[test]
    fn test_sub_millisecond_interval_refills() {
        let mut limiter = RateLimiter::new(1, Duration::from_nanos(100));
        let client = ClientId::new();
        let now = MonotonicInstant::now();

        assert!(limiter.check(&client, now));
        assert!(!limiter.check(&client, now));

        // More intervals than fit in a u32
        let later = now + Duration::from_secs(3600);
        assert!(limiter.check(&client, later));
        assert!(!limiter.check(&client, later));
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1));
        let client1 = ClientId::new();
        let client2 = ClientId::new();
        let now = MonotonicInstant::now();

        assert!(limiter.check(&client1, now));
        assert!(!limiter.check(&client1, now));
        assert!(limiter.check(&client2, now));
    }

    #[test]
    fn test_forgets_removed_clients() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let client = ClientId::new();
        let now = MonotonicInstant::now();

        assert!(limiter.check(&client, now));
        assert!(!limiter.check(&client, now));
        assert_eq!(limiter.tracked_clients(), 1);

        limiter.remove_client(&client);
        assert_eq!(limiter.tracked_clients(), 0);
        assert!(limiter.check(&client, now));
    }
}
