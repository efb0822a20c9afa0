use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

/// Sliding-window rate limiter, one window of request instants per client.
///
/// Exact counting over a `VecDeque`: instants older than the window are
/// pruned lazily on each check, so the limiter never under- or over-counts
/// within the window. O(window capacity) per check, which is fine for the
/// small fixed capacities this serves. State is in-memory only; a restart
/// briefly relaxes the limit, never tightens it.
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    clients: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(capacity: usize, window_secs: u64) -> Self {
        Self {
            capacity,
            window: Duration::seconds(window_secs as i64),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn lock_clients(&self) -> MutexGuard<'_, HashMap<String, VecDeque<DateTime<Utc>>>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admission check: prune, deny at capacity, otherwise record and admit.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Utc::now())
    }

    pub fn check_at(&self, client: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut clients = self.lock_clients();
        let instants = clients.entry(client.to_string()).or_default();

        while let Some(front) = instants.front() {
            if *front <= cutoff {
                instants.pop_front();
            } else {
                break;
            }
        }

        if instants.len() >= self.capacity {
            return false;
        }
        instants.push_back(now);
        true
    }

    /// Drops clients whose windows have fully expired. Returns the number of
    /// client entries removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let mut clients = self.lock_clients();
        let before = clients.len();
        clients.retain(|_, instants| instants.back().is_some_and(|last| *last > cutoff));
        before - clients.len()
    }

    pub fn clear(&self) {
        self.lock_clients().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn admits_up_to_capacity_then_denies() {
        let limiter = RateLimiter::new(20, 60);
        for i in 0..20 {
            assert!(
                limiter.check_at("10.0.0.1", t0() + Duration::seconds(i)),
                "request {} within capacity must be admitted",
                i + 1
            );
        }
        assert!(
            !limiter.check_at("10.0.0.1", t0() + Duration::seconds(20)),
            "21st request within the window must be denied"
        );
    }

    #[test]
    fn admits_again_after_window_elapses() {
        let limiter = RateLimiter::new(20, 60);
        for _ in 0..20 {
            assert!(limiter.check_at("10.0.0.1", t0()));
        }
        assert!(!limiter.check_at("10.0.0.1", t0() + Duration::seconds(30)));
        assert!(limiter.check_at("10.0.0.1", t0() + Duration::seconds(61)));
    }

    #[test]
    fn clients_are_tracked_independently() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.check_at("10.0.0.1", t0()));
        assert!(!limiter.check_at("10.0.0.1", t0()));
        assert!(limiter.check_at("10.0.0.2", t0()));
    }

    #[test]
    fn denied_request_is_not_recorded() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check_at("c", t0()));
        assert!(limiter.check_at("c", t0() + Duration::seconds(50)));
        assert!(!limiter.check_at("c", t0() + Duration::seconds(55)));
        // First instant expires at t0+60; the denied attempt must not have
        // taken its place.
        assert!(limiter.check_at("c", t0() + Duration::seconds(61)));
    }

    #[test]
    fn sweep_drops_fully_expired_clients() {
        let limiter = RateLimiter::new(20, 60);
        limiter.check_at("old", t0());
        limiter.check_at("fresh", t0() + Duration::seconds(90));

        let removed = limiter.sweep(t0() + Duration::seconds(120));
        assert_eq!(removed, 1);
        // The swept client starts from an empty window again.
        assert!(limiter.check_at("old", t0() + Duration::seconds(121)));
    }
}
