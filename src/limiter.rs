//! Process-wide request throttle shared by every session.
//!
//! Callers queue on a fair async mutex guarding the next free slot. The
//! holder sleeps until its slot, books the following one and releases the
//! lock, so grants are spaced by at least `min_interval` and served in
//! arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Two requests per second.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Permission to issue one request, granted at `granted_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateToken {
    pub granted_at: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Limiter with no spacing.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }


    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until this caller may issue a request.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// schedule untouched.
    pub async fn acquire(&self) -> RateToken {
        let mut next_slot = self.next_slot.lock().await;

        let now = Instant::now();
        let granted_at = match *next_slot {
            Some(slot) if slot > now => {
                sleep_until(slot).await;
                slot
            }
            _ => now,
        };

        *next_slot = Some(granted_at + self.min_interval);
        RateToken { granted_at }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let before = Instant::now();
        let token = limiter.acquire().await;
        assert_eq!(token.granted_at, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_grants_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        let c = limiter.acquire().await;
        assert!(b.granted_at - a.granted_at >= Duration::from_millis(500));
        assert!(c.granted_at - b.granted_at >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_does_not_accumulate_credit() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        assert!(b.granted_at - a.granted_at >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_all_served_and_spaced() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(250)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap().granted_at);
        }
        grants.sort();

        assert_eq!(grants.len(), 8);
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_served_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(100)));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                order.lock().unwrap().push(i);
            }));
            // Let each task reach the mutex queue before spawning the next.
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let start = std::time::Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_default_is_two_per_second() {
        assert_eq!(RateLimiter::default().min_interval(), Duration::from_millis(500));
        assert_eq!(RateLimiter::unlimited().min_interval(), Duration::ZERO);
    }
}
