//! Bounded-parallelism limiter for discovery probes
//!
//! Caps the number of probe sockets open at once so a full /24 sweep does
//! not open hundreds of simultaneous connections. Built on
//! `tokio::sync::Semaphore`, which queues waiters in FIFO order, so
//! permits go to the oldest waiter first. Permits are RAII guards: a
//! caller cancelled while waiting holds nothing, and a dropped permit
//! always releases.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// FIFO-fair permit pool with in-flight instrumentation
pub struct ProbeLimiter {
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// A held permit; dropping it releases the slot
pub struct ProbePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for ProbePermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ProbeLimiter {
    /// Create a limiter with `max_parallel` permits
    pub fn new(max_parallel: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_parallel)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Wait until a permit is available.
    ///
    /// Suspends the caller without blocking; waiters are served in FIFO
    /// order.
    pub async fn acquire(&self) -> ProbePermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");

        let current = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(current, Ordering::SeqCst);

        ProbePermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        }
    }

    /// Number of permits currently held
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at once
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Number of free permits
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_peak_never_exceeds_bound() {
        let limiter = Arc::new(ProbeLimiter::new(10));
        let mut handles = Vec::new();

        for _ in 0..200 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await;
                tokio::time::sleep(Duration::from_millis(2)).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(limiter.peak_in_flight() <= 10);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 10);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_holds_nothing() {
        let limiter = Arc::new(ProbeLimiter::new(1));
        let held = limiter.acquire().await;

        // A waiter that gets aborted must not consume the permit
        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                let _permit = limiter.acquire().await;
            })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        let _ = waiter.await;

        drop(held);

        // The permit must be acquirable again
        let reacquired = tokio::time::timeout(Duration::from_secs(1), limiter.acquire()).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let limiter = ProbeLimiter::new(2);
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(limiter.available(), 0);

        drop(a);
        drop(b);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 2);
        assert_eq!(limiter.peak_in_flight(), 2);
    }
}
