//! Request budget and retry policy
//!
//! The limiter is shared by every worker of a crawl. Spending the last request
//! of the budget puts the whole crawl to sleep: the worker that hits zero holds
//! the limiter lock for the full pause, so nobody else gets a request through
//! until the budget has been refilled.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Upper bound on the size of a worker pool
pub const MAX_WORKERS: usize = 10;

/// Outcome of asking the limiter for a request slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may be sent
    Allowed,
    /// The crawl is pausing; wait and ask again
    Paused,
}

#[derive(Debug)]
struct LimiterState {
    remaining: u32,
}

/// Tracks the request budget and the retry budget of a crawl
#[derive(Debug)]
pub struct RateLimiter {
    budget: u32,
    pause: Duration,
    max_retries: u32,
    state: Mutex<LimiterState>,
    paused: AtomicBool,
    retries_remaining: AtomicU32,
}

impl RateLimiter {
    /// Creates a limiter
    ///
    /// # Arguments
    ///
    /// * `budget` - Requests allowed before pausing (a zero budget is treated as 1)
    /// * `pause` - How long to pause once the budget is spent
    /// * `max_retries` - Error responses tolerated before a request goes stale
    pub fn new(budget: u32, pause: Duration, max_retries: u32) -> Self {
        let budget = budget.max(1);
        Self {
            budget,
            pause,
            max_retries,
            state: Mutex::new(LimiterState { remaining: budget }),
            paused: AtomicBool::new(false),
            retries_remaining: AtomicU32::new(max_retries),
        }
    }

    /// Asks for permission to send one request
    ///
    /// Returns `Paused` without waiting if a pause is in progress. Otherwise the
    /// budget is decremented; when that spends the last request this call
    /// sleeps for the pause duration, refills the budget and then returns
    /// `Allowed`.
    pub async fn try_consume(&self) -> Admission {
        if self.paused.load(Ordering::SeqCst) {
            return Admission::Paused;
        }

        let mut state = self.state.lock().await;
        state.remaining = state.remaining.saturating_sub(1);

        if state.remaining == 0 {
            self.paused.store(true, Ordering::SeqCst);
            info!(
                "Request budget of {} spent, pausing for {:?}",
                self.budget, self.pause
            );

            tokio::time::sleep(self.pause).await;

            state.remaining = self.budget;
            self.paused.store(false, Ordering::SeqCst);
            info!("Request budget refilled");
        }

        Admission::Allowed
    }

    /// Waits until a request slot is granted
    pub async fn acquire(&self) {
        while self.try_consume().await == Admission::Paused {
            debug!("Requests paused, waiting");
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Registers an error response
    pub fn on_error_response(&self) {
        // Saturating decrement; never wraps below zero
        let _ = self
            .retries_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Returns true while retries are left
    pub fn can_retry(&self) -> bool {
        self.retries_remaining.load(Ordering::SeqCst) > 0
    }

    /// Restores the retry budget after a request has been abandoned
    pub fn reset_retries(&self) {
        self.retries_remaining
            .store(self.max_retries, Ordering::SeqCst);
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining.load(Ordering::SeqCst)
    }

    /// Requests left in the current window
    pub async fn remaining(&self) -> u32 {
        self.state.lock().await.remaining
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn pause_duration(&self) -> Duration {
        self.pause
    }

    /// Backoff taken before retrying a rate-limited or failing request
    pub fn backoff_duration(&self) -> Duration {
        self.pause * 2
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Picks a worker pool size for a batch of items
    ///
    /// Long pauses relative to the budget call for fewer workers. The result
    /// grows with the logarithm of the item count and is clamped to
    /// `1..=MAX_WORKERS`.
    pub fn suitable_worker_count(&self, item_count: usize) -> usize {
        if item_count == 0 {
            return 1;
        }

        let pause_secs = self.pause.as_secs();
        let per_pause = (self.budget as u64 / pause_secs.max(1)).max(1);
        let factor = pause_secs / per_pause;
        let product = item_count as u64 * factor;

        if product == 0 {
            return 1;
        }

        ((product as f64).log10().floor() as usize).clamp(1, MAX_WORKERS)
    }

    fn poll_interval(&self) -> Duration {
        (self.pause / 10).clamp(Duration::from_millis(10), Duration::from_secs(1))
    }
}
