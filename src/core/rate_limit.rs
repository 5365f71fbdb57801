//! Request pacing.

use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Enforces a minimum spacing between outbound requests.
///
/// Single-instance, single-process scope: the pipeline issues at most one
/// request at a time, so a plain `&mut self` timestamp is all the
/// synchronization needed.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: None,
        }
    }

    /// Sleep until at least `delay` has elapsed since the previous call's
    /// completion. The first call never waits.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                let pause = self.delay - elapsed;
                tracing::trace!(?pause, "rate limit");
                sleep(pause).await;
            }
        }
        self.last_call = Some(Instant::now());
    }

    pub fn reset(&mut self) {
        self.last_call = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_does_not_wait() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_at_least_delay_apart() {
        let delay = Duration::from_millis(1500);
        let mut limiter = RateLimiter::new(delay);

        let mut returns = Vec::new();
        for _ in 0..4 {
            limiter.wait().await;
            returns.push(Instant::now());
        }

        for pair in returns.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_counts_toward_the_delay() {
        let mut limiter = RateLimiter::new(Duration::from_secs(2));
        limiter.wait().await;

        // Caller spends longer than the delay between requests; the next
        // wait must not add anything.
        sleep(Duration::from_secs(3)).await;
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_disables_pacing() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_forgets_the_last_call() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        limiter.wait().await;
        limiter.reset();

        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
