//! Pacing between repositories.
//!
//! The collector calls [`Throttle::wait`] after every repository that produced matching pull
//! requests. Swapping the implementation changes the rate-limit policy without touching the
//! collection loop.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Throttle: Send + Sync {
    async fn wait(&self);
}

/// Sleeps for a fixed interval on every call.
#[derive(Clone, Debug)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl Throttle for FixedInterval {
    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        tracing::debug!(seconds = self.interval.as_secs(), "Pacing before next repository");
        tokio::time::sleep(self.interval).await;
    }
}

/// Never waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unthrottled;

#[async_trait]
impl Throttle for Unthrottled {
    async fn wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_interval_sleeps() {
        let throttle = FixedInterval::new(Duration::from_secs(30));
        let start = Instant::now();

        throttle.wait().await;

        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_zero_interval_returns_immediately() {
        let throttle = FixedInterval::new(Duration::ZERO);
        let start = std::time::Instant::now();

        throttle.wait().await;

        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
