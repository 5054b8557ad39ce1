//! Politeness delays
//!
//! Each worker pauses on its own; there is no shared clock or lock, so one
//! sleeping worker never holds up another.

use crate::config::DelayRange;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PolitenessGovernor {
    interval: DelayRange,
}

impl PolitenessGovernor {
    pub fn new(interval: DelayRange) -> Self {
        Self { interval }
    }

    /// Suspends the calling worker for a random duration within the interval
    pub async fn pause(&self) -> Duration {
        sleep_within(self.interval).await
    }
}

/// Sleeps for a duration drawn from `range` and returns it
pub(crate) async fn sleep_within(range: DelayRange) -> Duration {
    let delay = range.sample();
    if !delay.is_zero() {
        tracing::trace!("Sleeping {:?}", delay);
        tokio::time::sleep(delay).await;
    }
    delay
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_pause_stays_within_interval() {
        let governor = PolitenessGovernor::new(DelayRange::new(5, 15));
        for _ in 0..5 {
            let start = Instant::now();
            let slept = governor.pause().await;
            assert!(slept >= Duration::from_millis(5) && slept <= Duration::from_millis(15));
            assert!(start.elapsed() >= slept);
        }
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_sleep() {
        let governor = PolitenessGovernor::new(DelayRange::ZERO);
        assert_eq!(governor.pause().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_workers_pause_independently() {
        let governor = PolitenessGovernor::new(DelayRange::new(50, 50));
        let start = Instant::now();
        tokio::join!(governor.pause(), governor.pause(), governor.pause());
        // Three concurrent 50ms pauses overlap rather than queue up
        assert!(start.elapsed() < Duration::from_millis(140));
    }
}
