//! Time source for backoff sleeps and breaker deadlines

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
    fn now(&self) -> Instant;
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that returns immediately from `sleep`, advancing its own time and
/// recording every requested delay.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Instant::now(),
                sleeps: Vec::new(),
            }),
        }
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.now += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .sleeps
            .clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.now += duration;
        state.sleeps.push(duration);
    }

    fn now(&self) -> Instant {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_records_and_advances() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.sleep(Duration::from_millis(1500)).await;
        clock.advance(Duration::from_secs(10));
        clock.sleep(Duration::from_secs(2)).await;

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(1500), Duration::from_secs(2)]
        );
        assert_eq!(clock.total_slept(), Duration::from_millis(3500));
        assert_eq!(clock.now() - start, Duration::from_millis(13_500));
    }

    #[tokio::test]
    async fn test_tokio_clock_zero_sleep_returns() {
        let clock = TokioClock;
        let before = clock.now();
        clock.sleep(Duration::ZERO).await;
        assert!(clock.now() >= before);
    }
}
