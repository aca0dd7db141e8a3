use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::config::Throttle;

/// Spaces out the start of consecutive requests.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(throttle: Option<Throttle>) -> Self {
        Self {
            interval: throttle.map(|t| t.interval()).unwrap_or_default(),
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Raises the interval to `interval` when it is larger than the current one.
    pub fn raise(&mut self, interval: Duration) {
        self.interval = self.interval.max(interval);
    }

    /// Sleeps until `interval` has elapsed since the previous call returned.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}
