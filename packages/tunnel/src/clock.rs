//! Wall-clock timestamps driven by tokio's monotonic clock.
//!
//! Timestamps are derived from the elapsed [`tokio::time::Instant`] since the
//! clock was started, anchored to the wall time observed at start. Event
//! times therefore agree with the tokio timers the tasks sleep on, including
//! when tokio's clock is paused in tests.

use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    origin: Instant,
    wall: DateTime<Local>,
}

impl SimClock {
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            wall: Local::now(),
        }
    }

    #[must_use]
    pub const fn started(&self) -> Instant {
        self.origin
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Local> {
        TimeDelta::from_std(self.elapsed()).map_or(self.wall, |elapsed| self.wall + elapsed)
    }
}

/// `HH:MM:SS` rendering used by the text logs.
#[must_use]
pub fn format_hms(time: &DateTime<Local>) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Elapsed time between two timestamps, clamped at zero.
#[must_use]
pub fn elapsed_between(from: &DateTime<Local>, to: &DateTime<Local>) -> Duration {
    to.signed_duration_since(from)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
