// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default minimum time between two progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Receives progress of a long run and may ask it to stop.
pub trait ProgressSink {
    fn report_progress(&self, current: u64, total: u64);

    /// Polled at the reporting cadence; `true` stops the run.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report_progress(&self, _current: u64, _total: u64) {}
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl ProgressSink for CancellationToken {
    fn report_progress(&self, _current: u64, _total: u64) {}

    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

/// Percentage of `current` over `total`, 0 when there is nothing to do.
#[inline]
pub fn percent(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (u128::from(current.min(total)) * 100 / u128::from(total)) as u8
}

/// Lets an event through at most once per interval; the first is immediate.
#[derive(Debug, Clone)]
pub(crate) struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(5, 3), 100);
    }

    #[test]
    fn test_throttle_lets_first_event_through() {
        let mut throttle = Throttle::new(Duration::from_secs(3600));
        assert!(throttle.ready());
        assert!(!throttle.ready());

        let mut eager = Throttle::new(Duration::ZERO);
        assert!(eager.ready());
        assert!(eager.ready());
    }

    #[test]
    fn test_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!ProgressSink::is_cancelled(&token));
        clone.cancel();
        assert!(ProgressSink::is_cancelled(&token));
    }
}
