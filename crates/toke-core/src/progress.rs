//! Progress reporting and throttling.
//!
//! Installers report `(downloaded, total)` byte pairs. A `total` of zero means
//! the size is not known yet and must be rendered as indeterminate.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Byte-progress callback: `(downloaded, total)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Coarse textual status callback used by quick setup.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback that drops every report.
pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_, _| {})
}

/// Minimum spacing between forwarded reports, i.e. at most 10 per second.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(100);

/// A [`ProgressCallback`] that drops reports arriving within
/// [`REPORT_INTERVAL`] of the last forwarded one.
pub struct ThrottledProgress {
    callback: ProgressCallback,
    interval: Duration,
    last: Option<Instant>,
}

impl ThrottledProgress {
    pub fn new(callback: ProgressCallback) -> Self {
        Self::with_interval(callback, REPORT_INTERVAL)
    }

    pub fn with_interval(callback: ProgressCallback, interval: Duration) -> Self {
        Self {
            callback,
            interval,
            last: None,
        }
    }

    /// Forward the report unless one went out less than an interval ago.
    pub fn report(&mut self, downloaded: u64, total: u64) {
        let now = Instant::now();
        if self.last.is_some_and(|last| now.duration_since(last) < self.interval) {
            return;
        }
        self.last = Some(now);
        (self.callback)(downloaded, total);
    }

    /// Report unconditionally, e.g. on completion.
    pub fn finish(&mut self, downloaded: u64, total: u64) {
        self.last = None;
        self.report(downloaded, total);
    }
}
