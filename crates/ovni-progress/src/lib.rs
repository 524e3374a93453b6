//! Wall-clock progress reporting for the emulation run.
//!
//! When the `report` feature is **on** (the default), [`Reporter`] logs a
//! rate line at most once a second
//! (`Instant::elapsed() >= Duration::from_secs(1)`).
//!
//! `-q`/`--quiet` is a separate, runtime concern: the driver just skips
//! calling `tick` at all when it is set. The `report` feature is the
//! compile-time escape hatch underneath that: when it is off, `Reporter` is
//! a zero-sized no-op and every method compiles away to nothing, for
//! builds that want the reporting code gone entirely rather than merely
//! silenced.

/// Fraction of total trace bytes consumed so far. `1.0` if there is nothing
/// to read, so an empty trace reports as complete rather than `NaN`.
pub fn progress_fraction(bytes_read: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        1.0
    } else {
        bytes_read as f64 / total_bytes as f64
    }
}

#[cfg(feature = "report")]
mod inner {
    use super::progress_fraction;
    use std::time::{Duration, Instant};

    pub struct Reporter {
        last: Instant,
        period: Duration,
    }

    impl Reporter {
        pub fn new() -> Self {
            Reporter {
                last: Instant::now(),
                period: Duration::from_secs(1),
            }
        }

        /// Logs a progress line if at least one reporting period has
        /// elapsed since the last one. A no-op otherwise, so callers can
        /// call this after every event without measuring the cost.
        pub fn tick(&mut self, fraction: f64, nprocessed: u64) {
            if self.last.elapsed() < self.period {
                return;
            }
            tracing::info!(
                progress = format!("{:.1}%", fraction * 100.0),
                nprocessed,
                "emulation progress"
            );
            self.last = Instant::now();
        }
    }

    impl Default for Reporter {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(not(feature = "report"))]
mod inner {
    pub struct Reporter;

    impl Reporter {
        #[inline(always)]
        pub fn new() -> Self {
            Reporter
        }
        #[inline(always)]
        pub fn tick(&mut self, _fraction: f64, _nprocessed: u64) {}
    }

    impl Default for Reporter {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub use inner::Reporter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trace_reports_complete() {
        assert_eq!(progress_fraction(0, 0), 1.0);
    }

    #[test]
    fn partial_trace_reports_fraction() {
        assert_eq!(progress_fraction(50, 200), 0.25);
    }
}
