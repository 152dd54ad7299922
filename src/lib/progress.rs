//! Progress tracking and log formatting.
//!
//! A thread-safe counter that logs at interval boundaries (safe to share
//! across the pipeline's consumer threads), a stage timer, and the small
//! formatting helpers used by the run summary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::info;

/// Thread-safe progress counter that logs whenever the count crosses a
/// multiple of its interval.
pub struct ProgressTracker {
    message: String,
    interval: u64,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker logging `message <count>` every `interval`
    /// items.
    #[must_use]
    pub fn new(message: impl Into<String>, interval: u64) -> ProgressTracker {
        ProgressTracker { message: message.into(), interval: interval.max(1), count: AtomicU64::new(0) }
    }

    /// Adds `additional` items, logging once per interval boundary
    /// crossed. Callable from any thread.
    pub fn add(&self, additional: u64) {
        if additional == 0 {
            return;
        }
        let previous = self.count.fetch_add(additional, Ordering::Relaxed);
        let updated = previous + additional;
        for crossed in (previous / self.interval + 1)..=(updated / self.interval) {
            info!("{} {}", self.message, format_count(crossed * self.interval));
        }
    }

    /// The current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Logs the final count unless the last `add` already logged it.
    pub fn finish(&self) {
        let count = self.count();
        if count % self.interval != 0 {
            info!("{} {} (complete)", self.message, format_count(count));
        }
    }
}

/// Logs the start of an operation and, on `done`, its duration and rate.
pub struct OperationTimer {
    operation: String,
    started: Instant,
}

impl OperationTimer {
    /// Starts timing and logs `<operation> ...`.
    #[must_use]
    pub fn start(operation: &str) -> OperationTimer {
        info!("{operation} ...");
        OperationTimer { operation: operation.to_string(), started: Instant::now() }
    }

    /// Logs completion with the processed item count.
    pub fn done(&self, items: u64) {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { items as f64 / secs } else { items as f64 };
        info!(
            "{} completed: {} in {} ({} items/s)",
            self.operation,
            format_count(items),
            format_duration(elapsed),
            format_count(rate as u64)
        );
    }
}

/// Formats a count with thousands separators: `1234567` -> `"1,234,567"`.
#[must_use]
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a duration as seconds, minutes or hours: `"45s"`, `"2m 15s"`,
/// `"1h 30m"`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let (m, s) = (secs / 60, secs % 60);
        if s == 0 { format!("{m}m") } else { format!("{m}m {s}s") }
    } else {
        let (h, m) = (secs / 3600, (secs % 3600) / 60);
        if m == 0 { format!("{h}h") } else { format!("{h}h {m}m") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(5460)), "1h 31m");
    }

    #[test]
    fn test_tracker_counts() {
        let tracker = ProgressTracker::new("Reads", 10);
        tracker.add(7);
        tracker.add(8);
        assert_eq!(tracker.count(), 15);
        tracker.finish();
    }

    #[test]
    fn test_tracker_across_threads() {
        use std::sync::Arc;
        let tracker = Arc::new(ProgressTracker::new("Reads", 1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.add(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.count(), 800);
    }
}
