//! Error reporting for the ingest and merge paths.
//!
//! Nothing on these paths may propagate an error back to the producer;
//! conditions are routed through a reporter instead.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Conditions reported while ingesting and merging updates.
#[derive(Debug, Clone)]
pub enum MergeEvent {
    /// Recoverable condition; processing continues.
    Recoverable(String),
    /// Fatal condition that stops the merge driver.
    Fatal(String),
}

impl fmt::Display for MergeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeEvent::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            MergeEvent::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

/// Trait for reporting merge pipeline conditions.
pub trait ErrorReporter: Send + Sync {
    /// Reports a condition from the named component.
    fn report(&self, component: &str, event: &MergeEvent);
}

/// Simple error reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, component: &str, event: &MergeEvent) {
        eprintln!("[{}] {}", component, event);
    }
}

/// Rate limiter for repeated warnings.
///
/// The saturation probe fires on every enqueue once the ring fills; without
/// throttling the producer would spam one warning per update.
#[derive(Debug)]
pub struct WarnThrottle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl WarnThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Returns true if enough time has passed to warn again, and records
    /// the warning time if so.
    pub fn should_warn(&self) -> bool {
        let mut last = self.last.lock().unwrap();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
