//! Lightweight performance timing utilities.
//!
//! Timing is off unless enabled programmatically or through the
//! `PNG_TIMING` environment variable. Results go to `tracing` at info level.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("PNG_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }

    /// Stop the timer and add the elapsed time to `acc`.
    pub fn stop_into(self, acc: &AccumulatingTimer) {
        if let Some(elapsed) = self.stop() {
            acc.record(elapsed);
        }
    }

    /// Stop the timer and log the result if enabled.
    pub fn stop_and_log(self) {
        let label = self.label;
        if let Some(elapsed) = self.stop() {
            tracing::info!(target: "png::timing", "{}: {:.3}s", label, elapsed);
        }
    }
}

/// Accumulating timer for tracking total time across multiple calls.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Number of calls.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Timers for the phases of one assemble-and-solve cycle.
pub mod cycle_timing {
    use super::AccumulatingTimer;

    /// Region-algorithm execution (element and face kernels)
    pub static ASSEMBLY: AccumulatingTimer = AccumulatingTimer::new();
    /// Shared-row reductions before the solve
    pub static SHARED_SUM: AccumulatingTimer = AccumulatingTimer::new();
    /// Collective linear solve
    pub static SOLVE: AccumulatingTimer = AccumulatingTimer::new();
    /// Owned-to-shared copy of the solution
    pub static SCATTER: AccumulatingTimer = AccumulatingTimer::new();

    pub fn reset_all() {
        ASSEMBLY.reset();
        SHARED_SUM.reset();
        SOLVE.reset();
        SCATTER.reset();
    }

    /// Log a breakdown of the cycle timers.
    pub fn log_summary() {
        if !super::is_enabled() {
            return;
        }
        for (label, timer) in [
            ("assembly", &ASSEMBLY),
            ("shared sum", &SHARED_SUM),
            ("solve", &SOLVE),
            ("scatter", &SCATTER),
        ] {
            let count = timer.count();
            if count > 0 {
                tracing::info!(
                    target: "png::timing",
                    "{:<12} {} calls, {:.3}s total, {:.4}ms avg",
                    label,
                    count,
                    timer.total_seconds(),
                    timer.average_seconds() * 1000.0
                );
            }
        }
    }
}
