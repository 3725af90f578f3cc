//! [`ProgressInfo`] — shared status for a running file operation, §4.G.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::task::Cancellable;

pub struct ProgressInfo {
    status: Mutex<String>,
    details: Mutex<String>,
    /// Fixed-point progress in millionths, so it can live in an atomic.
    fraction_micros: AtomicU64,
    started_at: Instant,
    cancellable: Cancellable,
}

impl ProgressInfo {
    pub fn new(cancellable: Cancellable) -> Self {
        ProgressInfo {
            status: Mutex::new(String::new()),
            details: Mutex::new(String::new()),
            fraction_micros: AtomicU64::new(0),
            started_at: Instant::now(),
            cancellable,
        }
    }

    pub fn set_status(&self, status: impl Into<String>) {
        *self.status.lock().unwrap() = status.into();
    }

    pub fn set_details(&self, details: impl Into<String>) {
        *self.details.lock().unwrap() = details.into();
    }

    pub fn status(&self) -> String {
        self.status.lock().unwrap().clone()
    }

    pub fn details(&self) -> String {
        self.details.lock().unwrap().clone()
    }

    /// `fraction` is clamped to `[0.0, 1.0]`.
    pub fn set_fraction(&self, fraction: f64) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.fraction_micros.store((clamped * 1_000_000.0) as u64, Ordering::Relaxed);
    }

    pub fn fraction(&self) -> f64 {
        self.fraction_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Estimated remaining time, extrapolated linearly from elapsed time
    /// and current fraction. `None` until some progress has been made.
    pub fn estimated_remaining(&self) -> Option<std::time::Duration> {
        let fraction = self.fraction();
        if fraction <= 0.0 {
            return None;
        }
        let elapsed = self.elapsed().as_secs_f64();
        let total_estimate = elapsed / fraction;
        Some(std::time::Duration::from_secs_f64((total_estimate - elapsed).max(0.0)))
    }

    pub fn cancellable(&self) -> &Cancellable {
        &self.cancellable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_round_trips_and_clamps() {
        let progress = ProgressInfo::new(Cancellable::new());
        progress.set_fraction(0.5);
        assert!((progress.fraction() - 0.5).abs() < 1e-6);
        progress.set_fraction(2.0);
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn no_estimate_before_any_progress() {
        let progress = ProgressInfo::new(Cancellable::new());
        assert!(progress.estimated_remaining().is_none());
    }
}
