//! Power inhibition, per spec.md §4.G: "While a long operation runs, the
//! core asks the host environment to inhibit logout and suspend with a
//! human-readable reason."
//!
//! The actual inhibit call is a desktop-shell integration, explicitly out
//! of scope per §1 ("desktop shell integration... external collaborators
//! whose only contract is stated in §6"). [`PowerInhibitor`] is that
//! contract: a trait the host implements; the default logs instead of
//! calling out to a real session manager, the same way [`crate::thumbnail`]'s
//! external-thumbnailer path fails over when no subprocess is configured.

use std::sync::Arc;

pub trait PowerInhibitor: Send + Sync {
    /// Begins inhibiting logout/suspend for `reason`; returns a cookie to
    /// hand back to [`PowerInhibitor::uninhibit`].
    fn inhibit(&self, reason: &str) -> u32;
    fn uninhibit(&self, cookie: u32);
}

/// Used when no host integration is wired up: logs the request and returns
/// a dummy cookie.
pub struct LoggingInhibitor;

impl PowerInhibitor for LoggingInhibitor {
    fn inhibit(&self, reason: &str) -> u32 {
        tracing::debug!(target: "filecore::operations", reason, "power inhibition requested (no host integration configured)");
        0
    }

    fn uninhibit(&self, _cookie: u32) {}
}

/// RAII guard: inhibits on construction, uninhibits on drop. Operations
/// hold one for their lifetime.
pub struct InhibitGuard {
    inhibitor: Arc<dyn PowerInhibitor>,
    cookie: u32,
}

impl InhibitGuard {
    pub fn new(inhibitor: Arc<dyn PowerInhibitor>, reason: &str) -> Self {
        let cookie = inhibitor.inhibit(reason);
        InhibitGuard { inhibitor, cookie }
    }
}

impl Drop for InhibitGuard {
    fn drop(&mut self) {
        self.inhibitor.uninhibit(self.cookie);
    }
}
