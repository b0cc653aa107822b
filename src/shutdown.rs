//! Process-wide shutdown signal.
//!
//! Any dispatched task may request shutdown with an exit code; the control
//! loop polls the signal once per cycle and owns the actual process exit.
//! The first request wins, later ones are logged and dropped.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Exit code asking the supervising service manager to restart the agent,
/// picking up a newly installed binary.
pub const EXIT_CODE_RESTART: i32 = 88;

/// Shared handle for requesting and observing agent shutdown.
///
/// Clones share the same underlying signal; tasks receive a clone, the loop
/// keeps one for polling.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    code: AtomicI32,
    reason: Mutex<Option<String>>,
}

impl ShutdownSignal {
    /// Create a new, unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request process shutdown with the given exit code.
    ///
    /// Writers serialize on the reason slot; the first one wins. The code
    /// is published before the flag flips, so a reader that sees the flag
    /// always sees the matching code.
    pub fn request(&self, code: i32, reason: &str) {
        let mut slot = self.inner.reason.lock();
        if self.inner.requested.load(Ordering::Acquire) {
            warn!(code, reason = %reason, "Shutdown already requested, ignoring");
            return;
        }
        self.inner.code.store(code, Ordering::Release);
        *slot = Some(reason.to_string());
        self.inner.requested.store(true, Ordering::Release);
    }

    /// The requested exit code, if any task asked for shutdown.
    ///
    /// Lock-free; safe to poll from the loop every cycle.
    #[must_use]
    pub fn requested(&self) -> Option<i32> {
        if self.inner.requested.load(Ordering::Acquire) {
            Some(self.inner.code.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// The reason recorded with the winning request.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        let signal = ShutdownSignal::new();
        assert_eq!(signal.requested(), None);
        assert_eq!(signal.reason(), None);
    }

    #[test]
    fn first_request_wins() {
        let signal = ShutdownSignal::new();
        signal.request(3, "disk gone");
        signal.request(4, "changed my mind");

        assert_eq!(signal.requested(), Some(3));
        assert_eq!(signal.reason().as_deref(), Some("disk gone"));
    }

    #[test]
    fn clones_share_the_signal() {
        let signal = ShutdownSignal::new();
        let handle = signal.clone();
        handle.request(EXIT_CODE_RESTART, "new binary installed");

        assert_eq!(signal.requested(), Some(EXIT_CODE_RESTART));
    }

    #[test]
    fn concurrent_requests_stay_consistent() {
        let signal = ShutdownSignal::new();
        let mut handles = Vec::new();
        for code in 0..8 {
            let signal = signal.clone();
            handles.push(std::thread::spawn(move || {
                signal.request(code, &code.to_string());
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Whichever writer won, its code and reason must agree
        let code = signal.requested().unwrap();
        assert_eq!(signal.reason().unwrap(), code.to_string());
    }
}
