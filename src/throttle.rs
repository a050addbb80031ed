//! Debounce gate for physical switch events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A gate that admits at most one caller per time window.
///
/// A single physical switch press is sampled several times by the poll
/// loop before the relay is restored; the gate collapses those samples
/// into one action. Callers that lose the race are dropped, not queued.
///
/// Entry is an atomic test-and-set; a timer task reopens the gate once
/// the window elapses. Clones share the same gate.
///
/// ```ignore
/// let gate = ToggleGate::new(Duration::from_millis(100));
/// if gate.try_enter() {
///     // at most once per 100 ms across all clones
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ToggleGate {
    ready: Arc<AtomicBool>,
    window: Duration,
}

impl ToggleGate {
    pub fn new(window: Duration) -> Self {
        ToggleGate {
            ready: Arc::new(AtomicBool::new(true)),
            window,
        }
    }

    /// Try to pass the gate. Returns `true` for at most one caller per
    /// window; the gate reopens automatically after the window elapses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn try_enter(&self) -> bool {
        if self
            .ready
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let ready = Arc::clone(&self.ready);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            ready.store(true, Ordering::SeqCst);
        });
        true
    }
}
