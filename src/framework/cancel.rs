use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Advisory cancellation flag polled by per-chromosome loops.
///
/// Clones share the same flag. Stopping never interrupts a thread; the
/// flag only takes effect at the next loop iteration that checks it.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    /// Fresh, not yet stopped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Whether `other` shares this token's flag.
    pub fn shares_flag_with(&self, other: &StopToken) -> bool {
        Arc::ptr_eq(&self.stopped, &other.stopped)
    }
}
