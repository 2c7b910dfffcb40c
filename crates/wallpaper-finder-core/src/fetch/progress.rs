use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared download counters.
///
/// Both counters only ever grow, so a poller can compute progress without
/// coordinating with the workers. Rendering is left to the caller.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of downloads finished so far, successful or not
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Number of downloads scheduled so far
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub(crate) fn schedule(&self, count: usize) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn complete_one(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cooperative cancellation flag shared between the caller and the workers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask workers to stop pulling new work
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
