//! Cooperative cancellation for long-running pairwise computations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable abort flag shared between a caller and running workers.
///
/// Workers poll the flag between units of work; raising it never interrupts
/// a unit already in progress.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// Create a flag that is not raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Return true once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
