//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// A cloneable flag shared between a caller and an in-flight analysis.
///
/// The engine polls it between detector passes and once per file in
/// multi-file loops. Nothing shared is mutated when cancellation is observed.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            tracing::debug!("cancellation observed");
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }
}
