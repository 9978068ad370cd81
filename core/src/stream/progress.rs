//! stream/progress.rs
//! Monotonic progress reporting with cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::DocumentError;

/// Cloneable cancel flag shared between a caller and a running pass.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes processed so far in this pass.
    pub processed: u64,
    /// Expected total, when known.
    pub total: Option<u64>,
}

type Observer = Box<dyn FnMut(&ProgressEvent) + Send>;

pub struct ProgressContext {
    processed: u64,
    total: Option<u64>,
    token: CancellationToken,
    observer: Option<Observer>,
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressContext")
            .field("processed", &self.processed)
            .field("total", &self.total)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl ProgressContext {
    pub fn new() -> Self {
        Self { processed: 0, total: None, token: CancellationToken::new(), observer: None }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_observer(mut self, observer: impl FnMut(&ProgressEvent) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_total(&mut self, total: Option<u64>) {
        self.total = total;
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Record `n` more bytes, notify the observer, then honour cancellation.
    pub fn advance(&mut self, n: u64) -> Result<(), DocumentError> {
        self.processed = self.processed.saturating_add(n);
        if let Some(observer) = self.observer.as_mut() {
            observer(&ProgressEvent { processed: self.processed, total: self.total });
        }
        self.check_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), DocumentError> {
        if self.token.is_cancelled() {
            return Err(DocumentError::Cancelled);
        }
        Ok(())
    }
}
