//! # Completions
//!
//! Two-outcome continuations that carry the result of one logical unit of work.
//!
//! - [`Completion`] is an owned continuation. Resolving it consumes it, so it can
//!   be resolved at most once; dropping it unresolved reports a failure so a
//!   parent is never left waiting forever.
//! - [`FutureCompletion`] is the blocking bridge between callback-driven work and
//!   call sites that must return synchronously, bounded by a timeout.
//! - [`CompletionBarrier`] composes N child completions into one parent with an
//!   explicit counter.
//!
//! ```rust
//! use std::time::Duration;
//! use cascade_core::completion::{Completion, Outcome};
//!
//! # tokio_test::block_on(async {
//! let (completion, future) = Completion::future();
//! tokio::spawn(async move { completion.success() });
//! assert!(matches!(future.wait(Duration::from_secs(1)).await, Outcome::Success));
//! # });
//! ```

pub mod barrier;
pub mod future_completion;

pub use barrier::{AggregationPolicy, CompletionBarrier};
pub use future_completion::{FutureCompletion, Outcome};

use crate::error::ErrorDetail;
use tokio::sync::oneshot;
use tracing::warn;

/// Result type delivered to a completion
pub type CompletionResult = Result<(), ErrorDetail>;

type Callback = Box<dyn FnOnce(CompletionResult) + Send + 'static>;

/// Owned success/failure continuation
pub struct Completion {
    label: &'static str,
    callback: Option<Callback>,
}

impl Completion {
    /// Create a completion that invokes `callback` with the outcome
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(CompletionResult) + Send + 'static,
    {
        Self::labeled("completion", callback)
    }

    /// Same as [`Completion::new`] with a label used in drop diagnostics
    pub fn labeled<F>(label: &'static str, callback: F) -> Self
    where
        F: FnOnce(CompletionResult) + Send + 'static,
    {
        Self {
            label,
            callback: Some(Box::new(callback)),
        }
    }

    /// Completion whose outcome nobody observes
    pub fn noop() -> Self {
        Self::labeled("noop", |_| {})
    }

    /// Completion bridged to a oneshot receiver
    pub fn channel() -> (Self, oneshot::Receiver<CompletionResult>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::labeled("channel", move |result| {
            // receiver may have been dropped by a caller that gave up waiting
            let _ = tx.send(result);
        });
        (completion, rx)
    }

    /// Completion bridged to a blocking [`FutureCompletion`]
    pub fn future() -> (Self, FutureCompletion) {
        let future = FutureCompletion::new();
        let handle = future.clone();
        let completion = Self::labeled("future", move |result| handle.resolve_result(result));
        (completion, future)
    }

    pub fn success(self) {
        self.resolve(Ok(()));
    }

    pub fn fail(self, error: ErrorDetail) {
        self.resolve(Err(error));
    }

    pub fn resolve(mut self, result: CompletionResult) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("label", &self.label)
            .field("resolved", &self.callback.is_none())
            .finish()
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            warn!(label = self.label, "Completion dropped without being resolved");
            callback(Err(ErrorDetail::internal(format!(
                "{} completion dropped without being resolved",
                self.label
            ))));
        }
    }
}
