//! Blocking completion handle with a bounded wait.
//!
//! A [`FutureCompletion`] owns one outcome slot. Exactly one producer resolves
//! it; at most one consumer waits on it. [`FutureCompletion::await_blocking`]
//! parks the calling thread on a condition variable, so while it waits that
//! thread is unavailable to any worker pool it belongs to. Call sites already
//! running inside the async runtime should use [`FutureCompletion::wait`].

use crate::error::{CascadeError, CascadeResult, ErrorDetail};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::warn;

use super::CompletionResult;

/// Final state observed by a waiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(ErrorDetail),
    TimedOut,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Convert into a result; a timeout never counts as success
    pub fn into_result(self, operation: &str, timeout: Duration) -> CascadeResult<()> {
        match self {
            Outcome::Success => Ok(()),
            Outcome::Failed(detail) => Err(CascadeError::RemoteOperation(detail)),
            Outcome::TimedOut => Err(CascadeError::Timeout {
                operation: operation.to_string(),
                timeout,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    slot: Mutex<Option<Outcome>>,
    condvar: Condvar,
    notify: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct FutureCompletion {
    inner: Arc<Inner>,
}

impl FutureCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the handle. Only the first call has any effect.
    pub fn resolve(&self, success: bool, error: Option<ErrorDetail>) {
        let outcome = if success {
            Outcome::Success
        } else {
            Outcome::Failed(error.unwrap_or_else(|| {
                ErrorDetail::operation_failure("operation failed without an error detail")
            }))
        };
        self.set(outcome);
    }

    pub fn success(&self) {
        self.resolve(true, None);
    }

    pub fn fail(&self, error: ErrorDetail) {
        self.resolve(false, Some(error));
    }

    pub fn resolve_result(&self, result: CompletionResult) {
        match result {
            Ok(()) => self.success(),
            Err(error) => self.fail(error),
        }
    }

    fn set(&self, outcome: Outcome) {
        {
            let mut slot = self.inner.slot.lock();
            if slot.is_some() {
                warn!(?outcome, "FutureCompletion resolved more than once; ignoring");
                return;
            }
            *slot = Some(outcome);
        }
        self.inner.condvar.notify_all();
        self.inner.notify.notify_waiters();
    }

    /// Current outcome, if already resolved
    pub fn peek(&self) -> Option<Outcome> {
        self.inner.slot.lock().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.slot.lock().is_some()
    }

    /// Block the calling thread until resolved or `timeout` elapses
    pub fn await_blocking(&self, timeout: Duration) -> Outcome {
        let mut slot = self.inner.slot.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while slot.is_none() {
                    if self.inner.condvar.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
            }
            // unrepresentable deadline, wait without one
            None => {
                while slot.is_none() {
                    self.inner.condvar.wait(&mut slot);
                }
            }
        }
        slot.clone().unwrap_or(Outcome::TimedOut)
    }

    /// Suspend the current task until resolved or `timeout` elapses
    pub async fn wait(&self, timeout: Duration) -> Outcome {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.peek() {
                return outcome;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.peek().unwrap_or(Outcome::TimedOut);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_unresolved_handle_times_out() {
        let future = FutureCompletion::new();
        let outcome = future.await_blocking(Duration::from_millis(20));
        assert_eq!(outcome, Outcome::TimedOut);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_resolution_from_another_thread_wakes_waiter() {
        let future = FutureCompletion::new();
        let producer = future.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.success();
        });
        let outcome = future.await_blocking(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn test_unbounded_timeout_on_resolved_handle_returns_outcome() {
        let future = FutureCompletion::new();
        future.success();
        assert_eq!(future.await_blocking(Duration::MAX), Outcome::Success);
    }

    #[test]
    fn test_unbounded_timeout_waits_for_late_resolution() {
        let future = FutureCompletion::new();
        let producer = future.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.fail(ErrorDetail::operation_failure("late"));
        });
        let outcome = future.await_blocking(Duration::MAX);
        handle.join().unwrap();
        assert!(matches!(outcome, Outcome::Failed(ref detail) if detail.description == "late"));
    }

    #[test]
    fn test_second_resolution_is_ignored() {
        let future = FutureCompletion::new();
        future.fail(ErrorDetail::operation_failure("first"));
        future.success();
        match future.await_blocking(Duration::from_millis(1)) {
            Outcome::Failed(detail) => assert_eq!(detail.description, "first"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_failure_without_detail_gets_generic_detail() {
        let future = FutureCompletion::new();
        future.resolve(false, None);
        assert!(matches!(future.peek(), Some(Outcome::Failed(_))));
    }

    #[test]
    fn test_timed_out_converts_to_timeout_error() {
        let error = Outcome::TimedOut
            .into_result("check deletable", Duration::from_millis(5))
            .unwrap_err();
        assert_eq!(error.kind(), crate::error::ErrorKind::TimeoutFault);
    }

    #[tokio::test]
    async fn test_async_wait_resolved_by_task() {
        let future = FutureCompletion::new();
        let producer = future.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            producer.success();
        });
        assert_eq!(future.wait(Duration::from_secs(5)).await, Outcome::Success);
    }

    #[tokio::test]
    async fn test_async_wait_times_out() {
        let future = FutureCompletion::new();
        assert_eq!(
            future.wait(Duration::from_millis(10)).await,
            Outcome::TimedOut
        );
    }
}
