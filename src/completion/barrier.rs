//! Counter-based fan-in of child completions into one parent completion.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Completion, CompletionResult};
use crate::error::ErrorDetail;

/// How child failures affect the parent outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Parent fails with the failure of the lowest-indexed failed child
    FailFast,
    /// Failures are logged; parent always succeeds
    BestEffort,
}

struct BarrierState {
    remaining: AtomicUsize,
    first_error: Mutex<Option<(usize, ErrorDetail)>>,
    parent: Mutex<Option<Completion>>,
    policy: AggregationPolicy,
    label: &'static str,
}

impl BarrierState {
    fn arrive(&self, index: usize, result: CompletionResult) {
        if let Err(error) = result {
            match self.policy {
                AggregationPolicy::FailFast => {
                    let mut first = self.first_error.lock();
                    let replace = first.as_ref().map_or(true, |(i, _)| index < *i);
                    if replace {
                        *first = Some((index, error));
                    }
                }
                AggregationPolicy::BestEffort => {
                    warn!(
                        barrier = self.label,
                        child = index,
                        error = %error,
                        "Ignoring child failure under best-effort aggregation"
                    );
                }
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.release();
        }
    }

    fn release(&self) {
        let Some(parent) = self.parent.lock().take() else {
            return;
        };
        match self.first_error.lock().take() {
            Some((index, error)) => {
                debug!(barrier = self.label, child = index, "Barrier resolved with failure");
                parent.fail(error);
            }
            None => {
                debug!(barrier = self.label, "Barrier resolved with success");
                parent.success();
            }
        }
    }
}

/// Splits a parent completion into N children
pub struct CompletionBarrier;

impl CompletionBarrier {
    /// Produce `count` child completions. The parent resolves exactly once,
    /// after every child has resolved (or been dropped). With `count == 0`
    /// the parent succeeds immediately.
    pub fn split(
        parent: Completion,
        count: usize,
        policy: AggregationPolicy,
    ) -> Vec<Completion> {
        Self::split_labeled("barrier", parent, count, policy)
    }

    pub fn split_labeled(
        label: &'static str,
        parent: Completion,
        count: usize,
        policy: AggregationPolicy,
    ) -> Vec<Completion> {
        if count == 0 {
            parent.success();
            return Vec::new();
        }

        let state = Arc::new(BarrierState {
            remaining: AtomicUsize::new(count),
            first_error: Mutex::new(None),
            parent: Mutex::new(Some(parent)),
            policy,
            label,
        });

        (0..count)
            .map(|index| {
                let state = Arc::clone(&state);
                Completion::labeled(label, move |result| state.arrive(index, result))
            })
            .collect()
    }
}
