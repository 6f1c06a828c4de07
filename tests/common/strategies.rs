//! Proptest strategies for cascade property tests.

use cascade_core::cascade::ActionCode;
use proptest::prelude::*;

pub fn action_code_strategy() -> impl Strategy<Value = ActionCode> {
    prop_oneof![
        Just(ActionCode::CheckDeletable),
        Just(ActionCode::Delete),
        Just(ActionCode::ForceDelete),
        Just(ActionCode::Cleanup),
    ]
}

/// Per-VM reply outcome; `true` means the remote service reports success
pub fn reply_outcomes_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..8)
}

pub fn resource_uuid_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{32}"
}

pub fn partitions_strategy() -> impl Strategy<Value = u32> {
    1u32..64
}

/// Child outcomes paired with the order in which the children resolve
pub fn barrier_resolution_strategy() -> impl Strategy<Value = (Vec<bool>, Vec<usize>)> {
    prop::collection::vec(any::<bool>(), 0..12).prop_flat_map(|outcomes| {
        let order: Vec<usize> = (0..outcomes.len()).collect();
        (Just(outcomes), Just(order).prop_shuffle())
    })
}
