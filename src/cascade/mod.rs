//! # Cascade
//!
//! Propagation of lifecycle actions (check, delete, force delete, cleanup)
//! across the graph of dependent resource types.
//!
//! ## Components
//!
//! - [`CascadeAction`]: the action travelling through the graph
//! - [`CascadeExtension`]: per resource type handler and child derivation
//! - [`CascadeEngine`]: traversal, concurrent fan-out and aggregation
//! - Extensions for volume snapshots, VM instances and volumes

pub mod action;
pub mod engine;
pub mod extension;
pub mod snapshot_extension;
pub mod vm_extension;
pub mod volume_extension;

pub use action::{ActionCode, CascadeAction};
pub use engine::CascadeEngine;
pub use extension::CascadeExtension;
pub use snapshot_extension::VolumeSnapshotCascadeExtension;
pub use vm_extension::VmInstanceCascadeExtension;
pub use volume_extension::VolumeCascadeExtension;
