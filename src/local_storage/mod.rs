//! # Local Storage
//!
//! Primary storage backed by each host's own disks. Because a disk is bound
//! to one host, this backend substitutes its own steps into VM pipelines,
//! vetoes operations that would split a VM across hosts, and tears down the
//! resources of a host that is being deleted.

pub mod flows;
pub mod hooks;
pub mod marshaller;
pub mod mediator;

pub use flows::{
    LocalStorageAllocateCapacityFlow, LocalStorageAllocateCapacityForAttachingVolumeFlow,
    LocalStorageKvmMigrateVmFlow,
};
pub use hooks::{HostMaintenancePolicy, LocalStorageHooks};
pub use marshaller::LocalStorageFlowMarshaller;
pub use mediator::{BitsTransfer, LocalStorageBackupStorageMediator};
