//! # Models
//!
//! Inventory snapshots of the resources the cascade engine reasons about.
//! They are read-only copies handed out by the persistence collaborator; the
//! core never mutates or persists them.

pub mod inventory;
pub mod resource_type;

pub use inventory::{
    HostInventory, InventoryRecord, PrimaryStorageInventory, VmInstanceInventory,
    VolumeInventory, VolumeSnapshotInventory, VolumeSnapshotType, VolumeStatus, VolumeType,
};
pub use resource_type::ResourceTypeName;
