use serde::{Deserialize, Serialize};

use super::ResourceTypeName;
use crate::constants::resource_types;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeType {
    Root,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeStatus {
    Creating,
    Ready,
    NotInstantiated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInventory {
    pub uuid: String,
    pub name: String,
    pub cluster_uuid: String,
    pub hypervisor_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryStorageInventory {
    pub uuid: String,
    pub name: String,
    pub storage_type: String,
    pub attached_cluster_uuids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInventory {
    pub uuid: String,
    pub name: String,
    pub vm_instance_uuid: Option<String>,
    pub primary_storage_uuid: Option<String>,
    pub volume_type: VolumeType,
    pub status: VolumeStatus,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInstanceInventory {
    pub uuid: String,
    pub name: String,
    pub hypervisor_type: String,
    pub host_uuid: Option<String>,
    pub cluster_uuid: Option<String>,
    pub root_volume_uuid: Option<String>,
    #[serde(default)]
    pub all_volumes: Vec<VolumeInventory>,
}

/// Origin of a snapshot: taken by the hypervisor or by the storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeSnapshotType {
    Hypervisor,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSnapshotInventory {
    pub uuid: String,
    pub name: String,
    pub volume_uuid: Option<String>,
    pub tree_uuid: String,
    pub parent_uuid: Option<String>,
    pub snapshot_type: VolumeSnapshotType,
}

impl VolumeSnapshotInventory {
    /// Full snapshot at the base of a hypervisor chain. Deleting it removes
    /// the whole chain on primary storage.
    pub fn is_chain_root(&self) -> bool {
        self.parent_uuid.is_none() && self.snapshot_type == VolumeSnapshotType::Hypervisor
    }
}

/// One entry of a cascade action's parent context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "inventory")]
pub enum InventoryRecord {
    Host(HostInventory),
    PrimaryStorage(PrimaryStorageInventory),
    VmInstance(VmInstanceInventory),
    Volume(VolumeInventory),
    VolumeSnapshot(VolumeSnapshotInventory),
}

impl InventoryRecord {
    pub fn resource_type(&self) -> ResourceTypeName {
        match self {
            Self::Host(_) => resource_types::HOST,
            Self::PrimaryStorage(_) => resource_types::PRIMARY_STORAGE,
            Self::VmInstance(_) => resource_types::VM_INSTANCE,
            Self::Volume(_) => resource_types::VOLUME,
            Self::VolumeSnapshot(_) => resource_types::VOLUME_SNAPSHOT,
        }
    }

    pub fn uuid(&self) -> &str {
        match self {
            Self::Host(inv) => &inv.uuid,
            Self::PrimaryStorage(inv) => &inv.uuid,
            Self::VmInstance(inv) => &inv.uuid,
            Self::Volume(inv) => &inv.uuid,
            Self::VolumeSnapshot(inv) => &inv.uuid,
        }
    }

    pub fn as_host(&self) -> Option<&HostInventory> {
        match self {
            Self::Host(inv) => Some(inv),
            _ => None,
        }
    }

    pub fn as_primary_storage(&self) -> Option<&PrimaryStorageInventory> {
        match self {
            Self::PrimaryStorage(inv) => Some(inv),
            _ => None,
        }
    }

    pub fn as_vm_instance(&self) -> Option<&VmInstanceInventory> {
        match self {
            Self::VmInstance(inv) => Some(inv),
            _ => None,
        }
    }

    pub fn as_volume(&self) -> Option<&VolumeInventory> {
        match self {
            Self::Volume(inv) => Some(inv),
            _ => None,
        }
    }

    pub fn as_volume_snapshot(&self) -> Option<&VolumeSnapshotInventory> {
        match self {
            Self::VolumeSnapshot(inv) => Some(inv),
            _ => None,
        }
    }
}

impl From<HostInventory> for InventoryRecord {
    fn from(inv: HostInventory) -> Self {
        Self::Host(inv)
    }
}

impl From<PrimaryStorageInventory> for InventoryRecord {
    fn from(inv: PrimaryStorageInventory) -> Self {
        Self::PrimaryStorage(inv)
    }
}

impl From<VmInstanceInventory> for InventoryRecord {
    fn from(inv: VmInstanceInventory) -> Self {
        Self::VmInstance(inv)
    }
}

impl From<VolumeInventory> for InventoryRecord {
    fn from(inv: VolumeInventory) -> Self {
        Self::Volume(inv)
    }
}

impl From<VolumeSnapshotInventory> for InventoryRecord {
    fn from(inv: VolumeSnapshotInventory) -> Self {
        Self::VolumeSnapshot(inv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(parent: Option<&str>, snapshot_type: VolumeSnapshotType) -> VolumeSnapshotInventory {
        VolumeSnapshotInventory {
            uuid: "s1".to_string(),
            name: "s1".to_string(),
            volume_uuid: Some("v1".to_string()),
            tree_uuid: "t1".to_string(),
            parent_uuid: parent.map(String::from),
            snapshot_type,
        }
    }

    #[test]
    fn test_chain_root_requires_hypervisor_origin_and_no_parent() {
        assert!(snapshot(None, VolumeSnapshotType::Hypervisor).is_chain_root());
        assert!(!snapshot(Some("s0"), VolumeSnapshotType::Hypervisor).is_chain_root());
        assert!(!snapshot(None, VolumeSnapshotType::Storage).is_chain_root());
    }

    #[test]
    fn test_record_resource_type() {
        let record = InventoryRecord::from(snapshot(None, VolumeSnapshotType::Storage));
        assert_eq!(record.resource_type(), resource_types::VOLUME_SNAPSHOT);
        assert_eq!(record.uuid(), "s1");
        assert!(record.as_volume().is_none());
    }
}
