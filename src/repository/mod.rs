//! # Repository
//!
//! Read-only query seam to the persistence collaborator. The core never
//! writes through it except to purge soft-deleted rows on `Cleanup`; every
//! other mutation travels through the messaging fabric to the owning service.
//!
//! The traits are split by concern and united under [`CascadeRepository`],
//! which is what the engine, extensions and local-storage hooks hold.

pub mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CascadeResult;
use crate::models::{
    HostInventory, PrimaryStorageInventory, ResourceTypeName, VmInstanceInventory,
    VolumeInventory, VolumeSnapshotInventory,
};

pub use in_memory::InMemoryInventory;

/// Residency of a resource on one host of a local primary storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStorageResourceRef {
    pub resource_uuid: String,
    pub resource_type: ResourceTypeName,
    pub primary_storage_uuid: String,
    pub host_uuid: String,
    pub size: u64,
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Uuids of the snapshot trees built on top of a volume
    async fn snapshot_tree_uuids_of_volume(&self, volume_uuid: &str) -> CascadeResult<Vec<String>>;

    /// Parentless hypervisor snapshot of a tree; `None` for storage-origin trees
    async fn root_hypervisor_snapshot_of_tree(
        &self,
        tree_uuid: &str,
    ) -> CascadeResult<Option<VolumeSnapshotInventory>>;

    async fn snapshots_of_volumes(
        &self,
        volume_uuids: &[String],
    ) -> CascadeResult<Vec<VolumeSnapshotInventory>>;
}

#[async_trait]
pub trait ComputeRepository: Send + Sync {
    async fn find_host(&self, uuid: &str) -> CascadeResult<Option<HostInventory>>;

    async fn find_primary_storage(&self, uuid: &str)
        -> CascadeResult<Option<PrimaryStorageInventory>>;

    async fn find_vm_instance(&self, uuid: &str) -> CascadeResult<Option<VmInstanceInventory>>;

    async fn find_volume(&self, uuid: &str) -> CascadeResult<Option<VolumeInventory>>;

    async fn vm_instances_on_hosts(
        &self,
        host_uuids: &[String],
    ) -> CascadeResult<Vec<VmInstanceInventory>>;

    async fn volumes_on_primary_storages(
        &self,
        primary_storage_uuids: &[String],
    ) -> CascadeResult<Vec<VolumeInventory>>;
}

#[async_trait]
pub trait LocalStorageRepository: Send + Sync {
    /// First primary storage of `storage_type` attached to the cluster
    async fn primary_storage_in_cluster(
        &self,
        cluster_uuid: &str,
        storage_type: &str,
    ) -> CascadeResult<Option<String>>;

    /// Local primary storage the host contributes capacity to
    async fn local_storage_of_host(&self, host_uuid: &str) -> CascadeResult<Option<String>>;

    async fn find_resource_ref(
        &self,
        resource_uuid: &str,
    ) -> CascadeResult<Option<LocalStorageResourceRef>>;

    /// Uuids of VMs whose root volume lives on `host_uuid` of the local storage
    async fn vm_uuids_with_root_volume_on_host(
        &self,
        primary_storage_uuid: &str,
        host_uuid: &str,
    ) -> CascadeResult<Vec<String>>;

    async fn data_volume_uuids_on_host(
        &self,
        primary_storage_uuid: &str,
        host_uuid: &str,
    ) -> CascadeResult<Vec<String>>;
}

#[async_trait]
pub trait PurgeRepository: Send + Sync {
    /// Remove soft-deleted rows of a resource type, returning how many went
    async fn purge_deleted(&self, resource_type: &ResourceTypeName) -> CascadeResult<u64>;
}

/// Every query the cascade core issues
pub trait CascadeRepository:
    SnapshotRepository + ComputeRepository + LocalStorageRepository + PurgeRepository
{
}

impl<T> CascadeRepository for T where
    T: SnapshotRepository + ComputeRepository + LocalStorageRepository + PurgeRepository
{
}
