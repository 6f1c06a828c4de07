//! # In-Memory Inventory
//!
//! DashMap-backed implementation of every repository trait, used by tests,
//! benchmarks and local development. Query results are sorted by uuid so they
//! do not depend on map iteration order.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;

use super::{
    ComputeRepository, LocalStorageRepository, LocalStorageResourceRef, PurgeRepository,
    SnapshotRepository,
};
use crate::constants::{resource_types, storage_types};
use crate::error::CascadeResult;
use crate::models::{
    HostInventory, PrimaryStorageInventory, ResourceTypeName, VmInstanceInventory,
    VolumeInventory, VolumeSnapshotInventory, VolumeSnapshotType, VolumeType,
};

#[derive(Debug, Default)]
pub struct InMemoryInventory {
    hosts: DashMap<String, HostInventory>,
    primary_storages: DashMap<String, PrimaryStorageInventory>,
    vm_instances: DashMap<String, VmInstanceInventory>,
    volumes: DashMap<String, VolumeInventory>,
    snapshots: DashMap<String, VolumeSnapshotInventory>,
    /// tree uuid -> volume uuid
    snapshot_trees: DashMap<String, Option<String>>,
    /// host uuid -> local primary storage uuid
    local_storage_hosts: DashMap<String, String>,
    resource_refs: DashMap<String, LocalStorageResourceRef>,
    /// uuid -> resource type of soft-deleted rows
    soft_deleted: DashMap<String, ResourceTypeName>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(&self, host: HostInventory) {
        self.hosts.insert(host.uuid.clone(), host);
    }

    pub fn add_primary_storage(&self, primary_storage: PrimaryStorageInventory) {
        self.primary_storages
            .insert(primary_storage.uuid.clone(), primary_storage);
    }

    pub fn add_vm_instance(&self, vm: VmInstanceInventory) {
        self.vm_instances.insert(vm.uuid.clone(), vm);
    }

    pub fn add_volume(&self, volume: VolumeInventory) {
        self.volumes.insert(volume.uuid.clone(), volume);
    }

    /// Adds the snapshot and registers its tree if unknown
    pub fn add_snapshot(&self, snapshot: VolumeSnapshotInventory) {
        self.snapshot_trees
            .entry(snapshot.tree_uuid.clone())
            .or_insert_with(|| snapshot.volume_uuid.clone());
        self.snapshots.insert(snapshot.uuid.clone(), snapshot);
    }

    pub fn add_snapshot_tree(&self, tree_uuid: &str, volume_uuid: Option<&str>) {
        self.snapshot_trees
            .insert(tree_uuid.to_string(), volume_uuid.map(String::from));
    }

    /// Attach a host to a local primary storage
    pub fn add_local_storage_host(&self, primary_storage_uuid: &str, host_uuid: &str) {
        self.local_storage_hosts
            .insert(host_uuid.to_string(), primary_storage_uuid.to_string());
    }

    pub fn add_resource_ref(&self, resource_ref: LocalStorageResourceRef) {
        self.resource_refs
            .insert(resource_ref.resource_uuid.clone(), resource_ref);
    }

    pub fn remove_resource_ref(&self, resource_uuid: &str) {
        self.resource_refs.remove(resource_uuid);
    }

    pub fn mark_soft_deleted(&self, resource_type: ResourceTypeName, uuid: &str) {
        self.soft_deleted.insert(uuid.to_string(), resource_type);
    }

    pub fn soft_deleted_count(&self, resource_type: &ResourceTypeName) -> usize {
        self.soft_deleted
            .iter()
            .filter(|entry| entry.value() == resource_type)
            .count()
    }

    fn volumes_on_host(
        &self,
        primary_storage_uuid: &str,
        host_uuid: &str,
        volume_type: VolumeType,
    ) -> Vec<VolumeInventory> {
        let mut volumes: Vec<VolumeInventory> = self
            .resource_refs
            .iter()
            .filter(|r| {
                r.resource_type == resource_types::VOLUME
                    && r.primary_storage_uuid == primary_storage_uuid
                    && r.host_uuid == host_uuid
            })
            .filter_map(|r| self.volumes.get(&r.resource_uuid).map(|v| v.value().clone()))
            .filter(|v| v.volume_type == volume_type)
            .collect();
        volumes.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        volumes
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryInventory {
    async fn snapshot_tree_uuids_of_volume(&self, volume_uuid: &str) -> CascadeResult<Vec<String>> {
        let trees: BTreeSet<String> = self
            .snapshot_trees
            .iter()
            .filter(|entry| entry.value().as_deref() == Some(volume_uuid))
            .map(|entry| entry.key().clone())
            .collect();
        Ok(trees.into_iter().collect())
    }

    async fn root_hypervisor_snapshot_of_tree(
        &self,
        tree_uuid: &str,
    ) -> CascadeResult<Option<VolumeSnapshotInventory>> {
        Ok(self
            .snapshots
            .iter()
            .find(|s| {
                s.tree_uuid == tree_uuid
                    && s.parent_uuid.is_none()
                    && s.snapshot_type == VolumeSnapshotType::Hypervisor
            })
            .map(|s| s.value().clone()))
    }

    async fn snapshots_of_volumes(
        &self,
        volume_uuids: &[String],
    ) -> CascadeResult<Vec<VolumeSnapshotInventory>> {
        let mut snapshots: Vec<VolumeSnapshotInventory> = self
            .snapshots
            .iter()
            .filter(|s| {
                s.volume_uuid
                    .as_ref()
                    .is_some_and(|volume| volume_uuids.contains(volume))
            })
            .map(|s| s.value().clone())
            .collect();
        snapshots.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        Ok(snapshots)
    }
}

#[async_trait]
impl ComputeRepository for InMemoryInventory {
    async fn find_host(&self, uuid: &str) -> CascadeResult<Option<HostInventory>> {
        Ok(self.hosts.get(uuid).map(|h| h.value().clone()))
    }

    async fn find_primary_storage(
        &self,
        uuid: &str,
    ) -> CascadeResult<Option<PrimaryStorageInventory>> {
        Ok(self.primary_storages.get(uuid).map(|p| p.value().clone()))
    }

    async fn find_vm_instance(&self, uuid: &str) -> CascadeResult<Option<VmInstanceInventory>> {
        Ok(self.vm_instances.get(uuid).map(|v| v.value().clone()))
    }

    async fn find_volume(&self, uuid: &str) -> CascadeResult<Option<VolumeInventory>> {
        Ok(self.volumes.get(uuid).map(|v| v.value().clone()))
    }

    async fn vm_instances_on_hosts(
        &self,
        host_uuids: &[String],
    ) -> CascadeResult<Vec<VmInstanceInventory>> {
        let mut vms: Vec<VmInstanceInventory> = self
            .vm_instances
            .iter()
            .filter(|vm| {
                vm.host_uuid
                    .as_ref()
                    .is_some_and(|host| host_uuids.contains(host))
            })
            .map(|vm| vm.value().clone())
            .collect();
        vms.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        Ok(vms)
    }

    async fn volumes_on_primary_storages(
        &self,
        primary_storage_uuids: &[String],
    ) -> CascadeResult<Vec<VolumeInventory>> {
        let mut volumes: Vec<VolumeInventory> = self
            .volumes
            .iter()
            .filter(|vol| {
                vol.primary_storage_uuid
                    .as_ref()
                    .is_some_and(|ps| primary_storage_uuids.contains(ps))
            })
            .map(|vol| vol.value().clone())
            .collect();
        volumes.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        Ok(volumes)
    }
}

#[async_trait]
impl LocalStorageRepository for InMemoryInventory {
    async fn primary_storage_in_cluster(
        &self,
        cluster_uuid: &str,
        storage_type: &str,
    ) -> CascadeResult<Option<String>> {
        let matching: BTreeSet<String> = self
            .primary_storages
            .iter()
            .filter(|ps| {
                ps.storage_type == storage_type
                    && ps.attached_cluster_uuids.iter().any(|c| c == cluster_uuid)
            })
            .map(|ps| ps.uuid.clone())
            .collect();
        Ok(matching.into_iter().next())
    }

    async fn local_storage_of_host(&self, host_uuid: &str) -> CascadeResult<Option<String>> {
        Ok(self
            .local_storage_hosts
            .get(host_uuid)
            .map(|ps| ps.value().clone())
            .filter(|ps| {
                self.primary_storages
                    .get(ps)
                    .map_or(true, |inv| inv.storage_type == storage_types::LOCAL_STORAGE)
            }))
    }

    async fn find_resource_ref(
        &self,
        resource_uuid: &str,
    ) -> CascadeResult<Option<LocalStorageResourceRef>> {
        Ok(self.resource_refs.get(resource_uuid).map(|r| r.value().clone()))
    }

    async fn vm_uuids_with_root_volume_on_host(
        &self,
        primary_storage_uuid: &str,
        host_uuid: &str,
    ) -> CascadeResult<Vec<String>> {
        Ok(self
            .volumes_on_host(primary_storage_uuid, host_uuid, VolumeType::Root)
            .into_iter()
            .filter_map(|volume| volume.vm_instance_uuid)
            .collect())
    }

    async fn data_volume_uuids_on_host(
        &self,
        primary_storage_uuid: &str,
        host_uuid: &str,
    ) -> CascadeResult<Vec<String>> {
        Ok(self
            .volumes_on_host(primary_storage_uuid, host_uuid, VolumeType::Data)
            .into_iter()
            .map(|volume| volume.uuid)
            .collect())
    }
}

#[async_trait]
impl PurgeRepository for InMemoryInventory {
    async fn purge_deleted(&self, resource_type: &ResourceTypeName) -> CascadeResult<u64> {
        let mut purged = 0u64;
        self.soft_deleted.retain(|_, kind| {
            let keep = kind != resource_type;
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }
}
