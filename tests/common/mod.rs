//! Shared fixtures for integration tests.
//!
//! `Harness` wires the built-in extensions over an in-memory inventory and an
//! in-memory fabric; the builder functions create inventory records with
//! sensible defaults.

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use cascade_core::bootstrap::{CascadeSystem, ExtensionCatalog};
use cascade_core::config::CascadeConfig;
use cascade_core::constants::{hypervisors, resource_types, storage_types};
use cascade_core::error::ErrorDetail;
use cascade_core::messaging::{InMemoryFabric, MessageReply, MessagingFabric};
use cascade_core::models::{
    HostInventory, PrimaryStorageInventory, VmInstanceInventory, VolumeInventory,
    VolumeSnapshotInventory, VolumeSnapshotType, VolumeStatus, VolumeType,
};
use cascade_core::repository::{CascadeRepository, InMemoryInventory, LocalStorageResourceRef};

pub struct Harness {
    pub inventory: Arc<InMemoryInventory>,
    pub fabric: Arc<InMemoryFabric>,
    pub system: CascadeSystem,
}

impl Harness {
    /// Built-in catalog; must be called inside a tokio runtime
    pub fn new() -> Self {
        Self::with_catalog(|repository, fabric| ExtensionCatalog::with_builtin(repository, fabric))
    }

    pub fn with_catalog<F>(build: F) -> Self
    where
        F: FnOnce(&Arc<dyn CascadeRepository>, &Arc<dyn MessagingFabric>) -> ExtensionCatalog,
    {
        Self::with_config_and_catalog(CascadeConfig::default(), build)
    }

    /// Built-in catalog under `config`
    pub fn with_config(config: CascadeConfig) -> Self {
        Self::with_config_and_catalog(config, |repository, fabric| {
            ExtensionCatalog::with_builtin(repository, fabric)
        })
    }

    pub fn with_config_and_catalog<F>(config: CascadeConfig, build: F) -> Self
    where
        F: FnOnce(&Arc<dyn CascadeRepository>, &Arc<dyn MessagingFabric>) -> ExtensionCatalog,
    {
        let inventory = Arc::new(InMemoryInventory::new());
        let fabric = Arc::new(InMemoryFabric::default());
        let repository: Arc<dyn CascadeRepository> = inventory.clone();
        let dyn_fabric: Arc<dyn MessagingFabric> = fabric.clone();

        let catalog = build(&repository, &dyn_fabric);
        let system = CascadeSystem::bootstrap(config, dyn_fabric, repository, catalog)
            .expect("bootstrap should succeed");

        Self {
            inventory,
            fabric,
            system,
        }
    }

    pub fn repository(&self) -> Arc<dyn CascadeRepository> {
        self.inventory.clone()
    }

    pub fn dyn_fabric(&self) -> Arc<dyn MessagingFabric> {
        self.fabric.clone()
    }

    /// Every message to `service` fails with `description`
    pub fn fail_service(&self, service: &str, description: &'static str) {
        self.fabric.set_handler(service, move |_| {
            MessageReply::failure(ErrorDetail::operation_failure(description))
        });
    }
}

pub fn host(uuid: &str, cluster_uuid: &str) -> HostInventory {
    HostInventory {
        uuid: uuid.to_string(),
        name: format!("host-{uuid}"),
        cluster_uuid: cluster_uuid.to_string(),
        hypervisor_type: hypervisors::KVM.to_string(),
    }
}

pub fn primary_storage(uuid: &str, storage_type: &str, cluster_uuid: &str) -> PrimaryStorageInventory {
    PrimaryStorageInventory {
        uuid: uuid.to_string(),
        name: format!("ps-{uuid}"),
        storage_type: storage_type.to_string(),
        attached_cluster_uuids: vec![cluster_uuid.to_string()],
    }
}

pub fn local_storage(uuid: &str, cluster_uuid: &str) -> PrimaryStorageInventory {
    primary_storage(uuid, storage_types::LOCAL_STORAGE, cluster_uuid)
}

pub fn vm(uuid: &str, host_uuid: &str, root_volume_uuid: &str) -> VmInstanceInventory {
    VmInstanceInventory {
        uuid: uuid.to_string(),
        name: format!("vm-{uuid}"),
        hypervisor_type: hypervisors::KVM.to_string(),
        host_uuid: Some(host_uuid.to_string()),
        cluster_uuid: None,
        root_volume_uuid: Some(root_volume_uuid.to_string()),
        all_volumes: Vec::new(),
    }
}

pub fn volume(
    uuid: &str,
    vm_uuid: Option<&str>,
    primary_storage_uuid: Option<&str>,
    volume_type: VolumeType,
) -> VolumeInventory {
    VolumeInventory {
        uuid: uuid.to_string(),
        name: format!("volume-{uuid}"),
        vm_instance_uuid: vm_uuid.map(String::from),
        primary_storage_uuid: primary_storage_uuid.map(String::from),
        volume_type,
        status: VolumeStatus::Ready,
        size: 1024,
    }
}

pub fn snapshot(
    uuid: &str,
    volume_uuid: &str,
    tree_uuid: &str,
    parent_uuid: Option<&str>,
    snapshot_type: VolumeSnapshotType,
) -> VolumeSnapshotInventory {
    VolumeSnapshotInventory {
        uuid: uuid.to_string(),
        name: format!("snapshot-{uuid}"),
        volume_uuid: Some(volume_uuid.to_string()),
        tree_uuid: tree_uuid.to_string(),
        parent_uuid: parent_uuid.map(String::from),
        snapshot_type,
    }
}

pub fn volume_ref(volume: &VolumeInventory, primary_storage_uuid: &str, host_uuid: &str) -> LocalStorageResourceRef {
    LocalStorageResourceRef {
        resource_uuid: volume.uuid.clone(),
        resource_type: resource_types::VOLUME,
        primary_storage_uuid: primary_storage_uuid.to_string(),
        host_uuid: host_uuid.to_string(),
        size: volume.size,
    }
}
