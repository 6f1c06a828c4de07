//! Local storage replacements for the generic VM pipeline steps.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::{flows, storage_types};
use crate::error::{CascadeError, CascadeResult};
use crate::flow::{Flow, FlowContext};
use crate::messaging::{MessageBody, MessagingFabric};
use crate::repository::CascadeRepository;

pub const ALLOCATED_PRIMARY_STORAGE_UUID: &str = "local_storage.allocated_primary_storage_uuid";
pub const ALLOCATED_HOST_UUID: &str = "local_storage.allocated_host_uuid";
pub const ALLOCATED_SIZE: &str = "local_storage.allocated_size";

async fn allocate_capacity(
    fabric: &dyn MessagingFabric,
    context: &mut FlowContext,
    primary_storage_uuid: &str,
    host_uuid: &str,
    size: u64,
) -> CascadeResult<()> {
    let msg = fabric.make_target(
        MessageBody::AllocatePrimaryStorage {
            required_host_uuid: host_uuid.to_string(),
            required_primary_storage_uuid: Some(primary_storage_uuid.to_string()),
            size,
        },
        primary_storage_uuid,
    );
    fabric.send(msg).await.into_result()?;

    info!(
        primary_storage_uuid,
        host_uuid, size, "Allocated capacity on local storage host"
    );
    context.put(ALLOCATED_PRIMARY_STORAGE_UUID, json!(primary_storage_uuid));
    context.put(ALLOCATED_HOST_UUID, json!(host_uuid));
    context.put(ALLOCATED_SIZE, json!(size));
    Ok(())
}

async fn return_capacity(fabric: &dyn MessagingFabric, context: &mut FlowContext) -> CascadeResult<()> {
    let (Some(primary_storage_uuid), Some(host_uuid), Some(size)) = (
        context.get_str(ALLOCATED_PRIMARY_STORAGE_UUID).map(String::from),
        context.get_str(ALLOCATED_HOST_UUID).map(String::from),
        context.get_u64(ALLOCATED_SIZE),
    ) else {
        return Ok(());
    };

    let msg = fabric.make_target(
        MessageBody::ReturnPrimaryStorageCapacity {
            primary_storage_uuid: primary_storage_uuid.clone(),
            host_uuid: Some(host_uuid),
            size,
        },
        &primary_storage_uuid,
    );
    fabric.send(msg).await.into_result()?;

    context.remove(ALLOCATED_PRIMARY_STORAGE_UUID);
    context.remove(ALLOCATED_HOST_UUID);
    context.remove(ALLOCATED_SIZE);
    Ok(())
}

/// Reserves root and data disk capacity on the destination host of a new VM
pub struct LocalStorageAllocateCapacityFlow {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
}

impl LocalStorageAllocateCapacityFlow {
    pub fn new(repository: Arc<dyn CascadeRepository>, fabric: Arc<dyn MessagingFabric>) -> Self {
        Self { repository, fabric }
    }
}

#[async_trait]
impl Flow for LocalStorageAllocateCapacityFlow {
    fn name(&self) -> &str {
        flows::LOCAL_STORAGE_ALLOCATE_CAPACITY
    }

    async fn run(&self, context: &mut FlowContext) -> CascadeResult<()> {
        let host = context.spec.dest_host.clone().ok_or_else(|| {
            CascadeError::configuration(self.name(), "destination host is not allocated")
        })?;
        let primary_storage_uuid = self
            .repository
            .primary_storage_in_cluster(&host.cluster_uuid, storage_types::LOCAL_STORAGE)
            .await?
            .ok_or_else(|| {
                CascadeError::configuration(
                    self.name(),
                    format!("cluster[uuid:{}] has no local storage", host.cluster_uuid),
                )
            })?;
        let size = context.spec.total_disk_size();
        allocate_capacity(self.fabric.as_ref(), context, &primary_storage_uuid, &host.uuid, size).await
    }

    async fn rollback(&self, context: &mut FlowContext) -> CascadeResult<()> {
        return_capacity(self.fabric.as_ref(), context).await
    }
}

/// Reserves capacity for a not yet instantiated data volume on the host that
/// holds the VM's root volume
pub struct LocalStorageAllocateCapacityForAttachingVolumeFlow {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
}

impl LocalStorageAllocateCapacityForAttachingVolumeFlow {
    pub fn new(repository: Arc<dyn CascadeRepository>, fabric: Arc<dyn MessagingFabric>) -> Self {
        Self { repository, fabric }
    }
}

#[async_trait]
impl Flow for LocalStorageAllocateCapacityForAttachingVolumeFlow {
    fn name(&self) -> &str {
        flows::LOCAL_STORAGE_ALLOCATE_CAPACITY_FOR_ATTACHING_VOLUME
    }

    async fn run(&self, context: &mut FlowContext) -> CascadeResult<()> {
        let volume = context.spec.dest_data_volumes.first().cloned().ok_or_else(|| {
            CascadeError::configuration(self.name(), "no data volume to attach")
        })?;
        let root_volume_uuid = context.spec.vm_inventory.root_volume_uuid.clone().ok_or_else(|| {
            CascadeError::configuration(self.name(), "vm has no root volume")
        })?;
        let root_ref = self
            .repository
            .find_resource_ref(&root_volume_uuid)
            .await?
            .ok_or_else(|| {
                CascadeError::configuration(
                    self.name(),
                    format!("root volume[uuid:{root_volume_uuid}] is not on local storage"),
                )
            })?;

        debug!(
            volume_uuid = %volume.uuid,
            host_uuid = %root_ref.host_uuid,
            "Placing attaching volume next to the root volume"
        );
        allocate_capacity(
            self.fabric.as_ref(),
            context,
            &root_ref.primary_storage_uuid,
            &root_ref.host_uuid,
            volume.size,
        )
        .await
    }

    async fn rollback(&self, context: &mut FlowContext) -> CascadeResult<()> {
        return_capacity(self.fabric.as_ref(), context).await
    }
}

/// Migrates a KVM VM together with its local disks
pub struct LocalStorageKvmMigrateVmFlow {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
}

impl LocalStorageKvmMigrateVmFlow {
    pub fn new(repository: Arc<dyn CascadeRepository>, fabric: Arc<dyn MessagingFabric>) -> Self {
        Self { repository, fabric }
    }
}

#[async_trait]
impl Flow for LocalStorageKvmMigrateVmFlow {
    fn name(&self) -> &str {
        flows::LOCAL_STORAGE_KVM_MIGRATE_VM
    }

    async fn run(&self, context: &mut FlowContext) -> CascadeResult<()> {
        let vm = &context.spec.vm_inventory;
        let dest_host = context.spec.dest_host.as_ref().ok_or_else(|| {
            CascadeError::configuration(self.name(), "destination host is not allocated")
        })?;
        let src_host_uuid = vm.host_uuid.clone().ok_or_else(|| {
            CascadeError::configuration(self.name(), format!("vm[uuid:{}] is not on a host", vm.uuid))
        })?;
        let root_volume_uuid = vm.root_volume_uuid.as_deref().unwrap_or_default();
        let root_ref = self
            .repository
            .find_resource_ref(root_volume_uuid)
            .await?
            .ok_or_else(|| {
                CascadeError::configuration(
                    self.name(),
                    format!("root volume of vm[uuid:{}] is not on local storage", vm.uuid),
                )
            })?;

        let msg = self.fabric.make_target(
            MessageBody::LocalStorageMigrateVm {
                vm_instance_uuid: vm.uuid.clone(),
                primary_storage_uuid: root_ref.primary_storage_uuid.clone(),
                src_host_uuid,
                dest_host_uuid: dest_host.uuid.clone(),
            },
            &root_ref.primary_storage_uuid,
        );
        self.fabric.send(msg).await.into_result()?;
        Ok(())
    }
}
