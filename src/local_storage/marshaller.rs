use async_trait::async_trait;
use std::sync::Arc;

use super::flows::{
    LocalStorageAllocateCapacityFlow, LocalStorageAllocateCapacityForAttachingVolumeFlow,
    LocalStorageKvmMigrateVmFlow,
};
use crate::constants::{flows, hypervisors, storage_types};
use crate::error::{CascadeError, CascadeResult};
use crate::flow::{Flow, MarshalVmOperationFlowExtension, VmInstanceSpec, VmOperation};
use crate::messaging::MessagingFabric;
use crate::models::VolumeStatus;
use crate::repository::CascadeRepository;

/// Splices local storage steps into VM pipelines whose disks live, or will
/// live, on a host's local disks
pub struct LocalStorageFlowMarshaller {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
}

impl LocalStorageFlowMarshaller {
    pub fn new(repository: Arc<dyn CascadeRepository>, fabric: Arc<dyn MessagingFabric>) -> Self {
        Self { repository, fabric }
    }

    async fn local_storage_in_cluster(&self, cluster_uuid: &str) -> CascadeResult<Option<String>> {
        self.repository
            .primary_storage_in_cluster(cluster_uuid, storage_types::LOCAL_STORAGE)
            .await
    }

    async fn is_root_volume_on_local_storage(&self, spec: &VmInstanceSpec) -> CascadeResult<bool> {
        match &spec.vm_inventory.root_volume_uuid {
            Some(root_volume_uuid) => Ok(self
                .repository
                .find_resource_ref(root_volume_uuid)
                .await?
                .is_some()),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl MarshalVmOperationFlowExtension for LocalStorageFlowMarshaller {
    fn name(&self) -> &str {
        "LocalStorageFlowMarshaller"
    }

    async fn marshal_vm_operation_flow(
        &self,
        _previous_flow: Option<&str>,
        next_flow: &str,
        spec: &VmInstanceSpec,
    ) -> CascadeResult<Option<Arc<dyn Flow>>> {
        let operation = spec.current_vm_operation;

        if next_flow == flows::VM_ALLOCATE_PRIMARY_STORAGE {
            if operation != VmOperation::NewCreate {
                return Ok(None);
            }
            let Some(host) = &spec.dest_host else {
                return Ok(None);
            };
            if self.local_storage_in_cluster(&host.cluster_uuid).await?.is_some() {
                return Ok(Some(Arc::new(LocalStorageAllocateCapacityFlow::new(
                    Arc::clone(&self.repository),
                    Arc::clone(&self.fabric),
                ))));
            }
        } else if operation == VmOperation::AttachVolume {
            let Some(volume) = spec.dest_data_volumes.first() else {
                return Ok(None);
            };
            if volume.status == VolumeStatus::NotInstantiated
                && next_flow == flows::VM_ALLOCATE_PRIMARY_STORAGE_FOR_ATTACHING_DISK
                && self.is_root_volume_on_local_storage(spec).await?
            {
                return Ok(Some(Arc::new(
                    LocalStorageAllocateCapacityForAttachingVolumeFlow::new(
                        Arc::clone(&self.repository),
                        Arc::clone(&self.fabric),
                    ),
                )));
            }
        } else if operation == VmOperation::Migrate
            && next_flow == flows::VM_MIGRATE_ON_HYPERVISOR
            && self.is_root_volume_on_local_storage(spec).await?
        {
            let hypervisor_type = &spec.vm_inventory.hypervisor_type;
            if hypervisor_type == hypervisors::KVM {
                return Ok(Some(Arc::new(LocalStorageKvmMigrateVmFlow::new(
                    Arc::clone(&self.repository),
                    Arc::clone(&self.fabric),
                ))));
            }
            return Err(CascadeError::veto(format!(
                "local storage doesn't support live migration for hypervisor[{hypervisor_type}]"
            )));
        }

        Ok(None)
    }
}
