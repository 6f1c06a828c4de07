//! # Local Storage Lifecycle Hooks
//!
//! Reactions of the local storage backend to host, volume and VM lifecycle
//! events. `pre_*` hooks veto by returning [`CascadeError::Veto`]; the
//! others act through the messaging fabric and only log remote failures.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::completion::Completion;
use crate::config::CompletionConfig;
use crate::constants::storage_types;
use crate::error::{CascadeError, CascadeResult};
use crate::messaging::{AddressedMessage, MessageBody, MessagingFabric, MessagingFabricExt};
use crate::models::{HostInventory, VmInstanceInventory, VolumeInventory, VolumeStatus};
use crate::repository::CascadeRepository;

/// What happens to running VMs when their host enters maintenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostMaintenancePolicy {
    MigrateVm,
    StopVm,
}

pub struct LocalStorageHooks {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
    host_teardown_timeout: Duration,
}

impl LocalStorageHooks {
    pub fn new(
        repository: Arc<dyn CascadeRepository>,
        fabric: Arc<dyn MessagingFabric>,
        completion: &CompletionConfig,
    ) -> Self {
        Self {
            repository,
            fabric,
            host_teardown_timeout: completion.host_teardown_timeout(),
        }
    }

    pub fn with_host_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.host_teardown_timeout = timeout;
        self
    }

    async fn is_local_storage(&self, primary_storage_uuid: &str) -> CascadeResult<bool> {
        Ok(self
            .repository
            .find_primary_storage(primary_storage_uuid)
            .await?
            .is_some_and(|ps| ps.storage_type == storage_types::LOCAL_STORAGE))
    }

    /// Send a batch, log each failed reply and wait for the whole batch
    /// within the host teardown budget
    async fn send_best_effort(
        &self,
        what: &'static str,
        uuids: Vec<String>,
        msgs: Vec<AddressedMessage>,
    ) -> CascadeResult<()> {
        let (completion, future) = Completion::future();
        self.fabric.send_batch_then(msgs, move |replies| {
            for (uuid, reply) in uuids.iter().zip(replies) {
                if let Some(error) = reply.error_detail() {
                    warn!(uuid = %uuid, error = %error, "Failed to {what}");
                }
            }
            completion.success();
        });

        future
            .wait(self.host_teardown_timeout)
            .await
            .into_result(what, self.host_teardown_timeout)
    }

    /// Destroy the VMs whose root volume sits on the host's local disks, then
    /// delete the data volumes stored there
    pub async fn before_delete_host(&self, host: &HostInventory) -> CascadeResult<()> {
        let Some(ps_uuid) = self.repository.local_storage_of_host(&host.uuid).await? else {
            return Ok(());
        };

        debug!(
            host_uuid = %host.uuid,
            primary_storage_uuid = %ps_uuid,
            "Host belongs to local storage, deleting its vms and volumes"
        );

        let vm_uuids = self
            .repository
            .vm_uuids_with_root_volume_on_host(&ps_uuid, &host.uuid)
            .await?;
        if !vm_uuids.is_empty() {
            let msgs = vm_uuids
                .iter()
                .map(|uuid| {
                    self.fabric.make_target(
                        MessageBody::DestroyVmInstance {
                            vm_instance_uuid: uuid.clone(),
                        },
                        uuid,
                    )
                })
                .collect();
            self.send_best_effort("destroy vm", vm_uuids, msgs).await?;
        }

        let volume_uuids = self
            .repository
            .data_volume_uuids_on_host(&ps_uuid, &host.uuid)
            .await?;
        if !volume_uuids.is_empty() {
            let msgs = volume_uuids
                .iter()
                .map(|uuid| {
                    self.fabric.make_target(
                        MessageBody::DeleteVolume {
                            volume_uuid: uuid.clone(),
                            detach_before_deleting: true,
                        },
                        uuid,
                    )
                })
                .collect();
            self.send_best_effort("delete data volume", volume_uuids, msgs)
                .await?;
        }

        Ok(())
    }

    pub async fn after_delete_host(&self, host: &HostInventory) -> CascadeResult<()> {
        let Some(ps_uuid) = self
            .repository
            .primary_storage_in_cluster(&host.cluster_uuid, storage_types::LOCAL_STORAGE)
            .await?
        else {
            return Ok(());
        };

        let msg = self.fabric.make_target(
            MessageBody::RemoveHostFromLocalStorage {
                primary_storage_uuid: ps_uuid.clone(),
                host_uuid: host.uuid.clone(),
            },
            &ps_uuid,
        );
        match self.fabric.send(msg).await.error_detail() {
            Some(error) => warn!(
                host_uuid = %host.uuid,
                primary_storage_uuid = %ps_uuid,
                error = %error,
                "Failed to remove host from local primary storage"
            ),
            None => debug!(
                host_uuid = %host.uuid,
                primary_storage_uuid = %ps_uuid,
                "Removed host from local primary storage"
            ),
        }
        Ok(())
    }

    /// Root and data volume must share a host when both are on local storage
    pub async fn pre_attach_volume(
        &self,
        vm: &VmInstanceInventory,
        volume: &VolumeInventory,
    ) -> CascadeResult<()> {
        let Some(root_volume_uuid) = &vm.root_volume_uuid else {
            return Ok(());
        };
        let root_ref = self.repository.find_resource_ref(root_volume_uuid).await?;
        let data_ref = self.repository.find_resource_ref(&volume.uuid).await?;

        if let (Some(root_ref), Some(data_ref)) = (root_ref, data_ref) {
            if root_ref.host_uuid != data_ref.host_uuid {
                return Err(CascadeError::veto(format!(
                    "cannot attach the data volume[uuid:{}] to the vm[uuid:{}]. Both vm's root volume and the data volume are \
                     on local primary storage, but they are on different hosts. The root volume[uuid:{}] is on the host[uuid:{}] \
                     but the data volume[uuid:{}] is on the host[uuid:{}]",
                    volume.uuid,
                    vm.uuid,
                    root_volume_uuid,
                    root_ref.host_uuid,
                    volume.uuid,
                    data_ref.host_uuid
                )));
            }
        }
        Ok(())
    }

    /// Drop ready volumes living on another host than the VM's root volume
    pub async fn attachable_volumes(
        &self,
        vm: &VmInstanceInventory,
        candidates: Vec<VolumeInventory>,
    ) -> CascadeResult<Vec<VolumeInventory>> {
        if !candidates.iter().any(|v| v.status == VolumeStatus::Ready) {
            return Ok(candidates);
        }
        let Some(root_volume_uuid) = &vm.root_volume_uuid else {
            return Ok(candidates);
        };
        let Some(root_ref) = self.repository.find_resource_ref(root_volume_uuid).await? else {
            return Ok(candidates);
        };

        let mut excluded = HashSet::new();
        for volume in candidates.iter().filter(|v| v.status == VolumeStatus::Ready) {
            if let Some(volume_ref) = self.repository.find_resource_ref(&volume.uuid).await? {
                if volume_ref.host_uuid != root_ref.host_uuid {
                    excluded.insert(volume.uuid.clone());
                }
            }
        }

        Ok(candidates
            .into_iter()
            .filter(|v| !excluded.contains(&v.uuid))
            .collect())
    }

    /// Keep only VMs whose root volume is on the host holding the volume
    pub async fn attachable_vms(
        &self,
        volume: &VolumeInventory,
        candidates: Vec<VmInstanceInventory>,
    ) -> CascadeResult<Vec<VmInstanceInventory>> {
        let Some(volume_ref) = self.repository.find_resource_ref(&volume.uuid).await? else {
            return Ok(candidates);
        };

        let mut attachable = Vec::with_capacity(candidates.len());
        for vm in candidates {
            let Some(root_volume_uuid) = &vm.root_volume_uuid else {
                continue;
            };
            let same_host = self
                .repository
                .find_resource_ref(root_volume_uuid)
                .await?
                .is_some_and(|root_ref| root_ref.host_uuid == volume_ref.host_uuid);
            if same_host {
                attachable.push(vm);
            }
        }
        Ok(attachable)
    }

    pub async fn host_maintenance_policy(
        &self,
        host: &HostInventory,
    ) -> CascadeResult<Option<HostMaintenancePolicy>> {
        Ok(self
            .repository
            .primary_storage_in_cluster(&host.cluster_uuid, storage_types::LOCAL_STORAGE)
            .await?
            .map(|_| HostMaintenancePolicy::StopVm))
    }

    /// Give the capacity of a deleted volume back to its host
    pub async fn after_delete_volume(&self, volume: &VolumeInventory) -> CascadeResult<()> {
        let Some(ps_uuid) = &volume.primary_storage_uuid else {
            return Ok(());
        };
        if volume.status != VolumeStatus::Deleted {
            return Ok(());
        }
        let Some(volume_ref) = self.repository.find_resource_ref(&volume.uuid).await? else {
            return Ok(());
        };

        let msg = self.fabric.make_target(
            MessageBody::LocalStorageReturnHostCapacity {
                primary_storage_uuid: ps_uuid.clone(),
                host_uuid: volume_ref.host_uuid.clone(),
                size: volume.size,
            },
            ps_uuid,
        );
        self.fabric.publish(msg).await;
        info!(
            volume_uuid = %volume.uuid,
            host_uuid = %volume_ref.host_uuid,
            size = volume.size,
            "Returned local storage capacity of deleted volume"
        );
        Ok(())
    }

    pub async fn pre_recover_data_volume(&self, volume: &VolumeInventory) -> CascadeResult<()> {
        let Some(ps_uuid) = &volume.primary_storage_uuid else {
            return Ok(());
        };
        if !self.is_local_storage(ps_uuid).await? {
            return Ok(());
        }
        if self.repository.find_resource_ref(&volume.uuid).await?.is_none() {
            return Err(CascadeError::veto(format!(
                "the data volume[name:{}, uuid:{}] is on the local storage[uuid:{}]; however, \
                 the host on which the data volume is has been deleted. Unable to recover this volume",
                volume.name, volume.uuid, ps_uuid
            )));
        }
        Ok(())
    }

    pub async fn pre_recover_vm(&self, vm: &VmInstanceInventory) -> CascadeResult<()> {
        let Some(root_volume_uuid) = &vm.root_volume_uuid else {
            return Ok(());
        };
        let Some(ps_uuid) = self
            .repository
            .find_volume(root_volume_uuid)
            .await?
            .and_then(|volume| volume.primary_storage_uuid)
        else {
            return Ok(());
        };
        if !self.is_local_storage(&ps_uuid).await? {
            return Ok(());
        }
        if self.repository.find_resource_ref(root_volume_uuid).await?.is_none() {
            return Err(CascadeError::veto(format!(
                "unable to recover the vm[uuid:{}, name:{}]. The vm's root volume is on the local \
                 storage[uuid:{}]; however, the host on which the root volume is has been deleted",
                vm.uuid, vm.name, ps_uuid
            )));
        }
        Ok(())
    }

    /// Live migration is refused while any volume of the VM is on local storage
    pub async fn pre_vm_migration(&self, vm: &VmInstanceInventory) -> CascadeResult<()> {
        for volume in &vm.all_volumes {
            let Some(ps_uuid) = &volume.primary_storage_uuid else {
                continue;
            };
            if self.is_local_storage(ps_uuid).await? {
                return Err(CascadeError::veto(format!(
                    "unable to live migrate with local storage. The vm[uuid:{}] has volumes on local storage, \
                     to protect your data, please stop the vm and do the volume migration",
                    vm.uuid
                )));
            }
        }
        Ok(())
    }
}
