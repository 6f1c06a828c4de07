use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::action::{ActionCode, CascadeAction};
use super::extension::{fold_replies, purge_soft_deleted, CascadeExtension};
use crate::completion::CompletionResult;
use crate::constants::resource_types;
use crate::error::CascadeResult;
use crate::messaging::{MessageBody, MessagingFabric};
use crate::models::{InventoryRecord, ResourceTypeName, VmInstanceInventory};
use crate::repository::CascadeRepository;

/// Destroys the VMs running on deleted hosts
pub struct VmInstanceCascadeExtension {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
}

impl VmInstanceCascadeExtension {
    pub fn new(repository: Arc<dyn CascadeRepository>, fabric: Arc<dyn MessagingFabric>) -> Self {
        Self { repository, fabric }
    }

    async fn vm_instances_from_action(
        &self,
        action: &CascadeAction,
    ) -> CascadeResult<Vec<VmInstanceInventory>> {
        let issuer = action.parent_issuer();
        if issuer == &resource_types::HOST {
            let host_uuids: Vec<String> = action.hosts().map(|host| host.uuid.clone()).collect();
            if host_uuids.is_empty() {
                return Ok(Vec::new());
            }
            self.repository.vm_instances_on_hosts(&host_uuids).await
        } else if issuer == &resource_types::VM_INSTANCE {
            Ok(action.vm_instances().cloned().collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn handle_deletion(&self, action: &CascadeAction) -> CompletionResult {
        let vms = self.vm_instances_from_action(action).await?;
        if vms.is_empty() {
            return Ok(());
        }

        debug!(count = vms.len(), issuer = %action.parent_issuer(), "Destroying VM instances");
        let msgs = vms
            .iter()
            .map(|vm| {
                self.fabric.make_target(
                    MessageBody::DestroyVmInstance {
                        vm_instance_uuid: vm.uuid.clone(),
                    },
                    &vm.uuid,
                )
            })
            .collect();
        let replies = self.fabric.send_batch(msgs).await;
        fold_replies(action.action_code(), &replies)
    }
}

#[async_trait]
impl CascadeExtension for VmInstanceCascadeExtension {
    fn cascade_resource_name(&self) -> ResourceTypeName {
        resource_types::VM_INSTANCE
    }

    fn edge_names(&self) -> Vec<ResourceTypeName> {
        vec![resource_types::HOST]
    }

    async fn cascade(&self, action: &CascadeAction) -> CompletionResult {
        match action.action_code() {
            ActionCode::CheckDeletable => Ok(()),
            ActionCode::Delete | ActionCode::ForceDelete => self.handle_deletion(action).await,
            ActionCode::Cleanup => {
                purge_soft_deleted(self.repository.as_ref(), &resource_types::VM_INSTANCE).await
            }
        }
    }

    async fn create_action_for_child_resource(
        &self,
        action: &CascadeAction,
    ) -> CascadeResult<Option<CascadeAction>> {
        if !action.action_code().is_deletion() || action.parent_issuer() != &resource_types::HOST {
            return Ok(None);
        }

        let vms = self.vm_instances_from_action(action).await?;
        if vms.is_empty() {
            return Ok(None);
        }
        let context = vms.into_iter().map(InventoryRecord::from).collect();
        Ok(Some(action.derive(self.cascade_resource_name(), context)?))
    }
}
