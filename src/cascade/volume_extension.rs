use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::action::{ActionCode, CascadeAction};
use super::extension::{fold_replies, purge_soft_deleted, CascadeExtension};
use crate::completion::CompletionResult;
use crate::constants::resource_types;
use crate::error::CascadeResult;
use crate::messaging::{MessageBody, MessagingFabric};
use crate::models::{InventoryRecord, ResourceTypeName, VolumeInventory};
use crate::repository::CascadeRepository;

/// Deletes the volumes living on deleted primary storages
pub struct VolumeCascadeExtension {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
}

impl VolumeCascadeExtension {
    pub fn new(repository: Arc<dyn CascadeRepository>, fabric: Arc<dyn MessagingFabric>) -> Self {
        Self { repository, fabric }
    }

    async fn volumes_from_action(&self, action: &CascadeAction) -> CascadeResult<Vec<VolumeInventory>> {
        let issuer = action.parent_issuer();
        if issuer == &resource_types::PRIMARY_STORAGE {
            let ps_uuids: Vec<String> = action.primary_storages().map(|ps| ps.uuid.clone()).collect();
            if ps_uuids.is_empty() {
                return Ok(Vec::new());
            }
            self.repository.volumes_on_primary_storages(&ps_uuids).await
        } else if issuer == &resource_types::VOLUME {
            Ok(action.volumes().cloned().collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn handle_deletion(&self, action: &CascadeAction) -> CompletionResult {
        let volumes = self.volumes_from_action(action).await?;
        if volumes.is_empty() {
            return Ok(());
        }

        debug!(count = volumes.len(), issuer = %action.parent_issuer(), "Deleting volumes");
        let msgs = volumes
            .iter()
            .map(|volume| {
                self.fabric.make_target(
                    MessageBody::DeleteVolume {
                        volume_uuid: volume.uuid.clone(),
                        detach_before_deleting: true,
                    },
                    &volume.uuid,
                )
            })
            .collect();
        let replies = self.fabric.send_batch(msgs).await;
        fold_replies(action.action_code(), &replies)
    }
}

#[async_trait]
impl CascadeExtension for VolumeCascadeExtension {
    fn cascade_resource_name(&self) -> ResourceTypeName {
        resource_types::VOLUME
    }

    fn edge_names(&self) -> Vec<ResourceTypeName> {
        vec![resource_types::PRIMARY_STORAGE]
    }

    async fn cascade(&self, action: &CascadeAction) -> CompletionResult {
        match action.action_code() {
            ActionCode::CheckDeletable => Ok(()),
            ActionCode::Delete | ActionCode::ForceDelete => self.handle_deletion(action).await,
            ActionCode::Cleanup => {
                purge_soft_deleted(self.repository.as_ref(), &resource_types::VOLUME).await
            }
        }
    }

    async fn create_action_for_child_resource(
        &self,
        action: &CascadeAction,
    ) -> CascadeResult<Option<CascadeAction>> {
        if !action.action_code().is_deletion()
            || action.parent_issuer() != &resource_types::PRIMARY_STORAGE
        {
            return Ok(None);
        }

        let volumes = self.volumes_from_action(action).await?;
        if volumes.is_empty() {
            return Ok(None);
        }
        let context = volumes.into_iter().map(InventoryRecord::from).collect();
        Ok(Some(action.derive(self.cascade_resource_name(), context)?))
    }
}
