use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::action::{ActionCode, CascadeAction};
use super::extension::{fold_replies, purge_soft_deleted, CascadeExtension};
use crate::completion::CompletionResult;
use crate::constants::resource_types;
use crate::error::CascadeResult;
use crate::messaging::{AddressedMessage, MessageBody, MessagingFabric};
use crate::models::{InventoryRecord, ResourceTypeName, VolumeSnapshotInventory};
use crate::repository::CascadeRepository;

/// Cascades deletions from volumes and VMs down to volume snapshots
pub struct VolumeSnapshotCascadeExtension {
    repository: Arc<dyn CascadeRepository>,
    fabric: Arc<dyn MessagingFabric>,
}

impl VolumeSnapshotCascadeExtension {
    pub fn new(repository: Arc<dyn CascadeRepository>, fabric: Arc<dyn MessagingFabric>) -> Self {
        Self { repository, fabric }
    }

    fn make_msg(&self, snapshot: &VolumeSnapshotInventory, volume_deletion: bool) -> AddressedMessage {
        let resource_uuid = snapshot
            .volume_uuid
            .clone()
            .unwrap_or_else(|| snapshot.tree_uuid.clone());
        self.fabric.make_target(
            MessageBody::VolumeSnapshotDeletion {
                snapshot_uuid: snapshot.uuid.clone(),
                tree_uuid: snapshot.tree_uuid.clone(),
                volume_uuid: snapshot.volume_uuid.clone(),
                volume_deletion,
            },
            &resource_uuid,
        )
    }

    /// One message per chain whose base is a hypervisor snapshot. Deleting
    /// that base removes the whole chain; storage snapshot trees stay.
    async fn handle_volume_deletion(&self, volume_uuid: &str) -> CascadeResult<Vec<AddressedMessage>> {
        let mut msgs = Vec::new();
        for tree_uuid in self.repository.snapshot_tree_uuids_of_volume(volume_uuid).await? {
            match self
                .repository
                .root_hypervisor_snapshot_of_tree(&tree_uuid)
                .await?
            {
                Some(root) => msgs.push(self.make_msg(&root, true)),
                None => debug!(
                    tree_uuid = %tree_uuid,
                    volume_uuid = %volume_uuid,
                    "Storage snapshot tree, leaving it on primary storage"
                ),
            }
        }
        Ok(msgs)
    }

    async fn deletion_msgs(&self, action: &CascadeAction) -> CascadeResult<Vec<AddressedMessage>> {
        let issuer = action.parent_issuer();
        let mut msgs = Vec::new();

        if issuer == &resource_types::VOLUME {
            for volume in action.volumes() {
                msgs.extend(self.handle_volume_deletion(&volume.uuid).await?);
            }
        } else if issuer == &resource_types::VM_INSTANCE {
            for vm in action.vm_instances() {
                if let Some(root_volume_uuid) = &vm.root_volume_uuid {
                    msgs.extend(self.handle_volume_deletion(root_volume_uuid).await?);
                }
            }
        } else if issuer == &resource_types::VOLUME_SNAPSHOT {
            for snapshot in action.volume_snapshots() {
                if snapshot.is_chain_root() {
                    msgs.push(self.make_msg(snapshot, false));
                } else {
                    debug!(
                        snapshot_uuid = %snapshot.uuid,
                        "Non-root or storage snapshot, bookkeeping-only deletion"
                    );
                }
            }
        }

        Ok(msgs)
    }

    async fn handle_deletion(&self, action: &CascadeAction) -> CompletionResult {
        let msgs = self.deletion_msgs(action).await?;
        if msgs.is_empty() {
            return Ok(());
        }

        let replies = self.fabric.send_batch(msgs).await;
        fold_replies(action.action_code(), &replies)
    }

    async fn snapshots_from_action(
        &self,
        action: &CascadeAction,
    ) -> CascadeResult<Option<Vec<VolumeSnapshotInventory>>> {
        let issuer = action.parent_issuer();

        let volume_uuids: Vec<String> = if issuer == &resource_types::VOLUME {
            action.volumes().map(|vol| vol.uuid.clone()).collect()
        } else if issuer == &resource_types::VM_INSTANCE {
            action
                .vm_instances()
                .filter_map(|vm| vm.root_volume_uuid.clone())
                .collect()
        } else if issuer == &resource_types::VOLUME_SNAPSHOT {
            return Ok(Some(action.volume_snapshots().cloned().collect()));
        } else {
            return Ok(None);
        };

        if volume_uuids.is_empty() {
            return Ok(None);
        }

        let snapshots = self.repository.snapshots_of_volumes(&volume_uuids).await?;
        Ok((!snapshots.is_empty()).then_some(snapshots))
    }
}

#[async_trait]
impl CascadeExtension for VolumeSnapshotCascadeExtension {
    fn cascade_resource_name(&self) -> ResourceTypeName {
        resource_types::VOLUME_SNAPSHOT
    }

    fn edge_names(&self) -> Vec<ResourceTypeName> {
        vec![resource_types::VOLUME, resource_types::VM_INSTANCE]
    }

    async fn cascade(&self, action: &CascadeAction) -> CompletionResult {
        match action.action_code() {
            // no snapshot-level veto exists
            ActionCode::CheckDeletable => Ok(()),
            ActionCode::Delete | ActionCode::ForceDelete => self.handle_deletion(action).await,
            ActionCode::Cleanup => {
                purge_soft_deleted(self.repository.as_ref(), &resource_types::VOLUME_SNAPSHOT).await
            }
        }
    }

    async fn create_action_for_child_resource(
        &self,
        action: &CascadeAction,
    ) -> CascadeResult<Option<CascadeAction>> {
        if !action.action_code().is_deletion() {
            return Ok(None);
        }

        match self.snapshots_from_action(action).await? {
            Some(snapshots) => {
                let context = snapshots.into_iter().map(InventoryRecord::from).collect();
                Ok(Some(action.derive(self.cascade_resource_name(), context)?))
            }
            None => Ok(None),
        }
    }
}
