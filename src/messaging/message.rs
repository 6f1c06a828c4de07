//! # Messages
//!
//! Addressed messages and replies exchanged with the owning services. Every
//! message carries the resource uuid its partition was derived from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::services;
use crate::error::ErrorDetail;

/// Payload of an addressed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// Physically delete a snapshot; with `volume_deletion` the whole chain
    /// goes because its volume is being deleted
    VolumeSnapshotDeletion {
        snapshot_uuid: String,
        tree_uuid: String,
        volume_uuid: Option<String>,
        volume_deletion: bool,
    },
    DestroyVmInstance {
        vm_instance_uuid: String,
    },
    DeleteVolume {
        volume_uuid: String,
        detach_before_deleting: bool,
    },
    RemoveHostFromLocalStorage {
        primary_storage_uuid: String,
        host_uuid: String,
    },
    LocalStorageReturnHostCapacity {
        primary_storage_uuid: String,
        host_uuid: String,
        size: u64,
    },
    AllocatePrimaryStorage {
        required_host_uuid: String,
        required_primary_storage_uuid: Option<String>,
        size: u64,
    },
    ReturnPrimaryStorageCapacity {
        primary_storage_uuid: String,
        host_uuid: Option<String>,
        size: u64,
    },
    LocalStorageMigrateVm {
        vm_instance_uuid: String,
        primary_storage_uuid: String,
        src_host_uuid: String,
        dest_host_uuid: String,
    },
}

impl MessageBody {
    /// Service that owns the resource this message mutates
    pub fn service(&self) -> &'static str {
        match self {
            Self::VolumeSnapshotDeletion { .. } => services::VOLUME_SNAPSHOT,
            Self::DestroyVmInstance { .. } => services::VM_INSTANCE,
            Self::DeleteVolume { .. } => services::VOLUME,
            Self::RemoveHostFromLocalStorage { .. }
            | Self::LocalStorageReturnHostCapacity { .. }
            | Self::AllocatePrimaryStorage { .. }
            | Self::ReturnPrimaryStorageCapacity { .. }
            | Self::LocalStorageMigrateVm { .. } => services::PRIMARY_STORAGE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::VolumeSnapshotDeletion { .. } => "VolumeSnapshotDeletionMsg",
            Self::DestroyVmInstance { .. } => "DestroyVmInstanceMsg",
            Self::DeleteVolume { .. } => "DeleteVolumeMsg",
            Self::RemoveHostFromLocalStorage { .. } => "RemoveHostFromLocalStorageMsg",
            Self::LocalStorageReturnHostCapacity { .. } => "LocalStorageReturnHostCapacityMsg",
            Self::AllocatePrimaryStorage { .. } => "AllocatePrimaryStorageMsg",
            Self::ReturnPrimaryStorageCapacity { .. } => "ReturnPrimaryStorageCapacityMsg",
            Self::LocalStorageMigrateVm { .. } => "LocalStorageMigrateVmMsg",
        }
    }
}

/// Message routed to one logical worker of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressedMessage {
    pub id: Uuid,
    /// `{service}.{partition}`
    pub service_id: String,
    /// Partition key; all messages about this resource share a worker
    pub resource_uuid: String,
    pub created_at: DateTime<Utc>,
    pub body: MessageBody,
}

impl AddressedMessage {
    pub fn service(&self) -> &'static str {
        self.body.service()
    }
}

/// Reply to an addressed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl MessageReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: ErrorDetail) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Error detail of a failed reply, synthesized when the sender left it empty
    pub fn error_detail(&self) -> Option<ErrorDetail> {
        if self.success {
            return None;
        }
        Some(
            self.error
                .clone()
                .unwrap_or_else(|| ErrorDetail::operation_failure("remote operation failed")),
        )
    }

    pub fn into_result(self) -> Result<(), ErrorDetail> {
        match self.error_detail() {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_routes_to_owning_service() {
        let body = MessageBody::DestroyVmInstance {
            vm_instance_uuid: "vm-1".to_string(),
        };
        assert_eq!(body.service(), services::VM_INSTANCE);
        assert_eq!(body.name(), "DestroyVmInstanceMsg");
    }

    #[test]
    fn test_body_serializes_with_type_tag() {
        let body = MessageBody::DeleteVolume {
            volume_uuid: "vol-1".to_string(),
            detach_before_deleting: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "delete_volume");
        assert_eq!(json["detach_before_deleting"], true);
    }

    #[test]
    fn test_failed_reply_without_detail_gets_one() {
        let reply = MessageReply {
            success: false,
            error: None,
        };
        assert!(reply.into_result().is_err());
        assert!(MessageReply::ok().into_result().is_ok());
    }
}
