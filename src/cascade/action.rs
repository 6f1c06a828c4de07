use serde::{Deserialize, Serialize};
use std::fmt;

use crate::completion::AggregationPolicy;
use crate::error::{CascadeError, CascadeResult};
use crate::models::{
    HostInventory, InventoryRecord, PrimaryStorageInventory, ResourceTypeName,
    VmInstanceInventory, VolumeInventory, VolumeSnapshotInventory,
};

/// Lifecycle operation propagated through the cascade graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCode {
    CheckDeletable,
    Delete,
    ForceDelete,
    Cleanup,
}

impl ActionCode {
    pub const DELETION_CODES: [ActionCode; 2] = [ActionCode::Delete, ActionCode::ForceDelete];

    /// Only deletion codes derive child actions
    pub fn is_deletion(&self) -> bool {
        Self::DELETION_CODES.contains(self)
    }

    /// How branch failures fold into the parent outcome
    pub fn aggregation_policy(&self) -> AggregationPolicy {
        match self {
            Self::Delete | Self::CheckDeletable => AggregationPolicy::FailFast,
            Self::ForceDelete | Self::Cleanup => AggregationPolicy::BestEffort,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckDeletable => "deletion.check",
            Self::Delete => "deletion.delete",
            Self::ForceDelete => "deletion.forceDelete",
            Self::Cleanup => "deletion.cleanup",
        }
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle action on its way through the cascade graph.
///
/// Every record of `parent_issuer_context` is an inventory of the
/// `parent_issuer` type; construction rejects anything else. Actions are
/// immutable once built; each hop derives a fresh copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeAction {
    action_code: ActionCode,
    parent_issuer: ResourceTypeName,
    parent_issuer_context: Vec<InventoryRecord>,
    root_issuer: Option<ResourceTypeName>,
}

impl CascadeAction {
    pub fn new(
        action_code: ActionCode,
        parent_issuer: ResourceTypeName,
        parent_issuer_context: Vec<InventoryRecord>,
    ) -> CascadeResult<Self> {
        let action = Self {
            action_code,
            parent_issuer,
            parent_issuer_context,
            root_issuer: None,
        };
        action.validate()?;
        Ok(action)
    }

    /// Check the parent context invariant
    pub fn validate(&self) -> CascadeResult<()> {
        match self
            .parent_issuer_context
            .iter()
            .find(|record| record.resource_type() != self.parent_issuer)
        {
            Some(record) => Err(CascadeError::malformed(format!(
                "parent issuer is {} but context holds {}[uuid:{}]",
                self.parent_issuer,
                record.resource_type(),
                record.uuid()
            ))),
            None => Ok(()),
        }
    }

    /// Copy with a new parent issuer and context; action code and root issuer carry over
    pub fn derive(
        &self,
        parent_issuer: ResourceTypeName,
        parent_issuer_context: Vec<InventoryRecord>,
    ) -> CascadeResult<Self> {
        let derived = Self {
            action_code: self.action_code,
            parent_issuer,
            parent_issuer_context,
            root_issuer: self.root_issuer.clone(),
        };
        derived.validate()?;
        Ok(derived)
    }

    pub(crate) fn with_root_issuer(mut self, root_issuer: ResourceTypeName) -> Self {
        self.root_issuer = Some(root_issuer);
        self
    }

    pub fn action_code(&self) -> ActionCode {
        self.action_code
    }

    pub fn is_action_code(&self, codes: &[ActionCode]) -> bool {
        codes.contains(&self.action_code)
    }

    pub fn parent_issuer(&self) -> &ResourceTypeName {
        &self.parent_issuer
    }

    pub fn parent_issuer_context(&self) -> &[InventoryRecord] {
        &self.parent_issuer_context
    }

    /// Unset until the engine accepts the action
    pub fn root_issuer(&self) -> Option<&ResourceTypeName> {
        self.root_issuer.as_ref()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostInventory> {
        self.parent_issuer_context.iter().filter_map(InventoryRecord::as_host)
    }

    pub fn primary_storages(&self) -> impl Iterator<Item = &PrimaryStorageInventory> {
        self.parent_issuer_context
            .iter()
            .filter_map(InventoryRecord::as_primary_storage)
    }

    pub fn vm_instances(&self) -> impl Iterator<Item = &VmInstanceInventory> {
        self.parent_issuer_context
            .iter()
            .filter_map(InventoryRecord::as_vm_instance)
    }

    pub fn volumes(&self) -> impl Iterator<Item = &VolumeInventory> {
        self.parent_issuer_context.iter().filter_map(InventoryRecord::as_volume)
    }

    pub fn volume_snapshots(&self) -> impl Iterator<Item = &VolumeSnapshotInventory> {
        self.parent_issuer_context
            .iter()
            .filter_map(InventoryRecord::as_volume_snapshot)
    }
}
