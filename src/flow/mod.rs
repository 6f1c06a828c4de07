//! # Flow Pipeline
//!
//! VM operations run as an ordered chain of named steps ("flows"). Before each
//! step the chain asks the [`FlowMarshalDispatcher`] whether a storage or
//! hypervisor plugin wants to splice in a specialized step instead, or to
//! refuse the operation outright.

pub mod chain;
pub mod dispatcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::CascadeResult;
use crate::models::{HostInventory, VmInstanceInventory, VolumeInventory};

pub use chain::FlowChain;
pub use dispatcher::{FlowMarshalDispatcher, MarshalVmOperationFlowExtension};

/// Kind of VM operation a pipeline is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmOperation {
    NewCreate,
    Start,
    Stop,
    Reboot,
    Migrate,
    AttachVolume,
    DetachVolume,
    Destroy,
}

/// Operation context shared by every step of a VM pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInstanceSpec {
    pub current_vm_operation: VmOperation,
    pub vm_inventory: VmInstanceInventory,
    pub dest_host: Option<HostInventory>,
    #[serde(default)]
    pub dest_data_volumes: Vec<VolumeInventory>,
    #[serde(default)]
    pub root_disk_size: u64,
    #[serde(default)]
    pub data_disk_sizes: Vec<u64>,
}

impl VmInstanceSpec {
    pub fn new(current_vm_operation: VmOperation, vm_inventory: VmInstanceInventory) -> Self {
        Self {
            current_vm_operation,
            vm_inventory,
            dest_host: None,
            dest_data_volumes: Vec::new(),
            root_disk_size: 0,
            data_disk_sizes: Vec::new(),
        }
    }

    pub fn with_dest_host(mut self, host: HostInventory) -> Self {
        self.dest_host = Some(host);
        self
    }

    pub fn with_dest_data_volumes(mut self, volumes: Vec<VolumeInventory>) -> Self {
        self.dest_data_volumes = volumes;
        self
    }

    pub fn with_disk_sizes(mut self, root_disk_size: u64, data_disk_sizes: Vec<u64>) -> Self {
        self.root_disk_size = root_disk_size;
        self.data_disk_sizes = data_disk_sizes;
        self
    }

    /// Saturates at `u64::MAX` instead of wrapping
    pub fn total_disk_size(&self) -> u64 {
        self.data_disk_sizes
            .iter()
            .fold(self.root_disk_size, |total, size| total.saturating_add(*size))
    }
}

/// Mutable state threaded through a chain run
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub spec: VmInstanceSpec,
    data: HashMap<String, Value>,
}

impl FlowContext {
    pub fn new(spec: VmInstanceSpec) -> Self {
        Self {
            spec,
            data: HashMap::new(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(Value::as_u64)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }
}

/// One named step of a VM operation pipeline
#[async_trait]
pub trait Flow: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self, context: &mut FlowContext) -> CascadeResult<()>;

    /// Undo `run` after a later step failed
    async fn rollback(&self, context: &mut FlowContext) -> CascadeResult<()> {
        let _ = context;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> VmInstanceSpec {
        VmInstanceSpec::new(
            VmOperation::NewCreate,
            VmInstanceInventory {
                uuid: "vm-1".to_string(),
                name: "vm-1".to_string(),
                hypervisor_type: "KVM".to_string(),
                host_uuid: None,
                cluster_uuid: None,
                root_volume_uuid: Some("root-1".to_string()),
                all_volumes: Vec::new(),
            },
        )
    }

    #[test]
    fn test_total_disk_size_sums_root_and_data_disks() {
        let spec = spec().with_disk_sizes(100, vec![20, 30]);
        assert_eq!(spec.total_disk_size(), 150);
    }

    #[test]
    fn test_total_disk_size_saturates() {
        let spec = spec().with_disk_sizes(u64::MAX - 5, vec![10, u64::MAX]);
        assert_eq!(spec.total_disk_size(), u64::MAX);
    }
}
