use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionResult;
use crate::error::CascadeResult;

/// Copy of bits between a backup storage and one host of a local storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitsTransfer {
    pub primary_storage_uuid: String,
    pub backup_storage_uuid: String,
    pub host_uuid: String,
    pub backup_storage_install_path: String,
    pub primary_storage_install_path: String,
}

/// Moves image bits between local storage and one backup storage type for a
/// set of hypervisor types. Each supported hypervisor yields one registry key.
#[async_trait]
pub trait LocalStorageBackupStorageMediator: Send + Sync + 'static {
    fn supported_backup_storage_type(&self) -> String;

    fn supported_hypervisor_types(&self) -> Vec<String>;

    async fn download_bits(&self, transfer: &BitsTransfer) -> CompletionResult;

    /// Returns the install path on the backup storage
    async fn upload_bits(&self, transfer: &BitsTransfer) -> CascadeResult<String>;
}
