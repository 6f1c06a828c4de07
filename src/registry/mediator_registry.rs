use std::sync::Arc;
use tracing::info;

use super::capability_key::CapabilityKey;
use super::extension_registry::ExtensionRegistry;
use crate::error::CascadeResult;
use crate::local_storage::LocalStorageBackupStorageMediator;

pub const MEDIATOR_REGISTRY: &str = "backup storage mediator";

/// Backup storage mediators keyed by `{hypervisor type}-{backup storage type}`
pub struct BackupStorageMediatorRegistry {
    mediators: ExtensionRegistry<dyn LocalStorageBackupStorageMediator>,
}

impl BackupStorageMediatorRegistry {
    pub fn make_mediator_key(hypervisor_type: &str, backup_storage_type: &str) -> CapabilityKey {
        CapabilityKey::new([hypervisor_type, backup_storage_type])
    }

    /// Registers one key per supported hypervisor; any collision fails
    pub fn from_mediators(
        mediators: impl IntoIterator<Item = Arc<dyn LocalStorageBackupStorageMediator>>,
    ) -> CascadeResult<Self> {
        let mut builder =
            ExtensionRegistry::<dyn LocalStorageBackupStorageMediator>::builder(MEDIATOR_REGISTRY);
        for mediator in mediators {
            let backup_storage_type = mediator.supported_backup_storage_type();
            for hypervisor_type in mediator.supported_hypervisor_types() {
                builder.register(
                    Self::make_mediator_key(&hypervisor_type, &backup_storage_type),
                    Arc::clone(&mediator),
                )?;
            }
        }
        let mediators = builder.build();
        info!(keys = mediators.len(), "Backup storage mediator registry built");
        Ok(Self { mediators })
    }

    pub fn backup_storage_mediator(
        &self,
        hypervisor_type: &str,
        backup_storage_type: &str,
    ) -> CascadeResult<Arc<dyn LocalStorageBackupStorageMediator>> {
        self.mediators
            .lookup(&Self::make_mediator_key(hypervisor_type, backup_storage_type))
    }

    pub fn len(&self) -> usize {
        self.mediators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mediators.is_empty()
    }
}

impl Default for BackupStorageMediatorRegistry {
    fn default() -> Self {
        Self {
            mediators: ExtensionRegistry::builder(MEDIATOR_REGISTRY).build(),
        }
    }
}

impl std::fmt::Debug for BackupStorageMediatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupStorageMediatorRegistry")
            .field("mediators", &self.mediators)
            .finish()
    }
}
