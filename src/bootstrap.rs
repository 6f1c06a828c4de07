//! # Cascade System Bootstrap
//!
//! Wires a validated configuration, a messaging fabric and a repository into a
//! running cascade system:
//!
//! - builds the cascade extension and backup storage mediator registries,
//!   failing fast on duplicate capability keys
//! - creates the cascade engine bound to the current tokio runtime
//! - assembles the flow marshal dispatcher in registration order
//! - creates the local storage lifecycle hooks
//!
//! Registries are frozen once bootstrap returns.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

use crate::cascade::{
    CascadeAction, CascadeEngine, CascadeExtension, VmInstanceCascadeExtension, VolumeCascadeExtension,
    VolumeSnapshotCascadeExtension,
};
use crate::config::{CascadeConfig, ConfigManager};
use crate::error::CascadeResult;
use crate::flow::{FlowMarshalDispatcher, MarshalVmOperationFlowExtension};
use crate::local_storage::{
    LocalStorageBackupStorageMediator, LocalStorageFlowMarshaller, LocalStorageHooks,
};
use crate::messaging::MessagingFabric;
use crate::registry::{BackupStorageMediatorRegistry, CascadeExtensionRegistry};
use crate::repository::CascadeRepository;

/// Everything plugins contribute at startup
#[derive(Default)]
pub struct ExtensionCatalog {
    pub cascade_extensions: Vec<Arc<dyn CascadeExtension>>,
    pub mediators: Vec<Arc<dyn LocalStorageBackupStorageMediator>>,
    pub flow_marshallers: Vec<Arc<dyn MarshalVmOperationFlowExtension>>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot, VM and volume cascade extensions plus the local storage
    /// flow marshaller
    pub fn with_builtin(
        repository: &Arc<dyn CascadeRepository>,
        fabric: &Arc<dyn MessagingFabric>,
    ) -> Self {
        Self::new()
            .cascade_extension(Arc::new(VolumeSnapshotCascadeExtension::new(
                Arc::clone(repository),
                Arc::clone(fabric),
            )))
            .cascade_extension(Arc::new(VmInstanceCascadeExtension::new(
                Arc::clone(repository),
                Arc::clone(fabric),
            )))
            .cascade_extension(Arc::new(VolumeCascadeExtension::new(
                Arc::clone(repository),
                Arc::clone(fabric),
            )))
            .flow_marshaller(Arc::new(LocalStorageFlowMarshaller::new(
                Arc::clone(repository),
                Arc::clone(fabric),
            )))
    }

    pub fn cascade_extension(mut self, extension: Arc<dyn CascadeExtension>) -> Self {
        self.cascade_extensions.push(extension);
        self
    }

    pub fn mediator(mut self, mediator: Arc<dyn LocalStorageBackupStorageMediator>) -> Self {
        self.mediators.push(mediator);
        self
    }

    pub fn flow_marshaller(mut self, marshaller: Arc<dyn MarshalVmOperationFlowExtension>) -> Self {
        self.flow_marshallers.push(marshaller);
        self
    }
}

/// Handle to a bootstrapped cascade system
pub struct CascadeSystem {
    pub config: CascadeConfig,
    pub fabric: Arc<dyn MessagingFabric>,
    pub repository: Arc<dyn CascadeRepository>,
    pub engine: Arc<CascadeEngine>,
    pub mediators: Arc<BackupStorageMediatorRegistry>,
    pub dispatcher: Arc<FlowMarshalDispatcher>,
    pub local_storage: Arc<LocalStorageHooks>,
}

impl CascadeSystem {
    /// Build the system from explicit parts.
    ///
    /// When called inside a tokio runtime the engine keeps that runtime's
    /// handle, so `async_cascade` also works from non-runtime threads later.
    pub fn bootstrap(
        config: CascadeConfig,
        fabric: Arc<dyn MessagingFabric>,
        repository: Arc<dyn CascadeRepository>,
        catalog: ExtensionCatalog,
    ) -> CascadeResult<Self> {
        config.validate()?;

        let ExtensionCatalog {
            cascade_extensions,
            mediators,
            flow_marshallers,
        } = catalog;

        let registry = Arc::new(CascadeExtensionRegistry::from_extensions(cascade_extensions)?);
        let mediators = Arc::new(BackupStorageMediatorRegistry::from_mediators(mediators)?);
        let dispatcher = Arc::new(FlowMarshalDispatcher::new(flow_marshallers));

        let engine = match Handle::try_current() {
            Ok(handle) => CascadeEngine::with_runtime(registry, handle),
            Err(_) => CascadeEngine::new(registry),
        };

        let local_storage = Arc::new(LocalStorageHooks::new(
            Arc::clone(&repository),
            Arc::clone(&fabric),
            &config.completion,
        ));

        info!(
            environment = %config.environment,
            fabric = fabric.provider_name(),
            cascade_extensions = engine.registry().len(),
            mediators = mediators.len(),
            flow_marshallers = dispatcher.len(),
            "Cascade system bootstrapped"
        );

        Ok(Self {
            config,
            fabric,
            repository,
            engine: Arc::new(engine),
            mediators,
            dispatcher,
            local_storage,
        })
    }

    /// Bootstrap with the built-in extensions, loading configuration through
    /// [`ConfigManager`]
    pub fn bootstrap_default(
        config_manager: &ConfigManager,
        fabric: Arc<dyn MessagingFabric>,
        repository: Arc<dyn CascadeRepository>,
    ) -> CascadeResult<Self> {
        let catalog = ExtensionCatalog::with_builtin(&repository, &fabric);
        Self::bootstrap(config_manager.config().clone(), fabric, repository, catalog)
    }

    /// Blocking cascade bounded by `completion.default_timeout_ms`.
    ///
    /// Same threading constraint as [`CascadeEngine::sync_cascade`].
    pub fn sync_cascade(&self, action: CascadeAction) -> CascadeResult<()> {
        self.engine
            .sync_cascade(action, self.config.completion.default_timeout())
    }
}

impl std::fmt::Debug for CascadeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeSystem")
            .field("environment", &self.config.environment)
            .field("fabric", &self.fabric.provider_name())
            .field("cascade_extensions", &self.engine.registry().len())
            .field("mediators", &self.mediators.len())
            .field("flow_marshallers", &self.dispatcher.len())
            .finish()
    }
}
