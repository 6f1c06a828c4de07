#![allow(clippy::doc_markdown)] // Allow technical terms like VolumeSnapshotVO in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Cascade Core Rust
//!
//! Orchestration core for cascading lifecycle operations across dependent
//! infrastructure resources (hosts, primary storage, VM instances, volumes,
//! volume snapshots).
//!
//! ## Overview
//!
//! Deleting a host must delete the VMs on it; deleting a VM must delete its
//! volumes' snapshots; and so on. Each resource type plugs in a
//! [`CascadeExtension`] that declares which parent types it reacts to. The
//! [`CascadeEngine`] walks that graph, fans out concurrently to every
//! dependent, and aggregates the outcomes according to the action's
//! strictness (`Delete` fails fast, `ForceDelete` always succeeds).
//!
//! Around the engine sit:
//!
//! - a flow pipeline whose steps storage plugins may replace or veto
//! - local storage lifecycle hooks and capacity flows
//! - capability-keyed registries with duplicate detection at startup
//! - a messaging fabric abstraction with partitioned addressing
//!
//! ## Module Organization
//!
//! - [`cascade`] - Actions, extensions and the propagation engine
//! - [`completion`] - Completions, barriers and the blocking bridge
//! - [`flow`] - VM operation pipelines and flow marshaling
//! - [`local_storage`] - Local storage flows, hooks and mediators
//! - [`messaging`] - Messaging fabric contract and in-memory provider
//! - [`registry`] - Write-once extension registries
//! - [`repository`] - Inventory lookups used by extensions
//! - [`bootstrap`] - Startup wiring
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cascade_core::bootstrap::{CascadeSystem, ExtensionCatalog};
//! use cascade_core::cascade::{ActionCode, CascadeAction};
//! use cascade_core::config::CascadeConfig;
//! use cascade_core::constants::resource_types;
//! use cascade_core::messaging::{InMemoryFabric, MessagingFabric};
//! use cascade_core::repository::{CascadeRepository, InMemoryInventory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fabric: Arc<dyn MessagingFabric> = Arc::new(InMemoryFabric::default());
//! let repository: Arc<dyn CascadeRepository> = Arc::new(InMemoryInventory::new());
//! let catalog = ExtensionCatalog::with_builtin(&repository, &fabric);
//! let system = CascadeSystem::bootstrap(CascadeConfig::default(), fabric, repository, catalog)?;
//!
//! let action = CascadeAction::new(ActionCode::Delete, resource_types::HOST, vec![])?;
//! system.engine.cascade(action).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod bootstrap;
pub mod cascade;
pub mod completion;
pub mod config;
pub mod constants;
pub mod error;
pub mod flow;
pub mod local_storage;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod registry;
pub mod repository;

pub use bootstrap::{CascadeSystem, ExtensionCatalog};
pub use cascade::{ActionCode, CascadeAction, CascadeEngine, CascadeExtension};
pub use completion::{AggregationPolicy, Completion, CompletionResult, FutureCompletion, Outcome};
pub use config::{CascadeConfig, ConfigManager};
pub use error::{CascadeError, CascadeResult, ErrorDetail, ErrorKind};
pub use flow::{FlowChain, FlowContext, FlowMarshalDispatcher, VmInstanceSpec, VmOperation};
pub use messaging::{InMemoryFabric, MessagingFabric};
pub use models::{InventoryRecord, ResourceTypeName};
