//! # Registry Infrastructure
//!
//! Write-once registries of pluggable extensions, built during startup and
//! read without locking afterwards.
//!
//! ## Available Registries
//!
//! - **ExtensionRegistry**: generic capability-keyed registry with duplicate detection
//! - **CascadeExtensionRegistry**: cascade extensions by owned resource type, plus the edge index
//! - **BackupStorageMediatorRegistry**: local storage mediators by hypervisor and backup storage type
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! ├── ExtensionRegistryBuilder      (startup-time registration)
//! ├── ExtensionRegistry             (frozen lookup)
//! ├── CascadeExtensionRegistry      (lookup + all_matching_edge)
//! └── BackupStorageMediatorRegistry (hv-bs lookup)
//! ```

pub mod capability_key;
pub mod cascade_registry;
pub mod extension_registry;
pub mod mediator_registry;

pub use capability_key::CapabilityKey;
pub use cascade_registry::CascadeExtensionRegistry;
pub use extension_registry::{ExtensionRegistry, ExtensionRegistryBuilder};
pub use mediator_registry::BackupStorageMediatorRegistry;
