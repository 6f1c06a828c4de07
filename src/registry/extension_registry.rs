//! # Extension Registry
//!
//! Write-once registry of pluggable strategy objects. Entries are collected
//! through an [`ExtensionRegistryBuilder`] during startup; building it freezes
//! the set, after which lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::capability_key::CapabilityKey;
use crate::error::{CascadeError, CascadeResult};
use crate::logging::log_registry_operation;

/// Collects registrations and rejects duplicate keys
pub struct ExtensionRegistryBuilder<E: ?Sized> {
    name: &'static str,
    entries: Vec<(CapabilityKey, Arc<E>)>,
    index: HashMap<CapabilityKey, usize>,
}

impl<E: ?Sized> ExtensionRegistryBuilder<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn register(&mut self, key: CapabilityKey, extension: Arc<E>) -> CascadeResult<()> {
        if self.index.contains_key(&key) {
            log_registry_operation(self.name, key.as_str(), "DUPLICATE", None);
            return Err(CascadeError::DuplicateCapability {
                registry: self.name.to_string(),
                key: key.to_string(),
            });
        }
        log_registry_operation(self.name, key.as_str(), "REGISTERED", None);
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, extension));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> ExtensionRegistry<E> {
        debug!(
            registry = self.name,
            entries = self.entries.len(),
            "Extension registry frozen"
        );
        ExtensionRegistry {
            name: self.name,
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Immutable capability-keyed registry; iteration follows registration order
pub struct ExtensionRegistry<E: ?Sized> {
    name: &'static str,
    entries: Vec<(CapabilityKey, Arc<E>)>,
    index: HashMap<CapabilityKey, usize>,
}

impl<E: ?Sized> ExtensionRegistry<E> {
    pub fn builder(name: &'static str) -> ExtensionRegistryBuilder<E> {
        ExtensionRegistryBuilder::new(name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &CapabilityKey) -> Option<&Arc<E>> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// A missing key is a configuration fault
    pub fn lookup(&self, key: &CapabilityKey) -> CascadeResult<Arc<E>> {
        self.get(key)
            .cloned()
            .ok_or_else(|| CascadeError::CapabilityNotFound {
                registry: self.name.to_string(),
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CapabilityKey, &Arc<E>)> {
        self.entries.iter().map(|(k, e)| (k, e))
    }

    pub fn keys(&self) -> impl Iterator<Item = &CapabilityKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: ?Sized> std::fmt::Debug for ExtensionRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("name", &self.name)
            .field("keys", &self.entries.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}
