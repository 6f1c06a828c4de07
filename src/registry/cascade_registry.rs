use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::capability_key::CapabilityKey;
use super::extension_registry::ExtensionRegistry;
use crate::cascade::CascadeExtension;
use crate::error::CascadeResult;
use crate::models::ResourceTypeName;

pub const CASCADE_REGISTRY: &str = "cascade";

/// Cascade extensions keyed by the resource type they own, with an index of
/// which extensions react to each parent issuer
pub struct CascadeExtensionRegistry {
    extensions: ExtensionRegistry<dyn CascadeExtension>,
    edges: HashMap<ResourceTypeName, Vec<Arc<dyn CascadeExtension>>>,
}

impl CascadeExtensionRegistry {
    /// Fails on two extensions owning the same resource type
    pub fn from_extensions(
        extensions: impl IntoIterator<Item = Arc<dyn CascadeExtension>>,
    ) -> CascadeResult<Self> {
        let mut builder = ExtensionRegistry::<dyn CascadeExtension>::builder(CASCADE_REGISTRY);
        let mut edges: HashMap<ResourceTypeName, Vec<Arc<dyn CascadeExtension>>> = HashMap::new();

        for extension in extensions {
            let own = extension.cascade_resource_name();
            builder.register(CapabilityKey::single(own.as_str()), Arc::clone(&extension))?;
            for edge in extension.edge_names() {
                let reacting = edges.entry(edge).or_default();
                // an edge listed twice must not produce two branches
                if !reacting
                    .iter()
                    .any(|existing| existing.cascade_resource_name() == own)
                {
                    reacting.push(Arc::clone(&extension));
                }
            }
        }

        let extensions = builder.build();
        info!(
            extensions = extensions.len(),
            edges = edges.len(),
            "Cascade extension registry built"
        );
        Ok(Self { extensions, edges })
    }

    pub fn lookup(&self, resource_type: &ResourceTypeName) -> CascadeResult<Arc<dyn CascadeExtension>> {
        self.extensions
            .lookup(&CapabilityKey::single(resource_type.as_str()))
    }

    /// Extensions declaring an edge to `resource_type`, in registration order
    pub fn all_matching_edge(&self, resource_type: &ResourceTypeName) -> &[Arc<dyn CascadeExtension>] {
        self.edges
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn resource_types(&self) -> Vec<ResourceTypeName> {
        self.extensions
            .keys()
            .map(|key| ResourceTypeName::new(key.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl std::fmt::Debug for CascadeExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeExtensionRegistry")
            .field("extensions", &self.extensions)
            .field("edges", &self.edges.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::CascadeAction;
    use crate::completion::CompletionResult;
    use crate::constants::resource_types;
    use async_trait::async_trait;

    struct EdgeOnly {
        own: ResourceTypeName,
        edges: Vec<ResourceTypeName>,
    }

    #[async_trait]
    impl CascadeExtension for EdgeOnly {
        fn cascade_resource_name(&self) -> ResourceTypeName {
            self.own.clone()
        }

        fn edge_names(&self) -> Vec<ResourceTypeName> {
            self.edges.clone()
        }

        async fn cascade(&self, _action: &CascadeAction) -> CompletionResult {
            Ok(())
        }

        async fn create_action_for_child_resource(
            &self,
            _action: &CascadeAction,
        ) -> CascadeResult<Option<CascadeAction>> {
            Ok(None)
        }
    }

    #[test]
    fn test_repeated_edge_indexes_extension_once() {
        let registry = CascadeExtensionRegistry::from_extensions(vec![
            Arc::new(EdgeOnly {
                own: resource_types::VM_INSTANCE,
                edges: vec![resource_types::HOST, resource_types::HOST],
            }) as Arc<dyn CascadeExtension>,
            Arc::new(EdgeOnly {
                own: resource_types::VOLUME,
                edges: vec![resource_types::HOST],
            }),
        ])
        .unwrap();

        let reacting: Vec<ResourceTypeName> = registry
            .all_matching_edge(&resource_types::HOST)
            .iter()
            .map(|extension| extension.cascade_resource_name())
            .collect();
        assert_eq!(reacting, vec![resource_types::VM_INSTANCE, resource_types::VOLUME]);
    }
}
