//! # Cascade Engine
//!
//! Walks the dependency graph of resource types for one root action.
//!
//! For the current issuer every extension with a matching edge becomes a
//! branch. All child actions are derived first; a derivation error fails the
//! cascade before anything runs. Branches then run concurrently, each one
//! recursing into its own dependents before invoking its handler, and their
//! outcomes fold into the parent through a [`CompletionBarrier`] whose policy
//! comes from the action code.
//!
//! ```text
//! Dispatched -> PerBranchFanout -> Aggregating -> Resolved
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::action::{ActionCode, CascadeAction};
use super::extension::CascadeExtension;
use crate::completion::{AggregationPolicy, Completion, CompletionBarrier, CompletionResult};
use crate::error::{CascadeError, CascadeResult, ErrorDetail};
use crate::logging::log_cascade_operation;
use crate::models::ResourceTypeName;
use crate::registry::CascadeExtensionRegistry;

/// (resource type, action code) pairs on the current ancestry path
type VisitPath = Arc<Vec<(ResourceTypeName, ActionCode)>>;

#[derive(Debug, Clone)]
pub struct CascadeEngine {
    registry: Arc<CascadeExtensionRegistry>,
    runtime: Option<Handle>,
}

impl CascadeEngine {
    /// Captures the current tokio runtime, if any, for [`CascadeEngine::async_cascade`]
    pub fn new(registry: Arc<CascadeExtensionRegistry>) -> Self {
        Self {
            registry,
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn with_runtime(registry: Arc<CascadeExtensionRegistry>, runtime: Handle) -> Self {
        Self {
            registry,
            runtime: Some(runtime),
        }
    }

    pub fn registry(&self) -> &Arc<CascadeExtensionRegistry> {
        &self.registry
    }

    /// Run a root action to completion
    pub async fn cascade(&self, action: CascadeAction) -> CompletionResult {
        let root = action.parent_issuer().clone();
        let code = action.action_code();
        log_cascade_operation("cascade", root.as_str(), code.as_str(), "DISPATCHED", None);

        if let Err(error) = action.validate() {
            log_cascade_operation(
                "cascade",
                root.as_str(),
                code.as_str(),
                "RESOLVED",
                Some("malformed root action"),
            );
            return Err(error.to_error_detail());
        }

        let action = Arc::new(action.with_root_issuer(root.clone()));
        let path: VisitPath = Arc::new(vec![(root.clone(), code)]);
        let result = Self::cascade_dependents(Arc::clone(&self.registry), action, path).await;

        let status = if result.is_ok() { "SUCCESS" } else { "FAILED" };
        log_cascade_operation("cascade", root.as_str(), code.as_str(), "RESOLVED", Some(status));
        result
    }

    /// Cascade to the dependents, then run the handler of the extension
    /// owning the root resource type itself, if one is registered
    pub async fn cascade_full(&self, action: CascadeAction) -> CompletionResult {
        let owner = self.registry.lookup(action.parent_issuer()).ok();
        let root_action = action.clone().with_root_issuer(action.parent_issuer().clone());
        let code = action.action_code();

        if let Err(error) = self.cascade(action).await {
            match code.aggregation_policy() {
                AggregationPolicy::FailFast => return Err(error),
                AggregationPolicy::BestEffort => warn!(
                    action_code = %code,
                    error = %error,
                    "Ignoring dependent failure before handling the root"
                ),
            }
        }

        match owner {
            Some(owner) => owner.cascade(&root_action).await,
            None => Ok(()),
        }
    }

    /// Callback form; runs the cascade on a spawned task
    pub fn async_cascade(&self, action: CascadeAction, completion: Completion) {
        let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok());
        let Some(runtime) = runtime else {
            completion.fail(ErrorDetail::internal(
                "no tokio runtime available to run the cascade",
            ));
            return;
        };
        let engine = self.clone();
        runtime.spawn(async move {
            let result = engine.cascade(action).await;
            completion.resolve(result);
        });
    }

    /// Blocking form bounded by `timeout`.
    ///
    /// Occupies the calling thread for the whole wait, so it must not be
    /// called from a runtime worker thread.
    pub fn sync_cascade(&self, action: CascadeAction, timeout: Duration) -> CascadeResult<()> {
        let (completion, future) = Completion::future();
        self.async_cascade(action, completion);
        future.await_blocking(timeout).into_result("cascade", timeout)
    }

    fn cascade_dependents(
        registry: Arc<CascadeExtensionRegistry>,
        action: Arc<CascadeAction>,
        path: VisitPath,
    ) -> BoxFuture<'static, CompletionResult> {
        async move {
            let issuer = action.parent_issuer().clone();
            let code = action.action_code();

            let extensions: Vec<Arc<dyn CascadeExtension>> = registry
                .all_matching_edge(&issuer)
                .iter()
                .filter(|extension| {
                    let visited = path.contains(&(extension.cascade_resource_name(), code));
                    if visited {
                        warn!(
                            issuer = %issuer,
                            extension = %extension.cascade_resource_name(),
                            action_code = %code,
                            "Skipping extension already on the cascade path"
                        );
                    }
                    !visited
                })
                .cloned()
                .collect();

            if extensions.is_empty() {
                debug!(issuer = %issuer, action_code = %code, "No dependents, resolving");
                return Ok(());
            }

            log_cascade_operation(
                "cascade",
                issuer.as_str(),
                code.as_str(),
                "PER_BRANCH_FANOUT",
                None,
            );

            let mut branches = Vec::with_capacity(extensions.len());
            for extension in extensions {
                let child = Self::derive_child(extension.as_ref(), &action)
                    .await
                    .map_err(|error| error.to_error_detail())?;
                branches.push((extension, child));
            }

            let (parent, aggregated) = Completion::channel();
            let children = CompletionBarrier::split_labeled(
                "cascade",
                parent,
                branches.len(),
                code.aggregation_policy(),
            );

            for ((extension, child), completion) in branches.into_iter().zip(children) {
                let registry = Arc::clone(&registry);
                let action = Arc::clone(&action);
                let path = Arc::clone(&path);
                tokio::spawn(async move {
                    let result = Self::run_branch(registry, extension, action, child, path).await;
                    completion.resolve(result);
                });
            }

            log_cascade_operation("cascade", issuer.as_str(), code.as_str(), "AGGREGATING", None);
            aggregated.await.unwrap_or_else(|_| {
                Err(ErrorDetail::internal("cascade aggregation channel closed"))
            })
        }
        .boxed()
    }

    async fn derive_child(
        extension: &dyn CascadeExtension,
        action: &CascadeAction,
    ) -> CascadeResult<Option<CascadeAction>> {
        let own = extension.cascade_resource_name();
        let Some(child) = extension.create_action_for_child_resource(action).await? else {
            return Ok(None);
        };
        if child.parent_issuer() != &own {
            return Err(CascadeError::malformed(format!(
                "extension {own} derived a child action issued by {}",
                child.parent_issuer()
            )));
        }
        child.validate()?;
        Ok(Some(child))
    }

    async fn run_branch(
        registry: Arc<CascadeExtensionRegistry>,
        extension: Arc<dyn CascadeExtension>,
        action: Arc<CascadeAction>,
        child: Option<CascadeAction>,
        path: VisitPath,
    ) -> CompletionResult {
        let own = extension.cascade_resource_name();
        let code = action.action_code();

        if let Some(child) = child {
            let mut child_path = path.as_ref().clone();
            child_path.push((own.clone(), code));
            let downstream =
                Self::cascade_dependents(registry, Arc::new(child), Arc::new(child_path)).await;

            if let Err(error) = downstream {
                match code.aggregation_policy() {
                    AggregationPolicy::FailFast => return Err(error),
                    AggregationPolicy::BestEffort => warn!(
                        extension = %own,
                        action_code = %code,
                        error = %error,
                        "Ignoring downstream failure"
                    ),
                }
            }
        }

        debug!(extension = %own, issuer = %action.parent_issuer(), action_code = %code, "Running branch handler");
        extension.cascade(&action).await
    }
}
