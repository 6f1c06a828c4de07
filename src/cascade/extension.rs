use async_trait::async_trait;
use tracing::{debug, warn};

use super::action::{ActionCode, CascadeAction};
use crate::completion::CompletionResult;
use crate::error::CascadeResult;
use crate::messaging::MessageReply;
use crate::models::ResourceTypeName;
use crate::repository::CascadeRepository;

/// Pluggable handler owning one resource type's reaction to cascade actions.
///
/// The engine calls [`create_action_for_child_resource`] to narrow the
/// parent's context down to the records this extension owns, recurses into
/// the dependents of those records, then calls [`cascade`] with the parent
/// action.
///
/// [`create_action_for_child_resource`]: CascadeExtension::create_action_for_child_resource
/// [`cascade`]: CascadeExtension::cascade
#[async_trait]
pub trait CascadeExtension: Send + Sync + 'static {
    /// Resource type this extension owns; also its registry key
    fn cascade_resource_name(&self) -> ResourceTypeName;

    /// Parent issuers this extension reacts to
    fn edge_names(&self) -> Vec<ResourceTypeName>;

    /// Handle the action as issued by the parent
    async fn cascade(&self, action: &CascadeAction) -> CompletionResult;

    /// Narrow the parent context to this extension's own records.
    ///
    /// `Ok(None)` means the branch has no dependents to recurse into. Errors
    /// fail the whole cascade before any branch runs.
    async fn create_action_for_child_resource(
        &self,
        action: &CascadeAction,
    ) -> CascadeResult<Option<CascadeAction>>;
}

/// Fail on the first failed reply, except under force delete where failures
/// are only logged
pub(crate) fn fold_replies(code: ActionCode, replies: &[MessageReply]) -> CompletionResult {
    for reply in replies {
        if let Some(error) = reply.error_detail() {
            if code == ActionCode::ForceDelete {
                warn!(action_code = %code, error = %error, "Ignoring failed reply under force delete");
                continue;
            }
            return Err(error);
        }
    }
    Ok(())
}

/// Cleanup never fails; a purge error is only logged
pub(crate) async fn purge_soft_deleted(
    repository: &dyn CascadeRepository,
    resource_type: &ResourceTypeName,
) -> CompletionResult {
    match repository.purge_deleted(resource_type).await {
        Ok(purged) => debug!(resource_type = %resource_type, purged, "Purged soft-deleted rows"),
        Err(error) => warn!(
            resource_type = %resource_type,
            error = %error,
            "Failed to purge soft-deleted rows"
        ),
    }
    Ok(())
}
