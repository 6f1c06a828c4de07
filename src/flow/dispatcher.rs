use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Flow, VmInstanceSpec};
use crate::error::CascadeResult;
use crate::logging::log_flow_operation;

/// Plugin hook deciding whether to replace the next step of a VM pipeline.
///
/// `Ok(None)` leaves the transition alone. `Err` vetoes the whole operation.
#[async_trait]
pub trait MarshalVmOperationFlowExtension: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn marshal_vm_operation_flow(
        &self,
        previous_flow: Option<&str>,
        next_flow: &str,
        spec: &VmInstanceSpec,
    ) -> CascadeResult<Option<Arc<dyn Flow>>>;
}

/// Consults marshallers in registration order; the first substitution wins
#[derive(Default)]
pub struct FlowMarshalDispatcher {
    marshallers: Vec<Arc<dyn MarshalVmOperationFlowExtension>>,
}

impl FlowMarshalDispatcher {
    pub fn new(marshallers: Vec<Arc<dyn MarshalVmOperationFlowExtension>>) -> Self {
        Self { marshallers }
    }

    pub fn len(&self) -> usize {
        self.marshallers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marshallers.is_empty()
    }

    pub async fn marshal(
        &self,
        previous_flow: Option<&str>,
        next_flow: &str,
        spec: &VmInstanceSpec,
    ) -> CascadeResult<Option<Arc<dyn Flow>>> {
        for marshaller in &self.marshallers {
            let substitution = match marshaller
                .marshal_vm_operation_flow(previous_flow, next_flow, spec)
                .await
            {
                Ok(substitution) => substitution,
                Err(error) => {
                    log_flow_operation(previous_flow, next_flow, None, "VETOED");
                    debug!(marshaller = marshaller.name(), error = %error, "Transition vetoed");
                    return Err(error);
                }
            };

            if let Some(flow) = substitution {
                log_flow_operation(previous_flow, next_flow, Some(flow.name()), "SUBSTITUTED");
                debug!(
                    marshaller = marshaller.name(),
                    next_flow,
                    replacement = flow.name(),
                    "Flow substituted"
                );
                return Ok(Some(flow));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for FlowMarshalDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowMarshalDispatcher")
            .field(
                "marshallers",
                &self.marshallers.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
