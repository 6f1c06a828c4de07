use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dispatcher::FlowMarshalDispatcher;
use super::{Flow, FlowContext};
use crate::error::CascadeResult;
use crate::logging::log_error;

/// Ordered sequence of flows with marshaling and reverse rollback
pub struct FlowChain {
    name: String,
    flows: Vec<Arc<dyn Flow>>,
    dispatcher: Option<Arc<FlowMarshalDispatcher>>,
}

impl FlowChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flows: Vec::new(),
            dispatcher: None,
        }
    }

    pub fn then(mut self, flow: Arc<dyn Flow>) -> Self {
        self.flows.push(flow);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<FlowMarshalDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every step in order and return the names of the steps that ran.
    ///
    /// A veto or step failure rolls back completed steps in reverse order and
    /// returns the original error.
    pub async fn run(&self, context: &mut FlowContext) -> CascadeResult<Vec<String>> {
        let mut done: Vec<Arc<dyn Flow>> = Vec::with_capacity(self.flows.len());
        let mut previous: Option<String> = None;

        for planned in &self.flows {
            let step = match self.marshal(previous.as_deref(), planned, context).await {
                Ok(step) => step,
                Err(error) => {
                    self.rollback(&done, context).await;
                    return Err(error);
                }
            };

            debug!(chain = %self.name, flow = step.name(), "Running flow");
            if let Err(error) = step.run(context).await {
                warn!(chain = %self.name, flow = step.name(), error = %error, "Flow failed");
                self.rollback(&done, context).await;
                return Err(error);
            }

            previous = Some(step.name().to_string());
            done.push(step);
        }

        info!(chain = %self.name, steps = done.len(), "Flow chain completed");
        Ok(done.iter().map(|flow| flow.name().to_string()).collect())
    }

    async fn marshal(
        &self,
        previous: Option<&str>,
        planned: &Arc<dyn Flow>,
        context: &FlowContext,
    ) -> CascadeResult<Arc<dyn Flow>> {
        let Some(dispatcher) = &self.dispatcher else {
            return Ok(Arc::clone(planned));
        };
        let replacement = dispatcher
            .marshal(previous, planned.name(), &context.spec)
            .await?;
        Ok(replacement.unwrap_or_else(|| Arc::clone(planned)))
    }

    async fn rollback(&self, done: &[Arc<dyn Flow>], context: &mut FlowContext) {
        for flow in done.iter().rev() {
            debug!(chain = %self.name, flow = flow.name(), "Rolling back flow");
            if let Err(error) = flow.rollback(context).await {
                log_error(
                    "FlowChain",
                    "rollback",
                    &error.to_string(),
                    Some(flow.name()),
                );
            }
        }
    }
}

impl std::fmt::Debug for FlowChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowChain")
            .field("name", &self.name)
            .field("flows", &self.flows.iter().map(|f| f.name()).collect::<Vec<_>>())
            .finish()
    }
}
