use tracing::info;

use super::model::{ActionModel, ActionStatus};
use crate::action::{ActionDefinition, FulfillRequest, Parameters};
use crate::error::{ResolveError, Result};

/// Runs fulfillment handlers and hands results back up the context stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher;

impl Dispatcher {
    /// Invokes the action's handler with validated parameters.
    ///
    /// Handler errors propagate as-is (wrapped with the intent name); the
    /// model is left untouched in that case.
    pub async fn fulfill(
        &self,
        action: &ActionDefinition,
        model: &mut ActionModel,
        parameters: Parameters,
    ) -> Result<()> {
        let request = FulfillRequest {
            intent_name: action.intent_name.clone(),
            parameters: parameters.clone(),
            parent_parameters: model.context_model().map(|frame| frame.parameters.clone()),
            subcontext_result: model.subcontext_result.clone(),
        };

        let result = action
            .handler()
            .fulfill(request)
            .await
            .map_err(|source| ResolveError::Fulfillment {
                intent: action.intent_name.clone(),
                source,
            })?;

        info!(intent = %action.intent_name, nested = model.is_nested(), "action fulfilled");

        model.status = ActionStatus::Fulfilled;
        model.result = Some(result);
        model.parameters = parameters;
        model.parameter_errors.clear();
        model.current_parameter = None;
        Ok(())
    }

    /// Pops the enclosing parent after a child fulfilled.
    ///
    /// The child's result lands in `subcontext_result` and the parent becomes
    /// the live action, pending re-validation. Hands back the child's
    /// parameters, or `None` at the root.
    pub fn return_to_parent(&self, model: &mut ActionModel) -> Option<Parameters> {
        let frame = model.context_stack.pop()?;

        let child_result = model.result.take();
        let child_parameters = std::mem::take(&mut model.parameters);
        info!(parent = %frame.intent_name, "returning to parent action");
        model.resume(frame);
        model.subcontext_result = child_result;
        Some(child_parameters)
    }
}
