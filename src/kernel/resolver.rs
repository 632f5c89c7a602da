use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dispatch::Dispatcher;
use super::event::TurnInput;
use super::model::{ActionFrame, ActionModel, ActionStatus, ContextSwitchData};
use crate::action::{ActionDefinition, ActionRegistry};
use crate::binder::{Binder, ParameterFocus};
use crate::config::{ResolverConfig, SwitchPolicy};
use crate::error::{ResolveError, Result};
use crate::recognizer::{Recognition, Recognizer};
use crate::validation::{validate, Validation};

/// Called when a contextual action starts cold and its parent frame is synthesized.
/// May pre-fill the parent's parameters.
pub trait ContextHook: Send + Sync {
    fn on_context_created(&self, parent: &ActionDefinition, frame: &mut ActionFrame);
}

impl<F> ContextHook for F
where
    F: Fn(&ActionDefinition, &mut ActionFrame) + Send + Sync,
{
    fn on_context_created(&self, parent: &ActionDefinition, frame: &mut ActionFrame) {
        self(parent, frame)
    }
}

/// The action resolution state machine.
///
/// Holds only read-only collaborators, so one instance serves any number of
/// conversations. Turns of the same conversation must be serialized by the host.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<ActionRegistry>,
    recognizer: Arc<dyn Recognizer>,
    binder: Binder,
    dispatcher: Dispatcher,
    config: ResolverConfig,
    context_hook: Option<Arc<dyn ContextHook>>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("actions", &self.registry.len())
            .field("binder", &self.binder)
            .field("config", &self.config)
            .field("context_hook", &self.context_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(registry: Arc<ActionRegistry>, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            registry,
            recognizer,
            binder: Binder::new(),
            dispatcher: Dispatcher,
            config: ResolverConfig::default(),
            context_hook: None,
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_binder(mut self, binder: Binder) -> Self {
        self.binder = binder;
        self
    }

    pub fn with_context_hook<H>(mut self, hook: H) -> Self
    where
        H: ContextHook + 'static,
    {
        self.context_hook = Some(Arc::new(hook));
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// One transition: previous model + turn input -> next model.
    ///
    /// The previous model is never mutated. Recognizer and fulfillment
    /// failures abort the turn; the caller keeps the previous model.
    pub async fn evaluate(&self, previous: &ActionModel, input: impl Into<TurnInput>) -> Result<ActionModel> {
        let input = input.into().normalized();
        let mut model = previous.clone();

        match (model.status, input) {
            (ActionStatus::NoActionRecognized | ActionStatus::Fulfilled, TurnInput::Utterance(text)) => {
                self.start(ActionModel::new(), text).await
            }
            (ActionStatus::MissingParameters, TurnInput::Utterance(text)) => {
                model.subcontext_result = None;
                self.fill(model, text).await
            }
            (ActionStatus::MissingParameters, _) => {
                model.subcontext_result = None;
                let action = self.action_for(&model)?;
                self.try_execute(model, action).await
            }
            (ActionStatus::ContextSwitch, TurnInput::Confirm(true)) => {
                model.subcontext_result = None;
                self.accept_switch(model).await
            }
            (ActionStatus::ContextSwitch, TurnInput::Confirm(false)) => {
                model.subcontext_result = None;
                decline_switch(&mut model);
                let action = self.action_for(&model)?;
                self.try_execute(model, action).await
            }
            (ActionStatus::ContextSwitch, TurnInput::Utterance(text)) => {
                // Answering with something else counts as "no".
                model.subcontext_result = None;
                decline_switch(&mut model);
                self.fill(model, text).await
            }
            // Nothing to act on.
            (_, _) => Ok(model),
        }
    }

    /// First utterance of an action session.
    async fn start(&self, mut model: ActionModel, text: String) -> Result<ActionModel> {
        model.user_input = Some(text.clone());
        let recognition = self.recognize(&text).await?;

        let Some(action) = self
            .registry
            .choose_best(&recognition, None, self.config.intent_threshold)
        else {
            debug!("no action recognized");
            model.status = ActionStatus::NoActionRecognized;
            model.intent_name = None;
            return Ok(model);
        };

        info!(intent = %action.intent_name, "action recognized");

        model.intent_name = Some(action.intent_name.clone());
        model.parameters = self.binder.bind(&action.schema, &recognition.entities, None);
        model.parameter_errors.clear();
        model.current_parameter = None;
        model.context_switch = None;
        model.result = None;

        self.ensure_context(&mut model, action)?;
        self.try_execute(model, action).await
    }

    /// Follow-up utterance while parameters are missing.
    async fn fill(&self, mut model: ActionModel, text: String) -> Result<ActionModel> {
        let mut action = self.action_for(&model)?;
        model.user_input = Some(text.clone());
        let recognition = self.recognize(&text).await?;

        let candidate = self
            .registry
            .choose_best(&recognition, Some(action), self.config.intent_threshold)
            .filter(|c| c.intent_name != action.intent_name);

        if let Some(candidate) = candidate {
            if candidate.parent.as_deref() == Some(action.intent_name.as_str()) {
                self.enter_child(&mut model, candidate)?;
                action = candidate;
            } else {
                let policy = if action.confirm_on_context_switch {
                    SwitchPolicy::Confirm
                } else {
                    self.config.unconfirmed_switch
                };

                match policy {
                    SwitchPolicy::Confirm => {
                        self.stage_switch(&mut model, action, candidate, &recognition);
                        return Ok(model);
                    }
                    SwitchPolicy::Immediate => {
                        switch_to(&mut model, candidate);
                        action = candidate;
                    }
                    SwitchPolicy::Ignore => {
                        debug!(ignored = %candidate.intent_name, "unrelated intent ignored");
                    }
                }
            }
        }

        let focus = model.current_parameter.as_deref().map(|parameter| ParameterFocus {
            parameter,
            user_input: &text,
        });
        let bound = self.binder.bind(&action.schema, &recognition.entities, focus);
        model.parameters.extend(bound);

        self.try_execute(model, action).await
    }

    async fn accept_switch(&self, mut model: ActionModel) -> Result<ActionModel> {
        let Some(staged) = model.context_switch.take() else {
            decline_switch(&mut model);
            let action = self.action_for(&model)?;
            return self.try_execute(model, action).await;
        };

        let action = self
            .registry
            .lookup(&staged.intent_name)
            .ok_or_else(|| ResolveError::UnknownAction(staged.intent_name.clone()))?;

        info!(to = %action.intent_name, "context switch confirmed");

        if !continues_stack(&model, action) {
            model.context_stack.clear();
        }
        model.status = ActionStatus::MissingParameters;
        model.intent_name = Some(staged.intent_name);
        model.parameters = staged.parameters;
        model.parameter_errors.clear();
        model.current_parameter = None;

        self.ensure_context(&mut model, action)?;
        self.try_execute(model, action).await
    }

    /// Validate, then fulfill and walk back up the context stack while parents complete.
    async fn try_execute<'a>(&'a self, mut model: ActionModel, mut action: &'a ActionDefinition) -> Result<ActionModel> {
        loop {
            match validate(&action.schema, &model.parameters) {
                Validation::Invalid { parameters, errors } => {
                    model.status = ActionStatus::MissingParameters;
                    model.parameters = parameters;
                    model.current_parameter = errors.first().map(|e| e.parameter_name.clone());
                    model.parameter_errors = errors;
                    model.result = None;
                    debug!(
                        intent = %action.intent_name,
                        missing = model.parameter_errors.len(),
                        "parameters missing"
                    );
                    return Ok(model);
                }
                Validation::Valid(parameters) => {
                    self.dispatcher.fulfill(action, &mut model, parameters).await?;
                    let Some(child_parameters) = self.dispatcher.return_to_parent(&mut model) else {
                        return Ok(model);
                    };

                    let child = action;
                    action = self.action_for(&model)?;
                    if child.propagate_to_parent {
                        let carried = child_parameters
                            .into_iter()
                            .filter(|(name, _)| action.schema.contains(name));
                        model.parameters.extend(carried);
                    }
                }
            }
        }
    }

    /// Pushes the live action and makes `child` current.
    fn enter_child(&self, model: &mut ActionModel, child: &ActionDefinition) -> Result<()> {
        self.check_depth(model.context_stack.len() + 1)?;

        info!(child = %child.intent_name, "entering contextual action");
        let frame = model.suspend();
        model.context_stack.push(frame);
        model.intent_name = Some(child.intent_name.clone());
        model.status = ActionStatus::MissingParameters;
        model.result = None;
        Ok(())
    }

    /// Synthesizes the parent chain for a contextual action started without one.
    fn ensure_context(&self, model: &mut ActionModel, action: &ActionDefinition) -> Result<()> {
        if !action.is_contextual() || model.is_nested() {
            return Ok(());
        }

        let mut frames = Vec::new();
        let mut cursor = self.registry.parent_of(action);
        while let Some(parent) = cursor {
            let mut frame = ActionFrame::new(parent.intent_name.clone());
            if let Some(hook) = &self.context_hook {
                hook.on_context_created(parent, &mut frame);
            }
            frames.push(frame);
            cursor = self.registry.parent_of(parent);
        }

        self.check_depth(frames.len())?;

        debug!(intent = %action.intent_name, parents = frames.len(), "synthesized parent context");
        frames.reverse();
        model.context_stack = frames;
        Ok(())
    }

    fn stage_switch(
        &self,
        model: &mut ActionModel,
        current: &ActionDefinition,
        candidate: &ActionDefinition,
        recognition: &Recognition,
    ) {
        info!(from = %current.intent_name, to = %candidate.intent_name, "context switch requires confirmation");

        model.status = ActionStatus::ContextSwitch;
        model.parameter_errors.clear();
        model.context_switch = Some(ContextSwitchData {
            intent_name: candidate.intent_name.clone(),
            parameters: self.binder.bind(&candidate.schema, &recognition.entities, None),
            prompt: format!(
                "Do you want to discard the current action '{}' and start executing '{}' action?",
                current.display_name(),
                candidate.display_name()
            ),
        });
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_context_depth {
            return Err(ResolveError::ContextDepthExceeded {
                depth: self.config.max_context_depth,
            });
        }
        Ok(())
    }

    fn action_for(&self, model: &ActionModel) -> Result<&ActionDefinition> {
        let name = model.intent_name.as_deref().unwrap_or_default();
        self.registry
            .lookup(name)
            .ok_or_else(|| ResolveError::UnknownAction(name.to_string()))
    }

    async fn recognize(&self, text: &str) -> Result<Recognition> {
        self.recognizer.recognize(text).await.map_err(|e| {
            warn!(error = %e, "recognizer call failed");
            ResolveError::from(e)
        })
    }
}

fn decline_switch(model: &mut ActionModel) {
    if let Some(staged) = model.context_switch.take() {
        debug!(declined = %staged.intent_name, "context switch declined");
    }
    model.status = ActionStatus::MissingParameters;
}

/// Whether `action` belongs under the parent frame currently on top of the stack.
fn continues_stack(model: &ActionModel, action: &ActionDefinition) -> bool {
    match (model.context_model(), action.parent.as_deref()) {
        (Some(frame), Some(parent)) => frame.intent_name == parent,
        _ => false,
    }
}

/// Unconfirmed switch: previous parameters stay, later binding overwrites on conflict.
fn switch_to(model: &mut ActionModel, action: &ActionDefinition) {
    info!(
        from = model.intent_name.as_deref().unwrap_or_default(),
        to = %action.intent_name,
        "switching action"
    );

    if !continues_stack(model, action) {
        model.context_stack.clear();
    }
    model.intent_name = Some(action.intent_name.clone());
    model.current_parameter = None;
    model.parameter_errors.clear();
}
