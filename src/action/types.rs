use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::params::{ParamType, ParamValue, Parameters};

/// Extra predicate a coerced value must satisfy (range checks, non-empty text, ...).
#[derive(Clone)]
pub struct Validator {
    label: String,
    check: Arc<dyn Fn(&ParamValue) -> bool + Send + Sync>,
}

impl Validator {
    pub fn new<F>(label: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ParamValue) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    /// Inclusive numeric range. Non-numeric values fail.
    pub fn range(min: f64, max: f64) -> Self {
        Self::new(format!("range({}, {})", min, max), move |v| {
            v.as_f64().map(|n| n >= min && n <= max).unwrap_or(false)
        })
    }

    pub fn non_empty() -> Self {
        Self::new("non_empty", |v| match v {
            ParamValue::Text(s) | ParamValue::Enum(s) => !s.trim().is_empty(),
            ParamValue::List(items) => !items.is_empty(),
            _ => true,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn check(&self, value: &ParamValue) -> bool {
        (self.check)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.label).finish()
    }
}

/// One parameter of an action schema.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: ParamType,
    /// Domain-specific entity category, searched first.
    pub custom_entity_type: Option<String>,
    /// Well-known recognizer category (e.g. "builtin.number"), searched last.
    pub builtin_entity_type: Option<String>,
    pub required: bool,
    pub error_message: String,
    /// Prompt priority. Filled with the declaration index when left unset.
    pub order: Option<i32>,
    pub validators: Vec<Validator>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, ty: ParamType, error_message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            custom_entity_type: None,
            builtin_entity_type: None,
            required: true,
            error_message: error_message.into(),
            order: None,
            validators: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, String::new())
        }
    }

    pub fn custom_entity(mut self, entity_type: impl Into<String>) -> Self {
        self.custom_entity_type = Some(entity_type.into());
        self
    }

    pub fn builtin_entity(mut self, entity_type: impl Into<String>) -> Self {
        self.builtin_entity_type = Some(entity_type.into());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn effective_order(&self) -> i32 {
        self.order.unwrap_or(i32::MAX)
    }
}

/// Parameters in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    params: Vec<ParameterSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut spec: ParameterSpec) {
        if spec.order.is_none() {
            spec.order = Some(self.params.len() as i32);
        }
        self.params.push(spec);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<ParameterSpec> for Schema {
    fn from_iter<I: IntoIterator<Item = ParameterSpec>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for spec in iter {
            schema.push(spec);
        }
        schema
    }
}

/// Everything a fulfillment handler gets to see.
#[derive(Debug, Clone)]
pub struct FulfillRequest {
    pub intent_name: String,
    pub parameters: Parameters,
    /// Parameters of the suspended parent action, for contextual actions.
    pub parent_parameters: Option<Parameters>,
    /// Result of a contextual child that just completed inside this action.
    pub subcontext_result: Option<Value>,
}

/// Side-effecting handler run once an action's parameters validate.
#[async_trait]
pub trait Fulfill: Send + Sync {
    async fn fulfill(&self, request: FulfillRequest) -> anyhow::Result<Value>;
}

/// Adapts an async closure into a [`Fulfill`] handler.
pub struct FnFulfill<F>(pub F);

#[async_trait]
impl<F, Fut> Fulfill for FnFulfill<F>
where
    F: Fn(FulfillRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn fulfill(&self, request: FulfillRequest) -> anyhow::Result<Value> {
        (self.0)(request).await
    }
}

/// A registered, schema-described operation bound to one intent.
#[derive(Clone)]
pub struct ActionDefinition {
    pub intent_name: String,
    pub friendly_name: String,
    pub schema: Schema,
    /// Intent name of the parent, set for contextual actions.
    pub parent: Option<String>,
    pub confirm_on_context_switch: bool,
    pub can_execute_without_context: bool,
    /// On completion, copy validated parameters the parent also declares into the parent.
    pub propagate_to_parent: bool,
    handler: Arc<dyn Fulfill>,
}

impl ActionDefinition {
    pub fn new<H>(intent_name: impl Into<String>, friendly_name: impl Into<String>, handler: H) -> Self
    where
        H: Fulfill + 'static,
    {
        Self {
            intent_name: intent_name.into(),
            friendly_name: friendly_name.into(),
            schema: Schema::new(),
            parent: None,
            confirm_on_context_switch: false,
            can_execute_without_context: false,
            propagate_to_parent: false,
            handler: Arc::new(handler),
        }
    }

    pub fn from_fn<F, Fut>(intent_name: impl Into<String>, friendly_name: impl Into<String>, f: F) -> Self
    where
        F: Fn(FulfillRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::new(intent_name, friendly_name, FnFulfill(f))
    }

    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.schema.push(spec);
        self
    }

    pub fn contextual_to(mut self, parent_intent: impl Into<String>) -> Self {
        self.parent = Some(parent_intent.into());
        self
    }

    pub fn confirm_on_context_switch(mut self, confirm: bool) -> Self {
        self.confirm_on_context_switch = confirm;
        self
    }

    pub fn can_execute_without_context(mut self, allowed: bool) -> Self {
        self.can_execute_without_context = allowed;
        self
    }

    pub fn propagate_to_parent(mut self, propagate: bool) -> Self {
        self.propagate_to_parent = propagate;
        self
    }

    pub fn is_contextual(&self) -> bool {
        self.parent.is_some()
    }

    /// Label used in prompts; falls back to the intent name.
    pub fn display_name(&self) -> &str {
        if self.friendly_name.trim().is_empty() {
            &self.intent_name
        } else {
            &self.friendly_name
        }
    }

    pub fn handler(&self) -> &Arc<dyn Fulfill> {
        &self.handler
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("intent_name", &self.intent_name)
            .field("friendly_name", &self.friendly_name)
            .field("schema", &self.schema)
            .field("parent", &self.parent)
            .field("confirm_on_context_switch", &self.confirm_on_context_switch)
            .field("can_execute_without_context", &self.can_execute_without_context)
            .field("propagate_to_parent", &self.propagate_to_parent)
            .finish_non_exhaustive()
    }
}
