use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::types::ActionDefinition;
use crate::error::ConfigError;
use crate::recognizer::Recognition;

/// Intent name -> action definition. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionDefinition>,
    declared: Vec<String>,
}

impl ActionRegistry {
    /// Validates and indexes the declared actions. Any problem is fatal.
    pub fn new(actions: Vec<ActionDefinition>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(actions.len());
        let mut declared = Vec::with_capacity(actions.len());

        for action in actions {
            validate_action(&action)?;
            if index.contains_key(&action.intent_name) {
                return Err(ConfigError::DuplicateIntent(action.intent_name));
            }
            declared.push(action.intent_name.clone());
            index.insert(action.intent_name.clone(), action);
        }

        let registry = Self {
            actions: index,
            declared,
        };
        registry.check_parents()?;

        debug!(actions = registry.declared.len(), "action registry built");
        Ok(registry)
    }

    pub fn lookup(&self, intent_name: &str) -> Option<&ActionDefinition> {
        self.actions.get(intent_name)
    }

    pub fn is_contextual(&self, action: &ActionDefinition) -> bool {
        action.is_contextual()
    }

    pub fn parent_of(&self, action: &ActionDefinition) -> Option<&ActionDefinition> {
        action.parent.as_deref().and_then(|p| self.lookup(p))
    }

    /// Actions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.declared.iter().filter_map(|name| self.actions.get(name))
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Picks the action for the top scoring intent.
    ///
    /// Contextual actions are only eligible as children of `current`, or
    /// cold-started when they allow running without context.
    pub fn choose_best(
        &self,
        recognition: &Recognition,
        current: Option<&ActionDefinition>,
        threshold: f64,
    ) -> Option<&ActionDefinition> {
        let top = recognition.top_intent()?;
        if top.score < threshold {
            return None;
        }

        let action = self.lookup(&top.intent)?;

        if let Some(parent) = action.parent.as_deref() {
            let is_child_of_current = current.map(|c| c.intent_name == parent).unwrap_or(false);

            // Belongs to some other action's context.
            if current.is_some() && !is_child_of_current {
                return None;
            }
            if !is_child_of_current && !action.can_execute_without_context {
                return None;
            }
        }

        Some(action)
    }

    fn check_parents(&self) -> Result<(), ConfigError> {
        for action in self.actions.values() {
            let Some(parent) = action.parent.as_deref() else {
                continue;
            };
            if !self.actions.contains_key(parent) {
                return Err(ConfigError::UnknownParent {
                    intent: action.intent_name.clone(),
                    parent: parent.to_string(),
                });
            }

            let mut seen = HashSet::new();
            let mut cursor = Some(action);
            while let Some(node) = cursor {
                if !seen.insert(node.intent_name.as_str()) {
                    return Err(ConfigError::ParentCycle(action.intent_name.clone()));
                }
                cursor = node.parent.as_deref().and_then(|p| self.actions.get(p));
            }
        }
        Ok(())
    }
}

fn validate_action(action: &ActionDefinition) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidAction {
        intent: action.intent_name.clone(),
        reason: reason.to_string(),
    };

    if action.intent_name.trim().is_empty() {
        return Err(invalid("intent name is empty"));
    }
    if action.friendly_name.trim().is_empty() {
        return Err(invalid("friendly name is empty"));
    }

    let mut names = HashSet::new();
    for spec in action.schema.iter() {
        if spec.name.trim().is_empty() {
            return Err(invalid("parameter with empty name"));
        }
        if !names.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateParameter {
                intent: action.intent_name.clone(),
                parameter: spec.name.clone(),
            });
        }
    }
    Ok(())
}
