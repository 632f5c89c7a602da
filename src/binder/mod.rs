//! Entity-to-parameter binding.
//!
//! Binding never fails: parameters with no match, or with an ambiguous match
//! and nobody to break the tie, are simply left out. Validation reports them.

pub mod builtin;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::action::{ParamValue, ParameterSpec, Parameters, Schema};
use crate::recognizer::Entity;

/// Picks one entity when several match the same parameter.
pub trait Disambiguator: Send + Sync {
    fn choose<'a>(&self, parameter: &ParameterSpec, candidates: &[&'a Entity]) -> Option<&'a Entity>;
}

/// The parameter the user was just prompted for, plus what they typed.
#[derive(Debug, Clone, Copy)]
pub struct ParameterFocus<'a> {
    pub parameter: &'a str,
    pub user_input: &'a str,
}

#[derive(Clone, Default)]
pub struct Binder {
    disambiguator: Option<Arc<dyn Disambiguator>>,
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("disambiguator", &self.disambiguator.is_some())
            .finish()
    }
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disambiguator<D>(mut self, disambiguator: D) -> Self
    where
        D: Disambiguator + 'static,
    {
        self.disambiguator = Some(Arc::new(disambiguator));
        self
    }

    /// Resolves parameter values for `schema` out of `entities`.
    pub fn bind(&self, schema: &Schema, entities: &[Entity], focus: Option<ParameterFocus<'_>>) -> Parameters {
        let entities = cross_match(entities);
        let mut parameters = Parameters::new();

        for spec in schema.iter() {
            let matches = matching_entities(spec, &entities);

            let value = match matches.len() {
                0 => focus
                    .filter(|f| f.parameter == spec.name && !f.user_input.trim().is_empty())
                    .map(|f| {
                        // Free-text answer to a direct prompt.
                        debug!(parameter = %spec.name, "binding raw input to prompted parameter");
                        Entity::new(spec.name.clone(), f.user_input.trim()).value()
                    }),
                1 => Some(matches[0].value()),
                _ => self.resolve_ambiguous(spec, &matches),
            };

            if let Some(param) = value.as_ref().and_then(ParamValue::from_json) {
                parameters.insert(spec.name.clone(), param);
            }
        }

        parameters
    }

    fn resolve_ambiguous(&self, spec: &ParameterSpec, matches: &[&Entity]) -> Option<Value> {
        if let Some(chosen) = self
            .disambiguator
            .as_ref()
            .and_then(|d| d.choose(spec, matches))
        {
            return Some(chosen.value());
        }

        // Several entities that each resolved to a list feed one list parameter.
        let all_lists = matches
            .iter()
            .all(|e| matches!(e.resolution.first(), Some(r) if r.value.is_array()));
        if spec.ty.is_list() && all_lists {
            let merged: Vec<Value> = matches
                .iter()
                .filter_map(|e| e.resolution.first())
                .filter_map(|r| r.value.as_array())
                .flatten()
                .cloned()
                .collect();
            return Some(Value::Array(merged));
        }

        debug!(parameter = %spec.name, candidates = matches.len(), "ambiguous entities dropped");
        None
    }
}

/// Binds with no disambiguation callback.
pub fn bind(schema: &Schema, entities: &[Entity], focus: Option<ParameterFocus<'_>>) -> Parameters {
    Binder::new().bind(schema, entities, focus)
}

/// Search order: declared custom type, then parameter name, then declared builtin type.
fn matching_entities<'a>(spec: &ParameterSpec, entities: &'a [Entity]) -> Vec<&'a Entity> {
    let by_type = |ty: &str| -> Vec<&'a Entity> {
        entities.iter().filter(|e| e.entity_type == ty).collect()
    };

    let candidates = [
        spec.custom_entity_type.as_deref(),
        Some(spec.name.as_str()),
        spec.builtin_entity_type.as_deref(),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(by_type)
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

/// Copies resolved values onto domain-specific entities extracted from the same span.
///
/// Entities are grouped by raw text. In a group with more than one member,
/// the first domain-specific entity (preferring one with no resolution of its
/// own) receives the first resolution of another entity in the group.
pub fn cross_match(entities: &[Entity]) -> Vec<Entity> {
    let mut result = entities.to_vec();

    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, entity) in entities.iter().enumerate() {
        groups.entry(entity.text.as_str()).or_default().push(idx);
    }

    for members in groups.values().filter(|m| m.len() > 1) {
        let custom: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&i| !builtin::is_builtin(&entities[i].entity_type))
            .collect();

        let target = custom
            .iter()
            .copied()
            .find(|&i| !entities[i].has_resolution())
            .or_else(|| custom.first().copied());

        let Some(target) = target else {
            continue;
        };

        let source = members
            .iter()
            .copied()
            .find(|&i| i != target && entities[i].has_resolution());

        if let Some(source) = source {
            let resolved = entities[source].resolution[0].clone();
            debug!(
                from = %entities[source].entity_type,
                to = %entities[target].entity_type,
                "cross-matched entity resolution"
            );
            result[target].resolution = vec![resolved];
        }
    }

    result
}
