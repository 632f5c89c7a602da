use serde::{Deserialize, Serialize};

use crate::action::{try_coerce, Parameters, Schema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterError {
    pub parameter_name: String,
    pub message: String,
}

/// Outcome of checking a candidate parameter set against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(Parameters),
    /// `parameters` holds whatever survived coercion. `errors` is never empty.
    Invalid {
        parameters: Parameters,
        errors: Vec<ParameterError>,
    },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn parameters(&self) -> &Parameters {
        match self {
            Validation::Valid(p) => p,
            Validation::Invalid { parameters, .. } => parameters,
        }
    }

    pub fn errors(&self) -> &[ParameterError] {
        match self {
            Validation::Valid(_) => &[],
            Validation::Invalid { errors, .. } => errors,
        }
    }
}

/// Coerces every declared parameter to its type and checks presence.
///
/// Values that fail coercion or a custom validator are dropped and count as
/// missing. Keys the schema does not declare pass through untouched. Errors
/// come back ordered by `(order, name)`.
pub fn validate(schema: &Schema, parameters: &Parameters) -> Validation {
    let mut accepted = parameters.clone();
    let mut failures = Vec::new();

    for spec in schema.iter() {
        let coerced = parameters
            .get(&spec.name)
            .and_then(|raw| try_coerce(raw, &spec.ty))
            .filter(|value| spec.validators.iter().all(|v| v.check(value)));

        match coerced {
            Some(value) => {
                accepted.insert(spec.name.clone(), value);
            }
            None => {
                accepted.remove(&spec.name);
                if spec.required {
                    failures.push((spec.effective_order(), spec.name.clone(), spec.error_message.clone()));
                }
            }
        }
    }

    if failures.is_empty() {
        return Validation::Valid(accepted);
    }

    failures.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    Validation::Invalid {
        parameters: accepted,
        errors: failures
            .into_iter()
            .map(|(_, parameter_name, message)| ParameterError {
                parameter_name,
                message,
            })
            .collect(),
    }
}
