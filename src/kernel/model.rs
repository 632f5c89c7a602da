use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Parameters;
use crate::validation::ParameterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActionStatus {
    #[default]
    NoActionRecognized,
    Fulfilled,
    MissingParameters,
    ContextSwitch,
}

/// A new action waiting for the user to confirm dropping the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSwitchData {
    pub intent_name: String,
    pub parameters: Parameters,
    pub prompt: String,
}

/// Snapshot of a parent action suspended while a contextual child runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFrame {
    pub intent_name: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub parameter_errors: Vec<ParameterError>,
    #[serde(default)]
    pub current_parameter: Option<String>,
}

impl ActionFrame {
    pub fn new(intent_name: impl Into<String>) -> Self {
        Self {
            intent_name: intent_name.into(),
            parameters: Parameters::new(),
            parameter_errors: Vec::new(),
            current_parameter: None,
        }
    }
}

/// The persisted turn state of one action session.
///
/// Plain data: the host stores it between turns and hands it back to
/// [`Resolver::evaluate`](crate::kernel::resolver::Resolver::evaluate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionModel {
    pub status: ActionStatus,
    pub intent_name: Option<String>,
    pub parameters: Parameters,
    /// Non-empty iff `status == MissingParameters`.
    pub parameter_errors: Vec<ParameterError>,
    /// Parameter being prompted for; steers binding of the next answer.
    pub current_parameter: Option<String>,
    /// Suspended parent actions, innermost last.
    pub context_stack: Vec<ActionFrame>,
    /// Set iff `status == ContextSwitch`.
    pub context_switch: Option<ContextSwitchData>,
    /// Result of a contextual child fulfilled during the last turn.
    pub subcontext_result: Option<Value>,
    pub result: Option<Value>,
    pub user_input: Option<String>,
}

impl ActionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parent this action runs inside, if any.
    pub fn context_model(&self) -> Option<&ActionFrame> {
        self.context_stack.last()
    }

    pub fn is_nested(&self) -> bool {
        !self.context_stack.is_empty()
    }

    pub fn first_error(&self) -> Option<&ParameterError> {
        self.parameter_errors.first()
    }

    /// Text the host should show next: the missing-parameter message or the switch question.
    pub fn prompt(&self) -> Option<&str> {
        match self.status {
            ActionStatus::MissingParameters => self.first_error().map(|e| e.message.as_str()),
            ActionStatus::ContextSwitch => self.context_switch.as_ref().map(|s| s.prompt.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Moves the live action into a frame, leaving a blank model behind.
    pub(crate) fn suspend(&mut self) -> ActionFrame {
        ActionFrame {
            intent_name: self.intent_name.take().unwrap_or_default(),
            parameters: std::mem::take(&mut self.parameters),
            parameter_errors: std::mem::take(&mut self.parameter_errors),
            current_parameter: self.current_parameter.take(),
        }
    }

    /// Makes a suspended frame the live action again.
    pub(crate) fn resume(&mut self, frame: ActionFrame) {
        self.intent_name = Some(frame.intent_name);
        self.parameters = frame.parameters;
        self.parameter_errors = frame.parameter_errors;
        self.current_parameter = frame.current_parameter;
        self.status = ActionStatus::MissingParameters;
    }
}
