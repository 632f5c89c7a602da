/// What the host hands the resolver for one conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// Free text typed or spoken by the user.
    Utterance(String),
    /// Answer to a pending "discard the current action?" question.
    Confirm(bool),
    /// Re-run validation on the current model without new input.
    Continue,
}

impl TurnInput {
    pub fn utterance(text: impl Into<String>) -> Self {
        TurnInput::Utterance(text.into())
    }

    /// Trims utterances; blank text carries no information and becomes `Continue`.
    pub fn normalized(self) -> Self {
        match self {
            TurnInput::Utterance(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    TurnInput::Continue
                } else {
                    TurnInput::Utterance(trimmed.to_string())
                }
            }
            other => other,
        }
    }
}

impl From<&str> for TurnInput {
    fn from(text: &str) -> Self {
        TurnInput::Utterance(text.to_string())
    }
}

impl From<String> for TurnInput {
    fn from(text: String) -> Self {
        TurnInput::Utterance(text)
    }
}

impl From<bool> for TurnInput {
    fn from(confirm: bool) -> Self {
        TurnInput::Confirm(confirm)
    }
}
