use thiserror::Error;

/// Registry construction failures. Fatal, surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("intent '{0}' is declared by more than one action")]
    DuplicateIntent(String),

    #[error("action '{intent}' is invalid: {reason}")]
    InvalidAction { intent: String, reason: String },

    #[error("action '{intent}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { intent: String, parameter: String },

    #[error("action '{intent}' declares unknown parent action '{parent}'")]
    UnknownParent { intent: String, parent: String },

    #[error("action '{0}' is part of a parent cycle")]
    ParentCycle(String),

    #[error("environment variable {key}: {reason}")]
    Env { key: String, reason: String },
}

/// Failures of the external language-understanding service.
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognizer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("recognizer returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("recognizer response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("recognizer is not configured: {0}")]
    NotConfigured(String),
}

/// Failures of a single `evaluate` turn. Validation misses are never errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),

    #[error("fulfillment of '{intent}' failed")]
    Fulfillment {
        intent: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("action model references unregistered intent '{0}'")]
    UnknownAction(String),

    #[error("contextual actions nested deeper than {depth} levels")]
    ContextDepthExceeded { depth: usize },
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
