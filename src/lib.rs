pub mod action;
pub mod binder;
pub mod config;
pub mod error;
pub mod kernel;
pub mod recognizer;
pub mod validation;

// Re-export the surface a host needs to run a conversation
pub use action::{ActionDefinition, ActionRegistry, ParamType, ParamValue, ParameterSpec, Parameters};
pub use config::{LuisConfig, ResolverConfig, SwitchPolicy};
pub use error::{ConfigError, RecognizerError, ResolveError};
pub use kernel::{ActionModel, ActionStatus, Resolver, TurnInput};
pub use recognizer::{Entity, IntentScore, Recognition, Recognizer};
