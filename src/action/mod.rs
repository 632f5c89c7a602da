pub mod params;
pub mod registry;
pub mod types;

pub use params::{try_coerce, ParamType, ParamValue, Parameters};
pub use registry::ActionRegistry;
pub use types::{
    ActionDefinition, FnFulfill, Fulfill, FulfillRequest, ParameterSpec, Schema, Validator,
};
