pub mod dispatch;
pub mod event;
pub mod model;
pub mod resolver;

pub use dispatch::Dispatcher;
pub use event::TurnInput;
pub use model::{ActionFrame, ActionModel, ActionStatus, ContextSwitchData};
pub use resolver::{ContextHook, Resolver};
