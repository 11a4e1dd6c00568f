pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, ShoppingSessionFlow};
pub use states::{FlowAction, FlowContext, FlowEvent, SessionStatus, TransitionOutcome};
