//! Chat dialog: per-user state machines, their scratch context and the
//! engine that reacts to inbound events.

pub mod commands;
pub mod context;
pub mod engine;
pub mod fsm;
pub mod render;
pub mod session;
pub mod store;

pub use commands::Command;
pub use context::{ConversationContext, PendingDelete, TrackingDraft};
pub use engine::ConversationEngine;
pub use fsm::{Event, State, StateMachine, TransitionError};
pub use session::{Conversation, ConversationKey};
pub use store::ConversationStore;
