use chrono::{DateTime, Utc};

use crate::conversation::context::ConversationContext;
use crate::conversation::fsm::{Event, State, StateMachine, TransitionError};
use crate::telegram::InboundEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub chat_id: i64,
    pub user_id: i64,
}

impl From<&InboundEvent> for ConversationKey {
    fn from(event: &InboundEvent) -> Self {
        Self {
            chat_id: event.chat_id,
            user_id: event.user_id,
        }
    }
}

/// Dialog with one user in one chat.
#[derive(Debug)]
pub struct Conversation {
    key: ConversationKey,
    machine: StateMachine,
    context: ConversationContext,
    last_message: Option<InboundEvent>,
    last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn new(key: ConversationKey) -> Self {
        Self {
            key,
            machine: StateMachine::new(),
            context: ConversationContext::Empty,
            last_message: None,
            last_activity: Utc::now(),
        }
    }

    pub fn key(&self) -> ConversationKey {
        self.key
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ConversationContext {
        &mut self.context
    }

    pub fn last_message(&self) -> Option<&InboundEvent> {
        self.last_message.as_ref()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn record(&mut self, event: &InboundEvent) {
        self.last_message = Some(event.clone());
        self.last_activity = Utc::now();
    }

    pub fn trigger(&mut self, event: Event) -> Result<State, TransitionError> {
        self.machine.trigger(event)
    }

    /// Starts a flow: the transition must succeed before the flow's context
    /// replaces the old one.
    pub fn begin(&mut self, event: Event, context: ConversationContext) -> Result<State, TransitionError> {
        let state = self.machine.trigger(event)?;
        self.context = context;
        Ok(state)
    }

    /// Back to idle with an empty context.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.context = ConversationContext::Empty;
    }

    pub fn is_inactive_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity <= cutoff
    }

    #[cfg(test)]
    pub(crate) fn set_last_activity(&mut self, at: DateTime<Utc>) {
        self.last_activity = at;
    }
}
