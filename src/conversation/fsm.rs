use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Idle,
    AskingForUrl,
    WaitingForUrl,
    Scraping,
    Listing,
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    AskForUrl,
    WaitForUrl,
    Scrape,
    List,
    Delete,
    Cancel,
}

impl State {
    pub const ALL: [State; 6] = [
        State::Idle,
        State::AskingForUrl,
        State::WaitingForUrl,
        State::Scraping,
        State::Listing,
        State::Deleting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::AskingForUrl => "asking_for_url",
            State::WaitingForUrl => "waiting_for_url",
            State::Scraping => "scraping",
            State::Listing => "listing",
            State::Deleting => "deleting",
        }
    }
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::AskForUrl => "ask_for_url",
            Event::WaitForUrl => "wait_for_url",
            Event::Scrape => "scrape",
            Event::List => "list",
            Event::Delete => "delete",
            Event::Cancel => "cancel",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("unsupported transition: {event} from {from}")]
    Unsupported { event: Event, from: State },
}

struct Transition {
    event: Event,
    sources: &'static [State],
    target: State,
}

// Cancel is accepted everywhere and handled outside the table.
const TRANSITIONS: &[Transition] = &[
    Transition {
        event: Event::AskForUrl,
        sources: &[State::Idle, State::Deleting],
        target: State::AskingForUrl,
    },
    Transition {
        event: Event::WaitForUrl,
        sources: &[State::AskingForUrl],
        target: State::WaitingForUrl,
    },
    Transition {
        event: Event::Scrape,
        sources: &[State::WaitingForUrl],
        target: State::Scraping,
    },
    Transition {
        event: Event::List,
        sources: &[State::Idle, State::Deleting],
        target: State::Listing,
    },
    Transition {
        event: Event::Delete,
        sources: &[State::Idle, State::Listing],
        target: State::Deleting,
    },
];

/// Dialog state with an explicit transition table. Completion of the
/// scraping and deleting steps is not an event; callers `reset` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn target(&self, event: Event) -> Option<State> {
        if event == Event::Cancel {
            return Some(State::Idle);
        }

        TRANSITIONS
            .iter()
            .find(|t| t.event == event && t.sources.contains(&self.state))
            .map(|t| t.target)
    }

    /// Moves to the event's target state. An event with no transition from
    /// the current state leaves it untouched.
    pub fn trigger(&mut self, event: Event) -> Result<State, TransitionError> {
        let target = self.target(event).ok_or(TransitionError::Unsupported {
            event,
            from: self.state,
        })?;
        self.state = target;
        Ok(target)
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
    }
}
