pub mod client;
pub mod poller;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::models::Owner;

pub use client::TelegramClient;
pub use poller::UpdatePoller;

/// One thing a user did in a chat: a text message or a button press.
///
/// For button presses `text` carries the button payload, `message_id` the
/// message the button is attached to and `callback_id` the query to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub message_id: i64,
    pub callback_id: Option<String>,
    pub text: String,
    pub date: DateTime<Utc>,
}

impl InboundEvent {
    pub fn owner(&self) -> Owner {
        Owner {
            chat_id: self.chat_id,
            user_id: self.user_id,
        }
    }

    pub fn is_callback(&self) -> bool {
        self.callback_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn single_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.iter().all(|row| row.is_empty())
    }
}

/// An HTML-formatted message ready to be sent or to replace an existing one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub reply_to: Option<i64>,
    pub keyboard: Option<InlineKeyboard>,
}

impl OutgoingMessage {
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_keyboard(mut self, keyboard: Option<InlineKeyboard>) -> Self {
        self.keyboard = keyboard.filter(|k| !k.is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
}

/// Outbound side of the chat.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: i64, message: OutgoingMessage) -> Result<SentMessage>;

    async fn edit_message(&self, chat_id: i64, message_id: i64, message: OutgoingMessage) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str) -> Result<()>;

    async fn set_reaction(&self, chat_id: i64, message_id: i64, emoji: &str) -> Result<()>;
}
