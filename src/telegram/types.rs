//! Bot API payloads, limited to the fields this bot reads or writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telegram::{InboundEvent, InlineKeyboard};

pub const PARSE_MODE_HTML: &str = "HTML";

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub date: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Flattens a message or button press into an event. Updates without a
    /// sender, chat or text are dropped.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            return Some(InboundEvent {
                chat_id: message.chat.id,
                user_id: query.from.id,
                username: query.from.username,
                message_id: message.message_id,
                callback_id: Some(query.id),
                text: query.data.unwrap_or_default(),
                date: Utc::now(),
            });
        }

        let message = self.message?;
        let from = message.from?;
        Some(InboundEvent {
            chat_id: message.chat.id,
            user_id: from.id,
            username: from.username,
            message_id: message.message_id,
            callback_id: None,
            text: message.text?,
            date: DateTime::from_timestamp(message.date, 0).unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GetUpdatesRequest<'a> {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub struct LinkPreviewOptions {
    pub is_disabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
    pub allow_sending_without_reply: bool,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub link_preview_options: LinkPreviewOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Debug, Serialize)]
pub struct EditMessageTextRequest<'a> {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub link_preview_options: LinkPreviewOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQueryRequest<'a> {
    pub callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ReactionType<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub emoji: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SetMessageReactionRequest<'a> {
    pub chat_id: i64,
    pub message_id: i64,
    pub reaction: Vec<ReactionType<'a>>,
}
