use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::telegram::types::*;
use crate::telegram::{ChatTransport, OutgoingMessage, SentMessage};
use crate::{AppError, Result};

const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];
const NOT_MODIFIED: &str = "message is not modified";

/// Bot API client over plain HTTPS.
///
/// The token is part of every request path, so request errors are stripped
/// of their url before they are returned.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // Long polls hold the connection for poll_timeout_secs
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .map_err(|e| AppError::Http(e.without_url()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<P, T>(&self, method: &'static str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "Calling Bot API");

        let response = self
            .client
            .post(self.endpoint(method))
            .json(params)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        if !body.ok {
            return Err(AppError::Telegram {
                method: method.to_string(),
                code: body.error_code.unwrap_or(status.as_u16() as i64),
                description: body.description.unwrap_or_default(),
            });
        }

        body.result.ok_or_else(|| AppError::Telegram {
            method: method.to_string(),
            code: status.as_u16() as i64,
            description: "response without result".to_string(),
        })
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call("getUpdates", &request).await
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(&self, chat_id: i64, message: OutgoingMessage) -> Result<SentMessage> {
        let request = SendMessageRequest {
            chat_id,
            text: &message.text,
            parse_mode: PARSE_MODE_HTML,
            link_preview_options: LinkPreviewOptions { is_disabled: true },
            reply_parameters: message.reply_to.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
            reply_markup: message.keyboard.as_ref(),
        };

        let sent: Message = self.call("sendMessage", &request).await?;
        Ok(SentMessage {
            message_id: sent.message_id,
        })
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, message: OutgoingMessage) -> Result<()> {
        let request = EditMessageTextRequest {
            chat_id,
            message_id,
            text: &message.text,
            parse_mode: PARSE_MODE_HTML,
            link_preview_options: LinkPreviewOptions { is_disabled: true },
            reply_markup: message.keyboard.as_ref(),
        };

        // Result is the edited message, or `true` for inline messages
        match self.call::<_, serde_json::Value>("editMessageText", &request).await {
            Ok(_) => Ok(()),
            Err(AppError::Telegram { description, .. }) if description.contains(NOT_MODIFIED) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id: callback_id,
        };
        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }

    async fn set_reaction(&self, chat_id: i64, message_id: i64, emoji: &str) -> Result<()> {
        let request = SetMessageReactionRequest {
            chat_id,
            message_id,
            reaction: vec![ReactionType { kind: "emoji", emoji }],
        };
        let _: bool = self.call("setMessageReaction", &request).await?;
        Ok(())
    }
}
