// Telegram Bot API client
//
// Only the handful of methods the bot needs.

use crate::bot::{Button, Reply};
use crate::error::{HaikuError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: &'a [Vec<Button>],
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Serialize)]
struct EditMessageRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct ChatActionRequest {
    chat_id: i64,
    action: &'static str,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// `poll_timeout` bounds getUpdates; the HTTP timeout leaves headroom
    /// above it.
    pub fn new(api_base: &str, token: &str, poll_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| HaikuError::TelegramError(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| HaikuError::TelegramError(format!("{}: {}", method, e.without_url())))?;

        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await.map_err(|e| {
            HaikuError::TelegramError(format!("{}: HTTP {}: {}", method, status, e.without_url()))
        })?;

        if !parsed.ok {
            return Err(HaikuError::TelegramError(format!(
                "{}: {}",
                method,
                parsed.description.unwrap_or_else(|| format!("HTTP {}", status))
            )));
        }

        parsed.result.ok_or_else(|| {
            HaikuError::TelegramError(format!("{}: response has no result", method))
        })
    }

    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message", "callback_query"],
        };
        self.call("getUpdates", &request).await
    }

    pub async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text: &reply.text,
            parse_mode: parse_mode(reply),
            reply_markup: keyboard(reply),
        };
        let _: Message = self.call("sendMessage", &request).await?;
        Ok(())
    }

    pub async fn edit_message_text(&self, chat_id: i64, message_id: i64, reply: &Reply) -> Result<()> {
        let request = EditMessageRequest {
            chat_id,
            message_id,
            text: &reply.text,
            parse_mode: parse_mode(reply),
            reply_markup: keyboard(reply),
        };
        // Returns the edited Message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &request).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let _: bool = self
            .call("answerCallbackQuery", &AnswerCallbackRequest { callback_query_id })
            .await?;
        Ok(())
    }

    pub async fn send_typing(&self, chat_id: i64) -> Result<()> {
        let request = ChatActionRequest {
            chat_id,
            action: "typing",
        };
        let _: bool = self.call("sendChatAction", &request).await?;
        Ok(())
    }
}

fn parse_mode(reply: &Reply) -> Option<&'static str> {
    reply.markdown.then_some("Markdown")
}

fn keyboard(reply: &Reply) -> Option<InlineKeyboard<'_>> {
    if reply.buttons.is_empty() {
        return None;
    }
    Some(InlineKeyboard {
        inline_keyboard: &reply.buttons,
    })
}
