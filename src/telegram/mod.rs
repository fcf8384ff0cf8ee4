//! # Telegram Bot API Integration
//!
//! This module is the messaging transport: it long-polls the Bot API for updates,
//! hands each one to the [`DealFinder`] on its own task, and implements [`Delivery`]
//! so the rest of the crate can send and edit messages without knowing about HTTP.
//!
//! ## Methods used
//!
//! - **getUpdates**: long polling with an offset, so every update is seen once
//! - **sendMessage**: new messages, optionally with `<<` / `>>` inline buttons
//! - **editMessageText**: replaces a results page in place when a button is pressed
//! - **answerCallbackQuery**: stops the client-side spinner after a button press
//! - **setMyCommands**: publishes the command menu once at startup
//!
//! ## Environment Configuration
//!
//! Set `TELEGRAM_BOT_TOKEN` to the token issued by BotFather.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::deal_finder::DealFinder;
use crate::models::ChatId;
use crate::models::telegram::{
    AnswerCallbackQuery, ApiResponse, BotCommand, EditMessageText, GetUpdates,
    InlineKeyboardButton, InlineKeyboardMarkup, Message, SendMessage, SetMyCommands, Update,
};
use crate::pagination::PageToken;
use crate::traits::{Delivery, MessageRef, PageControls};

mod queue;

use queue::ChatQueues;

const API_BASE: &str = "https://api.telegram.org";

/// Seconds the server may hold a `getUpdates` call open
const POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram Bot API client.
///
/// `Clone` is cheap: the `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct TelegramBot {
    client: Client,
    /// `https://api.telegram.org/bot<token>`
    endpoint: String,
}

impl TelegramBot {
    pub fn new(token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 30))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{API_BASE}/bot{token}"),
        })
    }

    /// Call a Bot API method and unwrap its `{ok, result}` envelope
    async fn call<P, R>(&self, method: &str, payload: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, method))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse<R> = response.json().await?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(anyhow::anyhow!(
                "Telegram {} failed ({}): {}",
                method,
                status,
                description.unwrap_or_default()
            )),
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let request = GetUpdates {
            offset,
            timeout: POLL_TIMEOUT_SECS,
            allowed_updates: vec!["message", "callback_query"],
        };

        self.call("getUpdates", &request).await
    }

    pub async fn answer_callback(&self, callback_query_id: &str) -> Result<()> {
        let request = AnswerCallbackQuery {
            callback_query_id: callback_query_id.to_string(),
        };

        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }

    /// Publish the command menu shown by Telegram clients
    pub async fn set_commands(&self) -> Result<()> {
        let _: bool = self.call("setMyCommands", &command_menu()).await?;
        info!("Registered bot commands");
        Ok(())
    }

    /// Poll for updates forever.
    ///
    /// Updates of one chat are handled in the order they arrived, each chat on its own
    /// task. Polling errors are logged and retried after a short pause.
    pub async fn listen(self: Arc<Self>, finder: DealFinder) {
        info!("Listening for Telegram updates");
        let queues = ChatQueues::new();
        let mut offset = 0;

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Polling Telegram failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let Some(chat) = update.chat_id() else {
                    debug!("Skipping update {} without a chat", update.update_id);
                    continue;
                };

                let bot = self.clone();
                let finder = finder.clone();
                queues.push(ChatId(chat), update, move |update| {
                    let bot = bot.clone();
                    let finder = finder.clone();
                    async move {
                        if let Err(e) = bot.dispatch(&finder, update).await {
                            error!("Error handling update: {}", e);
                        }
                    }
                });
            }
        }
    }

    async fn dispatch(&self, finder: &DealFinder, update: Update) -> Result<()> {
        if let Some(message) = update.message
            && let Some(text) = message.text.as_deref()
        {
            let username = message.from.as_ref().and_then(|u| u.username.as_deref());
            return finder
                .handle_message(ChatId(message.chat.id), username, text)
                .await;
        }

        if let Some(query) = update.callback_query {
            debug!("Callback from user {}: {:?}", query.from.id, query.data);

            let result = match (&query.message, query.data.as_deref()) {
                (Some(message), Some(data)) if PageToken::matches(data) => {
                    finder
                        .handle_page_request(ChatId(message.chat.id), MessageRef(message.message_id), data)
                        .await
                }
                _ => Ok(()),
            };

            self.answer_callback(&query.id).await?;
            return result;
        }

        Ok(())
    }
}

fn command_menu() -> SetMyCommands {
    let command = |command: &'static str, description: &'static str| BotCommand { command, description };

    SetMyCommands {
        commands: vec![
            command("start", "Start the bot."),
            command("categories", "Select a category."),
            command("subscribe", "Subscribe to the daily notification about high sales."),
            command("unsubscribe", "Unsubscribe from the daily notification."),
            command("cancel", "Cancel the current search."),
        ],
    }
}

/// Lay pagination controls out as a single row of inline buttons
fn keyboard(controls: Option<PageControls>) -> Option<InlineKeyboardMarkup> {
    let controls = controls?;
    let row: Vec<InlineKeyboardButton> = [("<<", controls.prev), (">>", controls.next)]
        .into_iter()
        .filter_map(|(label, token)| {
            token.map(|token| InlineKeyboardButton {
                text: label.to_string(),
                callback_data: token.to_string(),
            })
        })
        .collect();

    (!row.is_empty()).then(|| InlineKeyboardMarkup {
        inline_keyboard: vec![row],
    })
}

#[async_trait]
impl Delivery for TelegramBot {
    async fn send(&self, chat: ChatId, text: &str, controls: Option<PageControls>) -> Result<MessageRef> {
        let request = SendMessage {
            chat_id: chat.0,
            text: text.to_string(),
            disable_web_page_preview: true,
            reply_markup: keyboard(controls),
        };

        let message: Message = self.call("sendMessage", &request).await?;
        Ok(MessageRef(message.message_id))
    }

    async fn edit(
        &self,
        chat: ChatId,
        message: MessageRef,
        text: &str,
        controls: Option<PageControls>,
    ) -> Result<()> {
        let request = EditMessageText {
            chat_id: chat.0,
            message_id: message.0,
            text: text.to_string(),
            disable_web_page_preview: true,
            reply_markup: keyboard(controls),
        };

        // Telegram answers with the edited message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Namespace;

    #[test]
    fn test_keyboard_layout() {
        let markup = keyboard(Some(PageControls {
            prev: Some(PageToken::new(Namespace::Interactive, 1)),
            next: Some(PageToken::new(Namespace::Interactive, 3)),
        }))
        .unwrap();

        let json = serde_json::to_value(&markup).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "inline_keyboard": [[
                    {"text": "<<", "callback_data": "products-1"},
                    {"text": ">>", "callback_data": "products-3"}
                ]]
            })
        );
    }

    #[test]
    fn test_no_controls_no_keyboard() {
        assert!(keyboard(None).is_none());
        assert!(keyboard(Some(PageControls::default())).is_none());
    }

    #[test]
    fn test_send_message_omits_missing_markup() {
        let request = SendMessage {
            chat_id: 5,
            text: "hi".to_string(),
            disable_web_page_preview: true,
            reply_markup: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("reply_markup").is_none());
    }

    #[test]
    fn test_command_menu() {
        let json = serde_json::to_value(command_menu()).unwrap();
        let commands: Vec<&str> = json["commands"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["command"].as_str().unwrap())
            .collect();
        assert_eq!(commands, vec!["start", "categories", "subscribe", "unsubscribe", "cancel"]);
        assert!(json["commands"][0]["description"].is_string());
    }

    #[test]
    fn test_parse_update() {
        let update: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok":true,"result":[{"update_id":10,"callback_query":{"id":"q1","from":{"id":7,"username":"climber"},
                "message":{"message_id":99,"chat":{"id":7},"text":"old page"},"data":"products-notification-2"}}]}"#,
        )
        .unwrap();

        let update = &update.result.unwrap()[0];
        let query = update.callback_query.as_ref().unwrap();
        assert_eq!(update.update_id, 10);
        assert_eq!(query.data.as_deref(), Some("products-notification-2"));
        assert_eq!(query.message.as_ref().unwrap().message_id, 99);
        assert!(update.message.is_none());
        assert_eq!(update.chat_id(), Some(7));
    }
}
