//! Telegram Bot channel: message sending and long polling for commands.

use async_trait::async_trait;
use hwbot_core::config::TelegramConfig;
use hwbot_core::error::{HwBotError, Result};
use hwbot_core::traits::{CommandSource, Notifier};
use hwbot_core::types::{Command, IncomingCommand};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram Bot channel bound to a single chat.
pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
    api_base: String,
    request_timeout: Duration,
    client: reqwest::Client,
    last_update_id: i64,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| HwBotError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            request_timeout,
            client,
            last_update_id: 0,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Send a plain-text message to `chat_id`.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| HwBotError::Delivery(format!("sendMessage failed: {}", e.without_url())))?;

        let status = response.status();
        let result: TelegramApiResponse<serde_json::Value> = response.json().await.map_err(|e| {
            HwBotError::Delivery(format!("Invalid send response (HTTP {status}): {}", e.without_url()))
        })?;

        if !result.ok {
            return Err(HwBotError::Delivery(format!(
                "Telegram API error: {}",
                result.description.unwrap_or_else(|| format!("HTTP {status}"))
            )));
        }
        Ok(())
    }

    /// Get updates using long polling. `timeout_secs` of 0 is a short poll.
    pub async fn get_updates(&mut self, timeout_secs: u64) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", (self.last_update_id + 1).to_string()),
                ("timeout", timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .timeout(self.request_timeout + Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| {
                HwBotError::Connectivity(format!("Telegram getUpdates failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response.json().await.map_err(|e| {
            HwBotError::Parse(format!("Invalid Telegram response: {}", e.without_url()))
        })?;

        if !body.ok {
            return Err(HwBotError::transport(
                status.as_u16(),
                &body.description.unwrap_or_default(),
            ));
        }

        let updates = body.result.unwrap_or_default();
        if let Some(last) = updates.last() {
            self.last_update_id = last.update_id;
        }
        Ok(updates)
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| HwBotError::Connectivity(format!("getMe failed: {}", e.without_url())))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| HwBotError::Parse(format!("Invalid getMe response: {}", e.without_url())))?;
        body.result
            .ok_or_else(|| HwBotError::Parse(body.description.unwrap_or_else(|| "No bot info".into())))
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.send_message(&self.chat_id, text).await
    }
}

#[async_trait]
impl CommandSource for TelegramChannel {
    async fn poll_commands(&mut self, wait: Duration) -> Result<Vec<IncomingCommand>> {
        let updates = self.get_updates(wait.as_secs()).await?;
        let commands = updates
            .iter()
            .filter_map(TelegramUpdate::to_command)
            .filter(|cmd| {
                let ours = cmd.chat_id == self.chat_id;
                if !ours {
                    tracing::debug!("Ignoring command from foreign chat {}", cmd.chat_id);
                }
                ours
            })
            .collect();
        Ok(commands)
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl TelegramUpdate {
    /// Extract a bot command, skipping plain text and messages from bots.
    pub fn to_command(&self) -> Option<IncomingCommand> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        if msg.from.as_ref().is_some_and(|u| u.is_bot) {
            return None;
        }
        Some(IncomingCommand {
            chat_id: msg.chat.id.to_string(),
            command: Command::parse(text)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(server: &MockServer) -> TelegramChannel {
        TelegramChannel::new(&TelegramConfig {
            bot_token: "123:abc".into(),
            chat_id: "42".into(),
            api_base: server.uri(),
            request_timeout_secs: 2,
            ..TelegramConfig::default()
        })
        .unwrap()
    }

    fn update(update_id: i64, chat_id: i64, text: &str) -> serde_json::Value {
        serde_json::json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "from": {"id": 7, "is_bot": false, "first_name": "Student"},
                "chat": {"id": chat_id, "type": "private"},
                "text": text,
                "date": 1700000000
            }
        })
    }

    #[tokio::test]
    async fn test_send_posts_to_configured_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(serde_json::json!({"chat_id": "42", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true, "result": {"message_id": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        channel(&server).send("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_api_error_is_delivery_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false, "description": "Bad Request: chat not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        match channel(&server).send("hello").await {
            Err(HwBotError::Delivery(msg)) => assert!(msg.contains("chat not found")),
            other => panic!("expected delivery error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_commands_filters_chat_and_advances_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getUpdates"))
            .and(query_param("offset", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    update(10, 42, "/status"),
                    update(11, 99, "/status"),
                    update(12, 42, "just chatting"),
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getUpdates"))
            .and(query_param("offset", "13"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "result": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut tg = channel(&server);
        let commands = tg.poll_commands(Duration::ZERO).await.unwrap();
        assert_eq!(
            commands,
            vec![IncomingCommand { chat_id: "42".into(), command: Command::Status }]
        );
        assert!(tg.poll_commands(Duration::ZERO).await.unwrap().is_empty());
    }

    #[test]
    fn test_bot_messages_ignored() {
        let mut raw = update(1, 42, "/status");
        raw["message"]["from"]["is_bot"] = serde_json::Value::Bool(true);
        let upd: TelegramUpdate = serde_json::from_value(raw).unwrap();
        assert!(upd.to_command().is_none());
    }
}
