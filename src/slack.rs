//! Slack Web API client for the handful of methods the bot calls.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::BotError;

/// Bounds and size of one `conversations.history` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub oldest: i64,
    pub latest: i64,
    pub limit: u32,
}

/// One `conversations.history` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    /// Raw message objects, newest first as Slack returns them.
    pub messages: Vec<Value>,
    /// Slack had more messages in the window than `limit` allowed.
    pub has_more: bool,
}

/// The chat operations the bot depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn channel_info(&self, channel: &str) -> Result<Value>;

    async fn users_list(&self) -> Result<Value>;

    async fn history(&self, channel: &str, window: HistoryWindow) -> Result<HistoryPage>;

    /// Returns the `ts` of the posted message.
    async fn post_message(&self, channel: &str, text: &str, username: &str) -> Result<String>;

    async fn delete_message(&self, channel: &str, ts: &str) -> Result<()>;
}

pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl SlackClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BotError::Config(format!("failed to create slack client: {}", e)))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn get(&self, method: &str, query: &[(&str, String)]) -> Result<Value> {
        let request = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(query);
        self.execute(method, request).await
    }

    async fn post(&self, method: &str, body: Value) -> Result<Value> {
        let request = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.token)
            .json(&body);
        self.execute(method, request).await
    }

    async fn execute(&self, method: &str, request: reqwest::RequestBuilder) -> Result<Value> {
        debug!("Calling slack {}", method);
        let response = request
            .send()
            .await
            .map_err(|e| BotError::api(method, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::api(method, format!("HTTP {}: {}", status, body)).into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BotError::api(method, format!("invalid response body: {}", e)))?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(BotError::api(method, reason).into());
        }
        Ok(body)
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn channel_info(&self, channel: &str) -> Result<Value> {
        self.get("conversations.info", &[("channel", channel.to_string())])
            .await
    }

    async fn users_list(&self) -> Result<Value> {
        self.get("users.list", &[]).await
    }

    async fn history(&self, channel: &str, window: HistoryWindow) -> Result<HistoryPage> {
        let query = [
            ("channel", channel.to_string()),
            ("oldest", window.oldest.to_string()),
            ("latest", window.latest.to_string()),
            ("limit", window.limit.to_string()),
        ];
        let mut body = self.get("conversations.history", &query).await?;
        let has_more = body
            .get("has_more")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        match body.get_mut("messages").map(Value::take) {
            Some(Value::Array(messages)) => Ok(HistoryPage { messages, has_more }),
            _ => Err(BotError::api("conversations.history", "response missing messages").into()),
        }
    }

    async fn post_message(&self, channel: &str, text: &str, username: &str) -> Result<String> {
        let body = self
            .post(
                "chat.postMessage",
                json!({
                    "channel": channel,
                    "text": text,
                    "username": username,
                }),
            )
            .await?;
        Ok(body
            .get("ts")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> Result<()> {
        self.post("chat.delete", json!({ "channel": channel, "ts": ts }))
            .await?;
        Ok(())
    }
}
