use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::notify::Attachment;

const SLACK_API_BASE: &str = "https://slack.com/api";
const SLACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal Slack Web API client: one status message the relay keeps
/// editing, plus the thread underneath it for operator commands.
#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
    #[serde(default)]
    messages: Vec<ThreadMessage>,
}

/// A message in the thread under the status card.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub ts: String,
    #[serde(default)]
    pub text: String,
}

impl SlackClient {
    pub fn new(token: String) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SLACK_TIMEOUT).build()?;
        Ok(Self {
            client,
            token,
            base_url: SLACK_API_BASE.to_string(),
        })
    }

    /// Posts the status card; returns the message ts used for later edits.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<String> {
        let reply = self
            .post(
                "chat.postMessage",
                json!({
                    "channel": channel,
                    "text": text,
                    "attachments": attachments,
                }),
            )
            .await?;

        reply
            .ts
            .ok_or_else(|| AppError::Notification("chat.postMessage reply has no ts".to_string()))
    }

    pub async fn post_thread_reply(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<()> {
        self.post(
            "chat.postMessage",
            json!({
                "channel": channel,
                "text": text,
                "thread_ts": thread_ts,
            }),
        )
        .await?;
        Ok(())
    }

    /// Edits the status card in place.
    pub async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<()> {
        self.post(
            "chat.update",
            json!({
                "channel": channel,
                "ts": ts,
                "text": text,
                "attachments": attachments,
            }),
        )
        .await?;
        Ok(())
    }

    /// Messages in the thread under `ts`, strictly newer than `oldest`
    /// when a cursor is given.
    pub async fn thread_replies(
        &self,
        channel: &str,
        ts: &str,
        oldest: Option<&str>,
    ) -> Result<Vec<ThreadMessage>> {
        let url = format!("{}/conversations.replies", self.base_url);
        let mut query = vec![("channel", channel.to_string()), ("ts", ts.to_string())];
        if let Some(oldest) = oldest {
            query.push(("oldest", oldest.to_string()));
            query.push(("inclusive", "false".to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                AppError::Notification(format!("conversations.replies request failed: {}", e))
            })?;

        let reply = Self::parse_reply("conversations.replies", response).await?;
        Ok(reply.messages)
    }

    async fn post(&self, method: &str, payload: serde_json::Value) -> Result<ApiReply> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("{} request failed: {}", method, e)))?;

        Self::parse_reply(method, response).await
    }

    async fn parse_reply(method: &str, response: reqwest::Response) -> Result<ApiReply> {
        let reply: ApiReply = response
            .json()
            .await
            .map_err(|e| AppError::Notification(format!("{} reply unreadable: {}", method, e)))?;

        if !reply.ok {
            let detail = reply.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(AppError::Notification(format!("{} failed: {}", method, detail)));
        }
        Ok(reply)
    }
}
