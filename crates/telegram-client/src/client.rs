use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{ApiResponse, Message, SendMessage, Update};
use crate::{Result, TelegramError};

/// Extra time on top of the long-poll timeout before the HTTP request itself
/// gives up.
const POLL_SLACK: Duration = Duration::from_secs(10);

// ─── Client ───────────────────────────────────────────────────────────────

/// Bot API client bound to one token. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    /// `{api_url}/bot{token}`
    base: String,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

impl Client {
    pub fn new(api_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    /// Long-poll for updates with id `>= offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        self.call(
            "getUpdates",
            &body,
            Duration::from_secs(timeout_secs) + POLL_SLACK,
        )
        .await
    }

    pub async fn send_message(&self, msg: &SendMessage) -> Result<Message> {
        self.call("sendMessage", msg, POLL_SLACK).await
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base, method);
        let text = self
            .http
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?
            .text()
            .await?;

        let parsed: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|source| TelegramError::Parse { body: text, source })?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => Err(TelegramError::Api {
                code: error_code,
                description: description.unwrap_or_else(|| format!("{method} returned no result")),
            }),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
