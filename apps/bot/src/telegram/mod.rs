//! Telegram Bot API client. Nothing else in the crate talks to Telegram.
//!
//! Covers the four calls the bot needs: `getMe` (token check at startup),
//! `getUpdates` (long polling), `getFile` + file download, and `sendPhoto`.
//! The token is part of every URL, so URLs are stripped from HTTP errors before
//! they can reach a log line.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::dispatcher::PhotoTransport;

pub mod poller;
pub mod types;

use types::{ApiResponse, File, Update, User};

const API_BASE: &str = "https://api.telegram.org";
/// Slack on top of the long-poll timeout before the HTTP client gives up.
const REQUEST_SLACK: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Bot API error in {method} ({code}): {description}")]
    Api {
        method: &'static str,
        code: i32,
        description: String,
    },

    #[error("Bot API returned no result for {method}")]
    EmptyResult { method: &'static str },

    #[error("File {file_id} has no download path")]
    NoFilePath { file_id: String },

    #[error("File download failed with status {status}")]
    Download { status: u16 },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.without_url())
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String, poll_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(poll_timeout + REQUEST_SLACK)
            .build()?;
        Ok(Self { client, token })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{API_BASE}/file/bot{}/{file_path}", self.token)
    }

    async fn call<P, T>(&self, method: &'static str, params: &P) -> Result<T, TransportError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .send()
            .await?;

        // Error responses carry the same JSON envelope, whatever the status code.
        let envelope: ApiResponse<T> = response.json().await?;
        envelope.into_result(method)
    }

    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", &json!({})).await
    }

    /// Long-polls for updates with id ≥ `offset`, waiting up to `timeout` seconds.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: u64,
    ) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TransportError> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }

    pub async fn download(&self, file_path: &str) -> Result<Bytes, TransportError> {
        let response = self.client.get(self.file_url(file_path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Download {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl PhotoTransport for TelegramClient {
    async fn fetch_photo(&self, file_id: &str) -> Result<Bytes, TransportError> {
        let file = self.get_file(file_id).await?;
        let path = file.file_path.ok_or_else(|| TransportError::NoFilePath {
            file_id: file.file_id.clone(),
        })?;

        debug!(file_id, "Downloading photo");
        self.download(&path).await
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        image: Bytes,
        file_name: &str,
    ) -> Result<(), TransportError> {
        let photo = Part::bytes(image.to_vec())
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;

        let envelope: ApiResponse<IgnoredAny> = response.json().await?;
        envelope.into_result("sendPhoto").map(|_| ())
    }
}
