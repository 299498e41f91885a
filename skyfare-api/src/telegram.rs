use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use skyfare_core::{DeliveryError, NotificationSink, OwnerId};
use skyfare_store::app_config::TelegramConfig;
use std::time::Duration;

/// Bot API client: the notification sink and the source of user messages.
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    send_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: OwnerId,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, reqwest::Error> {
        Self::with_base_url(
            &format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.token),
            Duration::from_secs(config.send_timeout_seconds),
        )
    }

    /// `base_url` already includes the `/bot<token>` segment.
    pub fn with_base_url(base_url: &str, send_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            send_timeout,
        })
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> anyhow::Result<Vec<Update>> {
        let response: ApiResponse<Vec<Update>> = self
            .http
            .get(format!("{}/getUpdates", self.base_url))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            anyhow::bail!(
                "getUpdates failed: {}",
                response.description.unwrap_or_default()
            );
        }
        Ok(response.result.unwrap_or_default())
    }
}

/// Splits Bot API failures into "never deliverable to this chat again",
/// "try again" (after `retry_after` seconds when flood control says so) and
/// "this message was refused".
pub fn classify_failure(
    recipient: OwnerId,
    status: StatusCode,
    description: &str,
    retry_after: Option<u64>,
) -> DeliveryError {
    let lowered = description.to_ascii_lowercase();
    let unreachable = status == StatusCode::FORBIDDEN
        || (status == StatusCode::BAD_REQUEST && lowered.contains("chat not found"));

    if unreachable {
        DeliveryError::RecipientUnreachable {
            recipient,
            reason: description.to_string(),
        }
    } else if let (StatusCode::TOO_MANY_REQUESTS, Some(seconds)) = (status, retry_after) {
        DeliveryError::Throttled {
            retry_after: Duration::from_secs(seconds),
        }
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryError::Transient(format!("{status}: {description}"))
    } else {
        DeliveryError::Rejected(format!("{status}: {description}"))
    }
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn send_message(&self, recipient: OwnerId, text: &str) -> Result<(), DeliveryError> {
        let body = SendMessage {
            chat_id: recipient,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .http
            .post(format!("{}/sendMessage", self.base_url))
            .json(&body)
            .timeout(self.send_timeout)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.json::<ApiResponse<serde_json::Value>>().await.ok();
        let retry_after = body
            .as_ref()
            .and_then(|r| r.parameters.as_ref())
            .and_then(|p| p.retry_after);
        let description = body.and_then(|r| r.description).unwrap_or_default();
        Err(classify_failure(recipient, status, &description, retry_after))
    }
}
