use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use skyfare_core::retry::{with_retry, RetryConfig, RetryableError};
use skyfare_core::{AirportCode, ProviderFare, QuoteProvider};
use skyfare_store::app_config::ProviderConfig;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("provider rate limit reached")]
    RateLimited,
    #[error("provider returned status {0}")]
    Status(StatusCode),
    #[error("provider request timed out")]
    Timeout,
    #[error("provider transport error: {0}")]
    Transport(String),
}

impl RetryableError for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited | FetchError::Timeout | FetchError::Transport(_) => true,
            FetchError::Status(status) => status.is_server_error(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub token: String,
    pub currency: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl ProviderSettings {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            currency: config.currency.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            retry: RetryConfig::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
        }
    }
}

/// Client for the Travelpayouts `prices_for_dates` endpoint.
pub struct TravelpayoutsClient {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl TravelpayoutsClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { http, settings })
    }

    async fn fetch_once(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
        passengers: u32,
    ) -> Result<Vec<ProviderFare>, FetchError> {
        let departure_at = date.format("%Y-%m-%d").to_string();
        let adults = passengers.to_string();

        let response = self
            .http
            .get(&self.settings.base_url)
            .query(&[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("departure_at", departure_at.as_str()),
                ("adults", adults.as_str()),
                ("currency", self.settings.currency.as_str()),
                ("token", self.settings.token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        match response.json::<Value>().await {
            Ok(body) => Ok(parse_fares(&body)),
            Err(err) if err.is_timeout() => Err(FetchError::Timeout),
            Err(err) => {
                debug!(error = %err, %date, "Provider body is not JSON, treating as no fares");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl QuoteProvider for TravelpayoutsClient {
    async fn fetch_day(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
        passengers: u32,
    ) -> Vec<ProviderFare> {
        let result = with_retry(&self.settings.retry, || {
            self.fetch_once(origin, destination, date, passengers)
        })
        .await;

        match result {
            Ok(fares) => {
                debug!(%origin, %destination, %date, count = fares.len(), "Fetched fares");
                fares
            }
            Err(err) => {
                warn!(
                    %origin,
                    %destination,
                    %date,
                    error = %err,
                    "Giving up on provider day, reporting no fares"
                );
                Vec::new()
            }
        }
    }
}

/// Reads the `data` array of a provider response. A missing or malformed
/// list yields no fares; malformed items are skipped.
pub fn parse_fares(body: &Value) -> Vec<ProviderFare> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_fare).collect())
        .unwrap_or_default()
}

fn parse_fare(item: &Value) -> Option<ProviderFare> {
    let object = item.as_object()?;
    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

    let price = object.get("price").and_then(|price| {
        price
            .as_i64()
            .or_else(|| price.as_f64().map(|p| p.round() as i64))
    });

    Some(ProviderFare {
        origin: text("origin").unwrap_or_default(),
        destination: text("destination").unwrap_or_default(),
        departure_at: text("departure_at").unwrap_or_default(),
        price: price.filter(|p| *p >= 0),
        airline: text("airline"),
        link: text("link"),
    })
}
