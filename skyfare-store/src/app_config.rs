use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Prefix for the partial `link` paths returned with each fare.
    pub link_base_url: String,
    pub token: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_provider_backoff")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub token: String,
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
    #[serde(default = "default_attempts")]
    pub delivery_attempts: u32,
    #[serde(default = "default_delivery_backoff")]
    pub delivery_base_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub poll_interval_seconds: u64,
    /// Pause between consecutive per-day provider calls.
    pub rate_limit_ms: u64,
    pub subscription_delay_ms: u64,
    pub notification_cap: usize,
    pub failure_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 900,
            rate_limit_ms: 400,
            subscription_delay_ms: 1000,
            notification_cap: 3,
            failure_threshold: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub result_limit: usize,
    /// Seconds an unanswered `/search` dialogue is kept.
    #[serde(default = "default_dialogue_ttl")]
    pub dialogue_ttl_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_limit: 5,
            dialogue_ttl_seconds: default_dialogue_ttl(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_currency() -> String { "rub".into() }
fn default_provider_timeout() -> u64 { 20 }
fn default_attempts() -> u32 { 3 }
fn default_provider_backoff() -> u64 { 1000 }
fn default_telegram_api() -> String { "https://api.telegram.org".into() }
fn default_poll_timeout() -> u64 { 30 }
fn default_send_timeout() -> u64 { 20 }
fn default_delivery_backoff() -> u64 { 500 }
fn default_dialogue_ttl() -> u64 { 1800 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Secrets come from the environment, e.g. SKYFARE__PROVIDER__TOKEN
            .add_source(config::Environment::with_prefix("SKYFARE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
