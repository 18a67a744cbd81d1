//! Bridge configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! `main` loads an optional `.env` file first, so every value here can come
//! from either the process environment or that file. Required values fail
//! startup; tuning knobs fall back to defaults when absent or unparseable.

pub const DEFAULT_SERVICE_PORT: u16 = 8080;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FORWARD_QUEUE_CAPACITY: usize = 1024;
/// The server pings roughly once a minute; two missed pings mean the link is dead.
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or blank.
    #[error("missing required env var {var}")]
    Missing { var: &'static str },

    /// An environment variable is set but cannot be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Connection settings for the Mattermost server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MattermostConfig {
    /// Websocket endpoint, e.g. `wss://chat.example.com/api/v4/websocket`.
    pub ws_url: String,
    /// REST base, e.g. `https://chat.example.com/api/v4`. Stored without a trailing slash.
    pub api_url: String,
    pub bot_token: String,
    /// The bridge's own user id. Enables the self-message filter and DM replies.
    pub bot_user_id: Option<String>,
    /// Reconnect when the event stream stays silent this long.
    pub stream_idle_timeout_secs: u64,
}

/// Downstream automation webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: String,
}

/// Settings for the local HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_key: String,
    pub port: u16,
    pub http_timeout_secs: u64,
    pub forward_queue_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub mattermost: MattermostConfig,
    pub webhook: WebhookConfig,
    pub service: ServiceConfig,
}

impl BridgeConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `MATTERMOST_WS_URL`, `MATTERMOST_API_URL`, `MATTERMOST_BOT_TOKEN`
    /// - `N8N_INBOUND_WEBHOOK_URL`
    /// - `SERVICE_API_KEY`
    ///
    /// Optional:
    /// - `BOT_USER_ID`
    /// - `N8N_WEBHOOK_SECRET`: default empty
    /// - `SERVICE_PORT`: default 8080
    /// - `HTTP_TIMEOUT_SECS`: default 10
    /// - `FORWARD_QUEUE_CAPACITY`: default 1024
    /// - `STREAM_IDLE_TIMEOUT_SECS`: default 120
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or `SERVICE_PORT`
    /// is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mattermost = MattermostConfig {
            ws_url: required("MATTERMOST_WS_URL")?,
            api_url: required("MATTERMOST_API_URL")?.trim_end_matches('/').to_string(),
            bot_token: required("MATTERMOST_BOT_TOKEN")?,
            bot_user_id: optional("BOT_USER_ID"),
            stream_idle_timeout_secs: env_parse("STREAM_IDLE_TIMEOUT_SECS", DEFAULT_STREAM_IDLE_TIMEOUT_SECS).max(1),
        };

        let webhook = WebhookConfig {
            url: required("N8N_INBOUND_WEBHOOK_URL")?,
            secret: optional("N8N_WEBHOOK_SECRET").unwrap_or_default(),
        };

        let port = match optional("SERVICE_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "SERVICE_PORT", value: raw })?,
            None => DEFAULT_SERVICE_PORT,
        };

        let service = ServiceConfig {
            api_key: required("SERVICE_API_KEY")?,
            port,
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            forward_queue_capacity: env_parse("FORWARD_QUEUE_CAPACITY", DEFAULT_FORWARD_QUEUE_CAPACITY).max(1),
        };

        Ok(Self { mattermost, webhook, service })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::Missing { var })
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
