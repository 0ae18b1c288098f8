use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{InnkeeperError, Result};

/// Top-level service configuration.
///
/// Values come from the environment via [`Config::from_env`]; every field has
/// a sensible default so a bare process starts in a dev-friendly shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub checkout: CheckoutOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

/// Payment gateway credentials. Both are optional: without a secret key the
/// service runs in booking-only mode and the payment routes return a
/// configuration error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOptions {
    /// Page the embedded checkout returns to. The gateway appends the
    /// session id via a template placeholder, so this is the bare URL.
    #[serde(default = "default_return_url")]
    pub return_url: String,
    #[serde(default = "default_max_nights")]
    pub max_nights: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Origin allowed by CORS, normally the frontend dev server.
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_return_url() -> String {
    "http://localhost:5173/booking/complete".to_string()
}

fn default_max_nights() -> u32 {
    30
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_frontend_origin() -> String {
    "http://localhost:5173".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            gateway: GatewayConfig::default(),
            checkout: CheckoutOptions::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            return_url: default_return_url(),
            max_nights: default_max_nights(),
            currency: default_currency(),
            frontend_origin: default_frontend_origin(),
        }
    }
}

impl Config {
    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| InnkeeperError::config(format!("invalid PORT value: {port}")))?;
        }
        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(key) = std::env::var("STRIPE_SECRET_KEY") {
            if !key.is_empty() {
                config.gateway.secret_key = Some(key);
            }
        }
        if let Ok(secret) = std::env::var("STRIPE_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                config.gateway.webhook_secret = Some(secret);
            }
        }
        if let Ok(origin) = std::env::var("FRONTEND_URL") {
            config.checkout.frontend_origin = origin.clone();
            config.checkout.return_url = format!("{}/booking/complete", origin.trim_end_matches('/'));
        }
        if let Ok(url) = std::env::var("CHECKOUT_RETURN_URL") {
            config.checkout.return_url = url;
        }
        if let Ok(nights) = std::env::var("CHECKOUT_MAX_NIGHTS") {
            config.checkout.max_nights = nights.parse().map_err(|_| {
                InnkeeperError::config(format!("invalid CHECKOUT_MAX_NIGHTS value: {nights}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(InnkeeperError::config("server port must be non-zero"));
        }
        if self.checkout.max_nights == 0 {
            return Err(InnkeeperError::config("max_nights must be at least 1"));
        }

        let url = Url::parse(&self.checkout.return_url)
            .map_err(|e| InnkeeperError::config(format!("invalid return_url: {e}")))?;
        let is_local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
        if url.scheme() != "https" && !is_local {
            return Err(InnkeeperError::config(
                "return_url must use https outside of localhost",
            ));
        }

        Ok(())
    }
}
