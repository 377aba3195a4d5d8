use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_JWT_EXPIRATION_SECS: u64 = 3600;
const DEFAULT_DUPLICATE_ORDER_WINDOW_SECS: i64 = 300;
const DEFAULT_ACTIVATION_TOKEN_TTL_SECS: i64 = 172_800; // 48h
const DEFAULT_RESET_TOKEN_TTL_SECS: i64 = 3_600; // 1h

/// Payment gateway configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// Base URL of the payment provider API
    #[serde(default = "default_payment_api_base")]
    pub api_base: String,

    /// Provider secret key (sk_test_... / sk_live_...)
    #[serde(default)]
    pub secret_key: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_base: default_payment_api_base(),
            secret_key: String::new(),
        }
    }
}

fn default_payment_api_base() -> String {
    "https://api.stripe.com".to_string()
}

/// Outbound mail configuration. Without an endpoint, mail is logged only.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    /// HTTP mail-relay endpoint; `None` disables real delivery
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sender address stamped on outgoing mail
    #[serde(default = "default_mail_sender")]
    pub sender: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            sender: default_mail_sender(),
        }
    }
}

fn default_mail_sender() -> String {
    "no-reply@storefront.example".to_string()
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment name (development, staging, production)
    #[serde(default = "default_env")]
    pub environment: String,

    /// Log level for the env-filter default directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON-formatted logs
    #[serde(default)]
    pub log_json: bool,

    /// Create missing tables on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Maximum database pool connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum database pool connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// JWT signing secret (minimum 32 characters)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Base URL of the storefront frontend, used to build activation and
    /// password-reset links
    #[serde(default = "default_frontend_base_url")]
    pub frontend_base_url: String,

    /// ISO 4217 currency code (lowercase) used for payment intents
    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 3))]
    pub currency: String,

    /// Window in which an identical pending order counts as a duplicate
    #[serde(default = "default_duplicate_order_window")]
    pub duplicate_order_window_secs: i64,

    /// Lifetime of account-activation tokens
    #[serde(default = "default_activation_token_ttl")]
    pub activation_token_ttl_secs: i64,

    /// Lifetime of password-reset tokens
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: i64,

    #[serde(default)]
    #[validate]
    pub payment: PaymentConfig,

    #[serde(default)]
    #[validate]
    pub mail: MailConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_env() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_jwt_expiration() -> u64 {
    DEFAULT_JWT_EXPIRATION_SECS
}
fn default_frontend_base_url() -> String {
    "http://localhost:5173".to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_duplicate_order_window() -> i64 {
    DEFAULT_DUPLICATE_ORDER_WINDOW_SECS
}
fn default_activation_token_ttl() -> i64 {
    DEFAULT_ACTIVATION_TOKEN_TTL_SECS
}
fn default_reset_token_ttl() -> i64 {
    DEFAULT_RESET_TOKEN_TTL_SECS
}

impl AppConfig {
    /// Minimal constructor used by tests and embedded setups; everything else
    /// takes its default.
    pub fn new(database_url: String, jwt_secret: String, host: String, port: u16) -> Self {
        Self {
            database_url,
            host,
            port,
            environment: default_env(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            jwt_secret,
            jwt_expiration_secs: default_jwt_expiration(),
            frontend_base_url: default_frontend_base_url(),
            currency: default_currency(),
            duplicate_order_window_secs: default_duplicate_order_window(),
            activation_token_ttl_secs: default_activation_token_ttl(),
            reset_token_ttl_secs: default_reset_token_ttl(),
            payment: PaymentConfig::default(),
            mail: MailConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*, nested with `__`)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no default on purpose: it must come from a config file
    // or APP__JWT_SECRET, never from a baked-in constant.
    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET with a secure random string (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET.".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Installs the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".to_string(),
            "a_test_secret_that_is_long_enough_to_pass".to_string(),
            "127.0.0.1".to_string(),
            0,
        )
    }

    #[test]
    fn new_config_fills_defaults() {
        let cfg = test_config();
        assert_eq!(cfg.currency, "usd");
        assert_eq!(cfg.duplicate_order_window_secs, 300);
        assert_eq!(cfg.activation_token_ttl_secs, 172_800);
        assert_eq!(cfg.reset_token_ttl_secs, 3_600);
        assert!(!cfg.is_production());
    }

    #[test]
    fn config_validates_jwt_secret_length() {
        let mut cfg = test_config();
        cfg.jwt_secret = "short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_validates_currency_code() {
        let mut cfg = test_config();
        cfg.currency = "usdollar".to_string();
        assert!(cfg.validate().is_err());
    }
}
