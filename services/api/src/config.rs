//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials for the Resend email API.
#[derive(Clone, Debug)]
pub struct EmailSettings {
    pub api_key: String,
    pub from: String,
}

/// Credentials for the Twilio SMS API.
#[derive(Clone, Debug)]
pub struct SmsSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// How many requests a client may make within a window.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitSettings {
    fn from_env(prefix: &str, max_requests: u32, window_secs: u64) -> Result<Self, ConfigError> {
        let max_var = format!("{prefix}_RATE_LIMIT_MAX");
        let window_var = format!("{prefix}_RATE_LIMIT_WINDOW_SECS");
        let settings = Self {
            max_requests: parse_or(&max_var, max_requests)?,
            window_secs: parse_or(&window_var, window_secs)?,
        };
        if settings.max_requests == 0 {
            return Err(ConfigError::InvalidValue(max_var, "must be positive".to_string()));
        }
        if settings.window_secs == 0 {
            return Err(ConfigError::InvalidValue(window_var, "must be positive".to_string()));
        }
        Ok(settings)
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When absent the service runs on in-memory stores.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub cors_origin: String,
    /// Origin of the web app; password reset links point here.
    pub frontend_url: String,
    pub otp_ttl_secs: i64,
    pub otp_sweep_interval_secs: u64,
    /// Allowance on the routes that send verification codes.
    pub otp_rate_limit: RateLimitSettings,
    /// Allowance on the password reset request and reset routes.
    pub reset_rate_limit: RateLimitSettings,
    pub email: Option<EmailSettings>,
    pub sms: Option<SmsSettings>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());
        let frontend_url = std::env::var("FRONTEND_URL").unwrap_or_else(|_| cors_origin.clone());

        // --- Verification Settings ---
        let otp_ttl_secs = parse_or("OTP_TTL_SECS", 300)?;
        let otp_sweep_interval_secs = parse_or("OTP_SWEEP_INTERVAL_SECS", 600)?;
        if otp_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "OTP_TTL_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }
        if otp_sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "OTP_SWEEP_INTERVAL_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }

        // --- Rate Limits ---
        let otp_rate_limit = RateLimitSettings::from_env("OTP", 3, 15 * 60)?;
        let reset_rate_limit = RateLimitSettings::from_env("RESET", 3, 60 * 60)?;

        // --- Message Dispatch (optional; console delivery otherwise) ---
        let email = match std::env::var("RESEND_API_KEY").ok() {
            Some(api_key) => Some(EmailSettings {
                api_key,
                from: std::env::var("EMAIL_FROM")
                    .map_err(|_| ConfigError::MissingVar("EMAIL_FROM".to_string()))?,
            }),
            None => None,
        };

        let sms = match (
            std::env::var("TWILIO_ACCOUNT_SID").ok(),
            std::env::var("TWILIO_AUTH_TOKEN").ok(),
            std::env::var("TWILIO_PHONE_NUMBER").ok(),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsSettings {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            frontend_url,
            otp_ttl_secs,
            otp_sweep_interval_secs,
            otp_rate_limit,
            reset_rate_limit,
            email,
            sms,
        })
    }
}

fn parse_or<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
