use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let api_base_url = require("TORNILLO_API_BASE_URL")?;
    if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
        return Err(invalid(
            "TORNILLO_API_BASE_URL",
            format!("expected an http(s) URL, got '{api_base_url}'"),
        ));
    }

    let env = parse_environment(&or_default("TORNILLO_ENV", "development"));
    let log_level = or_default("TORNILLO_LOG_LEVEL", "info");
    let api_token = lookup("TORNILLO_API_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());

    let request_timeout_secs = parse_u64("TORNILLO_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("TORNILLO_USER_AGENT", "tornillo/0.1 (storefront-client)");
    let max_retries = parse_u32("TORNILLO_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("TORNILLO_RETRY_BACKOFF_BASE_MS", "500")?;

    let default_tax_rate = parse_u32("TORNILLO_DEFAULT_TAX_RATE", "12")?;
    if default_tax_rate == 0 || default_tax_rate > 100 {
        return Err(invalid(
            "TORNILLO_DEFAULT_TAX_RATE",
            format!("expected a percentage in 1..=100, got {default_tax_rate}"),
        ));
    }

    let shipping_raw = or_default("TORNILLO_SHIPPING_FLAT", "0");
    let shipping_flat = Decimal::from_str(shipping_raw.trim())
        .map_err(|e| invalid("TORNILLO_SHIPPING_FLAT", e.to_string()))?;
    if shipping_flat.is_sign_negative() {
        return Err(invalid(
            "TORNILLO_SHIPPING_FLAT",
            "shipping cannot be negative".to_string(),
        ));
    }

    let cart_dir = PathBuf::from(or_default("TORNILLO_CART_DIR", "./.tornillo"));

    Ok(AppConfig {
        api_base_url,
        env,
        log_level,
        api_token,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        default_tax_rate,
        shipping_flat,
        cart_dir,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
