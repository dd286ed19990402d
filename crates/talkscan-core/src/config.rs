use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

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

    let parse_i32 = |var: &str, default: &str| -> Result<i32, ConfigError> {
        or_default(var, default)
            .parse::<i32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("TALKSCAN_ENV", "development"));
    let log_level = or_default("TALKSCAN_LOG_LEVEL", "info");
    let subjects_path = PathBuf::from(or_default(
        "TALKSCAN_SUBJECTS_PATH",
        "./config/subjects.yaml",
    ));
    let output_dir = PathBuf::from(or_default("TALKSCAN_OUTPUT_DIR", "./output"));

    let webdriver_url = or_default("TALKSCAN_WEBDRIVER_URL", "http://localhost:9515");
    let webdriver_session_id = lookup("TALKSCAN_WEBDRIVER_SESSION_ID")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let browser_args = parse_list(&or_default("TALKSCAN_BROWSER_ARGS", ""));

    let request_timeout_secs = parse_u64("TALKSCAN_REQUEST_TIMEOUT_SECS", "60")?;
    let navigation_timeout_secs = parse_u64("TALKSCAN_NAVIGATION_TIMEOUT_SECS", "10")?;
    let settle_ms = parse_u64("TALKSCAN_SETTLE_MS", "2000")?;
    let poll_ms = parse_u64("TALKSCAN_POLL_MS", "250")?;

    let max_expand_rounds = parse_u32("TALKSCAN_MAX_EXPAND_ROUNDS", "3")?;
    let max_listing_iterations = parse_u32("TALKSCAN_MAX_LISTING_ITERATIONS", "100")?;
    let max_stalled_iterations = parse_u32("TALKSCAN_MAX_STALLED_ITERATIONS", "10")?;
    let too_old_streak = parse_u32("TALKSCAN_TOO_OLD_STREAK", "10")?;
    if too_old_streak == 0 {
        return Err(invalid(
            "TALKSCAN_TOO_OLD_STREAK",
            "must be at least 1".to_string(),
        ));
    }
    let detail_max_scrolls = parse_u32("TALKSCAN_DETAIL_MAX_SCROLLS", "50")?;

    let inter_navigation_delay_ms = parse_u64("TALKSCAN_INTER_NAVIGATION_DELAY_MS", "2000")?;
    let max_retries = parse_u32("TALKSCAN_MAX_RETRIES", "2")?;
    let retry_backoff_base_secs = parse_u64("TALKSCAN_RETRY_BACKOFF_BASE_SECS", "2")?;

    let utc_offset_hours = parse_i32("TALKSCAN_UTC_OFFSET_HOURS", "8")?;
    if !(-12..=14).contains(&utc_offset_hours) {
        return Err(invalid(
            "TALKSCAN_UTC_OFFSET_HOURS",
            format!("{utc_offset_hours} is outside -12..=14"),
        ));
    }

    Ok(AppConfig {
        env,
        log_level,
        subjects_path,
        output_dir,
        webdriver_url,
        webdriver_session_id,
        browser_args,
        request_timeout_secs,
        navigation_timeout_secs,
        settle_ms,
        poll_ms,
        max_expand_rounds,
        max_listing_iterations,
        max_stalled_iterations,
        too_old_streak,
        detail_max_scrolls,
        inter_navigation_delay_ms,
        max_retries,
        retry_backoff_base_secs,
        utc_offset_hours,
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

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
