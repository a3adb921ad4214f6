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
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

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

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let github_token = require("FESTMAP_GITHUB_TOKEN")?;
    let github_owner = require("FESTMAP_GITHUB_OWNER")?;
    let github_repo = require("FESTMAP_GITHUB_REPO")?;
    let github_branch = or_default("FESTMAP_GITHUB_BRANCH", "main");
    let github_path = or_default("FESTMAP_GITHUB_PATH", "data/map-data.json")
        .trim_start_matches('/')
        .to_string();
    let github_api_url = or_default("FESTMAP_GITHUB_API_URL", "https://api.github.com");

    let env = parse_environment(&or_default("FESTMAP_ENV", "development"))?;

    let bind_addr = or_default("FESTMAP_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("FESTMAP_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("FESTMAP_LOG_LEVEL", "info");
    let allowed_origins = parse_list(&or_default("FESTMAP_ALLOWED_ORIGINS", ""));

    let request_timeout_secs = parse_u64("FESTMAP_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("FESTMAP_USER_AGENT", "festmap/0.1 (map-sync)");

    let backup_dir = PathBuf::from(or_default("FESTMAP_BACKUP_DIR", "./backups"));
    let backup_retain = parse_usize("FESTMAP_BACKUP_RETAIN", "10")?;
    if backup_retain == 0 {
        return Err(invalid(
            "FESTMAP_BACKUP_RETAIN",
            "must keep at least one backup".to_string(),
        ));
    }

    let cache_path = PathBuf::from(or_default("FESTMAP_CACHE_PATH", "./data/map-data.json"));
    let max_upload_bytes = parse_usize("FESTMAP_MAX_UPLOAD_BYTES", "5242880")?;
    let sync_cron = or_default("FESTMAP_SYNC_CRON", "0 */15 * * * *");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        github_token,
        github_owner,
        github_repo,
        github_branch,
        github_path,
        github_api_url,
        request_timeout_secs,
        user_agent,
        allowed_origins,
        backup_dir,
        backup_retain,
        cache_path,
        max_upload_bytes,
        sync_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FESTMAP_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
