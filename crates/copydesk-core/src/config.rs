use crate::app_config::{AppConfig, Environment, ServiceLimits};
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

/// Load application configuration from environment variables already in the
/// process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for
/// testing or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual
/// environment so it can be tested with a pure `HashMap` lookup — no
/// `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default =
        |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let research_url = require("COPYDESK_RESEARCH_URL")?;
    let research_api_key = require("COPYDESK_RESEARCH_API_KEY")?;
    let writer_url = require("COPYDESK_WRITER_URL")?;
    let writer_api_key = require("COPYDESK_WRITER_API_KEY")?;
    let writer_model = or_default("COPYDESK_WRITER_MODEL", "longform-1");

    // Image generation and CMS export are optional capabilities; the
    // pipeline degrades gracefully when they are absent.
    let image_url = lookup("COPYDESK_IMAGE_URL").ok();
    let image_api_key = lookup("COPYDESK_IMAGE_API_KEY").ok();
    let cms_url = lookup("COPYDESK_CMS_URL").ok();
    let cms_token = lookup("COPYDESK_CMS_TOKEN").ok();

    let env = parse_environment(&or_default("COPYDESK_ENV", "development"));
    let bind_addr = parse_addr("COPYDESK_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("COPYDESK_LOG_LEVEL", "info");
    let templates_path = lookup("COPYDESK_TEMPLATES_PATH").ok().map(PathBuf::from);

    let request_timeout_secs = parse_u64("COPYDESK_REQUEST_TIMEOUT_SECS", "60")?;
    let user_agent = or_default("COPYDESK_USER_AGENT", "copydesk/0.1 (content-pipeline)");
    let max_retries = parse_u32("COPYDESK_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("COPYDESK_RETRY_BACKOFF_BASE_MS", "1000")?;

    let limits = ServiceLimits {
        research_per_minute: parse_usize("COPYDESK_RESEARCH_PER_MINUTE", "10")?,
        writer_per_minute: parse_usize("COPYDESK_WRITER_PER_MINUTE", "20")?,
        image_per_minute: parse_usize("COPYDESK_IMAGE_PER_MINUTE", "5")?,
        publish_per_minute: parse_usize("COPYDESK_PUBLISH_PER_MINUTE", "30")?,
    };
    let limiter_max_wait_secs = parse_u64("COPYDESK_LIMITER_MAX_WAIT_SECS", "30")?;

    let session_ttl_secs = parse_u64("COPYDESK_SESSION_TTL_SECS", "3600")?;
    let sweep_interval_secs = parse_u64("COPYDESK_SWEEP_INTERVAL_SECS", "60")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        templates_path,
        research_url,
        research_api_key,
        writer_url,
        writer_api_key,
        writer_model,
        image_url,
        image_api_key,
        cms_url,
        cms_token,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        limits,
        limiter_max_wait_secs,
        session_ttl_secs,
        sweep_interval_secs,
    })
}

fn parse_environment(raw: &str) -> Environment {
    match raw.to_ascii_lowercase().as_str() {
        "production" | "prod" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("COPYDESK_RESEARCH_URL", "https://research.test/v1"),
            ("COPYDESK_RESEARCH_API_KEY", "rk-test"),
            ("COPYDESK_WRITER_URL", "https://writer.test/v1"),
            ("COPYDESK_WRITER_API_KEY", "wk-test"),
        ])
    }

    fn build(env: &HashMap<&str, &str>) -> Result<AppConfig, ConfigError> {
        build_app_config(|key| {
            env.get(key)
                .map(|v| (*v).to_string())
                .ok_or(std::env::VarError::NotPresent)
        })
    }

    #[test]
    fn loads_with_required_vars_and_defaults() {
        let config = build(&base_env()).expect("config should load");
        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.writer_model, "longform-1");
        assert_eq!(config.limits.research_per_minute, 10);
        assert!(config.image_url.is_none());
        assert!(config.cms_url.is_none());
        assert_eq!(config.session_ttl_secs, 3600);
    }

    #[test]
    fn missing_required_var_is_an_error() {
        let mut env = base_env();
        env.remove("COPYDESK_WRITER_API_KEY");
        let err = build(&env).expect_err("missing writer key must fail");
        assert!(matches!(err, ConfigError::MissingEnvVar(v) if v == "COPYDESK_WRITER_API_KEY"));
    }

    #[test]
    fn invalid_numeric_var_is_an_error() {
        let mut env = base_env();
        env.insert("COPYDESK_RESEARCH_PER_MINUTE", "lots");
        let err = build(&env).expect_err("non-numeric limit must fail");
        assert!(
            matches!(err, ConfigError::InvalidEnvVar { var, .. } if var == "COPYDESK_RESEARCH_PER_MINUTE")
        );
    }

    #[test]
    fn parses_environment_aliases() {
        let mut env = base_env();
        env.insert("COPYDESK_ENV", "prod");
        let config = build(&env).expect("config should load");
        assert_eq!(config.env, Environment::Production);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = build(&base_env()).expect("config should load");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("rk-test"), "research key leaked: {rendered}");
        assert!(!rendered.contains("wk-test"), "writer key leaked: {rendered}");
        assert!(rendered.contains("[redacted]"));
    }
}
