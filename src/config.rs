use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Production API host used when neither an override nor a development proxy applies.
pub const PRODUCTION_BASE_URL: &str = "https://api-iot.wibudev.moe";

/// Proxy path exposed by the development front-end server.
pub const DEFAULT_DEV_PROXY_URL: &str = "http://localhost:5173/api";

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Build mode flag, `GREENHOUSE_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(anyhow::anyhow!("unknown mode: {other:?}")),
        }
    }
}

/// Development when the mode flag says so or the front end runs on a loopback host.
pub fn is_development(mode: Mode, frontend_host: &str) -> bool {
    mode == Mode::Development || frontend_host == "localhost" || frontend_host == "127.0.0.1"
}

/// Base URL precedence: explicit override, then the dev proxy, then the production host.
pub fn resolve_base_url(
    override_url: Option<&str>,
    development: bool,
    dev_proxy_url: &str,
) -> String {
    let url = match override_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url.trim(),
        None if development => dev_proxy_url,
        None => PRODUCTION_BASE_URL,
    };
    url.trim_end_matches('/').to_owned()
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub development: bool,
    /// Free-form label, only ever logged.
    pub environment: String,
    pub request_timeout: Duration,
    /// Sensor polling interval.
    pub poll_interval: Duration,
    pub default_room_id: u32,
    /// Directory holding the session record and preferences.
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mode = optional("GREENHOUSE_MODE", "production")
            .parse::<Mode>()
            .context("GREENHOUSE_MODE must be 'development' or 'production'")?;
        let frontend_host = optional("GREENHOUSE_FRONTEND_HOST", "");
        let development = is_development(mode, &frontend_host);
        let override_url = std::env::var("GREENHOUSE_API_BASE_URL").ok();

        Ok(Self {
            base_url: resolve_base_url(
                override_url.as_deref(),
                development,
                &optional("GREENHOUSE_DEV_PROXY_URL", DEFAULT_DEV_PROXY_URL),
            ),
            development,
            environment: optional("GREENHOUSE_ENVIRONMENT", "production"),
            request_timeout: parse_timeout(&optional("GREENHOUSE_TIMEOUT_MS", "10000"))
                .context("GREENHOUSE_TIMEOUT_MS must be a positive integer")?,
            poll_interval: parse_interval(&optional("GREENHOUSE_POLL_INTERVAL_MS", "5000"))?,
            default_room_id: optional("GREENHOUSE_ROOM_ID", "1")
                .parse()
                .context("GREENHOUSE_ROOM_ID must be a positive integer")?,
            state_dir: match std::env::var("GREENHOUSE_STATE_DIR") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => default_state_dir()?,
            },
        })
    }
}

/// Parse a polling interval in milliseconds. Zero is rejected since it would spin.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    parse_millis("polling interval", raw)
}

/// Parse a request timeout in milliseconds. Zero would fail every request.
pub fn parse_timeout(raw: &str) -> Result<Duration> {
    parse_millis("request timeout", raw)
}

fn parse_millis(what: &str, raw: &str) -> Result<Duration> {
    let millis: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{what} must be milliseconds, got: {raw:?}"))?;
    anyhow::ensure!(millis > 0, "{what} must be greater than zero");
    Ok(Duration::from_millis(millis))
}

fn default_state_dir() -> Result<PathBuf> {
    ProjectDirs::from("moe", "wibudev", "greenhouse-monitor")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("could not determine a home directory; set GREENHOUSE_STATE_DIR")
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_everything() {
        let url = resolve_base_url(Some("https://example.test/"), true, DEFAULT_DEV_PROXY_URL);
        assert_eq!(url, "https://example.test");
    }

    #[test]
    fn development_uses_proxy() {
        let url = resolve_base_url(None, true, "http://localhost:5173/api");
        assert_eq!(url, "http://localhost:5173/api");
    }

    #[test]
    fn production_falls_back_to_hardcoded_host() {
        assert_eq!(resolve_base_url(None, false, DEFAULT_DEV_PROXY_URL), PRODUCTION_BASE_URL);
    }

    #[test]
    fn blank_override_is_ignored() {
        assert_eq!(resolve_base_url(Some("  "), false, DEFAULT_DEV_PROXY_URL), PRODUCTION_BASE_URL);
    }

    #[test]
    fn loopback_host_counts_as_development() {
        assert!(is_development(Mode::Production, "localhost"));
        assert!(is_development(Mode::Production, "127.0.0.1"));
        assert!(is_development(Mode::Development, "greenhouse.example"));
        assert!(!is_development(Mode::Production, "greenhouse.example"));
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("development".parse::<Mode>().unwrap(), Mode::Development);
        assert_eq!("prod".parse::<Mode>().unwrap(), Mode::Production);
        let err = "staging".parse::<Mode>().unwrap_err();
        assert!(err.to_string().contains("unknown mode"));
    }

    #[test]
    fn parse_interval_rejects_zero_and_garbage() {
        assert_eq!(parse_interval("5000").unwrap(), Duration::from_millis(5000));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("fast").unwrap_err().to_string().contains("milliseconds"));
    }

    #[test]
    fn parse_timeout_rejects_zero() {
        assert_eq!(parse_timeout("10000").unwrap(), Duration::from_secs(10));
        assert!(parse_timeout("0")
            .unwrap_err()
            .to_string()
            .contains("request timeout must be greater than zero"));
        assert!(parse_timeout("-5").is_err());
    }
}
