use std::time::Duration;
use stool_core::{ArgumentStyle, DEFAULT_COLUMNS, DEFAULT_LOG_CAP_CHARS};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_POLL_MS: u64 = 5000;
pub const DEFAULT_LOG_POLL_MS: u64 = 1000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct DashboardConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub log_poll_interval: Duration,
    pub log_cap_chars: usize,
    pub select: Vec<String>,
    pub columns: Vec<String>,
    pub argument_style: ArgumentStyle,
    pub http_timeout: Duration,
    pub log_stdout: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            log_poll_interval: Duration::from_millis(DEFAULT_LOG_POLL_MS),
            log_cap_chars: DEFAULT_LOG_CAP_CHARS,
            select: Vec::new(),
            columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            argument_style: ArgumentStyle::Path,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_stdout: false,
        }
    }
}

/// Values given on the command line. Empty strings and `None` fall through
/// to the environment, then to the defaults.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub url: String,
    pub poll_ms: Option<u64>,
    pub log_poll_ms: Option<u64>,
    pub log_cap: Option<usize>,
    pub select: String,
    pub columns: String,
    pub argument_style: String,
    pub http_timeout_secs: Option<u64>,
}

impl DashboardConfig {
    pub fn from_env(overrides: &ConfigOverrides) -> Result<Self, String> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    pub fn resolve<E>(overrides: &ConfigOverrides, env: E) -> Result<Self, String>
    where
        E: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lookup = |flag: &str, key: &str| -> Option<String> {
            if !flag.trim().is_empty() {
                return Some(flag.trim().to_string());
            }
            env(key).filter(|value| !value.trim().is_empty())
        };

        let base_url = lookup(&overrides.url, "STOOL_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let poll_ms = number(overrides.poll_ms, env("STOOL_POLL_MS"), "STOOL_POLL_MS")?;
        let log_poll_ms = number(
            overrides.log_poll_ms,
            env("STOOL_LOG_POLL_MS"),
            "STOOL_LOG_POLL_MS",
        )?;
        let log_cap = number(
            overrides.log_cap.map(|cap| cap as u64),
            env("STOOL_LOG_CAP"),
            "STOOL_LOG_CAP",
        )?;
        let timeout_secs = number(
            overrides.http_timeout_secs,
            env("STOOL_HTTP_TIMEOUT_SECS"),
            "STOOL_HTTP_TIMEOUT_SECS",
        )?;

        let select = lookup(&overrides.select, "STOOL_SELECT")
            .map(|raw| split_list(&raw))
            .unwrap_or(defaults.select);
        let columns = lookup(&overrides.columns, "STOOL_COLUMNS")
            .map(|raw| split_list(&raw))
            .filter(|columns| !columns.is_empty())
            .unwrap_or(defaults.columns);
        let argument_style = match lookup(&overrides.argument_style, "STOOL_ARGUMENT_STYLE") {
            Some(raw) => raw.parse::<ArgumentStyle>()?,
            None => defaults.argument_style,
        };
        let log_stdout = env("STOOL_LOG_STDOUT")
            .and_then(|value| parse_bool_flag(&value))
            .unwrap_or(false);

        Ok(Self {
            base_url,
            poll_interval: poll_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            log_poll_interval: log_poll_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.log_poll_interval),
            log_cap_chars: log_cap.map(|cap| cap as usize).unwrap_or(defaults.log_cap_chars),
            select,
            columns,
            argument_style,
            http_timeout: timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            log_stdout,
        })
    }
}

fn number(flag: Option<u64>, env_value: Option<String>, key: &str) -> Result<Option<u64>, String> {
    if flag.is_some() {
        return Ok(flag);
    }
    match env_value {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| format!("invalid {key} '{raw}': {err}")),
        _ => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
