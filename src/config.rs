use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FORWARD_BASE_URL: &str = "http://localhost:3001";
const DEFAULT_DIRECT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_FORWARD_NAME: &str = "AIrep";
const DEFAULT_DIRECT_NAME: &str = "Gemini API";
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 35_000;
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_ENVIRONMENT: &str = "development";

pub const SERVICE_NAME: &str = "salud-proxy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamMode {
    Forward,
    Direct(GeminiSettings),
}

impl UpstreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Direct(_) => "direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub base_url: Url,
    pub name: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Base URL as the operator wrote it, without the trailing slash `Url` adds.
    pub fn display_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.display_url(), path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub upstream: UpstreamConfig,
    pub mode: UpstreamMode,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub fn from_env_with(
        mut get_var: impl FnMut(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let port = parse_port(get_var("PORT").as_deref())?;
        let timeout = parse_timeout(get_var("UPSTREAM_TIMEOUT_MS").as_deref())?;
        let mode = match parse_mode_name(get_var("UPSTREAM_MODE").as_deref())? {
            ModeName::Forward => UpstreamMode::Forward,
            ModeName::Direct => UpstreamMode::Direct(GeminiSettings {
                api_key: non_empty(get_var("GEMINI_API_KEY")).ok_or(ConfigError::MissingApiKey)?,
                model: parse_model(get_var("GEMINI_MODEL").as_deref())?,
            }),
        };
        let (default_base_url, default_name) = match &mode {
            UpstreamMode::Forward => (DEFAULT_FORWARD_BASE_URL, DEFAULT_FORWARD_NAME),
            UpstreamMode::Direct(_) => (DEFAULT_DIRECT_BASE_URL, DEFAULT_DIRECT_NAME),
        };
        let base_url = parse_url(
            "UPSTREAM_URL",
            get_var("UPSTREAM_URL").as_deref(),
            default_base_url,
        )?;

        Ok(Self {
            port,
            environment: non_empty(get_var("APP_ENV"))
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            upstream: UpstreamConfig {
                base_url,
                name: non_empty(get_var("UPSTREAM_NAME"))
                    .unwrap_or_else(|| default_name.to_string()),
                timeout,
            },
            mode,
            static_dir: non_empty(get_var("STATIC_DIR")).map(PathBuf::from),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeName {
    Forward,
    Direct,
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_port(raw: Option<&str>) -> Result<u16, ConfigError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_PORT);
    };
    value
        .parse::<u16>()
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| ConfigError::InvalidPort {
            value: value.to_string(),
        })
}

fn parse_timeout(raw: Option<&str>) -> Result<Duration, ConfigError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS));
    };
    value
        .parse::<u64>()
        .ok()
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::InvalidTimeout {
            value: value.to_string(),
        })
}

fn parse_mode_name(raw: Option<&str>) -> Result<ModeName, ConfigError> {
    match raw
        .unwrap_or("forward")
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "" | "forward" => Ok(ModeName::Forward),
        "direct" => Ok(ModeName::Direct),
        other => Err(ConfigError::UnknownMode {
            value: other.to_string(),
        }),
    }
}

fn parse_model(raw: Option<&str>) -> Result<String, ConfigError> {
    match raw {
        None => Ok(DEFAULT_GEMINI_MODEL.to_string()),
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyModel),
        Some(value) => Ok(value.trim().to_string()),
    }
}

fn parse_url(key: &'static str, raw: Option<&str>, default: &str) -> Result<Url, ConfigError> {
    let value = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default);
    let invalid = |reason: String| ConfigError::InvalidUrl {
        key,
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "unsupported scheme '{}', expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{
        Config, DEFAULT_DIRECT_BASE_URL, DEFAULT_DIRECT_NAME, DEFAULT_ENVIRONMENT,
        DEFAULT_FORWARD_BASE_URL, DEFAULT_FORWARD_NAME, DEFAULT_GEMINI_MODEL, DEFAULT_PORT,
        DEFAULT_UPSTREAM_TIMEOUT_MS, GeminiSettings, UpstreamMode, parse_port, parse_timeout,
        parse_url,
    };
    use crate::error::ConfigError;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Config::from_env_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn from_env_uses_defaults_when_vars_are_missing() {
        let cfg = config_from_pairs(&[]).expect("defaults should be valid");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.environment, DEFAULT_ENVIRONMENT);
        assert_eq!(cfg.upstream.display_url(), DEFAULT_FORWARD_BASE_URL);
        assert_eq!(cfg.upstream.name, DEFAULT_FORWARD_NAME);
        assert_eq!(
            cfg.upstream.timeout,
            Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS)
        );
        assert_eq!(cfg.mode, UpstreamMode::Forward);
        assert_eq!(cfg.static_dir, None);
    }

    #[test]
    fn from_env_reads_configured_values() {
        let cfg = config_from_pairs(&[
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("UPSTREAM_URL", "http://airep.internal:9000/"),
            ("UPSTREAM_NAME", "Planner"),
            ("UPSTREAM_TIMEOUT_MS", "1500"),
            ("STATIC_DIR", "public"),
        ])
        .expect("config should be valid");

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.environment, "production");
        assert_eq!(cfg.upstream.display_url(), "http://airep.internal:9000");
        assert_eq!(cfg.upstream.name, "Planner");
        assert_eq!(cfg.upstream.timeout, Duration::from_millis(1500));
        assert_eq!(cfg.static_dir, Some(PathBuf::from("public")));
    }

    #[test]
    fn direct_mode_requires_api_key() {
        let err = config_from_pairs(&[("UPSTREAM_MODE", "direct")])
            .expect_err("direct mode without key should fail");
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn direct_mode_defaults_to_provider_url_and_model() {
        let cfg = config_from_pairs(&[("UPSTREAM_MODE", " Direct "), ("GEMINI_API_KEY", "k")])
            .expect("direct config should be valid");
        assert_eq!(cfg.upstream.display_url(), DEFAULT_DIRECT_BASE_URL);
        assert_eq!(cfg.upstream.name, DEFAULT_DIRECT_NAME);
        assert_eq!(
            cfg.mode,
            UpstreamMode::Direct(GeminiSettings {
                api_key: "k".to_string(),
                model: DEFAULT_GEMINI_MODEL.to_string(),
            })
        );
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = config_from_pairs(&[("UPSTREAM_MODE", "mirror")])
            .expect_err("unknown mode should fail");
        assert!(matches!(err, ConfigError::UnknownMode { .. }));
    }

    #[test]
    fn parse_port_rejects_zero_and_garbage() {
        assert_eq!(parse_port(None), Ok(DEFAULT_PORT));
        assert_eq!(parse_port(Some("  ")), Ok(DEFAULT_PORT));
        assert_eq!(parse_port(Some(" 4000 ")), Ok(4000));
        for bad in ["0", "-1", "70000", "abc", "30.5"] {
            assert!(
                matches!(parse_port(Some(bad)), Err(ConfigError::InvalidPort { .. })),
                "expected {bad} to be rejected"
            );
        }
    }

    #[test]
    fn parse_timeout_requires_positive_millis() {
        assert_eq!(
            parse_timeout(None),
            Ok(Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS))
        );
        assert_eq!(parse_timeout(Some("250")), Ok(Duration::from_millis(250)));
        assert!(parse_timeout(Some("0")).is_err());
        assert!(parse_timeout(Some("soon")).is_err());
    }

    #[test]
    fn parse_url_requires_absolute_http_url() {
        let default = DEFAULT_FORWARD_BASE_URL;
        assert!(parse_url("UPSTREAM_URL", Some("https://example.com/v1"), default).is_ok());

        for bad in [
            "not a url",
            "localhost:3001",
            "ftp://example.com",
            "/api",
            "http://",
        ] {
            let err = parse_url("UPSTREAM_URL", Some(bad), default)
                .expect_err("malformed url should fail");
            assert!(
                err.to_string().starts_with("Invalid UPSTREAM_URL"),
                "unexpected message for {bad}: {err}"
            );
        }
    }

    #[test]
    fn malformed_upstream_url_fails_config_load() {
        let err =
            config_from_pairs(&[("UPSTREAM_URL", "::::")]).expect_err("malformed url should fail");
        let ConfigError::InvalidUrl { key, .. } = err else {
            panic!("expected an invalid url error, got {err:?}");
        };
        assert_eq!(key, "UPSTREAM_URL");
    }

    #[test]
    fn endpoint_joins_base_and_path_without_double_slash() {
        let cfg = config_from_pairs(&[("UPSTREAM_URL", "http://localhost:3001/")]).unwrap();
        assert_eq!(
            cfg.upstream.endpoint("/api/generateHealth"),
            "http://localhost:3001/api/generateHealth"
        );
    }
}
