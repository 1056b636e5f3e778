//! Runtime configuration.
//!
//! Resolution order, later layers win:
//! 1. built-in defaults
//! 2. optional TOML file
//! 3. `POLLCAST_API_BASE_URL` environment variable
//! 4. `--base-url` on the command line
//!
//! The base URL selects the deployment for both REST and channel traffic.
//!
//! ```toml
//! api_base_url = "https://live.example.com"
//! connect_timeout_ms = 3000
//! request_timeout_ms = 10000
//! reaction_window_ms = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const BASE_URL_ENV: &str = "POLLCAST_API_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deployment base address, without trailing slash.
    pub api_base_url: String,
    /// TCP connect timeout for REST fetches.
    pub connect_timeout: Duration,
    /// Whole-request timeout for REST fetches.
    pub request_timeout: Duration,
    /// How long an emoji reaction stays visible on the host.
    pub reaction_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
            reaction_window: Duration::from_millis(1000),
        }
    }
}

/// On-disk shape; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_base_url: Option<String>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    reaction_window_ms: Option<u64>,
}

impl Config {
    /// Resolve the full layer stack, reading the process environment.
    pub fn load(file: Option<&Path>, cli_base_url: Option<String>) -> Result<Self, ConfigError> {
        Self::resolve(file, std::env::var(BASE_URL_ENV).ok(), cli_base_url)
    }

    /// Resolve the layer stack from explicit inputs.
    pub fn resolve(
        file: Option<&Path>,
        env_base_url: Option<String>,
        cli_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = file {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            config.apply_toml(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        }

        if let Some(url) = env_base_url.filter(|u| !u.trim().is_empty()) {
            config.api_base_url = url;
        }
        if let Some(url) = cli_base_url {
            config.api_base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str) -> Result<(), toml::de::Error> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(url) = file.api_base_url {
            self.api_base_url = url;
        }
        if let Some(ms) = file.connect_timeout_ms {
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.reaction_window_ms {
            self.reaction_window = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Check invariants and normalize the base URL.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid("api_base_url must not be empty".into()));
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must start with http:// or https://, got {trimmed}"
            )));
        }
        if self.reaction_window.is_zero() {
            return Err(ConfigError::Invalid("reaction_window_ms must be > 0".into()));
        }
        self.api_base_url = trimmed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let cfg = Config::resolve(None, None, None).unwrap();
        assert_eq!(cfg.api_base_url, "http://localhost:3000");
        assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.reaction_window, Duration::from_millis(1000));
    }

    #[test]
    fn file_overrides_defaults() {
        let file = write_config(
            "api_base_url = \"https://live.example.com/\"\nrequest_timeout_ms = 2500\n",
        );
        let cfg = Config::resolve(Some(file.path()), None, None).unwrap();
        assert_eq!(cfg.api_base_url, "https://live.example.com");
        assert_eq!(cfg.request_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn env_overrides_file_and_cli_overrides_env() {
        let file = write_config("api_base_url = \"http://from-file\"\n");
        let cfg = Config::resolve(Some(file.path()), Some("http://from-env".into()), None).unwrap();
        assert_eq!(cfg.api_base_url, "http://from-env");

        let cfg = Config::resolve(
            Some(file.path()),
            Some("http://from-env".into()),
            Some("http://from-cli".into()),
        )
        .unwrap();
        assert_eq!(cfg.api_base_url, "http://from-cli");
    }

    #[test]
    fn blank_env_value_is_ignored() {
        let cfg = Config::resolve(None, Some("  ".into()), None).unwrap();
        assert_eq!(cfg.api_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::resolve(Some(Path::new("/nonexistent/pollcast.toml")), None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn unknown_key_is_parse_error() {
        let file = write_config("base = \"http://x\"\n");
        let err = Config::resolve(Some(file.path()), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn non_http_base_url_is_invalid() {
        let err = Config::resolve(None, None, Some("localhost:3000".into())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_reaction_window_is_invalid() {
        let file = write_config("reaction_window_ms = 0\n");
        assert!(matches!(
            Config::resolve(Some(file.path()), None, None),
            Err(ConfigError::Invalid(_))
        ));
    }
}
