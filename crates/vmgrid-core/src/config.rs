//! vmgrid.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider call timeout used when neither config nor caller sets one.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GridConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// redb database file. `None` leaves the choice to the program embedding
    /// the store; `vmgridctl` falls back to `./vmgrid.redb`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Default timeout for each provider call, e.g. "30s", "2m", "500ms".
    pub timeout: Option<String>,
}

impl GridConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolved provider timeout.
    pub fn provider_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.providers.timeout {
            Some(s) => parse_duration(s),
            None => Ok(DEFAULT_PROVIDER_TIMEOUT),
        }
    }
}

/// Parse `"500ms"`, `"30s"`, `"5m"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .map(|m| Duration::from_secs(m * 60))
            .map_err(|_| invalid())
    } else {
        s.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_no_store_and_a_30s_timeout() {
        let config = GridConfig::default();
        assert!(config.store.path.is_none());
        assert_eq!(config.provider_timeout().unwrap(), DEFAULT_PROVIDER_TIMEOUT);
    }

    #[test]
    fn parse_full() {
        let config = GridConfig::parse(
            r#"
[store]
path = "/var/lib/vmgrid/state.redb"

[providers]
timeout = "2m"
"#,
        )
        .unwrap();
        assert_eq!(
            config.store.path.as_deref(),
            Some(Path::new("/var/lib/vmgrid/state.redb"))
        );
        assert_eq!(config.provider_timeout().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn parse_empty_uses_defaults() {
        let config = GridConfig::parse("").unwrap();
        assert!(config.store.path.is_none());
        assert!(config.providers.timeout.is_none());
    }

    #[test]
    fn duration_values() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert!(matches!(
            parse_duration("soon"),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = GridConfig::from_file(Path::new("/nonexistent/vmgrid.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/vmgrid.toml"));
    }
}
