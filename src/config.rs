//! Application configuration.
//!
//! Values are layered: built-in defaults, then a TOML file, then environment
//! variables such as `TORRENT_AGGREGATOR__HTTP__TIMEOUT_SECS=30`.

use crate::client::fetch::{HttpClientConfig, DEFAULT_USER_AGENT};
use crate::client::torznab::IndexerConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TORRENT_AGGREGATOR";

const ENV_SEPARATOR: &str = "__";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpSettings,
    pub sources: SourceSettings,
    pub indexers: Vec<IndexerConfig>,
    pub logging: LoggingSettings,
}

/// Outgoing HTTP behaviour shared by every source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            connect_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
        }
    }
}

impl From<&HttpSettings> for HttpClientConfig {
    fn from(settings: &HttpSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            user_agent: settings.user_agent.clone(),
            proxy: settings.proxy.clone(),
            ..Self::default()
        }
    }
}

/// Which sources run and where they live
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Enabled source ids; the registry defaults apply when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Vec<String>>,
    /// Base URL overrides keyed by source id, for mirrors
    pub base_urls: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingSettings {
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// An explicit `path` must exist; otherwise the per-user file is read
    /// when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(
                    config::File::from(path.to_path_buf())
                        .format(config::FileFormat::Toml)
                        .required(true),
                );
            }
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.exists()) {
                    debug!("Loading configuration from {}", path.display());
                    builder = builder.add_source(
                        config::File::from(path)
                            .format(config::FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("sources.enabled"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults, without environment overrides
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `<config dir>/torrent-aggregator/config.toml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("torrent-aggregator").join("config.toml"))
    }

    /// Reject values that would only fail later, while searching
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_input("http.timeout_secs", "must be greater than zero"));
        }
        if self.http.connect_timeout_secs == 0 {
            return Err(Error::invalid_input(
                "http.connect_timeout_secs",
                "must be greater than zero",
            ));
        }
        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "pretty" | "json") {
            return Err(Error::invalid_input(
                "logging.format",
                format!("unknown format '{}', expected 'pretty' or 'json'", self.logging.format),
            ));
        }

        for (id, base_url) in &self.sources.base_urls {
            if !is_http_url(base_url) {
                return Err(Error::invalid_input(
                    format!("sources.base_urls.{id}"),
                    format!("'{base_url}' is not an http(s) URL"),
                ));
            }
        }

        for (index, indexer) in self.indexers.iter().enumerate() {
            if indexer.id.trim().is_empty() {
                return Err(Error::invalid_input(format!("indexers[{index}].id"), "must not be empty"));
            }
            if indexer.url.trim().is_empty() {
                return Err(Error::invalid_input(
                    format!("indexers[{index}].url"),
                    "must not be empty",
                ));
            }
        }

        Ok(())
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::record::Category;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 20);
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.is_json());
        assert!(config.sources.enabled.is_none());
        assert!(config.indexers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_layers_on_defaults() {
        let config = Config::from_toml(
            r#"
            [http]
            timeout_secs = 5

            [sources]
            enabled = ["yts", "nyaa"]

            [sources.base_urls]
            yts = "https://yts.mirror.example"

            [[indexers]]
            id = "jackett"
            name = "Jackett"
            url = "http://localhost:9117/api/v2.0/indexers/all/results/torznab"
            api_key = "abc"
            category = "anime"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert_eq!(
            config.sources.enabled,
            Some(vec!["yts".to_string(), "nyaa".to_string()])
        );
        assert_eq!(
            config.sources.base_urls.get("yts").map(String::as_str),
            Some("https://yts.mirror.example")
        );
        assert_eq!(config.indexers.len(), 1);
        assert_eq!(config.indexers[0].category, Category::Anime);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config
            .sources
            .base_urls
            .insert("yts".to_string(), "ftp://mirror".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.indexers.push(IndexerConfig {
            id: "local".to_string(),
            name: "Local".to_string(),
            url: " ".to_string(),
            api_key: String::new(),
            category: Category::All,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_dump_reloads() {
        let mut config = Config::default();
        config.sources.enabled = Some(vec!["eztv".to_string()]);
        config.indexers.push(IndexerConfig {
            id: "local".to_string(),
            name: "Local".to_string(),
            url: "http://localhost:9117/api".to_string(),
            api_key: "k".to_string(),
            category: Category::Series,
        });

        let dumped = config.to_toml().unwrap();
        assert!(dumped.contains("[[indexers]]"));
        assert_eq!(Config::from_toml(&dumped).unwrap(), config);
    }

    #[test]
    fn test_http_settings_conversion() {
        let settings = HttpSettings {
            timeout_secs: 3,
            proxy: Some("socks5://127.0.0.1:9050".to_string()),
            ..HttpSettings::default()
        };
        let client_config = HttpClientConfig::from(&settings);
        assert_eq!(client_config.timeout, Duration::from_secs(3));
        assert_eq!(client_config.connect_timeout, Duration::from_secs(10));
        assert_eq!(client_config.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
    }
}
