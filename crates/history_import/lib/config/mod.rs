use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use history_core::SourceTimezone;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Settings file layout, e.g.
///
/// ```yaml
/// elastic:
///   host: 127.0.0.1
///   port: 9200
///   index: otrs
/// mysql:
///   host: db.internal
///   dbname: otrs
///   user: importer
///   pass: secret
///   timezone: "+01:00"
/// ```
///
/// Every key is optional.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub elastic: ElasticConfig,
    pub mysql: MysqlConfig,
    pub import: ImportSettings,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ElasticConfig {
    pub host: String,
    pub port: u16,
    pub index: String,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9200,
            index: "otrstest".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MysqlConfig {
    pub dbname: String,
    pub host: String,
    pub user: String,
    pub pass: String,
    pub port: u16,
    /// Zone of the naive `DATETIME` columns: `local` (default), `UTC` or a fixed offset.
    pub timezone: SourceTimezone,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            dbname: "otrs2".to_string(),
            host: "localhost".to_string(),
            user: "root".to_string(),
            pass: "root".to_string(),
            port: 3306,
            timezone: SourceTimezone::Local,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ImportSettings {
    /// Bulk body lines buffered before a flush; every document takes two.
    pub bulk_max_lines: usize,
    /// Drop follow-ups that coincide with system "response required" state updates.
    pub exclude_automated_followups: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            bulk_max_lines: 400,
            exclude_automated_followups: false,
        }
    }
}

impl Config {
    /// Loads `path`, falling back to built-in defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    event = "config_file_missing",
                    path = %path.display(),
                    "config file not found, using defaults"
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        // An empty file parses as YAML null rather than an empty mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.elastic.index.trim().is_empty() {
            return Err(ConfigError::Invalid("elastic.index must not be empty".into()));
        }
        if self.import.bulk_max_lines < 2 {
            return Err(ConfigError::Invalid(format!(
                "import.bulk_max_lines must hold at least one document (2 lines), got {}",
                self.import.bulk_max_lines
            )));
        }
        Ok(())
    }

    pub fn elastic_url(&self) -> String {
        format!("http://{}:{}", self.elastic.host, self.elastic.port)
    }

    /// `mysql://` URL with percent-encoded credentials.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        let mysql = &self.mysql;
        let mut url = Url::parse(&format!(
            "mysql://{}:{}/{}",
            mysql.host, mysql.port, mysql.dbname
        ))
        .map_err(|err| ConfigError::Invalid(format!("mysql connection settings: {err}")))?;

        url.set_username(&mysql.user)
            .and_then(|_| url.set_password(Some(&mysql.pass)))
            .map_err(|_| ConfigError::Invalid("mysql credentials cannot be encoded".into()))?;

        Ok(url.to_string())
    }
}
