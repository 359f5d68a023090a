//! Configuration for the bridge.
//!
//! Two layers: [`ServerConfig`] is resolved from flags and environment at
//! startup and only records *where* the API credentials live; [`ApiConfig`]
//! is the credentials file itself, read when the first connection is made.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Credentials file used when neither a flag nor the environment names one.
pub const DEFAULT_API_CONFIG: &str = "volumes/api/api.config.yaml";

/// Environment variable naming the API credentials file.
pub const API_CONFIG_ENV: &str = "VELOCIRAPTOR_API_CONFIG";

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "MCP_LOG_LEVEL";

/// Environment variable holding the server name.
pub const SERVER_NAME_ENV: &str = "MCP_SERVER_NAME";

const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_SERVER_NAME: &str = "velociraptor-mcp";

/// Process-level settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Path to the Velociraptor `api.config.yaml`.
    pub api_config_path: PathBuf,
    /// Log level name, upper-cased (`INFO`, `DEBUG`, ...).
    pub log_level: String,
    /// Name reported to callers.
    pub server_name: String,
}

impl ServerConfig {
    /// Resolve settings from an optional path override and the environment.
    ///
    /// The credentials path is taken from `api_config`, then
    /// `VELOCIRAPTOR_API_CONFIG`, then [`DEFAULT_API_CONFIG`]. The file must
    /// exist; its contents are not read until the first connection.
    pub fn load(api_config: Option<&Path>) -> Result<Self> {
        let api_config_path = match api_config {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(API_CONFIG_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_API_CONFIG)),
        };

        if !api_config_path.exists() {
            return Err(Error::Config(format!(
                "Velociraptor API config not found at {}. Generate one with \
                 `velociraptor config api_client` or set {}.",
                api_config_path.display(),
                API_CONFIG_ENV
            )));
        }

        let log_level = std::env::var(LOG_LEVEL_ENV)
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_uppercase();
        let server_name =
            std::env::var(SERVER_NAME_ENV).unwrap_or_else(|_| DEFAULT_SERVER_NAME.to_string());

        Ok(Self {
            api_config_path,
            log_level,
            server_name,
        })
    }

    /// Override the log level.
    pub fn with_log_level(mut self, level: impl AsRef<str>) -> Self {
        self.log_level = level.as_ref().to_uppercase();
        self
    }

    /// Override the server name.
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }
}

/// Contents of a Velociraptor API client config (`api.config.yaml`).
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    /// PEM CA certificate of the server.
    pub ca_certificate: String,
    /// PEM client certificate.
    pub client_cert: String,
    /// PEM client private key.
    pub client_private_key: String,
    /// `host:port` of the API endpoint.
    pub api_connection_string: String,
    /// API user name the certificate was issued to.
    #[serde(default)]
    pub name: String,
    /// Organization to run queries in. Empty means the root org.
    #[serde(default)]
    pub org_id: String,
}

impl ApiConfig {
    /// Read and parse an API config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read API config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Parse an API config document.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: ApiConfig = serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("invalid API config: {}", e)))?;
        if config.api_connection_string.trim().is_empty() {
            return Err(Error::Config(
                "invalid API config: api_connection_string is empty".to_string(),
            ));
        }
        Ok(config)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_connection_string", &self.api_connection_string)
            .field("name", &self.name)
            .field("org_id", &self.org_id)
            .field("client_private_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}
