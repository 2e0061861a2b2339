//! Client configuration resolution
//!
//! Combines command-line overrides, environment and the TOML bootstrap file
//! into one [`ClientConfig`]. Priority per value: CLI > ENV > TOML > default.

use sgc_common::config::{
    resolve_backend_url, AuthConfig, DataFolderResolver, TimeoutConfig, TomlConfig,
};
use sgc_common::Result;
use std::path::PathBuf;
use tracing::info;

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend_url: Option<String>,
    pub data_folder: Option<PathBuf>,
}

/// Resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL without trailing slash
    pub backend_url: String,
    pub data_folder: PathBuf,
    pub timeouts: TimeoutConfig,
    pub auth: AuthConfig,
    pub log_level: String,
}

impl ClientConfig {
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let backend_url = resolve_backend_url(cli.backend_url.as_deref(), toml_config)?;

        let data_folder = DataFolderResolver::new("sgc-client")
            .with_cli_override(cli.data_folder.clone())
            .with_toml_value(toml_config.data_folder.clone())
            .resolve();

        info!(
            backend_url = %backend_url,
            data_folder = %data_folder.display(),
            "Client configuration resolved"
        );

        Ok(Self {
            backend_url,
            data_folder,
            timeouts: toml_config.timeouts.clone(),
            auth: toml_config.auth.clone(),
            log_level: toml_config.logging.level.clone(),
        })
    }

    /// Configuration with default timeouts and backend OTP auth
    pub fn new(backend_url: impl Into<String>, data_folder: PathBuf) -> Self {
        Self {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            data_folder,
            timeouts: TimeoutConfig::default(),
            auth: AuthConfig::default(),
            log_level: "info".to_string(),
        }
    }
}
