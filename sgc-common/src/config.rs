//! Bootstrap configuration and data folder resolution
//!
//! Configuration is layered. For each value the first source that provides
//! it wins:
//!
//! 1. Command-line argument
//! 2. Environment variable (`SGC_DATA_FOLDER`, `SGC_BACKEND_URL`)
//! 3. TOML configuration file
//! 4. Compiled default
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! the compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "SGC_DATA_FOLDER";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "SGC_BACKEND_URL";

/// File name of the local store inside the data folder
pub const DATABASE_FILE_NAME: &str = "sgc.db";

/// Directory (inside the data folder) holding resized capture photos
pub const CAPTURES_DIR_NAME: &str = "captures";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the style backend (e.g. `https://api.example.com`)
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Folder holding the local store and capture files
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Client-side deadlines for backend calls, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Interactive identity analysis
    #[serde(default = "default_analysis_secs")]
    pub analysis_secs: u64,

    /// Stylist chat turn
    #[serde(default = "default_chat_secs")]
    pub chat_secs: u64,

    /// Background status and task checks
    #[serde(default = "default_status_secs")]
    pub status_secs: u64,
}

impl TimeoutConfig {
    pub fn analysis(&self) -> Duration {
        Duration::from_secs(self.analysis_secs)
    }

    pub fn chat(&self) -> Duration {
        Duration::from_secs(self.chat_secs)
    }

    pub fn status(&self) -> Duration {
        Duration::from_secs(self.status_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            analysis_secs: default_analysis_secs(),
            chat_secs: default_chat_secs(),
            status_secs: default_status_secs(),
        }
    }
}

/// Phone verification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Hosted identity service base URL. When absent, codes are sent and
    /// verified through the backend's own OTP endpoints.
    #[serde(default)]
    pub identity_url: Option<String>,

    /// API key passed to the hosted identity service
    #[serde(default)]
    pub identity_api_key: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_analysis_secs() -> u64 {
    30
}

fn default_chat_secs() -> u64 {
    30
}

fn default_status_secs() -> u64 {
    10
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_folder = dirs::data_local_dir()
            .map(|d| d.join("sgc"))
            .unwrap_or_else(|| PathBuf::from("./sgc_data"));

        Self {
            data_folder,
            log_level: default_log_level(),
        }
    }
}

/// Resolves the data folder following the layered priority order
pub struct DataFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_override: None,
            toml_value: None,
        }
    }

    /// Command-line value (highest priority)
    pub fn with_cli_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    /// Value read from the TOML file
    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_override {
            debug!(module = %self.module_name, "Data folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Data folder from {}", DATA_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            debug!(module = %self.module_name, "Data folder from TOML config");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().data_folder
    }
}

/// Creates the data folder layout on first run
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    /// Create the data folder and capture directory (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_folder)?;
        std::fs::create_dir_all(self.captures_dir())?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    pub fn captures_dir(&self) -> PathBuf {
        self.data_folder.join(CAPTURES_DIR_NAME)
    }
}

/// Default location of the TOML file: `<config dir>/sgc/sgc-client.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sgc").join("sgc-client.toml"))
}

/// Load the TOML bootstrap configuration
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_toml_config(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            warn!("Could not determine config directory, using defaults");
            return TomlConfig::default();
        }
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<TomlConfig>(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded TOML config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed TOML config, using defaults");
                TomlConfig::default()
            }
        },
        Err(_) => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            TomlConfig::default()
        }
    }
}

/// Resolve the backend base URL (CLI > env > TOML)
///
/// Trailing slashes are trimmed so endpoint paths can be appended directly.
pub fn resolve_backend_url(cli_arg: Option<&str>, config: &TomlConfig) -> Result<String> {
    let env_value = std::env::var(BACKEND_URL_ENV).ok();

    let url = cli_arg
        .map(str::to_string)
        .or(env_value)
        .or_else(|| config.backend_url.clone())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "Backend URL not configured (use --backend-url, {} or backend_url in TOML)",
                BACKEND_URL_ENV
            ))
        })?;

    Ok(url.trim().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.analysis(), Duration::from_secs(30));
        assert_eq!(timeouts.chat(), Duration::from_secs(30));
        assert_eq!(timeouts.status(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            backend_url = "https://backend.test"

            [timeouts]
            analysis_secs = 45
            "#,
        )
        .unwrap();

        assert_eq!(config.backend_url.as_deref(), Some("https://backend.test"));
        assert_eq!(config.timeouts.analysis_secs, 45);
        assert_eq!(config.timeouts.status_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.auth.identity_url.is_none());
    }

    #[test]
    fn test_initializer_paths() {
        let init = DataFolderInitializer::new(PathBuf::from("/tmp/sgc-root"));
        assert_eq!(init.database_path(), PathBuf::from("/tmp/sgc-root/sgc.db"));
        assert_eq!(init.captures_dir(), PathBuf::from("/tmp/sgc-root/captures"));
    }
}
