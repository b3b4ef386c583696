//! Configuration loading and data folder resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (clap also maps each flag to an env variable)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is not fatal: the service logs a
//! warning and starts with defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP port for forma-server
pub const DEFAULT_PORT: u16 = 5790;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default long-poll hold time in seconds
pub const DEFAULT_LONGPOLL_TIMEOUT_SECS: u64 = 25;

/// Upper bound for the long-poll hold time
pub const MAX_LONGPOLL_TIMEOUT_SECS: u64 = 120;

/// Database file name inside the data folder
pub const DATABASE_FILE: &str = "forma.db";

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV: &str = "FORMA_DATA_FOLDER";

/// Contents of `config.toml`
///
/// Every key is optional; absent keys fall through to the compiled default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub longpoll_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Platform config file, if one exists
pub fn find_config_file() -> Option<PathBuf> {
    config_file_path().ok()
}

/// Values supplied on the command line (or their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub longpoll_timeout_secs: Option<u64>,
}

/// Fully resolved server settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub data_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub longpoll_timeout: Duration,
}

impl ServerSettings {
    /// Merge command line, environment, TOML and defaults
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Self {
        let data_folder = resolve_data_folder(
            cli.data_folder.as_deref(),
            DATA_FOLDER_ENV,
            toml_config,
        );

        let host = cli
            .host
            .clone()
            .or_else(|| toml_config.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);

        let timeout_secs = cli
            .longpoll_timeout_secs
            .or(toml_config.longpoll_timeout_secs)
            .unwrap_or(DEFAULT_LONGPOLL_TIMEOUT_SECS);

        Self {
            data_folder,
            host,
            port,
            longpoll_timeout: clamp_longpoll_timeout(timeout_secs),
        }
    }

    /// Location of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE)
    }

    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Create the data folder if it does not exist
    pub fn ensure_data_folder(&self) -> Result<()> {
        if !self.data_folder.exists() {
            std::fs::create_dir_all(&self.data_folder)?;
            info!("Created data folder: {}", self.data_folder.display());
        }
        Ok(())
    }
}

/// Long-poll hold time, clamped to `1..=MAX_LONGPOLL_TIMEOUT_SECS`
pub fn clamp_longpoll_timeout(secs: u64) -> Duration {
    let clamped = secs.clamp(1, MAX_LONGPOLL_TIMEOUT_SECS);
    if clamped != secs {
        warn!(
            "longpoll_timeout_secs {} out of range, using {}",
            secs, clamped
        );
    }
    Duration::from_secs(clamped)
}

/// Data folder resolution, highest priority first
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// Platform config file path
fn config_file_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/forma/config.toml first, then /etc/forma/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("forma").join("config.toml"));
        let system_config = PathBuf::from("/etc/forma/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("forma").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("forma"))
        .unwrap_or_else(|| PathBuf::from("./forma_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_longpoll_timeout() {
        assert_eq!(clamp_longpoll_timeout(0), Duration::from_secs(1));
        assert_eq!(clamp_longpoll_timeout(25), Duration::from_secs(25));
        assert_eq!(clamp_longpoll_timeout(999), Duration::from_secs(120));
    }

    #[test]
    fn test_database_path_and_bind_addr() {
        let settings = ServerSettings {
            data_folder: PathBuf::from("/srv/forma"),
            host: "0.0.0.0".into(),
            port: 8080,
            longpoll_timeout: Duration::from_secs(25),
        };
        assert_eq!(settings.database_path(), PathBuf::from("/srv/forma/forma.db"));
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
    }
}
