use std::fs::{read_to_string, write};
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the configuration file.
pub(crate) const CONFIG_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub(crate) type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct Paths {
    pub download_directory: String,
    pub database_file: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct Api {
    pub base_url: String,
    /// Style expert sent with generation requests, e.g. "ILLUSTRATION" or "PHOTO".
    pub style_expert: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct Eagle {
    pub server_url: String,
    pub folder_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct Rate {
    pub download_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
    pub item_delay_ms: u64,
    pub page_size: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct Generation {
    pub interval_secs: u64,
    pub progress_log_secs: u64,
    pub model_version: String,
    pub prepend: String,
    pub append: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct AppConfig {
    pub paths: Paths,
    pub api: Api,
    pub eagle: Eagle,
    pub rate: Rate,
    pub generation: Generation,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: Paths {
                download_directory: "./downloads".to_string(),
                database_file: "./data/seen_urls.sqlite".to_string(),
            },
            api: Api {
                base_url: "https://ideogram.ai".to_string(),
                style_expert: "ILLUSTRATION".to_string(),
            },
            eagle: Eagle {
                server_url: "http://localhost:41595".to_string(),
                folder_id: "KEHB8I2C9F23H".to_string(),
            },
            rate: Rate {
                download_timeout_secs: 5,
                retry_backoff_ms: 1000,
                max_retries: 2,
                item_delay_ms: 500,
                page_size: 60,
            },
            generation: Generation {
                interval_secs: 125,
                progress_log_secs: 10,
                model_version: "V_1_5".to_string(),
                prepend: String::new(),
                append: String::new(),
            },
        }
    }
}

impl AppConfig {
    /// Loads the config file, creating one with default values if it is missing.
    pub(crate) fn load_or_create(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let config = toml::from_str(&read_to_string(path)?)?;
            return Ok(config);
        }

        info!("Config file doesn't exist, creating {}...", path.display());
        let config = AppConfig::default();
        write(path, toml::to_string_pretty(&config)?)?;
        Ok(config)
    }

    pub(crate) fn download_directory(&self) -> PathBuf {
        PathBuf::from(&self.paths.download_directory)
    }

    pub(crate) fn database_file(&self) -> PathBuf {
        PathBuf::from(&self.paths.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed.api.base_url, config.api.base_url);
        assert_eq!(parsed.rate.max_retries, 2);
        assert_eq!(parsed.rate.download_timeout_secs, 5);
        assert_eq!(parsed.rate.item_delay_ms, 500);
        assert_eq!(parsed.rate.page_size, 60);
        assert_eq!(parsed.generation.interval_secs, 125);
    }

    #[test]
    fn load_or_create_writes_default_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = AppConfig::load_or_create(&path).unwrap();
        assert!(path.exists());

        let reloaded = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(reloaded.eagle.server_url, created.eagle.server_url);
    }
}
