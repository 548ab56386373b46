use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_system::manager::DEFAULT_EFFECT_POOL_SIZE;
use crate::error::ConfigError;

const APP_DIR: &str = "EssentialCore";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of pooled effect channels
    pub effect_pool_size: usize,

    /// Directory that asset addresses are resolved against
    pub asset_root: PathBuf,

    /// Sound library file, relative to `asset_root`
    pub library_file: String,

    /// Preference file; `None` uses the platform config directory
    pub prefs_file: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            effect_pool_size: DEFAULT_EFFECT_POOL_SIZE,
            asset_root: PathBuf::from("assets"),
            library_file: "library.json".to_string(),
            prefs_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-specific config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, writing defaults there if missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            AppConfig::default().save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
        }

        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::LoadFailed {
                path: path.display().to_string(),
                source,
            }
        };
        let content = fs::read_to_string(path).map_err(|e| load_failed(Box::new(e)))?;
        let mut config: AppConfig =
            serde_json::from_str(&content).map_err(|e| load_failed(Box::new(e)))?;

        if config.effect_pool_size == 0 {
            tracing::warn!(
                "effect_pool_size must be at least 1, using {}",
                DEFAULT_EFFECT_POOL_SIZE
            );
            config.effect_pool_size = DEFAULT_EFFECT_POOL_SIZE;
        }

        // Relative asset roots are anchored next to the config file
        if config.asset_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.asset_root = dir.join(&config.asset_root);
            }
        }

        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::SaveFailed {
                path: path.display().to_string(),
                source,
            }
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))?;
        Ok(())
    }

    /// `<config_dir>/EssentialCore`
    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::app_dir().map(|dir| dir.join("config.json"))
    }

    pub fn library_path(&self) -> PathBuf {
        self.asset_root.join(&self.library_file)
    }

    /// Preference file to use, falling back to the platform default
    pub fn prefs_path(&self) -> Option<PathBuf> {
        self.prefs_file
            .clone()
            .or_else(|| Self::app_dir().map(|dir| dir.join("prefs.json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.effect_pool_size, 10);
        assert_eq!(config.library_file, "library.json");
        assert!(config.prefs_file.is_none());
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.json");

        let config = AppConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.effect_pool_size, DEFAULT_EFFECT_POOL_SIZE);
        assert_eq!(config.asset_root, dir.path().join("cfg").join("assets"));
    }

    #[test]
    fn test_partial_file_and_relative_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "effect_pool_size": 0, "asset_root": "sounds" }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.effect_pool_size, DEFAULT_EFFECT_POOL_SIZE);
        assert_eq!(config.asset_root, dir.path().join("sounds"));
        assert_eq!(config.library_path(), dir.path().join("sounds").join("library.json"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
