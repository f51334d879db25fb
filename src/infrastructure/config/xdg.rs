//! XDG config store adapter
//!
//! Reads and writes `~/.config/voice-memo/config.toml`. Saves go through a
//! sibling temp file and a rename, so a crash never leaves half a config.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

const APP_DIR: &str = "voice-memo";
const FILE_NAME: &str = "config.toml";

/// Written above the defaults by `config init`
const INIT_HEADER: &str = "\
# voice-memo configuration
#
# input_device   = input device name, see `voice-memo formats` (default device when unset)
# recordings_dir = directory finished recordings are saved into
# max_duration   = cap on one recording: 90, 45s, 2m30s, 1h

";

/// Config file under the platform config directory
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    pub fn new() -> Self {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::with_path(base.join(APP_DIR).join(FILE_NAME))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn render(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn write_error(path: &Path, e: std::io::Error) -> ConfigError {
        ConfigError::WriteError(format!("{}: {}", path.display(), e))
    }

    async fn ensure_parent(&self) -> Result<(), ConfigError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::write_error(parent, e)),
            _ => Ok(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Self::parse_toml(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no config file; using empty config");
                Ok(AppConfig::empty())
            }
            Err(e) => Err(ConfigError::ReadError(format!("{}: {}", self.path.display(), e))),
        }
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let content = Self::render(config)?;
        self.ensure_parent().await?;

        let temp = self.temp_path();
        fs::write(&temp, content)
            .await
            .map_err(|e| Self::write_error(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(Self::write_error(&self.path, e));
        }

        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    async fn init(&self) -> Result<(), ConfigError> {
        let content = format!("{}{}", INIT_HEADER, Self::render(&AppConfig::defaults())?);
        self.ensure_parent().await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    ConfigError::AlreadyExists(self.path.display().to_string())
                }
                _ => Self::write_error(&self.path, e),
            })?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Self::write_error(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| Self::write_error(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), "config initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_path_is_xdg() {
        let store = XdgConfigStore::new();
        let path = store.path();
        assert!(path.to_string_lossy().contains("voice-memo"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn custom_path() {
        let store = XdgConfigStore::with_path("/custom/path/config.toml");
        assert_eq!(store.path(), PathBuf::from("/custom/path/config.toml"));
    }

    #[test]
    fn parse_toml_flat_format() {
        let content = r#"
input_device = "USB Microphone"
recordings_dir = "/tmp/memos"
max_duration = "90s"
"#;

        let config = XdgConfigStore::parse_toml(content).unwrap();
        assert_eq!(config.input_device.as_deref(), Some("USB Microphone"));
        assert_eq!(config.recordings_dir.as_deref(), Some("/tmp/memos"));
        assert_eq!(config.max_duration.as_deref(), Some("90s"));
    }

    #[test]
    fn parse_toml_rejects_garbage() {
        let err = XdgConfigStore::parse_toml("max_duration = [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        assert!(!store.exists());
        assert_eq!(store.load().await.unwrap(), AppConfig::empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("nested/config.toml"));
        let config = AppConfig {
            max_duration: Some("2m".to_string()),
            ..Default::default()
        };

        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));

        store.init().await.unwrap();
        assert_eq!(store.load().await.unwrap(), AppConfig::defaults());
        assert!(matches!(
            store.init().await.unwrap_err(),
            ConfigError::AlreadyExists(_)
        ));
    }

    #[tokio::test]
    async fn init_documents_every_key() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        store.init().await.unwrap();

        let written = std::fs::read_to_string(store.path()).unwrap();
        assert!(written.starts_with("# voice-memo configuration"));
        for key in ["input_device", "recordings_dir", "max_duration"] {
            assert!(written.contains(&format!("# {}", key)), "{key}");
        }
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        store.save(&AppConfig::defaults()).await.unwrap();
        store.save(&AppConfig::empty()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("config.toml")]);
        assert_eq!(store.load().await.unwrap(), AppConfig::empty());
    }

    #[tokio::test]
    async fn unreadable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = XdgConfigStore::with_path(dir.path());
        assert!(!store.exists());
        assert!(matches!(
            store.load().await.unwrap_err(),
            ConfigError::ReadError(_)
        ));
    }
}
