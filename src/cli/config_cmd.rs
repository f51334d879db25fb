//! `config` subcommand: typed access to the three persisted keys

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::recording::RecordingLimit;

use super::args::{ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// A persisted setting and the `AppConfig` field behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKey {
    InputDevice,
    RecordingsDir,
    MaxDuration,
}

impl ConfigKey {
    const ALL: [ConfigKey; 3] = [Self::InputDevice, Self::RecordingsDir, Self::MaxDuration];

    fn parse(name: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|key| key.name() == name)
            .ok_or_else(|| ConfigError::ValidationError {
                key: name.to_string(),
                message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
            })
    }

    fn name(self) -> &'static str {
        match self {
            Self::InputDevice => "input_device",
            Self::RecordingsDir => "recordings_dir",
            Self::MaxDuration => "max_duration",
        }
    }

    fn slot(self, config: &mut AppConfig) -> &mut Option<String> {
        match self {
            Self::InputDevice => &mut config.input_device,
            Self::RecordingsDir => &mut config.recordings_dir,
            Self::MaxDuration => &mut config.max_duration,
        }
    }

    fn read(self, config: &AppConfig) -> Option<&str> {
        match self {
            Self::InputDevice => config.input_device.as_deref(),
            Self::RecordingsDir => config.recordings_dir.as_deref(),
            Self::MaxDuration => config.max_duration.as_deref(),
        }
    }

    /// Canonical stored form of `raw`, or why it is rejected
    fn normalize(self, raw: &str) -> Result<String, ConfigError> {
        let value = raw.trim();
        let invalid = |message: String| ConfigError::ValidationError {
            key: self.name().to_string(),
            message,
        };
        match self {
            Self::MaxDuration => value
                .parse::<RecordingLimit>()
                .map(|limit| limit.to_string())
                .map_err(|e| invalid(e.to_string())),
            Self::RecordingsDir if value.is_empty() => {
                Err(invalid("Directory must not be empty".to_string()))
            }
            Self::InputDevice | Self::RecordingsDir => Ok(value.to_string()),
        }
    }
}

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => {
            store.init().await?;
            presenter.success(&format!("Config file created at: {}", store.path().display()));
        }
        ConfigAction::Set { key, value } => {
            let key = ConfigKey::parse(&key)?;
            let stored = set_value(store, key, &value).await?;
            presenter.success(&format!("{} = {}", key.name(), stored));
        }
        ConfigAction::Get { key } => {
            let key = ConfigKey::parse(&key)?;
            let config = store.load().await?;
            presenter.output(key.read(&config).unwrap_or(NOT_SET));
        }
        ConfigAction::List => {
            let config = store.load().await?;
            for key in ConfigKey::ALL {
                presenter.key_value(key.name(), key.read(&config).unwrap_or(NOT_SET));
            }
        }
        ConfigAction::Path => presenter.output(&store.path().to_string_lossy()),
    }
    Ok(())
}

/// Validate, store and return the value as written to the file
async fn set_value<S: ConfigStore>(
    store: &S,
    key: ConfigKey,
    raw: &str,
) -> Result<String, ConfigError> {
    let value = key.normalize(raw)?;
    let mut config = store.load().await?;
    *key.slot(&mut config) = Some(value.clone());
    store.save(&config).await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        config: Mutex<Option<AppConfig>>,
    }

    #[async_trait]
    impl ConfigStore for MemoryStore {
        async fn load(&self) -> Result<AppConfig, ConfigError> {
            Ok(self.config.lock().unwrap().clone().unwrap_or_default())
        }

        async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
            *self.config.lock().unwrap() = Some(config.clone());
            Ok(())
        }

        fn path(&self) -> PathBuf {
            PathBuf::from("/memory/config.toml")
        }

        fn exists(&self) -> bool {
            self.config.lock().unwrap().is_some()
        }

        async fn init(&self) -> Result<(), ConfigError> {
            if self.exists() {
                return Err(ConfigError::AlreadyExists("memory".into()));
            }
            self.save(&AppConfig::defaults()).await
        }
    }

    #[test]
    fn key_table_matches_cli_keys() {
        let names: Vec<_> = ConfigKey::ALL.iter().map(|key| key.name()).collect();
        assert_eq!(names, VALID_CONFIG_KEYS);
        assert!(ConfigKey::parse("api_key").is_err());
    }

    #[test]
    fn duration_is_stored_in_canonical_form() {
        let key = ConfigKey::MaxDuration;
        assert_eq!(key.normalize("90").unwrap(), "1m30s");
        assert_eq!(key.normalize(" 2m30s ").unwrap(), "2m30s");
        assert!(key.normalize("invalid").is_err());
        assert!(key.normalize("2h").is_err());
    }

    #[test]
    fn recordings_dir_must_not_be_blank() {
        assert_eq!(ConfigKey::RecordingsDir.normalize(" /tmp ").unwrap(), "/tmp");
        assert!(ConfigKey::RecordingsDir.normalize("  ").is_err());
        assert_eq!(ConfigKey::InputDevice.normalize("").unwrap(), "");
    }

    #[tokio::test]
    async fn set_persists_value() {
        let store = MemoryStore::default();
        let action = ConfigAction::Set {
            key: "input_device".into(),
            value: "USB Mic".into(),
        };
        handle_config_command(action, &store, &Presenter::new())
            .await
            .unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.input_device.as_deref(), Some("USB Mic"));
    }

    #[tokio::test]
    async fn set_keeps_other_keys() {
        let store = MemoryStore::default();
        store.save(&AppConfig::defaults()).await.unwrap();

        let stored = set_value(&store, ConfigKey::MaxDuration, "45").await.unwrap();
        assert_eq!(stored, "45s");

        let config = store.load().await.unwrap();
        assert_eq!(config.max_duration.as_deref(), Some("45s"));
        assert_eq!(config.recordings_dir, AppConfig::defaults().recordings_dir);
    }

    #[tokio::test]
    async fn set_rejects_unknown_key() {
        let store = MemoryStore::default();
        let action = ConfigAction::Set {
            key: "api_key".into(),
            value: "x".into(),
        };
        let err = handle_config_command(action, &store, &Presenter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn invalid_value_leaves_store_untouched() {
        let store = MemoryStore::default();
        assert!(set_value(&store, ConfigKey::MaxDuration, "soon").await.is_err());
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn init_twice_fails() {
        let store = MemoryStore::default();
        let presenter = Presenter::new();
        handle_config_command(ConfigAction::Init, &store, &presenter)
            .await
            .unwrap();
        assert!(matches!(
            handle_config_command(ConfigAction::Init, &store, &presenter).await,
            Err(ConfigError::AlreadyExists(_))
        ));
    }
}
