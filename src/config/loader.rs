use super::types::NotifierConfig;
use crate::{NotifierError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory under the user's home holding the notifier configuration
pub const CONFIG_DIR_NAME: &str = ".claude-notifier";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Loads and validates `NotifierConfig` from YAML
pub struct ConfigLoader;

impl ConfigLoader {
    /// Default config path: `~/.claude-notifier/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| {
            dirs.home_dir()
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME)
        })
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<NotifierConfig> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NotifierError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!("Loading notifier config from {}", path.display());
        Self::load_from_str(&contents).map_err(|e| match e {
            NotifierError::Yaml(inner) => NotifierError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                inner
            )),
            other => other,
        })
    }

    /// Parse configuration from a YAML string. An empty document yields defaults.
    pub fn load_from_str(contents: &str) -> Result<NotifierConfig> {
        if contents.trim().is_empty() {
            return Ok(NotifierConfig::default());
        }

        let config: NotifierConfig = serde_yaml_ng::from_str(contents)?;
        for warning in Self::validate(&config) {
            warn!("{}", warning);
        }
        Ok(config)
    }

    /// Load from the default path; a missing file yields defaults
    pub fn load_default() -> Result<NotifierConfig> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                debug!("No config at {}, using defaults", path.display());
                Ok(NotifierConfig::default())
            }
            None => {
                warn!("Could not determine home directory, using default config");
                Ok(NotifierConfig::default())
            }
        }
    }

    /// Non-fatal problems in a loaded configuration
    pub fn validate(config: &NotifierConfig) -> Vec<String> {
        let mut warnings = Vec::new();

        for (id, raw) in &config.custom_events {
            let has_triggers = raw
                .get("triggers")
                .and_then(Value::as_array)
                .is_some_and(|triggers| !triggers.is_empty());
            if !has_triggers {
                warnings.push(format!(
                    "Custom event '{}' has no triggers and will never fire",
                    id
                ));
            }
        }

        // Routing names are only checked when channels are declared at all
        if !config.channels.is_empty() {
            let mut check = |owner: &str, names: &[String]| {
                for name in names {
                    if !config.channels.contains_key(name) {
                        warnings.push(format!(
                            "{} routes to unknown channel '{}'",
                            owner, name
                        ));
                    }
                }
            };

            check(
                "notifications.default_channels",
                &config.notifications.default_channels,
            );
            for (id, settings) in &config.events {
                if let Some(channels) = &settings.channels {
                    check(&format!("events.{}", id), channels);
                }
            }
            for (id, raw) in &config.custom_events {
                if let Some(channels) = raw.get("channels").and_then(Value::as_array) {
                    let names: Vec<String> = channels
                        .iter()
                        .filter_map(|c| c.as_str().map(str::to_string))
                        .collect();
                    check(&format!("custom_events.{}", id), &names);
                }
            }
        }

        warnings
    }
}
