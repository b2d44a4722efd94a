//! Stack Configuration
//!
//! Layered configuration intake, highest precedence first:
//! - `--config namespace:key=value` overrides from the command line
//! - `PULUMI_CONFIG` (JSON object) as injected by the engine
//! - `Pulumi.<stack>.yaml` settings file (`config:` map)
//!
//! Required values are never defaulted. A missing required key aborts
//! synthesis before any resource is declared.

use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, StackError};

/// Cloud region for every AWS resource
pub const REGION_KEY: &str = "aws:region";
/// Prefix every resource name is derived from
pub const PREFIX_KEY: &str = "project:prefix";
/// Kubernetes namespace that receives the workload objects
pub const NAMESPACE_KEY: &str = "kubernetes:namespace";

/// Environment variable the engine uses to hand config to programs
pub const PULUMI_CONFIG_ENV: &str = "PULUMI_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigEntry {
    Plain(String),
    /// Encrypted value; only the engine holds the key
    Secure,
}

/// One or more merged configuration layers
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    entries: BTreeMap<String, ConfigEntry>,
}

impl ConfigStore {
    /// Load all three layers and merge them.
    pub fn load(
        stack_file: &Path,
        env_json: Option<&str>,
        overrides: &[String],
    ) -> Result<Self> {
        let mut store = Self::from_stack_file(stack_file)?;

        if let Some(raw) = env_json.filter(|raw| !raw.trim().is_empty()) {
            store = store.layer(Self::from_env_json(raw)?);
        }

        Ok(store.layer(Self::from_overrides(overrides)?))
    }

    /// Read the `config:` map of a stack settings file.
    ///
    /// A file that does not exist yields an empty layer.
    pub fn from_stack_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Stack settings file not found, skipping layer");
            return Ok(Self::default());
        }

        let file_error = |reason: String| StackError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let doc: YamlValue = serde_yaml::from_str(&raw).map_err(|e| file_error(e.to_string()))?;

        let mut store = Self::default();
        let Some(config) = doc.get("config") else {
            return Ok(store);
        };
        let map = config
            .as_mapping()
            .ok_or_else(|| file_error("`config` must be a mapping".to_string()))?;

        for (key, value) in map {
            let key = key
                .as_str()
                .ok_or_else(|| file_error("config keys must be strings".to_string()))?;
            store
                .entries
                .insert(key.to_string(), yaml_entry(key, value)?);
        }

        debug!(path = %path.display(), keys = store.entries.len(), "Loaded stack settings");
        Ok(store)
    }

    /// Parse the JSON object the engine places in `PULUMI_CONFIG`.
    pub fn from_env_json(raw: &str) -> Result<Self> {
        let invalid = |reason: String| StackError::InvalidConfig {
            key: PULUMI_CONFIG_ENV.to_string(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| invalid("expected a JSON object".to_string()))?;

        let entries = object
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), ConfigEntry::Plain(text))
            })
            .collect();

        Ok(Self { entries })
    }

    /// Parse `namespace:key=value` pairs from the command line.
    pub fn from_overrides(pairs: &[String]) -> Result<Self> {
        let mut store = Self::default();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| StackError::InvalidConfig {
                key: pair.clone(),
                reason: "expected namespace:key=value".to_string(),
            })?;
            store
                .entries
                .insert(key.trim().to_string(), ConfigEntry::Plain(value.to_string()));
        }
        Ok(store)
    }

    /// Merge `higher` on top of this layer.
    pub fn layer(mut self, higher: ConfigStore) -> Self {
        self.entries.extend(higher.entries);
        self
    }

    /// Look up a key. Empty strings count as absent.
    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ConfigEntry::Secure) => Err(StackError::InvalidConfig {
                key: key.to_string(),
                reason: "encrypted values cannot be read outside the engine".to_string(),
            }),
            Some(ConfigEntry::Plain(value)) if value.trim().is_empty() => Ok(None),
            Some(ConfigEntry::Plain(value)) => Ok(Some(value.as_str())),
        }
    }

    /// Look up a key that must be present.
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)?
            .map(str::to_string)
            .ok_or_else(|| StackError::MissingConfig {
                key: key.to_string(),
            })
    }
}

fn yaml_entry(key: &str, value: &YamlValue) -> Result<ConfigEntry> {
    let entry = match value {
        YamlValue::String(s) => ConfigEntry::Plain(s.clone()),
        YamlValue::Bool(b) => ConfigEntry::Plain(b.to_string()),
        YamlValue::Number(n) => ConfigEntry::Plain(n.to_string()),
        YamlValue::Null => ConfigEntry::Plain(String::new()),
        YamlValue::Mapping(map) if map.contains_key("secure") => ConfigEntry::Secure,
        other => {
            let text = serde_json::to_string(other).map_err(|e| StackError::InvalidConfig {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
            ConfigEntry::Plain(text)
        }
    };
    Ok(entry)
}

/// Resolved settings for one synthesis run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSettings {
    /// Project (program) name
    pub project: String,
    /// Stack name, used for tags and labels
    pub stack: String,
    pub region: String,
    pub prefix: String,
    pub namespace: String,
}

impl StackSettings {
    /// Resolve the required keys. Fails on the first missing one.
    pub fn from_store(project: &str, stack: &str, store: &ConfigStore) -> Result<Self> {
        let region = store.require(REGION_KEY)?;
        let prefix = store.require(PREFIX_KEY)?;
        let namespace = store.require(NAMESPACE_KEY)?;

        Ok(Self {
            project: project.to_string(),
            stack: stack.to_string(),
            region,
            prefix,
            namespace,
        })
    }
}
