use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde_json::{Map, Value};

use crate::emby::EmbyEndpoint;
use crate::error::ConfigError;
use crate::registry::{SectionKey, SectionRegistry};

pub const DEFAULT_MAX_ITEMS: usize = 10;

/// Fills `api_key` when the config file leaves it out.
pub const API_KEY_ENV: &str = "EMBY_LATEST_API_KEY";

/// Resolved settings for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionConfig {
    pub label: String,
    pub max_items: usize,
    /// Name of the config field carrying this section's entity id.
    pub entity_key: String,
    /// Set when the section reads from a host entity instead of the Emby API.
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub emby_url: String,
    pub api_key: String,
    pub user_id: Option<String>,
}

/// Validated card configuration. Keeps the raw mapping (in document order) for
/// per-section lookups.
#[derive(Debug, Clone)]
pub struct CardConfig {
    raw: Map<String, Value>,
    max_items: usize,
    active: Vec<SectionKey>,
    remote: Option<RemoteConfig>,
}

fn non_empty_str<'a>(raw: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

fn positive_int(key: &str, value: &Value) -> Result<usize, ConfigError> {
    value
        .as_u64()
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a positive integer, got {}", value),
        })
}

impl CardConfig {
    pub fn from_value(raw: Value, registry: &SectionRegistry) -> Result<Self, ConfigError> {
        let Value::Object(raw) = raw else { return Err(ConfigError::NotAMapping) };

        for (key, value) in &raw {
            if key == "max_items" || key.ends_with("_max_items") {
                positive_int(key, value)?;
            }
        }
        let max_items = match raw.get("max_items") {
            Some(v) => positive_int("max_items", v)?,
            None => DEFAULT_MAX_ITEMS,
        };

        let active = registry.resolve_active(&raw);
        if active.is_empty() {
            return Err(ConfigError::NoDataSource);
        }

        let needs_remote = active
            .iter()
            .any(|k| non_empty_str(&raw, &entity_key(*k)).is_none());
        let remote = if needs_remote {
            let emby_url = non_empty_str(&raw, "emby_url").ok_or(ConfigError::MissingCredential { missing: "emby_url" })?;
            let api_key = non_empty_str(&raw, "api_key").ok_or(ConfigError::MissingCredential { missing: "api_key" })?;
            let user_id = non_empty_str(&raw, "user_id");
            // Fail on a bad URL now rather than on the first tick.
            EmbyEndpoint::new(emby_url, api_key, user_id)?;
            Some(RemoteConfig {
                emby_url: emby_url.to_string(),
                api_key: api_key.to_string(),
                user_id: user_id.map(str::to_string),
            })
        } else {
            None
        };

        Ok(Self { raw, max_items, active, remote })
    }

    /// Card-wide default item count.
    pub fn max_items(&self) -> usize { self.max_items }

    /// Active sections in config-declared order.
    pub fn active(&self) -> &[SectionKey] { &self.active }

    /// Emby API settings, present when at least one active section pulls from the API.
    pub fn remote(&self) -> Option<&RemoteConfig> { self.remote.as_ref() }

    /// Settings for `key`: `<key>_max_items`, then `max_items`, then 10.
    pub fn section(&self, key: SectionKey, default_label: &str) -> SectionConfig {
        let label = non_empty_str(&self.raw, &format!("{}_label", key))
            .unwrap_or(default_label)
            .to_string();
        let max_items = self
            .raw
            .get(&format!("{}_max_items", key))
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.max_items);
        let entity_key = entity_key(key);
        let entity_id = non_empty_str(&self.raw, &entity_key).map(str::to_string);
        SectionConfig { label, max_items, entity_key, entity_id }
    }
}

pub fn entity_key(key: SectionKey) -> String {
    format!("{}_entity", key)
}

/// `<config dir>/card.toml` for this user.
pub fn default_config_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "emby-latest", "emby-latest")
        .context("unable to determine config directory for default card config")?;
    Ok(proj.config_dir().join("card.toml"))
}

/// Read a TOML (or `.json`) card config into an ordered mapping, filling
/// `api_key` from the environment when absent. Validation happens in
/// [`CardConfig::from_value`].
pub fn load_config_value(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading card config: {}", path.display()))?;
    let mut value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON card config: {}", path.display()))?,
        _ => toml::from_str(&text)
            .with_context(|| format!("parsing TOML card config: {}", path.display()))?,
    };

    if let Value::Object(map) = &mut value {
        if !map.contains_key("api_key") {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                if !key.trim().is_empty() {
                    map.insert("api_key".to_string(), Value::String(key));
                }
            }
        }
    }
    Ok(value)
}
