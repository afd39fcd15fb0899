use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::UnknownSectionError;
use crate::sections::{MoviesSection, Section, SeriesSection};

/// Stable identifier of a section kind. Also the prefix of its per-section config keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey(&'static str);

impl SectionKey {
    pub const MOVIES: SectionKey = SectionKey("emby_movies");
    pub const SERIES: SectionKey = SectionKey("emby_series");

    pub const fn new(key: &'static str) -> Self { Self(key) }

    pub fn as_str(self) -> &'static str { self.0 }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.0) }
}

/// Config keys that switch a section on, in the order the table lists the sections
/// each one enables. `emby_url` turns on every pull-capable kind.
const DEFAULT_ENABLING_KEYS: &[(&str, SectionKey)] = &[
    ("emby_movies_entity", SectionKey::MOVIES),
    ("emby_series_entity", SectionKey::SERIES),
    ("emby_url", SectionKey::MOVIES),
    ("emby_url", SectionKey::SERIES),
];

const ENTITY_SUFFIX: &str = "_entity";

/// Ordered set of known sections plus the table mapping enabling keys to them.
pub struct SectionRegistry {
    sections: Vec<Arc<dyn Section>>,
    enabling: Vec<(&'static str, SectionKey)>,
}

impl Default for SectionRegistry {
    fn default() -> Self { Self::with_defaults() }
}

impl SectionRegistry {
    #[cfg(test)]
    pub(crate) fn from_parts(sections: Vec<Arc<dyn Section>>, enabling: Vec<(&'static str, SectionKey)>) -> Self {
        Self { sections, enabling }
    }

    /// Movies and series, enabled by their entity keys or by `emby_url`.
    pub fn with_defaults() -> Self {
        Self {
            sections: vec![Arc::new(MoviesSection), Arc::new(SeriesSection)],
            enabling: DEFAULT_ENABLING_KEYS.to_vec(),
        }
    }

    /// Add a section kind (replacing any with the same key) and the config keys that enable it.
    pub fn register(&mut self, section: Arc<dyn Section>, enabling_keys: &[&'static str]) {
        let key = section.key();
        self.sections.retain(|s| s.key() != key);
        self.sections.push(section);
        for k in enabling_keys {
            if !self.enabling.contains(&(*k, key)) {
                self.enabling.push((*k, key));
            }
        }
    }

    pub fn keys(&self) -> Vec<SectionKey> {
        self.sections.iter().map(|s| s.key()).collect()
    }

    pub fn get(&self, key: &str) -> Result<&dyn Section, UnknownSectionError> {
        self.sections
            .iter()
            .find(|s| s.key().as_str() == key)
            .map(|s| s.as_ref())
            .ok_or_else(|| UnknownSectionError(key.to_string()))
    }

    fn is_enabling_key(&self, key: &str) -> bool {
        key.ends_with(ENTITY_SUFFIX) || self.enabling.iter().any(|(k, _)| *k == key)
    }

    /// Sections switched on by `config`, in first-seen order of their enabling keys.
    ///
    /// Only non-empty string values enable. Unknown `*_entity` keys are skipped.
    pub fn resolve_active(&self, config: &Map<String, Value>) -> Vec<SectionKey> {
        let mut active: Vec<SectionKey> = Vec::new();
        for (name, value) in config {
            if !self.is_enabling_key(name) { continue; }
            if !value.as_str().is_some_and(|v| !v.trim().is_empty()) { continue; }

            let mut matched = false;
            for (_, key) in self.enabling.iter().filter(|(k, _)| *k == name) {
                matched = true;
                if !active.contains(key) { active.push(*key); }
            }
            if !matched {
                tracing::debug!(key = %name, "ignoring unrecognized enabling key");
            }
        }
        active
    }
}
