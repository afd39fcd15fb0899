use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// State of every entity the host knows about, keyed by entity id. Delivered on each tick.
///
/// Entities are kept as loose JSON: one malformed entity must not make the whole
/// snapshot unreadable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostSnapshot {
    states: HashMap<String, Value>,
}

impl HostSnapshot {
    pub fn new() -> Self { Self::default() }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn insert(&mut self, entity_id: impl Into<String>, state: Value) {
        self.states.insert(entity_id.into(), state);
    }

    /// Convenience for building snapshots: an entity whose `attributes.data` is `items`.
    pub fn with_entity_data(mut self, entity_id: impl Into<String>, items: Vec<Value>) -> Self {
        self.insert(entity_id, json!({ "attributes": { "data": items } }));
        self
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.states.contains_key(entity_id)
    }

    /// The entity's `attributes.data` list, if it has one.
    pub fn entity_data(&self, entity_id: &str) -> Option<&[Value]> {
        self.states
            .get(entity_id)?
            .get("attributes")?
            .get("data")?
            .as_array()
            .map(Vec::as_slice)
    }
}
