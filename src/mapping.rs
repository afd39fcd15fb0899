use serde_json::Value;

use crate::emby::{EmbyEndpoint, EmbyRecord};
use crate::media::{MediaItem, MediaKind, UNTITLED};
use crate::registry::SectionKey;

fn fallback_id(section: SectionKey, position: usize) -> String {
    format!("{}-{}", section, position)
}

// Strings and numbers both show up in entity attributes ("2021" vs 2021).
fn text_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn entity_subtitle(obj: &serde_json::Map<String, Value>, kind: MediaKind) -> Option<String> {
    match kind {
        MediaKind::Movie => text_field(obj, "year"),
        MediaKind::Series => {
            let parts: Vec<String> = ["season", "episode"]
                .iter()
                .filter_map(|k| text_field(obj, k))
                .collect();
            if parts.is_empty() { None } else { Some(parts.join(" ")) }
        }
    }
}

/// Normalize one record from an entity's `attributes.data` list.
///
/// Never fails: a record that is not an object, or lacks a title, becomes an item
/// titled [`UNTITLED`] so the rest of the section still renders.
pub fn item_from_entity_record(section: SectionKey, kind: MediaKind, position: usize, raw: &Value) -> MediaItem {
    let Some(obj) = raw.as_object() else {
        tracing::debug!(section = %section, position, "entity record is not an object");
        return MediaItem::new(fallback_id(section, position), UNTITLED, kind);
    };

    let id = text_field(obj, "id").unwrap_or_else(|| fallback_id(section, position));
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(UNTITLED);
    let image = text_field(obj, "thumb").or_else(|| text_field(obj, "poster")).unwrap_or_default();

    let mut item = MediaItem::new(id, title, kind).with_image(image);
    if let Some(sub) = entity_subtitle(obj, kind) { item = item.with_subtitle(sub); }
    if let Some(overview) = text_field(obj, "overview") { item = item.with_overview(overview); }
    item
}

fn emby_subtitle(record: &EmbyRecord, kind: MediaKind) -> Option<String> {
    match (kind, record.parent_index_number, record.index_number) {
        (MediaKind::Series, Some(season), Some(episode)) => Some(format!("S{} E{}", season, episode)),
        (MediaKind::Series, Some(season), None) => Some(format!("S{}", season)),
        _ => record.production_year.map(|y| y.to_string()),
    }
}

/// Normalize one record from the Emby items API.
pub fn item_from_emby_record(section: SectionKey, kind: MediaKind, position: usize, record: &EmbyRecord, endpoint: &EmbyEndpoint) -> MediaItem {
    let id = record.id.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| fallback_id(section, position));
    let title = record.name.as_deref().filter(|t| !t.trim().is_empty()).unwrap_or(UNTITLED);
    let image = match (&record.id, record.has_primary_image()) {
        (Some(raw_id), true) => endpoint.image_url(raw_id),
        _ => String::new(),
    };

    let mut item = MediaItem::new(id, title, kind).with_image(image);
    if let Some(sub) = emby_subtitle(record, kind) { item = item.with_subtitle(sub); }
    if let Some(overview) = &record.overview { item = item.with_overview(overview.clone()); }
    item
}
