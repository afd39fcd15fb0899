use async_trait::async_trait;

use crate::error::FetchFailure;
use crate::host::HostSnapshot;
use crate::mapping::item_from_entity_record;
use crate::media::{MediaItem, MediaKind};
use crate::registry::SectionKey;

/// What one section asks its data source for on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestQuery<'a> {
    pub section: SectionKey,
    pub kind: MediaKind,
    /// Host entity bound to the section, if it reads from one.
    pub entity_id: Option<&'a str>,
    pub limit: usize,
}

/// Produces a fresh item list for one section per tick.
///
/// Failures are reported, never raised past the caller: the card renders the
/// affected section empty and carries on with the others.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_latest(&self, query: &LatestQuery<'_>, snapshot: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure>;
}

/// Push adapter: reads `attributes.data` of the section's entity from the host snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntitySource;

#[async_trait]
impl DataSource for EntitySource {
    async fn fetch_latest(&self, query: &LatestQuery<'_>, snapshot: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure> {
        let entity_id = query.entity_id.ok_or(FetchFailure::Unbound("entity"))?;
        if !snapshot.contains(entity_id) {
            return Err(FetchFailure::EntityUnavailable(entity_id.to_string()));
        }
        let Some(data) = snapshot.entity_data(entity_id) else {
            tracing::debug!(entity = entity_id, "entity has no attributes.data list");
            return Ok(Vec::new());
        };
        Ok(data
            .iter()
            .enumerate()
            .map(|(i, raw)| item_from_entity_record(query.section, query.kind, i, raw))
            .collect())
    }
}
