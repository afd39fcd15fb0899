use super::{description, poster, subtitle, title, Section, ITEM_CLASS};
use crate::dom::Element;
use crate::media::{MediaItem, MediaKind};
use crate::registry::SectionKey;

/// Recently added series. Subtitle is season and episode when known.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesSection;

impl Section for SeriesSection {
    fn key(&self) -> SectionKey { SectionKey::SERIES }

    fn kind(&self) -> MediaKind { MediaKind::Series }

    fn default_label(&self) -> &'static str { "Emby Serien" }

    fn empty_text(&self) -> &'static str { "Keine Serien gefunden" }

    fn render_item(&self, item: &MediaItem) -> Element {
        let mut el = Element::new("div")
            .class(ITEM_CLASS)
            .attr("data-item-id", item.id.clone())
            .child(poster(item))
            .child(title(item))
            .child(subtitle(item));
        if let Some(d) = description(item) { el = el.child(d); }
        el
    }
}
