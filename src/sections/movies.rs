use super::{description, poster, subtitle, title, Section, ITEM_CLASS};
use crate::dom::Element;
use crate::media::{MediaItem, MediaKind};
use crate::registry::SectionKey;

/// Recently added movies. Subtitle is the release year.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoviesSection;

impl Section for MoviesSection {
    fn key(&self) -> SectionKey { SectionKey::MOVIES }

    fn kind(&self) -> MediaKind { MediaKind::Movie }

    fn default_label(&self) -> &'static str { "Filme" }

    fn empty_text(&self) -> &'static str { "Keine Filme gefunden" }

    fn render_item(&self, item: &MediaItem) -> Element {
        let mut info = Element::new("div").class("media-info").child(title(item)).child(subtitle(item));
        if let Some(d) = description(item) { info = info.child(d); }

        Element::new("div")
            .class(ITEM_CLASS)
            .attr("data-item-id", item.id.clone())
            .child(Element::new("div").class("media-poster-wrapper").child(poster(item)))
            .child(info)
    }
}
