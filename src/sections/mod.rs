//! Section kinds. Each one owns a header/content shell and re-renders its own
//! content slot from a list of [`MediaItem`]s.

mod movies;
mod series;

pub use movies::MoviesSection;
pub use series::SeriesSection;

use crate::config::CardConfig;
use crate::dom::{section_part, Element, Node, SECTION_KEY_ATTR};
use crate::media::{MediaItem, MediaKind};
use crate::registry::SectionKey;

pub const SECTION_CLASS: &str = "section";
pub const HEADER_CLASS: &str = "section-header";
pub const CONTENT_CLASS: &str = "section-content";
pub const ICON_CLASS: &str = "section-toggle-icon";
pub const ITEM_CLASS: &str = "media-item";
pub const EMPTY_CLASS: &str = "empty";

pub trait Section: Send + Sync {
    fn key(&self) -> SectionKey;
    fn kind(&self) -> MediaKind;
    fn default_label(&self) -> &'static str;
    /// Placeholder shown when the section has nothing to list.
    fn empty_text(&self) -> &'static str;
    fn render_item(&self, item: &MediaItem) -> Element;

    /// Empty container for this section: marker, header with label and toggle icon,
    /// and an empty content slot. Never contains item data.
    fn render_shell(&self, config: &CardConfig) -> Element {
        let key = self.key().as_str();
        let label = config.section(self.key(), self.default_label()).label;
        Element::new("div")
            .class(SECTION_CLASS)
            .attr(SECTION_KEY_ATTR, key)
            .child(
                Element::new("div")
                    .class(HEADER_CLASS)
                    .attr(SECTION_KEY_ATTR, key)
                    .child(Element::new("div").class("section-title").text(label))
                    .child(
                        Element::new("ha-icon")
                            .class(ICON_CLASS)
                            .attr(SECTION_KEY_ATTR, key)
                            .attr("icon", "mdi:chevron-down"),
                    ),
            )
            .child(Element::new("div").class(CONTENT_CLASS).attr(SECTION_KEY_ATTR, key))
    }

    /// Replace this section's content under `root` with at most `max_items` of `items`,
    /// in the order given. No-op when the content slot is not in the tree.
    fn reconcile(&self, root: &mut Element, items: &[MediaItem], max_items: usize) {
        let key = self.key();
        let Some(slot) = root.find_mut(&section_part(key.as_str(), CONTENT_CLASS)) else {
            tracing::debug!(section = %key, "content slot not mounted, skipping reconcile");
            return;
        };

        if items.is_empty() {
            slot.replace_children(vec![Element::new("div").class(EMPTY_CLASS).text(self.empty_text()).into()]);
            return;
        }

        // A non-empty list always shows at least one item.
        let nodes: Vec<Node> = items.iter().take(max_items.max(1)).map(|i| self.render_item(i).into()).collect();
        slot.replace_children(nodes);
    }
}

/// Poster image, or an icon tile when the item has no image.
pub(crate) fn poster(item: &MediaItem) -> Element {
    if item.has_image() {
        Element::new("img")
            .class("media-poster")
            .attr("src", item.image_url.clone())
            .attr("alt", item.title.clone())
    } else {
        Element::new("div")
            .class("media-poster no-image")
            .child(Element::new("ha-icon").attr("icon", "mdi:image-off-outline"))
    }
}

pub(crate) fn title(item: &MediaItem) -> Element {
    Element::new("div").class("media-title").text(item.title.clone())
}

pub(crate) fn subtitle(item: &MediaItem) -> Element {
    Element::new("div").class("media-subtitle").text(item.subtitle.clone().unwrap_or_default())
}

pub(crate) fn description(item: &MediaItem) -> Option<Element> {
    item.overview
        .as_ref()
        .map(|o| Element::new("div").class("media-description").text(o.clone()))
}
