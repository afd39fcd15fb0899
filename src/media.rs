use serde::{Deserialize, Serialize};

/// Shown in place of a record's title when the record has none.
pub const UNTITLED: &str = "Unbekannter Titel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    /// Value of Emby's `IncludeItemTypes` filter.
    pub fn emby_item_type(self) -> &'static str {
        match self {
            MediaKind::Movie => "Movie",
            MediaKind::Series => "Series",
        }
    }
}

/// One movie or series, normalized from whichever data source produced it.
///
/// A fresh list of these is built on every tick; items are never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    /// Year for movies, season/episode for series.
    pub subtitle: Option<String>,
    /// Empty when the source has no image for this item.
    pub image_url: String,
    pub overview: Option<String>,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            image_url: String::new(),
            overview: None,
            kind,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into()).filter(|s: &String| !s.trim().is_empty());
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    pub fn with_overview(mut self, overview: impl Into<String>) -> Self {
        self.overview = Some(overview.into()).filter(|s: &String| !s.trim().is_empty());
        self
    }

    pub fn has_image(&self) -> bool {
        !self.image_url.trim().is_empty()
    }
}
