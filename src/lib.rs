pub mod card;
pub mod config;
pub mod dom;
pub mod emby;
pub mod error;
pub mod host;
pub mod mapping;
pub mod media;
pub mod registry;
pub mod sections;
pub mod source;
pub mod styles;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::card::{CardController, CardHandle, CardState};
    pub use crate::config::{CardConfig, SectionConfig};
    pub use crate::error::{ConfigError, FetchFailure, UnknownSectionError};
    pub use crate::host::HostSnapshot;
    pub use crate::media::{MediaItem, MediaKind};
    pub use crate::registry::{SectionKey, SectionRegistry};
    pub use crate::sections::Section;
    pub use crate::source::{DataSource, LatestQuery};
}
