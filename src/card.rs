use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use uuid::Uuid;

use crate::config::CardConfig;
use crate::dom::{escape, section_part, Element, Listener, Node};
use crate::emby::{EmbyClient, EmbyEndpoint};
use crate::error::{ConfigError, FetchFailure, UnknownSectionError};
use crate::host::HostSnapshot;
use crate::media::MediaItem;
use crate::registry::{SectionKey, SectionRegistry};
use crate::sections::{CONTENT_CLASS, HEADER_CLASS, ICON_CLASS, SECTION_CLASS};
use crate::source::{DataSource, EntitySource, LatestQuery};
use crate::styles::CARD_STYLES;

/// Rows the card asks the dashboard for.
pub const CARD_SIZE: usize = 3;

/// Ordered (key, label) pairs a shell was built from.
type ShellLayout = Vec<(SectionKey, String)>;

enum Lifecycle {
    Uninitialized,
    Mounted { root: Element, layout: ShellLayout },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Uninitialized,
    Mounted,
}

/// Shared "still on the page" flag. Clone it out before a tick to tear the card
/// down while requests are in flight.
#[derive(Debug, Clone)]
pub struct CardHandle {
    connected: Arc<AtomicBool>,
}

impl CardHandle {
    fn new() -> Self { Self { connected: Arc::new(AtomicBool::new(true)) } }

    pub fn disconnect(&self) { self.connected.store(false, Ordering::SeqCst); }

    pub fn connect(&self) { self.connected.store(true, Ordering::SeqCst); }

    pub fn is_connected(&self) -> bool { self.connected.load(Ordering::SeqCst) }
}

struct SectionLoad {
    key: SectionKey,
    max_items: usize,
    items: Vec<MediaItem>,
}

/// One card instance: builds the section shell once, then refreshes section
/// content on every host tick.
pub struct CardController {
    instance: Uuid,
    registry: SectionRegistry,
    config: Option<CardConfig>,
    config_error: Option<ConfigError>,
    lifecycle: Lifecycle,
    collapsed: BTreeSet<SectionKey>,
    handle: CardHandle,
    entities: EntitySource,
    remote: Option<Arc<dyn DataSource>>,
    // Set when the caller supplied its own pull source; configure() leaves it alone.
    remote_pinned: bool,
}

impl Default for CardController {
    fn default() -> Self { Self::new() }
}

fn report_unknown(err: &UnknownSectionError) {
    tracing::error!(error = %err, "section registry and enabling-key table disagree");
    debug_assert!(false, "{}", err);
}

fn apply_collapse(root: &mut Element, key: SectionKey, collapsed: bool) {
    let k = key.as_str();
    if let Some(section) = root.find_mut(&section_part(k, SECTION_CLASS)) {
        section.toggle_class("collapsed", collapsed);
    }
    if let Some(content) = root.find_mut(&section_part(k, CONTENT_CLASS)) {
        if collapsed { content.set_attr("hidden", "") } else { content.remove_attr("hidden") }
    }
    if let Some(icon) = root.find_mut(&section_part(k, ICON_CLASS)) {
        icon.toggle_class("rotated", collapsed);
    }
}

fn remote_for(cfg: &CardConfig) -> Option<Arc<dyn DataSource>> {
    let remote = cfg.remote()?;
    let endpoint = match EmbyEndpoint::from_remote(remote) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "unusable Emby endpoint");
            return None;
        }
    };
    match EmbyClient::new(endpoint) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::error!(error = %e, "failed to build HTTP client");
            None
        }
    }
}

/// The parts of a card a section load reads from, borrowed apart from the
/// mounted tree so loads can run while earlier results are written.
struct Sources<'a> {
    registry: &'a SectionRegistry,
    entities: &'a EntitySource,
    remote: Option<&'a dyn DataSource>,
    instance: Uuid,
}

async fn load_section(
    sources: &Sources<'_>,
    cfg: &CardConfig,
    key: SectionKey,
    snapshot: &HostSnapshot,
) -> Option<SectionLoad> {
    let section = match sources.registry.get(key.as_str()) {
        Ok(s) => s,
        Err(e) => {
            report_unknown(&e);
            return None;
        }
    };
    let sc = cfg.section(key, section.default_label());
    let query = LatestQuery {
        section: key,
        kind: section.kind(),
        entity_id: sc.entity_id.as_deref(),
        limit: sc.max_items,
    };

    let source: Option<&dyn DataSource> = match sc.entity_id {
        Some(_) => Some(sources.entities),
        None => sources.remote,
    };
    let result = match source {
        Some(source) => source.fetch_latest(&query, snapshot).await,
        None => Err(FetchFailure::Unbound("remote")),
    };
    let items = result.unwrap_or_else(|e| {
        tracing::warn!(card = %sources.instance, section = %key, error = %e, "section data unavailable");
        Vec::new()
    });
    Some(SectionLoad { key, max_items: sc.max_items, items })
}

impl CardController {
    pub fn new() -> Self { Self::with_registry(SectionRegistry::with_defaults()) }

    pub fn with_registry(registry: SectionRegistry) -> Self {
        Self {
            instance: Uuid::new_v4(),
            registry,
            config: None,
            config_error: None,
            lifecycle: Lifecycle::Uninitialized,
            collapsed: BTreeSet::new(),
            handle: CardHandle::new(),
            entities: EntitySource,
            remote: None,
            remote_pinned: false,
        }
    }

    /// Use `source` for every section not bound to a host entity, instead of
    /// building an Emby client from the configuration.
    pub fn with_remote_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.remote = Some(source);
        self.remote_pinned = true;
        self
    }

    pub fn registry(&self) -> &SectionRegistry { &self.registry }

    pub fn config(&self) -> Option<&CardConfig> { self.config.as_ref() }

    pub fn config_error(&self) -> Option<&ConfigError> { self.config_error.as_ref() }

    pub fn handle(&self) -> CardHandle { self.handle.clone() }

    pub fn disconnect(&self) { self.handle.disconnect(); }

    pub fn card_size(&self) -> usize { CARD_SIZE }

    pub fn state(&self) -> CardState {
        match self.lifecycle {
            Lifecycle::Uninitialized => CardState::Uninitialized,
            Lifecycle::Mounted { .. } => CardState::Mounted,
        }
    }

    pub fn root(&self) -> Option<&Element> {
        match &self.lifecycle {
            Lifecycle::Mounted { root, .. } => Some(root),
            Lifecycle::Uninitialized => None,
        }
    }

    pub fn is_collapsed(&self, key: &str) -> bool {
        self.collapsed.iter().any(|k| k.as_str() == key)
    }

    pub fn collapsed(&self) -> Vec<SectionKey> { self.collapsed.iter().copied().collect() }

    /// Validate and adopt a configuration. Does not touch the shell, except that a
    /// changed section layout schedules a fresh mount on the next tick.
    pub fn configure(&mut self, raw: Value) -> Result<(), ConfigError> {
        let cfg = match CardConfig::from_value(raw, &self.registry) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(card = %self.instance, error = %e, "rejected card configuration");
                self.config = None;
                self.config_error = Some(e.clone());
                return Err(e);
            }
        };

        let layout = self.layout_for(&cfg);
        if let Lifecycle::Mounted { layout: mounted, .. } = &self.lifecycle {
            if *mounted != layout {
                tracing::info!(card = %self.instance, "section layout changed, rebuilding shell on next tick");
                self.lifecycle = Lifecycle::Uninitialized;
                // A fresh shell starts expanded; nothing is collapsed while unmounted.
                self.collapsed.clear();
            }
        }
        if !self.remote_pinned {
            self.remote = remote_for(&cfg);
        }

        tracing::debug!(card = %self.instance, active = ?cfg.active(), "card configured");
        self.config = Some(cfg);
        self.config_error = None;
        Ok(())
    }

    fn layout_for(&self, cfg: &CardConfig) -> ShellLayout {
        cfg.active()
            .iter()
            .filter_map(|&key| match self.registry.get(key.as_str()) {
                Ok(section) => Some((key, cfg.section(key, section.default_label()).label)),
                Err(e) => {
                    report_unknown(&e);
                    None
                }
            })
            .collect()
    }

    fn mount(&mut self) {
        let Some(cfg) = &self.config else { return };

        let mut content = Element::new("div").class("card-content");
        let mut keys = Vec::new();
        for &key in cfg.active() {
            match self.registry.get(key.as_str()) {
                Ok(section) => {
                    content = content.child(section.render_shell(cfg));
                    keys.push(key);
                }
                Err(e) => report_unknown(&e),
            }
        }
        let mut root = Element::new("ha-card")
            .child(Element::new("style").child(Node::Raw(CARD_STYLES.to_string())))
            .child(content);

        for &key in &keys {
            if let Some(header) = root.find_mut(&section_part(key.as_str(), HEADER_CLASS)) {
                header.add_listener(Listener::ToggleCollapse(key));
            }
            apply_collapse(&mut root, key, self.collapsed.contains(&key));
        }

        let layout = self.layout_for(cfg);
        tracing::info!(card = %self.instance, sections = ?keys, "mounted card shell");
        self.lifecycle = Lifecycle::Mounted { root, layout };
    }

    /// Host update. Mounts the shell on the first call, then refreshes every active
    /// section's content. Each section is written as soon as its own load resolves,
    /// so a slow source never holds back its siblings. Never fails: a section whose
    /// data cannot be loaded shows its empty placeholder.
    pub async fn on_tick(&mut self, snapshot: &HostSnapshot) {
        if self.config.is_none() {
            tracing::debug!(card = %self.instance, "tick without a valid configuration ignored");
            return;
        }
        if !self.handle.is_connected() {
            tracing::debug!(card = %self.instance, "tick on a disconnected card ignored");
            return;
        }
        if matches!(self.lifecycle, Lifecycle::Uninitialized) {
            self.mount();
        }

        let Self { instance, registry, config, lifecycle, handle, entities, remote, .. } = self;
        let Some(cfg) = config.as_ref() else { return };
        let Lifecycle::Mounted { root, .. } = lifecycle else { return };
        let sources = Sources { registry, entities, remote: remote.as_deref(), instance: *instance };

        let mut pending: FuturesUnordered<_> =
            cfg.active().iter().map(|&key| load_section(&sources, cfg, key, snapshot)).collect();
        while let Some(load) = pending.next().await {
            let Some(load) = load else { continue };
            // The card may have been removed while requests were in flight.
            if !handle.is_connected() {
                tracing::debug!(card = %instance, section = %load.key, "card disconnected during tick, dropping results");
                return;
            }
            match registry.get(load.key.as_str()) {
                Ok(section) => section.reconcile(root, &load.items, load.max_items),
                Err(e) => report_unknown(&e),
            }
        }
    }

    /// Dispatch a click on `key`'s section header. Returns false when no header with
    /// a bound listener exists for that key.
    pub fn click(&mut self, key: &str) -> bool {
        let Lifecycle::Mounted { root, .. } = &self.lifecycle else { return false };
        let Some(header) = root.find(&section_part(key, HEADER_CLASS)) else { return false };
        let listeners = header.listeners().to_vec();
        if listeners.is_empty() {
            return false;
        }
        for listener in listeners {
            match listener {
                Listener::ToggleCollapse(k) => self.toggle(k),
            }
        }
        true
    }

    fn toggle(&mut self, key: SectionKey) {
        let collapsed = if self.collapsed.remove(&key) {
            false
        } else {
            self.collapsed.insert(key);
            true
        };
        if let Lifecycle::Mounted { root, .. } = &mut self.lifecycle {
            apply_collapse(root, key, collapsed);
        }
        tracing::debug!(card = %self.instance, section = %key, collapsed, "toggled section");
    }

    /// Current markup: the configuration error if there is one, else the mounted
    /// card, else nothing.
    pub fn to_html(&self) -> String {
        if let Some(err) = &self.config_error {
            return format!(
                "<ha-card><div class=\"card-error\">\u{26a0}\u{fe0f} {}</div></ha-card>",
                escape(&err.to_string())
            );
        }
        self.root().map(Element::to_html).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::sections::ITEM_CLASS;
    use async_trait::async_trait;
    use serde_json::json;

    fn entity_items(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"id": format!("{i}"), "title": format!("Item {i}")})).collect()
    }

    fn item_titles(card: &CardController, key: &str) -> Vec<String> {
        let root = card.root().unwrap();
        let slot = root.find(&section_part(key, CONTENT_CLASS)).unwrap();
        slot.child_elements()
            .filter(|e| e.has_class(ITEM_CLASS))
            .map(|e| e.find(&|x| x.has_class("media-title")).unwrap().text_content())
            .collect()
    }

    #[tokio::test]
    async fn mounts_once_and_keeps_listeners() {
        let mut card = CardController::new();
        card.configure(json!({"emby_movies_entity": "sensor.m"})).unwrap();
        assert_eq!(card.state(), CardState::Uninitialized);

        let snap = HostSnapshot::new().with_entity_data("sensor.m", entity_items(2));
        for _ in 0..3 {
            card.on_tick(&snap).await;
        }
        assert_eq!(card.state(), CardState::Mounted);
        let root = card.root().unwrap();
        let header = root.find(&section_part("emby_movies", HEADER_CLASS)).unwrap();
        assert_eq!(header.listeners(), &[Listener::ToggleCollapse(SectionKey::MOVIES)]);
        assert_eq!(root.count(&|e| e.has_class(SECTION_CLASS)), 1);
    }

    #[tokio::test]
    async fn tick_before_configure_builds_nothing() {
        let mut card = CardController::new();
        assert!(card.configure(json!({"max_items": 2})).is_err());
        card.on_tick(&HostSnapshot::new()).await;
        assert_eq!(card.state(), CardState::Uninitialized);
        assert!(card.to_html().contains("at least one data source must be configured"));
    }

    #[tokio::test]
    async fn toggle_twice_is_identity() {
        let mut card = CardController::new();
        card.configure(json!({"emby_movies_entity": "sensor.m", "emby_series_entity": "sensor.s"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        let before = card.to_html();

        assert!(card.click("emby_series"));
        assert!(card.is_collapsed("emby_series"));
        let root = card.root().unwrap();
        assert!(root.find(&section_part("emby_series", CONTENT_CLASS)).unwrap().get_attr("hidden").is_some());
        assert!(root.find(&section_part("emby_series", ICON_CLASS)).unwrap().has_class("rotated"));
        assert!(!card.is_collapsed("emby_movies"));

        assert!(card.click("emby_series"));
        assert!(!card.is_collapsed("emby_series"));
        assert_eq!(card.to_html(), before);
    }

    #[tokio::test]
    async fn click_on_unknown_section_is_ignored() {
        let mut card = CardController::new();
        assert!(!card.click("emby_movies"));
        card.configure(json!({"emby_movies_entity": "sensor.m"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        assert!(!card.click("emby_series"));
        assert!(card.collapsed().is_empty());
    }

    #[tokio::test]
    async fn collapse_survives_ticks() {
        let mut card = CardController::new();
        card.configure(json!({"emby_movies_entity": "sensor.m"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        card.click("emby_movies");
        card.on_tick(&HostSnapshot::new().with_entity_data("sensor.m", entity_items(3))).await;
        assert!(card.is_collapsed("emby_movies"));
        assert_eq!(item_titles(&card, "emby_movies").len(), 3);
    }

    #[tokio::test]
    async fn reconfigure_with_same_layout_keeps_shell() {
        let mut card = CardController::new();
        card.configure(json!({"emby_movies_entity": "sensor.m"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        card.configure(json!({"emby_movies_entity": "sensor.other", "max_items": 1})).unwrap();
        assert_eq!(card.state(), CardState::Mounted);

        card.on_tick(&HostSnapshot::new().with_entity_data("sensor.other", entity_items(4))).await;
        assert_eq!(item_titles(&card, "emby_movies"), vec!["Item 0"]);
    }

    #[tokio::test]
    async fn reconfigure_with_new_sections_remounts() {
        let mut card = CardController::new();
        card.configure(json!({"emby_movies_entity": "sensor.m"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        card.click("emby_movies");

        card.configure(json!({"emby_series_entity": "sensor.s"})).unwrap();
        assert_eq!(card.state(), CardState::Uninitialized);
        assert!(card.collapsed().is_empty());

        card.on_tick(&HostSnapshot::new()).await;
        let root = card.root().unwrap();
        assert!(root.find(&section_part("emby_series", SECTION_CLASS)).is_some());
        assert!(root.find(&section_part("emby_movies", SECTION_CLASS)).is_none());
    }

    #[tokio::test]
    async fn label_change_remounts() {
        let mut card = CardController::new();
        card.configure(json!({"emby_movies_entity": "sensor.m"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        card.configure(json!({"emby_movies_entity": "sensor.m", "emby_movies_label": "Kino"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        assert!(card.to_html().contains(">Kino<"));
    }

    #[tokio::test]
    async fn relabel_drops_collapse_state_with_the_old_shell() {
        let mut card = CardController::new();
        card.configure(json!({"emby_movies_entity": "sensor.m"})).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        assert!(card.click("emby_movies"));

        card.configure(json!({"emby_movies_entity": "sensor.m", "emby_movies_label": "Kino"})).unwrap();
        assert_eq!(card.state(), CardState::Uninitialized);
        assert!(card.collapsed().is_empty());

        card.on_tick(&HostSnapshot::new()).await;
        let root = card.root().unwrap();
        assert!(!root.find(&section_part("emby_movies", SECTION_CLASS)).unwrap().has_class("collapsed"));
        assert!(root.find(&section_part("emby_movies", CONTENT_CLASS)).unwrap().get_attr("hidden").is_none());
    }

    #[tokio::test]
    async fn slow_section_does_not_hold_back_its_sibling() {
        struct SlowSeries;

        #[async_trait]
        impl DataSource for SlowSeries {
            async fn fetch_latest(&self, q: &LatestQuery<'_>, _s: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure> {
                if q.kind == MediaKind::Series {
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
                Ok(vec![MediaItem::new("q", "Quick", q.kind)])
            }
        }

        let mut card = CardController::new().with_remote_source(Arc::new(SlowSeries));
        card.configure(json!({"emby_url": "http://emby:8096", "api_key": "k"})).unwrap();

        let tick = tokio::time::timeout(std::time::Duration::from_millis(300), card.on_tick(&HostSnapshot::new())).await;
        assert!(tick.is_err());
        assert_eq!(item_titles(&card, "emby_movies"), vec!["Quick"]);
        assert!(item_titles(&card, "emby_series").is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "no section registered under key 'emby_series'")]
    fn enabling_key_without_section_panics_in_debug() {
        let registry = SectionRegistry::from_parts(
            vec![Arc::new(crate::sections::MoviesSection) as Arc<dyn crate::sections::Section>],
            vec![("emby_series_entity", SectionKey::SERIES)],
        );
        let mut card = CardController::with_registry(registry);
        let _ = card.configure(json!({"emby_series_entity": "sensor.s"}));
    }

    #[test]
    fn card_asks_for_three_rows() {
        assert_eq!(CardController::new().card_size(), 3);
    }

    struct Failing;

    #[async_trait]
    impl DataSource for Failing {
        async fn fetch_latest(&self, _q: &LatestQuery<'_>, _s: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure> {
            Err(FetchFailure::Status { status: 500 })
        }
    }

    #[tokio::test]
    async fn failing_section_does_not_blank_its_sibling() {
        let mut card = CardController::new().with_remote_source(Arc::new(Failing));
        card.configure(json!({
            "emby_movies_entity": "sensor.m",
            "emby_url": "http://emby:8096",
            "api_key": "k",
        })).unwrap();
        card.on_tick(&HostSnapshot::new().with_entity_data("sensor.m", entity_items(2))).await;

        assert_eq!(item_titles(&card, "emby_movies"), vec!["Item 0", "Item 1"]);
        let root = card.root().unwrap();
        let series = root.find(&section_part("emby_series", CONTENT_CLASS)).unwrap();
        assert_eq!(series.text_content(), "Keine Serien gefunden");
    }

    struct DisconnectsMidFetch(CardHandle);

    #[async_trait]
    impl DataSource for DisconnectsMidFetch {
        async fn fetch_latest(&self, q: &LatestQuery<'_>, _s: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure> {
            self.0.disconnect();
            Ok(vec![MediaItem::new("x", "Late", q.kind)])
        }
    }

    #[tokio::test]
    async fn results_after_disconnect_are_dropped() {
        let mut card = CardController::new();
        let handle = card.handle();
        card = card.with_remote_source(Arc::new(DisconnectsMidFetch(handle.clone())));
        card.configure(json!({"emby_url": "http://emby:8096", "api_key": "k"})).unwrap();

        card.on_tick(&HostSnapshot::new()).await;
        assert!(!handle.is_connected());
        let root = card.root().unwrap();
        let slot = root.find(&section_part("emby_movies", CONTENT_CLASS)).unwrap();
        assert!(slot.children().is_empty());

        // Reattached: the next tick renders again.
        handle.connect();
        let mut card = card.with_remote_source(Arc::new(Fixed));
        card.on_tick(&HostSnapshot::new()).await;
        assert_eq!(item_titles(&card, "emby_movies"), vec!["Fixed"]);
    }

    struct Fixed;

    #[async_trait]
    impl DataSource for Fixed {
        async fn fetch_latest(&self, q: &LatestQuery<'_>, _s: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure> {
            Ok(vec![MediaItem::new("f", "Fixed", q.kind)])
        }
    }

    #[tokio::test]
    async fn pull_limit_follows_section_max_items() {
        struct Echo;

        #[async_trait]
        impl DataSource for Echo {
            async fn fetch_latest(&self, q: &LatestQuery<'_>, _s: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure> {
                Ok(vec![MediaItem::new("e", format!("limit {}", q.limit), MediaKind::Movie)])
            }
        }

        let mut card = CardController::new().with_remote_source(Arc::new(Echo));
        card.configure(json!({
            "emby_url": "http://emby:8096", "api_key": "k",
            "max_items": 6, "emby_series_max_items": 2,
        })).unwrap();
        card.on_tick(&HostSnapshot::new()).await;
        assert_eq!(item_titles(&card, "emby_movies"), vec!["limit 6"]);
        assert_eq!(item_titles(&card, "emby_series"), vec!["limit 2"]);
    }
}
