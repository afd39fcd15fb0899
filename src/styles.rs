pub const CARD_STYLES: &str = r#"
:host { display: block; }
ha-card { background: rgba(0, 0, 0, 0.4); color: white; padding: 8px; }
.section { margin-bottom: 8px; }
.section-header { display: flex; align-items: center; justify-content: space-between; cursor: pointer; }
.section-title { font-size: 1.1em; font-weight: bold; margin: 6px 0; }
.section-toggle-icon { transition: transform 0.2s; }
.section-toggle-icon.rotated { transform: rotate(-90deg); }
.section-content { display: flex; overflow-x: auto; gap: 8px; padding-bottom: 8px; }
.section-content[hidden] { display: none; }
.media-item { flex: 0 0 auto; width: 100px; position: relative; border-radius: 8px; overflow: hidden; }
.media-poster { width: 100%; height: 150px; object-fit: cover; border-radius: 8px; }
.media-poster.no-image { display: flex; align-items: center; justify-content: center; background: rgba(255, 255, 255, 0.1); }
.media-title { font-size: 0.9em; font-weight: bold; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }
.media-subtitle { font-size: 0.8em; opacity: 0.8; }
.media-description { font-size: 0.8em; opacity: 0.8; display: -webkit-box; -webkit-line-clamp: 2; -webkit-box-orient: vertical; overflow: hidden; }
.empty { opacity: 0.7; padding: 8px; }
.card-error { color: red; padding: 16px; }
"#;
