//! Pull adapter: asks the Emby API for the most recently added items of one kind.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{ConfigError, FetchFailure};
use crate::host::HostSnapshot;
use crate::mapping::item_from_emby_record;
use crate::media::{MediaItem, MediaKind};
use crate::source::{DataSource, LatestQuery};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const BODY_PREVIEW_CHARS: usize = 200;

/// Base URL and credentials, with the URL shapes the card needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbyEndpoint {
    base: Url,
    api_key: String,
    user_id: Option<String>,
}

impl EmbyEndpoint {
    pub fn new(base: &str, api_key: &str, user_id: Option<&str>) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl { value: base.to_string(), reason };
        let parsed = Url::parse(base.trim()).map_err(|e| invalid(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme '{}'", other))),
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        Ok(Self {
            base: parsed,
            api_key: api_key.to_string(),
            user_id: user_id.map(str::to_string).filter(|u| !u.is_empty()),
        })
    }

    pub fn from_remote(remote: &RemoteConfig) -> Result<Self, ConfigError> {
        Self::new(&remote.emby_url, &remote.api_key, remote.user_id.as_deref())
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `{base}/Items/Latest`, or `{base}/Users/{user}/Items` sorted newest first when a
    /// user id is configured.
    pub fn latest_url(&self, kind: MediaKind, limit: usize) -> Url {
        let mut url = match &self.user_id {
            Some(user) => self.join(&["Users", user.as_str(), "Items"]),
            None => self.join(&["Items", "Latest"]),
        };
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("IncludeItemTypes", kind.emby_item_type())
                .append_pair("Limit", &limit.to_string());
            if self.user_id.is_some() {
                q.append_pair("SortBy", "DateCreated")
                    .append_pair("SortOrder", "Descending")
                    .append_pair("Recursive", "true")
                    .append_pair("Fields", "Overview,ProductionYear");
            }
            q.append_pair("api_key", &self.api_key);
        }
        url
    }

    pub fn image_url(&self, item_id: &str) -> String {
        let mut url = self.join(&["emby", "Items", item_id, "Images", "Primary"]);
        url.query_pairs_mut()
            .append_pair("maxHeight", "300")
            .append_pair("quality", "90")
            .append_pair("api_key", &self.api_key);
        url.to_string()
    }
}

/// One record as the items API returns it. Every field is optional; a record
/// that does not fit this shape keeps whichever fields still have the right type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub image_tags: Option<HashMap<String, String>>,
    pub production_year: Option<i64>,
    pub parent_index_number: Option<i64>,
    pub index_number: Option<i64>,
}

impl EmbyRecord {
    /// Field-by-field decode that drops only the mistyped fields.
    fn salvage(v: &Value) -> Self {
        let text = |k: &str| v.get(k).and_then(Value::as_str).map(str::to_string);
        let int = |k: &str| v.get(k).and_then(Value::as_i64);
        let id = match v.get("Id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let image_tags = v.get("ImageTags").and_then(Value::as_object).map(|tags| {
            tags.iter()
                .filter_map(|(k, t)| t.as_str().map(|t| (k.clone(), t.to_string())))
                .collect()
        });
        Self {
            id,
            name: text("Name"),
            overview: text("Overview"),
            image_tags,
            production_year: int("ProductionYear"),
            parent_index_number: int("ParentIndexNumber"),
            index_number: int("IndexNumber"),
        }
    }

    pub fn has_primary_image(&self) -> bool {
        self.image_tags.as_ref().is_some_and(|t| t.contains_key("Primary"))
    }
}

// `/Items/Latest` answers with a bare list, `/Users/{id}/Items` wraps it.
#[derive(Deserialize)]
#[serde(untagged)]
enum LatestBody {
    Paged {
        #[serde(rename = "Items")]
        items: Vec<Value>,
    },
    Bare(Vec<Value>),
}

/// Parse either response shape. A record with mistyped fields keeps the rest.
pub fn parse_latest(body: &str) -> Result<Vec<EmbyRecord>, serde_json::Error> {
    let raw = match serde_json::from_str::<LatestBody>(body)? {
        LatestBody::Paged { items } => items,
        LatestBody::Bare(items) => items,
    };
    Ok(raw
        .iter()
        .map(|v| {
            EmbyRecord::deserialize(v).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "malformed Emby record, salvaging fields");
                EmbyRecord::salvage(v)
            })
        })
        .collect())
}

pub struct EmbyClient {
    http: reqwest::Client,
    endpoint: EmbyEndpoint,
}

impl EmbyClient {
    pub fn new(endpoint: EmbyEndpoint) -> Result<Self, FetchFailure> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, endpoint })
    }

    pub async fn latest(&self, kind: MediaKind, limit: usize) -> Result<Vec<EmbyRecord>, FetchFailure> {
        let url = self.endpoint.latest_url(kind, limit);
        tracing::debug!(kind = ?kind, limit, "requesting latest items");

        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchFailure::Status { status: status.as_u16() });
        }
        let text = res.text().await?;
        parse_latest(&text).map_err(|e| {
            let preview: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
            tracing::warn!(kind = ?kind, body = %preview, "Emby returned a non-JSON body");
            FetchFailure::Body(e)
        })
    }
}

#[async_trait]
impl DataSource for EmbyClient {
    async fn fetch_latest(&self, query: &LatestQuery<'_>, _snapshot: &HostSnapshot) -> Result<Vec<MediaItem>, FetchFailure> {
        let records = self.latest(query.kind, query.limit).await?;
        Ok(records
            .iter()
            .enumerate()
            .map(|(i, r)| item_from_emby_record(query.section, query.kind, i, r, &self.endpoint))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SectionKey;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port; returns the base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let resp = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = sock.write_all(resp.as_bytes()).await;
            let _ = sock.shutdown().await;
        });
        format!("http://{}", addr)
    }

    fn query(limit: usize) -> LatestQuery<'static> {
        LatestQuery { section: SectionKey::MOVIES, kind: MediaKind::Movie, entity_id: None, limit }
    }

    #[test]
    fn latest_url_shapes() {
        let e = EmbyEndpoint::new("http://emby:8096/", "k", None).unwrap();
        assert_eq!(
            e.latest_url(MediaKind::Movie, 5).as_str(),
            "http://emby:8096/Items/Latest?IncludeItemTypes=Movie&Limit=5&api_key=k"
        );
        let e = EmbyEndpoint::new("http://emby:8096", "k", Some("u1")).unwrap();
        let url = e.latest_url(MediaKind::Series, 3);
        assert_eq!(url.path(), "/Users/u1/Items");
        assert!(url.as_str().contains("IncludeItemTypes=Series&Limit=3"));
        assert!(url.as_str().ends_with("api_key=k"));
    }

    #[test]
    fn parses_both_body_shapes() {
        let bare = parse_latest(r#"[{"Id":"1","Name":"A"},{"Id":"2"}]"#).unwrap();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[0].name.as_deref(), Some("A"));

        let paged = parse_latest(r#"{"Items":[{"Id":"3","Name":"C"}],"TotalRecordCount":1}"#).unwrap();
        assert_eq!(paged[0].id.as_deref(), Some("3"));

        assert!(parse_latest("<html>502</html>").is_err());
    }

    #[test]
    fn malformed_record_does_not_sink_the_list() {
        let list = parse_latest(r#"[{"Id":"1","Name":"A"},{"Id":2,"Name":["x"]}]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[1].name.is_none());
        assert_eq!(list[1].id.as_deref(), Some("2"));
    }

    #[test]
    fn one_bad_field_keeps_the_title() {
        let list = parse_latest(
            r#"{"Items":[{"Id":"5","Name":"Kept","ProductionYear":"2020","ImageTags":{"Primary":null,"Thumb":"t"}}]}"#,
        )
        .unwrap();
        assert_eq!(list[0].id.as_deref(), Some("5"));
        assert_eq!(list[0].name.as_deref(), Some("Kept"));
        assert_eq!(list[0].production_year, None);
        assert!(!list[0].has_primary_image());
        assert!(list[0].image_tags.as_ref().unwrap().contains_key("Thumb"));
    }

    #[tokio::test]
    async fn fetch_maps_records_to_items() {
        let base = serve_once("200 OK", r#"[{"Id":"9","Name":"Dune","ProductionYear":2021,"ImageTags":{"Primary":"t"}}]"#).await;
        let client = EmbyClient::new(EmbyEndpoint::new(&base, "k", None).unwrap()).unwrap();
        let items = client.fetch_latest(&query(5), &HostSnapshot::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Dune");
        assert_eq!(items[0].subtitle.as_deref(), Some("2021"));
        assert!(items[0].image_url.contains("/emby/Items/9/Images/Primary"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_failure() {
        let base = serve_once("401 Unauthorized", "{}").await;
        let client = EmbyClient::new(EmbyEndpoint::new(&base, "bad", None).unwrap()).unwrap();
        let err = client.fetch_latest(&query(5), &HostSnapshot::default()).await.unwrap_err();
        assert!(matches!(err, FetchFailure::Status { status: 401 }));
    }

    #[tokio::test]
    async fn unparseable_body_is_a_fetch_failure() {
        let base = serve_once("200 OK", "not json").await;
        let client = EmbyClient::new(EmbyEndpoint::new(&base, "k", None).unwrap()).unwrap();
        let err = client.fetch_latest(&query(5), &HostSnapshot::default()).await.unwrap_err();
        assert!(matches!(err, FetchFailure::Body(_)));
    }
}
