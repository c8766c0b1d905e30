use super::json::{array_field, str_field, u32_field, u64_field};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{format_size, normalize_date, normalize_size, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

pub const ID: &str = "yts";
pub const DEFAULT_BASE_URL: &str = "https://yts.mx";

/// YTS movie API; every movie expands into one record per available torrent
pub struct YtsProvider {
    descriptor: SourceDescriptor,
}

impl YtsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "YTS", base_url, Category::Movies),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/api/v2/list_movies.json?query_term={}&limit=50&sort_by=seeds",
            self.descriptor.base_url,
            encode_query(query)
        )
    }

    fn parse_results(body: &str) -> Vec<(RowDraft, TorrentId)> {
        let Ok(document) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        let Some(data) = document.get("data") else {
            return Vec::new();
        };

        array_field(data, "movies")
            .iter()
            .flat_map(Self::parse_movie)
            .collect()
    }

    fn parse_movie(movie: &Value) -> Vec<(RowDraft, TorrentId)> {
        let Some(title) = str_field(movie, "title_long").or_else(|| str_field(movie, "title"))
        else {
            return Vec::new();
        };
        let page = str_field(movie, "url").unwrap_or_default();

        array_field(movie, "torrents")
            .iter()
            .filter_map(|torrent| Self::parse_torrent(&title, &page, torrent))
            .collect()
    }

    fn parse_torrent(title: &str, page: &str, torrent: &Value) -> Option<(RowDraft, TorrentId)> {
        let id = TorrentId::hash(&str_field(torrent, "hash")?)?;
        let size = u64_field(torrent, "size_bytes")
            .map(format_size)
            .or_else(|| str_field(torrent, "size").and_then(|s| normalize_size(&s)))?;

        let mut name = title.to_string();
        for key in ["quality", "type", "video_codec"] {
            if let Some(tag) = str_field(torrent, key) {
                name.push_str(&format!(" [{tag}]"));
            }
        }

        Some((
            RowDraft {
                name,
                size,
                seeders: u32_field(torrent, "seeds")?,
                peers: u32_field(torrent, "peers")?,
                date: normalize_date(
                    &str_field(torrent, "date_uploaded_unix")?,
                    DateFormat::EpochSeconds,
                ),
                category: Some(Category::Movies),
                description_url: page.to_string(),
            },
            id,
        ))
    }
}

impl Default for YtsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for YtsProvider {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        query: &str,
        _category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError> {
        let url = self.search_url(query);
        debug!("YTS search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get_json(url)).await?;
        let rows = parse_off_thread(body, Self::parse_results).await;
        info!("YTS returned {} torrents", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
