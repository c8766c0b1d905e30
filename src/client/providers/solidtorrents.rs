use super::json::{array_field, str_field, u32_field, u64_field};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{format_size, normalize_date, CategoryTable, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

pub const ID: &str = "solidtorrents";
pub const DEFAULT_BASE_URL: &str = "https://solidtorrents.to";

const CODES: CategoryTable = CategoryTable::new(&[
    ("Audio", Category::Music),
    ("Video", Category::Movies),
    ("Ebook", Category::Books),
    ("Document", Category::Books),
    ("Program", Category::Apps),
    ("Android", Category::Apps),
    ("Games", Category::Games),
    ("Archive", Category::Other),
    ("Image", Category::Other),
    ("DiskImage", Category::Apps),
    ("Adult", Category::Porn),
]);

/// Solid Torrents JSON API
pub struct SolidTorrentsProvider {
    descriptor: SourceDescriptor,
}

impl SolidTorrentsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(
                ID,
                "Solid Torrents",
                base_url,
                Category::All,
            ),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let mut url = format!(
            "{}/api/v1/search?q={}&sort=seeders",
            self.descriptor.base_url,
            encode_query(query)
        );
        if let Some(code) = CODES.code_for(category) {
            url.push_str("&category=");
            url.push_str(code);
        }
        url
    }

    fn parse_results(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let Ok(document) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        array_field(&document, "results")
            .iter()
            .filter_map(|row| Self::parse_row(row, base))
            .collect()
    }

    fn parse_row(row: &Value, base: &str) -> Option<(RowDraft, TorrentId)> {
        let id = TorrentId::from_parts(
            str_field(row, "magnet").as_deref(),
            str_field(row, "infohash").as_deref(),
        )?;
        let swarm = row.get("swarm")?;
        let description_url = str_field(row, "_id")
            .map(|key| format!("{base}/view/{key}"))
            .unwrap_or_default();

        Some((
            RowDraft {
                name: str_field(row, "title")?,
                size: format_size(u64_field(row, "size")?),
                seeders: u32_field(swarm, "seeders")?,
                peers: u32_field(swarm, "leechers")?,
                date: normalize_date(&str_field(row, "imported")?, DateFormat::Iso8601),
                category: str_field(row, "category").map(|code| CODES.category_for(&code)),
                description_url,
            },
            id,
        ))
    }
}

impl Default for SolidTorrentsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for SolidTorrentsProvider {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        query: &str,
        category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError> {
        let url = self.search_url(query, category);
        debug!("Solid Torrents search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get_json(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_results(b, &base)).await;
        info!("Solid Torrents returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
