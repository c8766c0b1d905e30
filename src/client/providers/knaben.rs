use super::json::{array_field, str_field, u32_field, u64_field};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{format_size, normalize_date, CategoryTable, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

pub const ID: &str = "knaben";
pub const DEFAULT_BASE_URL: &str = "https://api.knaben.org";

/// Top-level category ids; item ids are finer grained and matched by their million prefix
const CODES: CategoryTable = CategoryTable::new(&[
    ("1000000", Category::Music),
    ("2000000", Category::Series),
    ("3000000", Category::Movies),
    ("4001000", Category::Apps),
    ("4002000", Category::Games),
    ("5000000", Category::Porn),
    ("6000000", Category::Anime),
    ("9000000", Category::Books),
    ("10000000", Category::Other),
]);

/// Knaben, itself an aggregator with a JSON search API
pub struct KnabenProvider {
    descriptor: SourceDescriptor,
}

impl KnabenProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "Knaben", base_url, Category::All),
        }
    }

    fn request_body(query: &str, category: Category) -> Value {
        let mut body = json!({
            "search_type": "100%",
            "search_field": "title",
            "query": query.trim(),
            "order_by": "seeders",
            "order_direction": "desc",
            "size": 100,
            "hide_unsafe": true,
            "hide_xxx": category != Category::Porn,
        });
        if let Some(code) = CODES.code_for(category).and_then(|c| c.parse::<u64>().ok()) {
            body["categories"] = json!([code]);
        }
        body
    }

    /// Map a fine grained id such as `3001000` onto its parent category
    fn item_category(id: u64) -> Category {
        match id {
            4_001_000..=4_001_999 => Category::Apps,
            4_002_000..=4_002_999 => Category::Games,
            _ => CODES.category_for(&((id / 1_000_000) * 1_000_000).to_string()),
        }
    }

    fn parse_results(body: &str) -> Vec<(RowDraft, TorrentId)> {
        let Ok(document) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        array_field(&document, "hits")
            .iter()
            .filter_map(Self::parse_hit)
            .collect()
    }

    fn parse_hit(hit: &Value) -> Option<(RowDraft, TorrentId)> {
        let id = TorrentId::from_parts(
            str_field(hit, "magnetUrl").as_deref(),
            str_field(hit, "hash").as_deref(),
        )?;
        let category = array_field(hit, "categoryId")
            .iter()
            .filter_map(Value::as_u64)
            .max()
            .map(Self::item_category);

        Some((
            RowDraft {
                name: str_field(hit, "title")?,
                size: format_size(u64_field(hit, "bytes")?),
                seeders: u32_field(hit, "seeders")?,
                peers: u32_field(hit, "peers")?,
                date: normalize_date(&str_field(hit, "date")?, DateFormat::Iso8601),
                category,
                description_url: str_field(hit, "details").unwrap_or_default(),
            },
            id,
        ))
    }
}

impl Default for KnabenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for KnabenProvider {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        query: &str,
        category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError> {
        let url = format!("{}/v1", self.descriptor.base_url);
        let request = FetchRequest::post_json(&url, &Self::request_body(query, category));
        debug!("Knaben search POST {} ({})", url, category);

        let body = fetch_body(fetcher, request).await?;
        let rows = parse_off_thread(body, Self::parse_results).await;
        info!("Knaben returned {} usable hits", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
