use super::json::{str_field, u32_field, u64_field};
use super::traits::{ProviderError, Safety, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{format_size, normalize_date, CategoryTable, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

pub const ID: &str = "thepiratebay";
pub const DEFAULT_BASE_URL: &str = "https://apibay.org";
const SITE_URL: &str = "https://thepiratebay.org";

/// Request-side codes; the API takes a comma separated list
const REQUEST_CODES: CategoryTable = CategoryTable::new(&[
    ("100", Category::Music),
    ("201,202,207,209,211", Category::Movies),
    ("205,208,212", Category::Series),
    ("300", Category::Apps),
    ("400", Category::Games),
    ("500", Category::Porn),
    ("601,102", Category::Books),
    ("600", Category::Other),
]);

/// Per-item subcategory codes
const ITEM_CODES: CategoryTable = CategoryTable::new(&[
    ("101", Category::Music),
    ("103", Category::Music),
    ("104", Category::Music),
    ("199", Category::Music),
    ("102", Category::Books),
    ("201", Category::Movies),
    ("202", Category::Movies),
    ("207", Category::Movies),
    ("209", Category::Movies),
    ("211", Category::Movies),
    ("205", Category::Series),
    ("208", Category::Series),
    ("212", Category::Series),
    ("301", Category::Apps),
    ("302", Category::Apps),
    ("303", Category::Apps),
    ("304", Category::Apps),
    ("305", Category::Apps),
    ("306", Category::Apps),
    ("399", Category::Apps),
    ("401", Category::Games),
    ("402", Category::Games),
    ("403", Category::Games),
    ("404", Category::Games),
    ("405", Category::Games),
    ("406", Category::Games),
    ("407", Category::Games),
    ("408", Category::Games),
    ("499", Category::Games),
    ("501", Category::Porn),
    ("502", Category::Porn),
    ("503", Category::Porn),
    ("504", Category::Porn),
    ("505", Category::Porn),
    ("506", Category::Porn),
    ("507", Category::Porn),
    ("599", Category::Porn),
    ("601", Category::Books),
    ("602", Category::Books),
]);

/// The Pirate Bay through its JSON backend
pub struct PirateBayProvider {
    descriptor: SourceDescriptor,
    api_url: String,
}

impl PirateBayProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(api_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "The Pirate Bay", SITE_URL, Category::All)
                .with_safety(Safety::unsafe_because(
                    "Frequent fake uploads and malware in unverified torrents",
                ))
                .disabled_by_default(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let mut url = format!("{}/q.php?q={}", self.api_url, encode_query(query));
        if let Some(codes) = REQUEST_CODES.code_for(category) {
            url.push_str("&cat=");
            url.push_str(codes);
        }
        url
    }

    fn parse_results(body: &str) -> Vec<(RowDraft, TorrentId)> {
        let Ok(Value::Array(rows)) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        rows.iter().filter_map(Self::parse_row).collect()
    }

    fn parse_row(row: &Value) -> Option<(RowDraft, TorrentId)> {
        // "No results" is reported as a row carrying the all-zero hash
        let id = TorrentId::hash(&str_field(row, "info_hash")?)?;
        let torrent_id = str_field(row, "id")?;
        let category = str_field(row, "category").map(|code| ITEM_CODES.category_for(&code));

        Some((
            RowDraft {
                name: str_field(row, "name")?,
                size: format_size(u64_field(row, "size")?),
                seeders: u32_field(row, "seeders")?,
                peers: u32_field(row, "leechers")?,
                date: normalize_date(&str_field(row, "added")?, DateFormat::EpochSeconds),
                category,
                description_url: format!("{SITE_URL}/description.php?id={torrent_id}"),
            },
            id,
        ))
    }
}

impl Default for PirateBayProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for PirateBayProvider {
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
        debug!("The Pirate Bay search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get_json(url)).await?;
        let rows = parse_off_thread(body, Self::parse_results).await;
        info!("The Pirate Bay returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
