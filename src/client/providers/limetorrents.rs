use super::html::{absolute, cells, find, selector, text};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{dashed_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{
    normalize_date, normalize_size, parse_count, CategoryTable, DateFormat,
};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use tracing::{debug, info};

pub const ID: &str = "limetorrents";
pub const DEFAULT_BASE_URL: &str = "https://www.limetorrents.lol";

/// Path segment per category, also used for the "in Movies" row labels
const PATHS: CategoryTable = CategoryTable::new(&[
    ("movies", Category::Movies),
    ("tv", Category::Series),
    ("music", Category::Music),
    ("games", Category::Games),
    ("applications", Category::Apps),
    ("anime", Category::Anime),
    ("other", Category::Other),
]);

/// LimeTorrents; info hashes are embedded in the cached .torrent links
pub struct LimeTorrentsProvider {
    descriptor: SourceDescriptor,
}

fn hash_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"/torrent/([A-Fa-f0-9]{40})\.torrent").ok())
        .as_ref()
}

impl LimeTorrentsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "LimeTorrents", base_url, Category::All),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        format!(
            "{}/search/{}/{}/seeds/1/",
            self.descriptor.base_url,
            PATHS.code_for(category).unwrap_or("all"),
            dashed_query(query)
        )
    }

    fn parse_listing(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table.table2 tr") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str) -> Option<(RowDraft, TorrentId)> {
        let columns = cells(row);
        let [name_cell, added_cell, size_cell, seeds_cell, peers_cell, ..] = columns.as_slice()
        else {
            return None;
        };

        let name_block = find(*name_cell, "div.tt-name")?;
        let anchors = selector("a")?;
        let links: Vec<ElementRef<'_>> = name_block.select(&anchors).collect();
        let [cache_link, title_link, ..] = links.as_slice() else {
            return None;
        };

        let cache_href = cache_link.value().attr("href")?;
        let hash = hash_pattern()?.captures(cache_href)?.get(1)?.as_str();
        let id = TorrentId::hash(hash)?;

        // "2 years ago - in Movies"
        let added = text(*added_cell);
        let (age, label) = match added.split_once(" - in ") {
            Some((age, label)) => (age.to_string(), Some(label.trim().to_ascii_lowercase())),
            None => (added.clone(), None),
        };
        let category = label.map(|label| match label.as_str() {
            "tv shows" => Category::Series,
            other => PATHS.category_for(other),
        });

        Some((
            RowDraft {
                name: text(*title_link),
                size: normalize_size(&text(*size_cell))?,
                seeders: parse_count(&text(*seeds_cell))?,
                peers: parse_count(&text(*peers_cell))?,
                date: normalize_date(&age, DateFormat::Relative),
                category,
                description_url: absolute(base, title_link.value().attr("href")?),
            },
            id,
        ))
    }
}

impl Default for LimeTorrentsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for LimeTorrentsProvider {
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
        debug!("LimeTorrents search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await;
        info!("LimeTorrents returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
