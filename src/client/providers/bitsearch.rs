use super::html::{absolute, find, find_attr, selector, text};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{
    normalize_date, normalize_size, parse_count, CategoryTable, DateFormat,
};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const ID: &str = "bitsearch";
pub const DEFAULT_BASE_URL: &str = "https://bitsearch.to";

const REQUEST_CODES: CategoryTable = CategoryTable::new(&[
    ("1", Category::Other),
    ("2", Category::Movies),
    ("3", Category::Series),
    ("4", Category::Anime),
    ("5", Category::Apps),
    ("6", Category::Games),
    ("7", Category::Music),
    ("9", Category::Books),
    ("10", Category::Porn),
]);

/// Category labels shown on each result
const LABELS: CategoryTable = CategoryTable::new(&[
    ("Other", Category::Other),
    ("Movies", Category::Movies),
    ("TV", Category::Series),
    ("Anime", Category::Anime),
    ("Softwares", Category::Apps),
    ("Software", Category::Apps),
    ("Games", Category::Games),
    ("Music", Category::Music),
    ("Ebook", Category::Books),
    ("Books", Category::Books),
    ("XXX", Category::Porn),
    ("Adult", Category::Porn),
]);

/// BitSearch DHT search; results are list items with a stats strip
pub struct BitsearchProvider {
    descriptor: SourceDescriptor,
}

impl BitsearchProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "BitSearch", base_url, Category::All),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let mut url = format!(
            "{}/search?q={}&sort=seeders",
            self.descriptor.base_url,
            encode_query(query)
        );
        if let Some(code) = REQUEST_CODES.code_for(category) {
            url.push_str("&category=");
            url.push_str(code);
        }
        url
    }

    fn parse_listing(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(items) = selector("li.search-result") else {
            return Vec::new();
        };
        document
            .select(&items)
            .filter_map(|item| Self::parse_item(item, base))
            .collect()
    }

    fn parse_item(item: ElementRef<'_>, base: &str) -> Option<(RowDraft, TorrentId)> {
        let title = find(item, "h5.title a")?;
        let name = text(title);
        if name.is_empty() {
            return None;
        }
        let id = TorrentId::magnet(&find_attr(item, "a.dl-magnet", "href")?)?;

        // downloads, size, seeders, leechers, date
        let stat_selector = selector("div.stats > div")?;
        let stats: Vec<String> = item.select(&stat_selector).map(text).collect();
        let [_, size, seeders, leechers, date, ..] = stats.as_slice() else {
            return None;
        };

        let category = find(item, "a.category").map(|label| LABELS.category_for(&text(label)));

        Some((
            RowDraft {
                name,
                size: normalize_size(size)?,
                seeders: parse_count(seeders)?,
                peers: parse_count(leechers)?,
                date: normalize_date(date, DateFormat::MonthDayYear),
                category,
                description_url: absolute(base, title.value().attr("href")?),
            },
            id,
        ))
    }
}

impl Default for BitsearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for BitsearchProvider {
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
        debug!("BitSearch search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await;
        info!("BitSearch returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
