use super::html::{absolute, cells, find, find_attr, selector, text};
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

pub const ID: &str = "anidex";
pub const DEFAULT_BASE_URL: &str = "https://anidex.info";

/// Request filters accept a comma separated id list
const REQUEST_CODES: CategoryTable = CategoryTable::new(&[
    ("1,2,3", Category::Anime),
    ("4,5", Category::Series),
    ("6,7,8", Category::Books),
    ("9,10,11", Category::Music),
    ("12", Category::Games),
    ("13", Category::Apps),
    ("15", Category::Porn),
    ("14,16", Category::Other),
]);

const ITEM_CODES: CategoryTable = CategoryTable::new(&[
    ("1", Category::Anime),
    ("2", Category::Anime),
    ("3", Category::Anime),
    ("4", Category::Series),
    ("5", Category::Series),
    ("6", Category::Books),
    ("7", Category::Books),
    ("8", Category::Books),
    ("9", Category::Music),
    ("10", Category::Music),
    ("11", Category::Music),
    ("12", Category::Games),
    ("13", Category::Apps),
    ("14", Category::Other),
    ("15", Category::Porn),
    ("16", Category::Other),
]);

/// AniDex anime tracker
pub struct AnidexProvider {
    descriptor: SourceDescriptor,
}

impl AnidexProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "AniDex", base_url, Category::Anime),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let mut url = format!(
            "{}/?q={}&s=seeders&o=desc",
            self.descriptor.base_url,
            encode_query(query)
        );
        if let Some(codes) = REQUEST_CODES.code_for(category) {
            url.push_str("&id=");
            url.push_str(codes);
        }
        url
    }

    fn parse_listing(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table tbody tr") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str) -> Option<(RowDraft, TorrentId)> {
        let columns = cells(row);
        if columns.len() < 10 {
            return None;
        }

        let link = find(columns[1], "a.torrent")?;
        let name = find_attr(link, "span[title]", "title").unwrap_or_else(|| text(link));
        if name.is_empty() {
            return None;
        }
        let id = TorrentId::magnet(&find_attr(row, "a[href^=\"magnet:\"]", "href")?)?;
        let category = find_attr(columns[0], "a", "href")
            .and_then(|href| href.split("id=").nth(1).map(ToString::to_string))
            .map(|code| ITEM_CODES.category_for(&code));

        // the visible cell text is relative; the exact timestamp sits in the title
        let date_cell = columns[7];
        let date = match date_cell.value().attr("title") {
            Some(exact) => normalize_date(exact, DateFormat::YearMonthDay),
            None => normalize_date(&text(date_cell), DateFormat::Relative),
        };

        Some((
            RowDraft {
                name,
                size: normalize_size(&text(columns[6]))?,
                seeders: parse_count(&text(columns[8]))?,
                peers: parse_count(&text(columns[9]))?,
                date,
                category,
                description_url: absolute(base, link.value().attr("href")?),
            },
            id,
        ))
    }
}

impl Default for AnidexProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for AnidexProvider {
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
        debug!("AniDex search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await;
        info!("AniDex returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
