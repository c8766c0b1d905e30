use super::html::{absolute, find, find_attr, selector, text};
use super::traits::{ProviderError, Safety, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{
    normalize_date, normalize_size, parse_count, CategoryTable, DateFormat,
};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const ID: &str = "torrentgalaxy";
pub const DEFAULT_BASE_URL: &str = "https://torrentgalaxy.to";

/// The first entry per category doubles as the request filter
const CODES: CategoryTable = CategoryTable::new(&[
    ("3", Category::Movies),
    ("41", Category::Series),
    ("22", Category::Music),
    ("10", Category::Games),
    ("20", Category::Apps),
    ("45", Category::Books),
    ("28", Category::Anime),
    ("35", Category::Porn),
    ("38", Category::Other),
    ("4", Category::Movies),
    ("42", Category::Movies),
    ("46", Category::Movies),
    ("5", Category::Series),
    ("6", Category::Series),
    ("23", Category::Music),
    ("25", Category::Music),
    ("43", Category::Games),
    ("21", Category::Apps),
    ("18", Category::Apps),
    ("12", Category::Books),
    ("13", Category::Books),
    ("48", Category::Porn),
]);

/// TorrentGalaxy, a div-based table with magnets inline
pub struct TorrentGalaxyProvider {
    descriptor: SourceDescriptor,
}

impl TorrentGalaxyProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "TorrentGalaxy", base_url, Category::All)
                .with_safety(Safety::unsafe_because("Mirror domains change frequently")),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let mut url = format!(
            "{}/torrents.php?search={}&sort=seeders&order=desc",
            self.descriptor.base_url,
            encode_query(query)
        );
        if let Some(code) = CODES.code_for(category) {
            url.push_str(&format!("&c{code}=1"));
        }
        url
    }

    fn parse_listing(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("div.tgxtablerow") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str) -> Option<(RowDraft, TorrentId)> {
        let cell_selector = selector("div.tgxtablecell")?;
        let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();

        let title = find(row, "a.txlight[href^=\"/torrent/\"]")?;
        let name = title
            .value()
            .attr("title")
            .map(ToString::to_string)
            .unwrap_or_else(|| text(title));
        let id = TorrentId::magnet(&find_attr(row, "a[href^=\"magnet:\"]", "href")?)?;

        let counts = find(row, "span[title=\"Seeders/Leechers\"]")?;
        let bold = selector("b")?;
        let mut numbers = counts.select(&bold).map(text);
        let seeders = parse_count(&numbers.next()?)?;
        let peers = parse_count(&numbers.next()?)?;

        let category = find_attr(row, "a[href*=\"cat=\"]", "href")
            .and_then(|href| href.split("cat=").nth(1).map(ToString::to_string))
            .map(|code| CODES.category_for(&code));
        let date = cells.last().map(|cell| text(*cell))?;

        Some((
            RowDraft {
                name,
                size: normalize_size(&text(find(row, "span.badge")?))?,
                seeders,
                peers,
                date: normalize_date(&date, DateFormat::DayMonthYear),
                category,
                description_url: absolute(base, title.value().attr("href")?),
            },
            id,
        ))
    }
}

impl Default for TorrentGalaxyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for TorrentGalaxyProvider {
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
        debug!("TorrentGalaxy search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await;
        info!("TorrentGalaxy returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
