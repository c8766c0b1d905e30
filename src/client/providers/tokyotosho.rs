use super::html::{absolute, find, find_attr, find_text, selector, text};
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

pub const ID: &str = "tokyotosho";
pub const DEFAULT_BASE_URL: &str = "https://www.tokyotosho.info";

const TYPES: CategoryTable = CategoryTable::new(&[
    ("1", Category::Anime),
    ("2", Category::Music),
    ("3", Category::Books),
    ("4", Category::Porn),
    ("5", Category::Other),
    ("7", Category::Anime),
    ("8", Category::Series),
    ("9", Category::Music),
    ("10", Category::Other),
    ("11", Category::Anime),
    ("12", Category::Porn),
    ("13", Category::Porn),
    ("14", Category::Porn),
    ("15", Category::Porn),
]);

/// Tokyo Toshokan; every result spans two table rows
pub struct TokyoToshoProvider {
    descriptor: SourceDescriptor,
}

impl TokyoToshoProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(
                ID,
                "Tokyo Toshokan",
                base_url,
                Category::Anime,
            ),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        format!(
            "{}/search.php?terms={}&type={}&searchName=true",
            self.descriptor.base_url,
            encode_query(query),
            TYPES.code_for(category).unwrap_or("0")
        )
    }

    fn parse_listing(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table.listing tr") else {
            return Vec::new();
        };

        let mut results = Vec::new();
        let mut pending: Option<ElementRef<'_>> = None;
        for row in document.select(&rows) {
            if find(row, "td.desc-top").is_some() {
                pending = Some(row);
            } else if find(row, "td.desc-bot").is_some() {
                if let Some(parsed) = pending.take().and_then(|top| Self::parse_pair(top, row, base))
                {
                    results.push(parsed);
                }
            }
        }
        results
    }

    fn parse_pair(
        top: ElementRef<'_>,
        bottom: ElementRef<'_>,
        base: &str,
    ) -> Option<(RowDraft, TorrentId)> {
        let id = TorrentId::magnet(&find_attr(top, "td.desc-top a[href^=\"magnet:\"]", "href")?)?;
        let anchors = selector("td.desc-top a")?;
        let name = top
            .select(&anchors)
            .map(text)
            .find(|label| !label.is_empty())?;
        let type_code = find_attr(top, "a[href*=\"cat=\"]", "href")
            .and_then(|href| href.split("cat=").nth(1).map(ToString::to_string));
        let details = find_attr(top, "td.web a[href*=\"details.php\"]", "href")
            .map(|href| absolute(base, &href))
            .unwrap_or_default();

        // "Submitter: x | Size: 1.2GB | Date: 2024-01-05 12:00 UTC | Comment: ..."
        let summary = find_text(bottom, "td.desc-bot")?;
        let field = |label: &str| {
            summary
                .split('|')
                .filter_map(|part| part.trim().strip_prefix(label))
                .map(|value| value.trim().to_string())
                .next()
        };

        Some((
            RowDraft {
                name,
                size: normalize_size(&field("Size:")?)?,
                seeders: parse_count(&find_text(bottom, "td.stats span.stats_s")?)?,
                peers: parse_count(&find_text(bottom, "td.stats span.stats_l")?)?,
                date: normalize_date(&field("Date:")?, DateFormat::YearMonthDay),
                category: type_code.map(|code| TYPES.category_for(&code)),
                description_url: details,
            },
            id,
        ))
    }
}

impl Default for TokyoToshoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for TokyoToshoProvider {
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
        debug!("Tokyo Toshokan search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await;
        info!("Tokyo Toshokan returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
