use super::html::{absolute, cells, find, find_attr, selector, text};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{dashed_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{
    normalize_date, normalize_size, parse_count, CategoryTable, DateFormat,
};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use futures::future::join_all;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const ID: &str = "magnetdl";
pub const DEFAULT_BASE_URL: &str = "https://www.magnetdl.com";

/// Result pages fetched per query
const PAGES: u32 = 3;

const TYPES: CategoryTable = CategoryTable::new(&[
    ("Movie", Category::Movies),
    ("TV", Category::Series),
    ("Music", Category::Music),
    ("Software", Category::Apps),
    ("Game", Category::Games),
    ("E-Book", Category::Books),
    ("Other", Category::Other),
]);

/// MagnetDL; one query is spread over several listing pages
pub struct MagnetDlProvider {
    descriptor: SourceDescriptor,
}

impl MagnetDlProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "MagnetDL", base_url, Category::All),
        }
    }

    /// Listing URL for one page, `None` when the query has nothing to index by
    fn page_url(&self, query: &str, page: u32) -> Option<String> {
        let slug = dashed_query(&query.to_lowercase());
        let initial = slug.chars().next()?;
        Some(format!(
            "{}/{}/{}/se/desc/{}/",
            self.descriptor.base_url, initial, slug, page
        ))
    }

    fn parse_listing(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table.download tbody tr") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str) -> Option<(RowDraft, TorrentId)> {
        let columns = cells(row);
        let [_, title_cell, age_cell, type_cell, _, size_cell, seeds_cell, peers_cell, ..] =
            columns.as_slice()
        else {
            return None;
        };

        let id = TorrentId::magnet(&find_attr(row, "td.m a", "href")?)?;
        let title = find(*title_cell, "a")?;
        let name = title
            .value()
            .attr("title")
            .map(ToString::to_string)
            .unwrap_or_else(|| text(title));

        Some((
            RowDraft {
                name,
                size: normalize_size(&text(*size_cell))?,
                seeders: parse_count(&text(*seeds_cell))?,
                peers: parse_count(&text(*peers_cell))?,
                date: normalize_date(&text(*age_cell), DateFormat::Relative),
                category: Some(TYPES.category_for(&text(*type_cell))),
                description_url: absolute(base, title.value().attr("href")?),
            },
            id,
        ))
    }
}

impl Default for MagnetDlProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for MagnetDlProvider {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        query: &str,
        _category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError> {
        let urls: Vec<String> = (1..=PAGES)
            .filter_map(|page| self.page_url(query, page))
            .collect();
        if urls.is_empty() {
            return Err(ProviderError::InvalidQuery("empty query".to_string()));
        }
        debug!("MagnetDL fetching {} pages starting at {}", urls.len(), urls[0]);

        let pages = join_all(urls.into_iter().map(|url| async move {
            let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
            let base = self.descriptor.base_url.clone();
            Ok::<_, ProviderError>(
                parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await,
            )
        }))
        .await;

        let mut rows = Vec::new();
        let mut first_error = None;
        let mut succeeded = 0;
        for page in pages {
            match page {
                Ok(page_rows) => {
                    succeeded += 1;
                    rows.extend(page_rows);
                }
                Err(e) => {
                    debug!("MagnetDL page failed: {}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if succeeded == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        info!("MagnetDL returned {} usable rows", rows.len());
        Ok(into_records(&self.descriptor, rows))
    }
}
