use super::html::{absolute, cells, find, find_attr, selector, text};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{dashed_query, enrich_rows, fetch_body, parse_off_thread, scoped_category, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{normalize_date, normalize_size, parse_count, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const ID: &str = "torlock";
pub const DEFAULT_BASE_URL: &str = "https://www.torlock.com";

/// Torlock, verified uploads only; magnets come from the detail pages
pub struct TorlockProvider {
    descriptor: SourceDescriptor,
}

impl TorlockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "Torlock", base_url, Category::All),
        }
    }

    const fn category_path(category: Category) -> &'static str {
        match category {
            Category::Movies => "movies",
            Category::Series => "television",
            Category::Music => "music",
            Category::Games => "games",
            Category::Apps => "software",
            Category::Anime => "anime",
            Category::Books => "ebooks",
            Category::Porn => "adult",
            Category::All | Category::Other => "all",
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        format!(
            "{}/{}/torrents/{}.html?sort=seeds",
            self.descriptor.base_url,
            Self::category_path(category),
            dashed_query(query)
        )
    }

    fn parse_listing(body: &str, base: &str, category: Option<Category>) -> Vec<RowDraft> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table tr") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base, category))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str, category: Option<Category>) -> Option<RowDraft> {
        let columns = cells(row);
        let [name_cell, date_cell, size_cell, seeds_cell, peers_cell, ..] = columns.as_slice()
        else {
            return None;
        };
        let link = find(*name_cell, "a[href^=\"/torrent/\"]")?;
        let name = text(link);
        if name.is_empty() {
            return None;
        }

        Some(RowDraft {
            name,
            size: normalize_size(&text(*size_cell))?,
            seeders: parse_count(&text(*seeds_cell))?,
            peers: parse_count(&text(*peers_cell))?,
            date: normalize_date(&text(*date_cell), DateFormat::MonthDayYear),
            category,
            description_url: absolute(base, link.value().attr("href")?),
        })
    }

    fn extract_magnet(body: &str) -> Option<TorrentId> {
        let document = Html::parse_document(body);
        TorrentId::magnet(&find_attr(
            document.root_element(),
            "a[href^=\"magnet:\"]",
            "href",
        )?)
    }
}

impl Default for TorlockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for TorlockProvider {
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
        debug!("Torlock search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let scoped = scoped_category(category);
        let drafts = parse_off_thread(body, move |b| Self::parse_listing(b, &base, scoped)).await;
        info!("Torlock listed {} rows", drafts.len());

        Ok(enrich_rows(&self.descriptor, drafts, fetcher, Self::extract_magnet).await)
    }
}
