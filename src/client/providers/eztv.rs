use super::html::{absolute, cells, find, find_attr, selector, text};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{dashed_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{normalize_date, normalize_size, parse_count, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const ID: &str = "eztv";
pub const DEFAULT_BASE_URL: &str = "https://eztvx.to";

/// EZTV episode listings; the site does not publish peer counts
pub struct EztvProvider {
    descriptor: SourceDescriptor,
}

impl EztvProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "EZTV", base_url, Category::Series),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search/{}", self.descriptor.base_url, dashed_query(query))
    }

    /// Ages read like `5h 3m`, `3 days` or `2 weeks`
    fn age_to_date(age: &str) -> String {
        let first = age.split_whitespace().next().unwrap_or_default();
        let hours_or_minutes = first.len() > 1
            && (first.ends_with('h') || first.ends_with('m'))
            && first[..first.len() - 1].chars().all(|c| c.is_ascii_digit());
        if hours_or_minutes {
            normalize_date("Today", DateFormat::Relative)
        } else {
            normalize_date(age, DateFormat::Relative)
        }
    }

    fn parse_listing(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("tr.forum_header_border") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str) -> Option<(RowDraft, TorrentId)> {
        let columns = cells(row);
        let [_, name_cell, links_cell, size_cell, age_cell, seeds_cell, ..] = columns.as_slice()
        else {
            return None;
        };
        let episode = find(*name_cell, "a.epinfo")?;
        let id = TorrentId::magnet(&find_attr(*links_cell, "a.magnet", "href")?)?;

        Some((
            RowDraft {
                name: text(episode),
                size: normalize_size(&text(*size_cell))?,
                // dashes stand in for unknown seed counts
                seeders: parse_count(&text(*seeds_cell)).unwrap_or(0),
                peers: 0,
                date: Self::age_to_date(&text(*age_cell)),
                category: Some(Category::Series),
                description_url: absolute(base, episode.value().attr("href")?),
            },
            id,
        ))
    }
}

impl Default for EztvProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for EztvProvider {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        query: &str,
        _category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError> {
        let url = self.search_url(query);
        debug!("EZTV search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await;
        info!("EZTV returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}
