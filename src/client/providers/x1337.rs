use super::html::{absolute, find, find_attr, find_text, own_text, selector, text};
use super::traits::{ProviderError, Safety, SourceDescriptor, SourceProvider};
use super::{enrich_rows, fetch_body, parse_off_thread, scoped_category, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{
    normalize_date, normalize_size, parse_count, DateFormat, DISPLAY_DATE_FORMAT,
};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const ID: &str = "1337x";
pub const DEFAULT_BASE_URL: &str = "https://1337x.to";

/// 1337x listing pages; magnets live on the detail pages
pub struct X1337Provider {
    descriptor: SourceDescriptor,
}

impl X1337Provider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "1337x", base_url, Category::All)
                .with_safety(Safety::unsafe_because(
                    "Heavy advertising and frequent impersonation sites",
                )),
        }
    }

    const fn category_path(category: Category) -> Option<&'static str> {
        match category {
            Category::All => None,
            Category::Anime => Some("Anime"),
            Category::Apps => Some("Apps"),
            Category::Books => Some("Other"),
            Category::Games => Some("Games"),
            Category::Movies => Some("Movies"),
            Category::Music => Some("Music"),
            Category::Porn => Some("XXX"),
            Category::Series => Some("TV"),
            Category::Other => Some("Other"),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let query = query
            .split_whitespace()
            .map(|word| urlencoding::encode(word).into_owned())
            .collect::<Vec<_>>()
            .join("+");
        match Self::category_path(category) {
            Some(path) => format!(
                "{}/category-search/{}/{}/1/",
                self.descriptor.base_url, query, path
            ),
            None => format!("{}/search/{}/1/", self.descriptor.base_url, query),
        }
    }

    fn parse_listing(body: &str, base: &str, category: Option<Category>) -> Vec<RowDraft> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table.table-list tbody tr") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base, category))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str, category: Option<Category>) -> Option<RowDraft> {
        // the first link in the name cell is the category icon
        let link = find(row, "td.coll-1 a[href^=\"/torrent/\"]")?;
        let href = link.value().attr("href")?;
        let name = text(link);
        if name.is_empty() {
            return None;
        }

        Some(RowDraft {
            name,
            size: normalize_size(&own_text(find(row, "td.coll-4")?)?)?,
            seeders: parse_count(&find_text(row, "td.coll-2")?)?,
            peers: parse_count(&find_text(row, "td.coll-3")?)?,
            date: Self::listing_date(&find_text(row, "td.coll-date")?),
            category,
            description_url: absolute(base, href),
        })
    }

    /// Listing dates look like `Jan. 5th '24`; uploads from today show only a time
    fn listing_date(raw: &str) -> String {
        let lower = raw.to_ascii_lowercase();
        if lower.ends_with("am") || lower.ends_with("pm") {
            return normalize_date("Today", DateFormat::Relative);
        }

        let cleaned: Vec<String> = raw
            .split_whitespace()
            .map(|word| {
                let word = word.trim_matches(|c: char| c == '.' || c == '\'' || c == ',');
                let digits = word.trim_end_matches(|c: char| c.is_ascii_alphabetic());
                let kept = if digits.is_empty() { word } else { digits };
                kept.to_string()
            })
            .collect();
        NaiveDate::parse_from_str(&cleaned.join(" "), "%b %d %y").map_or_else(
            |_| raw.trim().to_string(),
            |date| date.format(DISPLAY_DATE_FORMAT).to_string(),
        )
    }

    fn extract_magnet(body: &str) -> Option<TorrentId> {
        let document = Html::parse_document(body);
        let href = find_attr(document.root_element(), "a[href^=\"magnet:\"]", "href")?;
        TorrentId::magnet(&href)
    }
}

impl Default for X1337Provider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for X1337Provider {
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
        debug!("1337x search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let scoped = scoped_category(category);
        let drafts = parse_off_thread(body, move |b| Self::parse_listing(b, &base, scoped)).await;
        info!("1337x listed {} rows, fetching detail pages", drafts.len());

        Ok(enrich_rows(&self.descriptor, drafts, fetcher, Self::extract_magnet).await)
    }
}
