use super::html::{absolute, cells, find, find_attr, selector, text};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{enrich_rows, fetch_body, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{
    normalize_date, normalize_size, parse_count, CategoryTable, DateFormat,
};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const ID: &str = "therarbg";
pub const DEFAULT_BASE_URL: &str = "https://therarbg.to";

const CODES: CategoryTable = CategoryTable::new(&[
    ("Movies", Category::Movies),
    ("TV", Category::Series),
    ("Games", Category::Games),
    ("Music", Category::Music),
    ("Apps", Category::Apps),
    ("Anime", Category::Anime),
    ("Books", Category::Books),
    ("XXX", Category::Porn),
    ("Other", Category::Other),
    ("Documentaries", Category::Other),
]);

/// TheRARBG listing pages with magnets behind each post
pub struct TheRarbgProvider {
    descriptor: SourceDescriptor,
}

impl TheRarbgProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "TheRARBG", base_url, Category::All),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let keywords = query
            .split_whitespace()
            .map(|word| urlencoding::encode(word).into_owned())
            .collect::<Vec<_>>()
            .join("+");
        match CODES.code_for(category) {
            Some(code) => format!(
                "{}/get-posts/keywords:{}:category:{}/",
                self.descriptor.base_url, keywords, code
            ),
            None => format!("{}/get-posts/keywords:{}/", self.descriptor.base_url, keywords),
        }
    }

    fn parse_listing(body: &str, base: &str) -> Vec<RowDraft> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table tbody tr") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str) -> Option<RowDraft> {
        let columns = cells(row);
        let [_, name_cell, category_cell, date_cell, size_cell, seeds_cell, peers_cell, ..] =
            columns.as_slice()
        else {
            return None;
        };
        let link = find(*name_cell, "a[href^=\"/post-detail/\"]")?;
        let name = text(link);
        if name.is_empty() {
            return None;
        }
        let label = text(*category_cell);

        Some(RowDraft {
            name,
            size: normalize_size(&text(*size_cell))?,
            seeders: parse_count(&text(*seeds_cell))?,
            peers: parse_count(&text(*peers_cell))?,
            date: normalize_date(&text(*date_cell), DateFormat::YearMonthDay),
            category: (!label.is_empty()).then(|| CODES.category_for(&label)),
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

impl Default for TheRarbgProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for TheRarbgProvider {
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
        debug!("TheRARBG search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let drafts = parse_off_thread(body, move |b| Self::parse_listing(b, &base)).await;
        info!("TheRARBG listed {} rows", drafts.len());

        Ok(enrich_rows(&self.descriptor, drafts, fetcher, Self::extract_magnet).await)
    }
}
