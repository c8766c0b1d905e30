use super::html::absolute;
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{format_size, normalize_date, CategoryTable, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use roxmltree::{Document, Node};
use tracing::{debug, info, warn};

pub const ID: &str = "torrentdownloads";
pub const DEFAULT_BASE_URL: &str = "https://www.torrentdownloads.pro";

const CODES: CategoryTable = CategoryTable::new(&[
    ("1", Category::Anime),
    ("2", Category::Apps),
    ("3", Category::Games),
    ("4", Category::Movies),
    ("5", Category::Music),
    ("7", Category::Other),
    ("8", Category::Series),
    ("9", Category::Books),
]);

/// Torrent Downloads search RSS feed
pub struct TorrentDownloadsProvider {
    descriptor: SourceDescriptor,
}

impl TorrentDownloadsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(
                ID,
                "Torrent Downloads",
                base_url,
                Category::All,
            ),
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        let mut url = format!(
            "{}/rss.xml?type=search&search={}",
            self.descriptor.base_url,
            encode_query(query)
        );
        if let Some(code) = CODES.code_for(category) {
            url.push_str("&cid=");
            url.push_str(code);
        }
        url
    }

    fn parse_feed(body: &str, base: &str) -> Vec<(RowDraft, TorrentId)> {
        let document = match Document::parse(body) {
            Ok(document) => document,
            Err(e) => {
                warn!("Torrent Downloads feed is not XML: {}", e);
                return Vec::new();
            }
        };
        document
            .descendants()
            .filter(|node| node.has_tag_name("item"))
            .filter_map(|item| Self::parse_item(item, base))
            .collect()
    }

    fn child_text(item: Node<'_, '_>, name: &str) -> Option<String> {
        let value = item
            .children()
            .find(|child| child.has_tag_name(name))?
            .text()?
            .trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn parse_item(item: Node<'_, '_>, base: &str) -> Option<(RowDraft, TorrentId)> {
        let id = TorrentId::hash(&Self::child_text(item, "info_hash")?)?;
        let size: u64 = Self::child_text(item, "size")?.parse().ok()?;

        Some((
            RowDraft {
                name: Self::child_text(item, "title")?,
                size: format_size(size),
                seeders: Self::child_text(item, "seeders")?.parse().ok()?,
                peers: Self::child_text(item, "leechers")?.parse().ok()?,
                date: normalize_date(&Self::child_text(item, "pubDate")?, DateFormat::Rfc1123),
                category: Self::child_text(item, "categoryID").map(|code| CODES.category_for(&code)),
                description_url: absolute(base, &Self::child_text(item, "link")?),
            },
            id,
        ))
    }
}

impl Default for TorrentDownloadsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for TorrentDownloadsProvider {
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
        debug!("Torrent Downloads feed URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let rows = parse_off_thread(body, move |b| Self::parse_feed(b, &base)).await;
        info!("Torrent Downloads returned {} usable items", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch::test_support::StubFetcher;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
    <rss version="2.0"><channel>
      <title>Torrent Downloads</title>
      <item>
        <title>Elephants Dream 1080p</title>
        <link>/torrent/1660000/Elephants+Dream+1080p</link>
        <pubDate>Fri, 05 Jan 2024 12:00:00 +0000</pubDate>
        <info_hash>0123456789abcdef0123456789abcdef01234567</info_hash>
        <size>854589440</size>
        <seeders>19</seeders>
        <leechers>1</leechers>
        <categoryID>4</categoryID>
      </item>
      <item>
        <title>Missing hash</title>
        <link>/torrent/2</link>
        <pubDate>Fri, 05 Jan 2024 12:00:00 +0000</pubDate>
        <size>1</size><seeders>1</seeders><leechers>1</leechers>
      </item>
    </channel></rss>"#;

    #[test]
    fn test_search_url() {
        let provider = TorrentDownloadsProvider::new();
        assert_eq!(
            provider.search_url("elephants dream", Category::Movies),
            "https://www.torrentdownloads.pro/rss.xml?type=search&search=elephants%20dream&cid=4"
        );
    }

    #[tokio::test]
    async fn test_feed_items() {
        let fetcher = StubFetcher::new().route("rss.xml", FEED);
        let records = TorrentDownloadsProvider::new()
            .search("elephants dream", Category::All, &fetcher)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.size, "815.00 MB");
        assert_eq!(record.date, "2024-01-05");
        assert_eq!(record.category, Some(Category::Movies));
        assert_eq!(
            record.description_url,
            "https://www.torrentdownloads.pro/torrent/1660000/Elephants+Dream+1080p"
        );
    }

    #[tokio::test]
    async fn test_malformed_feed_is_empty() {
        let fetcher = StubFetcher::new().route("rss.xml", "<rss><channel><item>");
        let records = TorrentDownloadsProvider::new()
            .search("x", Category::All, &fetcher)
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
