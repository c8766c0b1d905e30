//! Torznab protocol client for self-hosted indexers (Jackett, Prowlarr, ...).

pub mod caps;
pub mod categories;
pub mod diagnosis;
pub mod feed;

pub use caps::{parse_capabilities, Capabilities};
pub use categories::{canonical_ids, category_for_id, filter_categories};
pub use diagnosis::{diagnose, ConnectionStatus};
pub use feed::parse_feed;

use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::providers::{
    fetch_body, into_records, parse_off_thread, ProviderError, SourceDescriptor, SourceProvider,
};
use crate::client::record::{Category, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

/// A user-configured indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub id: String,
    pub name: String,
    /// Torznab endpoint, e.g. `http://localhost:9117/api/v2.0/indexers/all/results/torznab`
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub category: Category,
}

fn endpoint(config: &IndexerConfig) -> Result<Url, ProviderError> {
    Url::parse(config.url.trim())
        .map_err(|e| ProviderError::InvalidQuery(format!("invalid indexer URL '{}': {e}", config.url)))
}

/// Torznab responses are always XML documents
pub(crate) fn xml_request(url: String) -> FetchRequest {
    FetchRequest::get(url).header("Accept", "application/rss+xml, application/xml")
}

pub(crate) fn caps_url(config: &IndexerConfig) -> Result<String, ProviderError> {
    let mut url = endpoint(config)?;
    url.query_pairs_mut()
        .append_pair("apikey", &config.api_key)
        .append_pair("t", "caps");
    Ok(url.into())
}

pub(crate) fn search_url(
    config: &IndexerConfig,
    query: &str,
    categories: &[String],
) -> Result<String, ProviderError> {
    let mut url = endpoint(config)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("apikey", &config.api_key)
            .append_pair("t", "search")
            .append_pair("q", query.trim());
        if !categories.is_empty() {
            pairs.append_pair("cat", &categories.join(","));
        }
        pairs.append_pair("extended", "1");
    }
    Ok(url.into())
}

/// Source backed by one Torznab indexer
pub struct TorznabProvider {
    descriptor: SourceDescriptor,
    config: IndexerConfig,
    capabilities: OnceCell<Option<Capabilities>>,
}

impl TorznabProvider {
    #[must_use]
    pub fn new(config: IndexerConfig) -> Self {
        Self {
            descriptor: SourceDescriptor::protocol_client(
                &config.id,
                &config.name,
                &config.url,
                config.category,
            ),
            config,
            capabilities: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Cached capabilities, negotiated on first use; `None` when negotiation
    /// failed, in which case it is never retried
    pub async fn capabilities(&self, fetcher: &dyn Fetcher) -> Option<&Capabilities> {
        self.capabilities
            .get_or_init(|| self.negotiate(fetcher))
            .await
            .as_ref()
    }

    async fn negotiate(&self, fetcher: &dyn Fetcher) -> Option<Capabilities> {
        let url = match caps_url(&self.config) {
            Ok(url) => url,
            Err(e) => {
                warn!("Indexer {}: {}", self.config.id, e);
                return None;
            }
        };
        let body = match fetch_body(fetcher, xml_request(url)).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    "Indexer {} capability discovery failed, searching unfiltered: {}",
                    self.config.id, e
                );
                return None;
            }
        };

        let caps = parse_off_thread(body, parse_capabilities).await;
        match &caps {
            Some(caps) => info!(
                "Indexer {} supports {} categories",
                self.config.id,
                caps.len()
            ),
            None => warn!(
                "Indexer {} returned unusable capabilities, searching unfiltered",
                self.config.id
            ),
        }
        caps
    }
}

#[async_trait]
impl SourceProvider for TorznabProvider {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        query: &str,
        category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError> {
        let capabilities = self.capabilities(fetcher).await;
        let categories = filter_categories(category, capabilities);
        if categories.is_empty() && !canonical_ids(category).is_empty() {
            info!(
                "Indexer {} does not serve category {}, skipping",
                self.config.id, category
            );
            return Ok(Vec::new());
        }

        let url = search_url(&self.config, query, &categories)?;
        debug!("Indexer {} search URL: {}", self.config.id, url);

        let body = fetch_body(fetcher, xml_request(url)).await?;
        let rows = parse_off_thread(body, feed::parse_rows).await;
        info!("Indexer {} returned {} usable items", self.config.id, rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch::test_support::StubFetcher;
    use crate::client::providers::SourceKind;

    const CAPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <caps><categories>
          <category id="5000" name="TV"><subcat id="5070" name="TV/Anime"/></category>
        </categories></caps>"#;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed"><channel>
          <item>
            <title>One Piece - 1090</title>
            <comments>http://localhost:9117/details/1</comments>
            <pubDate>Fri, 05 Jan 2024 12:00:00 +0000</pubDate>
            <size>1073741824</size>
            <torznab:attr name="category" value="5070"/>
            <torznab:attr name="seeders" value="50"/>
            <torznab:attr name="peers" value="60"/>
            <torznab:attr name="magneturl" value="magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567"/>
          </item>
        </channel></rss>"#;

    fn config(category: Category) -> IndexerConfig {
        IndexerConfig {
            id: "jackett".to_string(),
            name: "Jackett".to_string(),
            url: "http://localhost:9117/api".to_string(),
            api_key: "key".to_string(),
            category,
        }
    }

    #[test]
    fn test_wire_shape() {
        let url = search_url(&config(Category::All), "one piece", &["5070".to_string()]).unwrap();
        assert_eq!(
            url,
            "http://localhost:9117/api?apikey=key&t=search&q=one+piece&cat=5070&extended=1"
        );
        let url = search_url(&config(Category::All), "x", &[]).unwrap();
        assert!(!url.contains("cat="));

        let mut broken = config(Category::All);
        broken.url = "not a url".to_string();
        assert!(matches!(caps_url(&broken), Err(ProviderError::InvalidQuery(_))));
    }

    #[test]
    fn test_descriptor_kind() {
        let provider = TorznabProvider::new(config(Category::Anime));
        assert_eq!(provider.descriptor().kind, SourceKind::ProtocolClient);
        assert_eq!(provider.descriptor().category, Category::Anime);
        assert_eq!(provider.id(), "jackett");
    }

    #[tokio::test]
    async fn test_search_uses_capability_intersection() {
        let fetcher = StubFetcher::new()
            .route("t=caps", CAPS)
            .route("t=search", FEED);
        let provider = TorznabProvider::new(config(Category::All));

        let records = provider.search("one piece", Category::Anime, &fetcher).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, Some(Category::Anime));
        assert_eq!(records[0].size, "1.00 GB");

        // both the caps and the search request ask for XML
        assert!(fetcher.requests().iter().all(|request| request
            .headers
            .iter()
            .any(|(name, value)| name == "Accept" && value.contains("xml"))));

        let urls = fetcher.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[1].contains("&cat=5070&"));

        // capabilities are negotiated once per instance
        provider.search("again", Category::Anime, &fetcher).await.unwrap();
        assert_eq!(fetcher.urls().iter().filter(|u| u.contains("t=caps")).count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_category_skips_request() {
        let fetcher = StubFetcher::new()
            .route("t=caps", CAPS)
            .route("t=search", FEED);
        let provider = TorznabProvider::new(config(Category::All));

        let records = provider.search("x", Category::Movies, &fetcher).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(fetcher.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_discovery_is_permanent_and_unfiltered() {
        let fetcher = StubFetcher::new()
            .status("t=caps", 500, "")
            .route("t=search", FEED);
        let provider = TorznabProvider::new(config(Category::All));

        provider.search("x", Category::Music, &fetcher).await.unwrap();
        provider.search("y", Category::Music, &fetcher).await.unwrap();

        let urls = fetcher.urls();
        assert_eq!(urls.iter().filter(|u| u.contains("t=caps")).count(), 1);
        assert!(urls[1].contains("cat=3000%2C3010"));
        assert!(provider.capabilities(&fetcher).await.is_none());
    }
}
