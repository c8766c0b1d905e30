//! Builtin torrent sources and the helpers they share.

pub mod traits;

mod html;
mod json;

pub mod anidex;
pub mod bitsearch;
pub mod eztv;
pub mod knaben;
pub mod limetorrents;
pub mod magnetdl;
pub mod nyaa;
pub mod solidtorrents;
pub mod thepiratebay;
pub mod therarbg;
pub mod tokyotosho;
pub mod torlock;
pub mod torrentdownloads;
pub mod torrentgalaxy;
pub mod torrentscsv;
pub mod x1337;
pub mod yts;

pub use traits::{ProviderError, Safety, SourceDescriptor, SourceKind, SourceProvider};

pub use anidex::AnidexProvider;
pub use bitsearch::BitsearchProvider;
pub use eztv::EztvProvider;
pub use knaben::KnabenProvider;
pub use limetorrents::LimeTorrentsProvider;
pub use magnetdl::MagnetDlProvider;
pub use nyaa::NyaaProvider;
pub use solidtorrents::SolidTorrentsProvider;
pub use thepiratebay::PirateBayProvider;
pub use therarbg::TheRarbgProvider;
pub use tokyotosho::TokyoToshoProvider;
pub use torlock::TorlockProvider;
pub use torrentdownloads::TorrentDownloadsProvider;
pub use torrentgalaxy::TorrentGalaxyProvider;
pub use torrentscsv::TorrentsCsvProvider;
pub use x1337::X1337Provider;
pub use yts::YtsProvider;

use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::record::{Category, Record, TorrentId};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Every builtin source with its default base URL, in display order
#[must_use]
pub fn builtin_providers(base_urls: &HashMap<String, String>) -> Vec<Arc<dyn SourceProvider>> {
    let base = |id: &str, default: &str| {
        base_urls
            .get(id)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };

    vec![
        Arc::new(PirateBayProvider::with_base_url(&base(
            thepiratebay::ID,
            thepiratebay::DEFAULT_BASE_URL,
        ))),
        Arc::new(YtsProvider::with_base_url(&base(yts::ID, yts::DEFAULT_BASE_URL))),
        Arc::new(TorrentsCsvProvider::with_base_url(&base(
            torrentscsv::ID,
            torrentscsv::DEFAULT_BASE_URL,
        ))),
        Arc::new(KnabenProvider::with_base_url(&base(
            knaben::ID,
            knaben::DEFAULT_BASE_URL,
        ))),
        Arc::new(SolidTorrentsProvider::with_base_url(&base(
            solidtorrents::ID,
            solidtorrents::DEFAULT_BASE_URL,
        ))),
        Arc::new(NyaaProvider::nyaa(&base(nyaa::NYAA_ID, nyaa::NYAA_BASE_URL))),
        Arc::new(NyaaProvider::sukebei(&base(
            nyaa::SUKEBEI_ID,
            nyaa::SUKEBEI_BASE_URL,
        ))),
        Arc::new(X1337Provider::with_base_url(&base(x1337::ID, x1337::DEFAULT_BASE_URL))),
        Arc::new(TorrentGalaxyProvider::with_base_url(&base(
            torrentgalaxy::ID,
            torrentgalaxy::DEFAULT_BASE_URL,
        ))),
        Arc::new(LimeTorrentsProvider::with_base_url(&base(
            limetorrents::ID,
            limetorrents::DEFAULT_BASE_URL,
        ))),
        Arc::new(TokyoToshoProvider::with_base_url(&base(
            tokyotosho::ID,
            tokyotosho::DEFAULT_BASE_URL,
        ))),
        Arc::new(BitsearchProvider::with_base_url(&base(
            bitsearch::ID,
            bitsearch::DEFAULT_BASE_URL,
        ))),
        Arc::new(TorlockProvider::with_base_url(&base(
            torlock::ID,
            torlock::DEFAULT_BASE_URL,
        ))),
        Arc::new(MagnetDlProvider::with_base_url(&base(
            magnetdl::ID,
            magnetdl::DEFAULT_BASE_URL,
        ))),
        Arc::new(AnidexProvider::with_base_url(&base(anidex::ID, anidex::DEFAULT_BASE_URL))),
        Arc::new(EztvProvider::with_base_url(&base(eztv::ID, eztv::DEFAULT_BASE_URL))),
        Arc::new(TorrentDownloadsProvider::with_base_url(&base(
            torrentdownloads::ID,
            torrentdownloads::DEFAULT_BASE_URL,
        ))),
        Arc::new(TheRarbgProvider::with_base_url(&base(
            therarbg::ID,
            therarbg::DEFAULT_BASE_URL,
        ))),
    ]
}

/// Ids of every builtin source
pub const BUILTIN_IDS: [&str; 18] = [
    thepiratebay::ID,
    yts::ID,
    torrentscsv::ID,
    knaben::ID,
    solidtorrents::ID,
    nyaa::NYAA_ID,
    nyaa::SUKEBEI_ID,
    x1337::ID,
    torrentgalaxy::ID,
    limetorrents::ID,
    tokyotosho::ID,
    bitsearch::ID,
    torlock::ID,
    magnetdl::ID,
    anidex::ID,
    eztv::ID,
    torrentdownloads::ID,
    therarbg::ID,
];

/// Everything a row carries except its identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowDraft {
    pub name: String,
    pub size: String,
    pub seeders: u32,
    pub peers: u32,
    pub date: String,
    pub category: Option<Category>,
    pub description_url: String,
}

impl RowDraft {
    pub fn into_record(self, descriptor: &SourceDescriptor, id: TorrentId) -> Record {
        Record {
            name: self.name,
            size: self.size,
            seeders: self.seeders,
            peers: self.peers,
            date: self.date,
            category: self.category,
            source_id: descriptor.id.clone(),
            source_name: descriptor.name.clone(),
            description_url: self.description_url,
            id,
        }
    }
}

/// Per-item category for sources that do not expose one on each row
pub(crate) fn scoped_category(requested: Category) -> Option<Category> {
    (requested != Category::All).then_some(requested)
}

/// Fetch a document and turn HTTP error statuses into provider errors
pub(crate) async fn fetch_body(
    fetcher: &dyn Fetcher,
    request: FetchRequest,
) -> Result<String, ProviderError> {
    let url = request.url.clone();
    let response = fetcher.fetch(request).await?;
    if !response.is_success() {
        debug!("{} returned HTTP {}", url, response.status);
        return Err(ProviderError::from_status(response.status));
    }
    Ok(response.body)
}

/// Run a parser on the blocking pool so markup parsing never stalls the fetch path
pub(crate) async fn parse_off_thread<T, F>(body: String, parse: F) -> T
where
    T: Default + Send + 'static,
    F: FnOnce(&str) -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(move || parse(&body)).await {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Parser task failed: {}", e);
            T::default()
        }
    }
}

/// Attach identifiers to parsed rows
pub(crate) fn into_records(
    descriptor: &SourceDescriptor,
    rows: Vec<(RowDraft, TorrentId)>,
) -> Vec<Record> {
    rows.into_iter()
        .map(|(draft, id)| draft.into_record(descriptor, id))
        .collect()
}

/// Fetch every row's detail page concurrently; rows whose page fails or has
/// no identifier are dropped
// TODO: bound the enrichment fan-out once a shared concurrency budget exists
pub(crate) async fn enrich_rows(
    descriptor: &SourceDescriptor,
    rows: Vec<RowDraft>,
    fetcher: &dyn Fetcher,
    extract: fn(&str) -> Option<TorrentId>,
) -> Vec<Record> {
    let total = rows.len();
    let enriched = join_all(rows.into_iter().map(|row| async move {
        let body = match fetch_body(fetcher, FetchRequest::get(&row.description_url)).await {
            Ok(body) => body,
            Err(e) => {
                debug!("Detail page {} failed: {}", row.description_url, e);
                return None;
            }
        };
        let id = parse_off_thread(body, extract).await?;
        Some(row.into_record(descriptor, id))
    }))
    .await;

    let records: Vec<Record> = enriched.into_iter().flatten().collect();
    debug!(
        "{}: {} of {} rows enriched from detail pages",
        descriptor.id,
        records.len(),
        total
    );
    records
}

/// Percent-encode a query for use in a URL path or query string
pub(crate) fn encode_query(query: &str) -> String {
    urlencoding::encode(query.trim()).into_owned()
}

/// Query words joined with `-`, as used in slug-style search paths
pub(crate) fn dashed_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch::test_support::StubFetcher;
    use crate::client::fetch::FetchError;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn draft(url: &str) -> RowDraft {
        RowDraft {
            name: "Row".to_string(),
            size: "1.00 GB".to_string(),
            seeders: 1,
            peers: 1,
            date: "2024-01-05".to_string(),
            category: None,
            description_url: url.to_string(),
        }
    }

    fn extract(body: &str) -> Option<TorrentId> {
        TorrentId::hash(body.trim())
    }

    #[test]
    fn test_builtin_registry_is_complete() {
        let providers = builtin_providers(&HashMap::new());
        let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, BUILTIN_IDS.to_vec());
    }

    #[test]
    fn test_base_url_override() {
        let mut overrides = HashMap::new();
        overrides.insert("yts".to_string(), "http://localhost:9000/".to_string());
        let providers = builtin_providers(&overrides);
        let yts = providers.iter().find(|p| p.id() == "yts").unwrap();
        assert_eq!(yts.descriptor().base_url, "http://localhost:9000");
    }

    #[test]
    fn test_query_encoding() {
        assert_eq!(encode_query(" one piece "), "one%20piece");
        assert_eq!(dashed_query("one  piece & co"), "one-piece-%26-co");
        assert_eq!(scoped_category(Category::All), None);
        assert_eq!(scoped_category(Category::Anime), Some(Category::Anime));
    }

    #[tokio::test]
    async fn test_fetch_body_maps_statuses() {
        let fetcher = StubFetcher::new()
            .status("/limited", 429, "")
            .fail("/down", FetchError::Timeout)
            .route("/ok", "body");

        assert_eq!(
            fetch_body(&fetcher, FetchRequest::get("http://x/limited")).await,
            Err(ProviderError::RateLimit)
        );
        assert_eq!(
            fetch_body(&fetcher, FetchRequest::get("http://x/down")).await,
            Err(ProviderError::Timeout)
        );
        assert_eq!(
            fetch_body(&fetcher, FetchRequest::get("http://x/ok")).await.unwrap(),
            "body"
        );
    }

    #[tokio::test]
    async fn test_enrichment_drops_only_failed_rows() {
        let descriptor = SourceDescriptor::builtin("test", "Test", "http://x", Category::All);
        let fetcher = StubFetcher::new()
            .route("/good", HASH)
            .route("/nohash", "<html></html>")
            .fail("/broken", FetchError::Connect("refused".to_string()));

        let rows = vec![
            draft("http://x/good"),
            draft("http://x/nohash"),
            draft("http://x/broken"),
            draft("http://x/missing"),
        ];
        let records = enrich_rows(&descriptor, rows, &fetcher, extract).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description_url, "http://x/good");
        assert_eq!(records[0].source_id, "test");
        assert_eq!(fetcher.urls().len(), 4);
    }
}
