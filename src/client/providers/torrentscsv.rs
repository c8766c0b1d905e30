use super::json::{array_field, str_field, u32_field, u64_field};
use super::traits::{ProviderError, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{format_size, normalize_date, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

pub const ID: &str = "torrentscsv";
pub const DEFAULT_BASE_URL: &str = "https://torrents-csv.com";

/// Torrents-CSV: a flat DHT dump without categories or description pages
pub struct TorrentsCsvProvider {
    descriptor: SourceDescriptor,
}

impl TorrentsCsvProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(ID, "Torrents-CSV", base_url, Category::All),
        }
    }

    fn parse_results(body: &str) -> Vec<(RowDraft, TorrentId)> {
        let Ok(document) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        array_field(&document, "torrents")
            .iter()
            .filter_map(|row| {
                let id = TorrentId::hash(&str_field(row, "infohash")?)?;
                Some((
                    RowDraft {
                        name: str_field(row, "name")?,
                        size: format_size(u64_field(row, "size_bytes")?),
                        seeders: u32_field(row, "seeders")?,
                        peers: u32_field(row, "leechers")?,
                        date: normalize_date(
                            &str_field(row, "created_unix")?,
                            DateFormat::EpochSeconds,
                        ),
                        category: None,
                        description_url: String::new(),
                    },
                    id,
                ))
            })
            .collect()
    }
}

impl Default for TorrentsCsvProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProvider for TorrentsCsvProvider {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn search(
        &self,
        query: &str,
        _category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError> {
        let url = format!(
            "{}/service/search?q={}&size=100",
            self.descriptor.base_url,
            encode_query(query)
        );
        debug!("Torrents-CSV search URL: {}", url);

        let body = fetch_body(fetcher, FetchRequest::get_json(url)).await?;
        let rows = parse_off_thread(body, Self::parse_results).await;
        info!("Torrents-CSV returned {} usable rows", rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch::test_support::StubFetcher;

    #[tokio::test]
    async fn test_records_have_no_category_or_page() {
        let body = r#"{"torrents":[
            {"infohash":"0123456789abcdef0123456789abcdef01234567","name":"ubuntu-24.04-desktop-amd64.iso",
             "size_bytes":6114656256,"created_unix":1714000000,"seeders":900,"leechers":30,"completed":100},
            {"infohash":"nothex","name":"broken","size_bytes":1,"created_unix":1,"seeders":1,"leechers":1}
        ],"next":null}"#;
        let fetcher = StubFetcher::new().route("/service/search", body);

        let records = TorrentsCsvProvider::new()
            .search("ubuntu", Category::Apps, &fetcher)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, "5.69 GB");
        assert_eq!(records[0].category, None);
        assert!(records[0].description_url.is_empty());
    }
}
