use super::html::{absolute, cells, find_attr, own_text, selector, text};
use super::traits::{ProviderError, Safety, SourceDescriptor, SourceProvider};
use super::{encode_query, fetch_body, into_records, parse_off_thread, RowDraft};
use crate::client::fetch::{FetchRequest, Fetcher};
use crate::client::normalize::{normalize_date, normalize_size, parse_count, DateFormat};
use crate::client::record::{Category, Record, TorrentId};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

pub const NYAA_ID: &str = "nyaa";
pub const NYAA_BASE_URL: &str = "https://nyaa.si";
pub const SUKEBEI_ID: &str = "sukebei";
pub const SUKEBEI_BASE_URL: &str = "https://sukebei.nyaa.si";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Nyaa,
    Sukebei,
}

/// Nyaa and its adult sibling Sukebei share one page layout
pub struct NyaaProvider {
    descriptor: SourceDescriptor,
    flavor: Flavor,
}

impl NyaaProvider {
    #[must_use]
    pub fn nyaa(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(NYAA_ID, "Nyaa", base_url, Category::Anime),
            flavor: Flavor::Nyaa,
        }
    }

    #[must_use]
    pub fn sukebei(base_url: &str) -> Self {
        Self {
            descriptor: SourceDescriptor::builtin(SUKEBEI_ID, "Sukebei", base_url, Category::Porn)
                .with_safety(Safety::unsafe_because("Adult content only"))
                .disabled_by_default(),
            flavor: Flavor::Sukebei,
        }
    }

    fn category_code(&self, category: Category) -> &'static str {
        if self.flavor == Flavor::Sukebei {
            return "0_0";
        }
        match category {
            Category::Anime => "1_0",
            Category::Music => "2_0",
            Category::Books => "3_0",
            Category::Movies | Category::Series => "4_0",
            Category::Apps => "6_1",
            Category::Games => "6_2",
            _ => "0_0",
        }
    }

    fn search_url(&self, query: &str, category: Category) -> String {
        format!(
            "{}/?f=0&c={}&q={}&s=seeders&o=desc",
            self.descriptor.base_url,
            self.category_code(category),
            encode_query(query)
        )
    }

    /// `c=1_2` style codes from the row's category link
    fn item_category(flavor: Flavor, code: &str) -> Category {
        if flavor == Flavor::Sukebei {
            return Category::Porn;
        }
        match code {
            "6_2" => Category::Games,
            _ => match code.split('_').next() {
                Some("1") => Category::Anime,
                Some("2") => Category::Music,
                Some("3") => Category::Books,
                Some("4") => Category::Movies,
                Some("6") => Category::Apps,
                _ => Category::Other,
            },
        }
    }

    fn parse_listing(body: &str, base: &str, flavor: Flavor) -> Vec<(RowDraft, TorrentId)> {
        let document = Html::parse_document(body);
        let Some(rows) = selector("table.torrent-list tbody tr") else {
            return Vec::new();
        };
        document
            .select(&rows)
            .filter_map(|row| Self::parse_row(row, base, flavor))
            .collect()
    }

    fn parse_row(row: ElementRef<'_>, base: &str, flavor: Flavor) -> Option<(RowDraft, TorrentId)> {
        let columns = cells(row);
        let [category_cell, name_cell, links_cell, size_cell, date_cell, seeders_cell, peers_cell, ..] =
            columns.as_slice()
        else {
            return None;
        };

        let code = find_attr(*category_cell, "a", "href")
            .and_then(|href| href.split("c=").nth(1).map(ToString::to_string))
            .unwrap_or_default();

        // the first link may be the comment counter
        let anchors = selector("a")?;
        let title = name_cell
            .select(&anchors)
            .filter(|a| !a.value().classes().any(|class| class == "comments"))
            .last()?;
        let href = title.value().attr("href")?;
        let name = title
            .value()
            .attr("title")
            .map(ToString::to_string)
            .unwrap_or_else(|| text(title));

        let id = TorrentId::magnet(&find_attr(*links_cell, "a[href^=\"magnet:\"]", "href")?)?;
        let date = date_cell
            .value()
            .attr("data-timestamp")
            .map(ToString::to_string)
            .or_else(|| own_text(*date_cell))?;
        let format = if date.chars().all(|c| c.is_ascii_digit()) {
            DateFormat::EpochSeconds
        } else {
            DateFormat::YearMonthDay
        };

        Some((
            RowDraft {
                name,
                size: normalize_size(&text(*size_cell))?,
                seeders: parse_count(&text(*seeders_cell))?,
                peers: parse_count(&text(*peers_cell))?,
                date: normalize_date(&date, format),
                category: Some(Self::item_category(flavor, &code)),
                description_url: absolute(base, href),
            },
            id,
        ))
    }
}

impl Default for NyaaProvider {
    fn default() -> Self {
        Self::nyaa(NYAA_BASE_URL)
    }
}

#[async_trait]
impl SourceProvider for NyaaProvider {
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
        debug!("{} search URL: {}", self.descriptor.name, url);

        let body = fetch_body(fetcher, FetchRequest::get(url)).await?;
        let base = self.descriptor.base_url.clone();
        let flavor = self.flavor;
        let rows = parse_off_thread(body, move |b| Self::parse_listing(b, &base, flavor)).await;
        info!("{} returned {} usable rows", self.descriptor.name, rows.len());

        Ok(into_records(&self.descriptor, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch::test_support::StubFetcher;

    const PAGE: &str = r#"<html><body><table class="table torrent-list"><tbody>
        <tr class="success">
          <td><a href="/?c=1_2" title="Anime - English-translated"><img src="/1_2.png"></a></td>
          <td colspan="2">
            <a href="/view/100#comments" class="comments"><i class="fa fa-comments-o"></i>4</a>
            <a href="/view/100" title="[SubsPlease] One Piece - 1090 (1080p)">[SubsPlease] One Piece - 1090 (1080p)</a>
          </td>
          <td class="text-center">
            <a href="/download/100.torrent"><i class="fa fa-download"></i></a>
            <a href="magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&amp;dn=One+Piece"><i class="fa fa-magnet"></i></a>
          </td>
          <td class="text-center">1.4 GiB</td>
          <td class="text-center" data-timestamp="1704456000">2024-01-05 12:00</td>
          <td class="text-center">1,310</td>
          <td class="text-center">42</td>
          <td class="text-center">9000</td>
        </tr>
        <tr class="default">
          <td><a href="/?c=6_2"></a></td>
          <td colspan="2"><a href="/view/101">No magnet here</a></td>
          <td class="text-center"><a href="/download/101.torrent"></a></td>
          <td class="text-center">10 MiB</td>
          <td class="text-center" data-timestamp="1704456000">2024-01-05 12:00</td>
          <td class="text-center">1</td>
          <td class="text-center">0</td>
          <td class="text-center">1</td>
        </tr>
    </tbody></table></body></html>"#;

    #[test]
    fn test_category_codes_per_flavor() {
        let nyaa = NyaaProvider::nyaa(NYAA_BASE_URL);
        let sukebei = NyaaProvider::sukebei(SUKEBEI_BASE_URL);

        assert!(nyaa.search_url("one piece", Category::Anime).contains("c=1_0&q=one%20piece"));
        assert!(sukebei.search_url("x", Category::Anime).contains("c=0_0"));
        assert_eq!(NyaaProvider::item_category(Flavor::Nyaa, "6_2"), Category::Games);
        assert_eq!(NyaaProvider::item_category(Flavor::Nyaa, "6_1"), Category::Apps);
        assert_eq!(NyaaProvider::item_category(Flavor::Nyaa, ""), Category::Other);
        assert_eq!(NyaaProvider::item_category(Flavor::Sukebei, "1_1"), Category::Porn);
    }

    #[test]
    fn test_sukebei_descriptor_is_unsafe() {
        let sukebei = NyaaProvider::sukebei(SUKEBEI_BASE_URL);
        assert!(!sukebei.descriptor().safety.is_safe());
        assert!(!sukebei.descriptor().default_enabled);
        assert!(NyaaProvider::default().descriptor().default_enabled);
    }

    #[tokio::test]
    async fn test_listing_rows() {
        let fetcher = StubFetcher::new().route("nyaa.si/?f=0", PAGE);
        let records = NyaaProvider::nyaa(NYAA_BASE_URL)
            .search("one piece", Category::Anime, &fetcher)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "[SubsPlease] One Piece - 1090 (1080p)");
        assert_eq!(record.size, "1.40 GB");
        assert_eq!(record.seeders, 1310);
        assert_eq!(record.peers, 42);
        assert_eq!(record.date, "2024-01-05");
        assert_eq!(record.category, Some(Category::Anime));
        assert_eq!(record.description_url, "https://nyaa.si/view/100");
        assert_eq!(record.source_id, "nyaa");
    }
}
