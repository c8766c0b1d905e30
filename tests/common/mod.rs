#![allow(dead_code)]

use torrent_aggregator::client::{Category, IndexerConfig};

pub const CAPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<caps>
  <server title="Test Indexer"/>
  <categories>
    <category id="5000" name="TV"><subcat id="5070" name="TV/Anime"/></category>
  </categories>
</caps>"#;

/// A Torznab feed with `count` anime items named `<prefix> <n>`
pub fn feed(prefix: &str, count: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                r#"<item>
  <title>{prefix} {i}</title>
  <comments>https://tracker.example/{prefix}/{i}</comments>
  <pubDate>Fri, 05 Jan 2024 12:00:00 +0000</pubDate>
  <size>1073741824</size>
  <torznab:attr name="category" value="5070"/>
  <torznab:attr name="seeders" value="{seeders}"/>
  <torznab:attr name="peers" value="{peers}"/>
  <torznab:attr name="infohash" value="{hash:040x}"/>
</item>"#,
                seeders = 10 + i,
                peers = 12 + i,
                hash = i + 1,
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed"><channel>{items}</channel></rss>"#
    )
}

pub fn indexer(id: &str, url: String, category: Category) -> IndexerConfig {
    IndexerConfig {
        id: id.to_string(),
        name: id.to_uppercase(),
        url,
        api_key: "test-key".to_string(),
        category,
    }
}
