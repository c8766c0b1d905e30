//! Canonical search result model shared by every source.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical torrent category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Wildcard, matches every requested category
    #[default]
    All,
    Anime,
    Apps,
    Books,
    Games,
    Movies,
    Music,
    Porn,
    Series,
    Other,
}

impl Category {
    /// Every category, wildcard first
    pub const ALL: [Self; 10] = [
        Self::All,
        Self::Anime,
        Self::Apps,
        Self::Books,
        Self::Games,
        Self::Movies,
        Self::Music,
        Self::Porn,
        Self::Series,
        Self::Other,
    ];

    /// Lowercase name used in configuration and on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Anime => "anime",
            Self::Apps => "apps",
            Self::Books => "books",
            Self::Games => "games",
            Self::Movies => "movies",
            Self::Music => "music",
            Self::Porn => "porn",
            Self::Series => "series",
            Self::Other => "other",
        }
    }

    /// True when either side is the wildcard or both are equal
    #[must_use]
    pub fn matches(self, requested: Self) -> bool {
        self == Self::All || requested == Self::All || self == requested
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| crate::Error::invalid_input("category", format!("unknown category '{s}'")))
    }
}

/// A 40 character hexadecimal BitTorrent v1 info hash, stored lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InfoHash(String);

impl InfoHash {
    /// Validate and normalize an info hash. The all-zero hash is rejected.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != 40 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        if trimmed.chars().all(|c| c == '0') {
            return None;
        }
        Some(Self(trimmed.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InfoHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid info hash '{value}'"))
    }
}

impl From<InfoHash> for String {
    fn from(hash: InfoHash) -> Self {
        hash.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `magnet:?` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MagnetLink(String);

impl MagnetLink {
    /// Accept any string starting with the magnet scheme and carrying an `xt` parameter
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if !lower.starts_with("magnet:?") || !lower.contains("xt=") {
            return None;
        }
        Some(Self(trimmed.replace("&amp;", "&")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex info hash embedded in the `urn:btih:` exact topic, if it is hex encoded
    #[must_use]
    pub fn info_hash(&self) -> Option<InfoHash> {
        let lower = self.0.to_ascii_lowercase();
        let start = lower.find("urn:btih:")? + "urn:btih:".len();
        let rest = &lower[start..];
        let end = rest.find('&').unwrap_or(rest.len());
        InfoHash::parse(&rest[..end])
    }
}

impl TryFrom<String> for MagnetLink {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid magnet link '{value}'"))
    }
}

impl From<MagnetLink> for String {
    fn from(link: MagnetLink) -> Self {
        link.0
    }
}

impl fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a download client locates the torrent content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TorrentId {
    InfoHash(InfoHash),
    Magnet(MagnetLink),
}

impl TorrentId {
    /// Build an identifier from whatever a source exposes, preferring the magnet link
    #[must_use]
    pub fn from_parts(magnet: Option<&str>, info_hash: Option<&str>) -> Option<Self> {
        magnet
            .and_then(MagnetLink::parse)
            .map(Self::Magnet)
            .or_else(|| info_hash.and_then(InfoHash::parse).map(Self::InfoHash))
    }

    #[must_use]
    pub fn magnet(raw: &str) -> Option<Self> {
        MagnetLink::parse(raw).map(Self::Magnet)
    }

    #[must_use]
    pub fn hash(raw: &str) -> Option<Self> {
        InfoHash::parse(raw).map(Self::InfoHash)
    }

    /// Hex info hash, either direct or extracted from the magnet link
    #[must_use]
    pub fn info_hash(&self) -> Option<InfoHash> {
        match self {
            Self::InfoHash(hash) => Some(hash.clone()),
            Self::Magnet(link) => link.info_hash(),
        }
    }

    /// Magnet URI for this torrent; bare hashes get one built with the display name
    #[must_use]
    pub fn magnet_uri(&self, name: &str) -> String {
        match self {
            Self::Magnet(link) => link.as_str().to_string(),
            Self::InfoHash(hash) => format!(
                "magnet:?xt=urn:btih:{}&dn={}",
                hash,
                urlencoding::encode(name)
            ),
        }
    }
}

/// One normalized search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Torrent title
    pub name: String,
    /// Unit-normalized display size, e.g. "1.37 GB"
    pub size: String,
    pub seeders: u32,
    pub peers: u32,
    /// Display date, `YYYY-MM-DD` when the source date could be parsed
    pub date: String,
    /// Per-item category, absent when the source does not expose one
    pub category: Option<Category>,
    pub source_id: String,
    pub source_name: String,
    /// Description page, empty when the source has none
    pub description_url: String,
    pub id: TorrentId,
}

impl Record {
    /// Magnet URI usable by a download client
    #[must_use]
    pub fn magnet_uri(&self) -> String {
        self.id.magnet_uri(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789ABCDEF0123456789abcdef01234567";

    #[test]
    fn test_info_hash_validation() {
        let hash = InfoHash::parse(HASH).unwrap();
        assert_eq!(hash.as_str(), HASH.to_ascii_lowercase());
        assert!(InfoHash::parse("abc").is_none());
        assert!(InfoHash::parse(&"g".repeat(40)).is_none());
        assert!(InfoHash::parse(&"0".repeat(40)).is_none());
    }

    #[test]
    fn test_magnet_validation_and_hash_extraction() {
        let raw = format!("magnet:?xt=urn:btih:{HASH}&amp;dn=Test");
        let link = MagnetLink::parse(&raw).unwrap();
        assert_eq!(link.as_str(), format!("magnet:?xt=urn:btih:{HASH}&dn=Test"));
        assert_eq!(link.info_hash().unwrap().as_str(), HASH.to_ascii_lowercase());

        assert!(MagnetLink::parse("http://example.com").is_none());
        assert!(MagnetLink::parse("magnet:?dn=only-a-name").is_none());
    }

    #[test]
    fn test_torrent_id_prefers_magnet() {
        let magnet = format!("magnet:?xt=urn:btih:{HASH}");
        let id = TorrentId::from_parts(Some(&magnet), Some(HASH)).unwrap();
        assert!(matches!(id, TorrentId::Magnet(_)));

        let id = TorrentId::from_parts(Some("not a magnet"), Some(HASH)).unwrap();
        assert!(matches!(id, TorrentId::InfoHash(_)));

        assert!(TorrentId::from_parts(None, None).is_none());
        assert!(TorrentId::from_parts(Some(""), Some("")).is_none());
    }

    #[test]
    fn test_magnet_uri_from_hash() {
        let id = TorrentId::hash(HASH).unwrap();
        let uri = id.magnet_uri("Big Buck Bunny");
        assert!(uri.starts_with("magnet:?xt=urn:btih:0123456789abcdef"));
        assert!(uri.ends_with("&dn=Big%20Buck%20Bunny"));
    }

    #[test]
    fn test_category_parsing_and_matching() {
        assert_eq!("Anime".parse::<Category>().unwrap(), Category::Anime);
        assert_eq!(" series ".parse::<Category>().unwrap(), Category::Series);
        assert!("tv".parse::<Category>().is_err());

        assert!(Category::All.matches(Category::Anime));
        assert!(Category::Anime.matches(Category::All));
        assert!(Category::Anime.matches(Category::Anime));
        assert!(!Category::Anime.matches(Category::Movies));
    }

    #[test]
    fn test_record_serialization() {
        let record = Record {
            name: "Test".to_string(),
            size: "1.00 GB".to_string(),
            seeders: 10,
            peers: 2,
            date: "2024-01-05".to_string(),
            category: Some(Category::Movies),
            source_id: "yts".to_string(),
            source_name: "YTS".to_string(),
            description_url: String::new(),
            id: TorrentId::hash(HASH).unwrap(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"category\":\"movies\""));
        assert!(json.contains("\"type\":\"info_hash\""));

        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
