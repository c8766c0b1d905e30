//! Torznab category ids and their canonical counterparts.

use super::caps::Capabilities;
use crate::client::record::Category;

const ANIME: &[&str] = &["5070"];
const APPS: &[&str] = &["4000", "4010", "4020", "4030", "4040", "4060", "4070"];
const BOOKS: &[&str] = &[
    "7000", "7010", "7020", "7030", "7040", "7050", "7060", "3030",
];
const GAMES: &[&str] = &[
    "1000", "1010", "1020", "1030", "1040", "1050", "1060", "1070", "1080", "1090", "1110",
    "1120", "1130", "1140", "1180", "4050",
];
const MOVIES: &[&str] = &[
    "2000", "2010", "2020", "2030", "2040", "2045", "2050", "2060", "2070", "2080",
];
const MUSIC: &[&str] = &["3000", "3010", "3020", "3040", "3050", "3060"];
const PORN: &[&str] = &[
    "6000", "6010", "6020", "6030", "6040", "6045", "6050", "6060", "6070", "6080", "6090",
];
const SERIES: &[&str] = &[
    "5000", "5010", "5020", "5030", "5040", "5045", "5050", "5060", "5080",
];
const OTHER: &[&str] = &["8000", "8010", "8020"];

/// Standard Torznab ids for a canonical category; empty for `All`
#[must_use]
pub const fn canonical_ids(category: Category) -> &'static [&'static str] {
    match category {
        Category::All => &[],
        Category::Anime => ANIME,
        Category::Apps => APPS,
        Category::Books => BOOKS,
        Category::Games => GAMES,
        Category::Movies => MOVIES,
        Category::Music => MUSIC,
        Category::Porn => PORN,
        Category::Series => SERIES,
        Category::Other => OTHER,
    }
}

/// Ids to send for `category`: the canonical list, narrowed to what the
/// indexer advertises when its capabilities are known
#[must_use]
pub fn filter_categories(category: Category, capabilities: Option<&Capabilities>) -> Vec<String> {
    canonical_ids(category)
        .iter()
        .filter(|id| capabilities.map_or(true, |caps| caps.supports(id)))
        .map(|id| (*id).to_string())
        .collect()
}

/// Canonical category of a numeric Torznab id
#[must_use]
pub const fn category_for_id(id: u32) -> Category {
    match id {
        3030 => Category::Books,
        4050 => Category::Games,
        5070 => Category::Anime,
        1000..=1999 => Category::Games,
        2000..=2999 => Category::Movies,
        3000..=3999 => Category::Music,
        4000..=4999 => Category::Apps,
        5000..=5999 => Category::Series,
        6000..=6999 => Category::Porn,
        7000..=7999 => Category::Books,
        _ => Category::Other,
    }
}
