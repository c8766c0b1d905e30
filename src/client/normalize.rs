//! Size, date and category normalizers shared by the source adapters.
//!
//! Everything here is pure. Parsers return `None` on garbage and the date
//! normalizer hands unparseable input back unchanged, so a single odd row can
//! never fail a whole batch.

use super::record::Category;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Display format for every normalized date
pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a byte count with base-1024 units and two decimals
#[must_use]
pub fn format_size(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

fn size_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^([0-9][0-9.,]*)\s*([kmgtp]?)(i?)(b|bytes?)?$").ok())
        .as_ref()
}

/// Parse a human readable size ("12.3 MB", "12.3MB", "1,234 KiB") into bytes
#[must_use]
pub fn parse_size(text: &str) -> Option<u64> {
    let cleaned = text.replace('\u{a0}', " ");
    let captures = size_pattern()?.captures(cleaned.trim())?;

    let number = normalize_decimal(captures.get(1)?.as_str())?;
    let prefix = captures.get(2).map_or("", |m| m.as_str());
    let has_unit = captures.get(4).is_some() || !prefix.is_empty();
    if !has_unit && number.fract() != 0.0 {
        return None;
    }

    let exponent = match prefix.to_ascii_lowercase().as_str() {
        "" => 0,
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        "p" => 5,
        _ => return None,
    };

    let bytes = number * 1024f64.powi(exponent);
    if !bytes.is_finite() || bytes < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(bytes.round() as u64)
}

/// Re-render a source size string in the canonical display form
#[must_use]
pub fn normalize_size(text: &str) -> Option<String> {
    parse_size(text).map(format_size)
}

/// Decimal numbers with either `,` thousands separators or a `,` decimal mark
fn normalize_decimal(raw: &str) -> Option<f64> {
    let normalized = if raw.contains('.') {
        raw.replace(',', "")
    } else if is_grouped_thousands(raw) {
        raw.replace(',', "")
    } else {
        raw.replacen(',', ".", 1)
    };
    normalized.parse::<f64>().ok()
}

fn is_grouped_thousands(raw: &str) -> bool {
    let mut groups = raw.split(',');
    let head_ok = groups
        .next()
        .is_some_and(|head| (1..=3).contains(&head.len()));
    let mut saw_group = false;
    for group in groups {
        saw_group = true;
        if group.len() != 3 {
            return false;
        }
    }
    head_ok && saw_group
}

/// Parse a count that may carry thousands separators ("1,204")
#[must_use]
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | ' ' | '\u{a0}'))
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Date encodings found across the sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// Unix timestamp in seconds
    EpochSeconds,
    /// `yyyy-M-d`, optionally followed by a time
    YearMonthDay,
    /// `d/M/yyyy` (two digit years accepted)
    DayMonthYear,
    /// `M/d/yyyy` (two digit years accepted)
    MonthDayYear,
    /// ISO-8601 / RFC 3339 with offset
    Iso8601,
    /// RFC-1123 as used in RSS `pubDate`
    Rfc1123,
    /// "Today", "Yesterday", "3 days ago"
    Relative,
}

/// Normalize a source date relative to the current UTC day
#[must_use]
pub fn normalize_date(raw: &str, format: DateFormat) -> String {
    normalize_date_on(raw, format, Utc::now().date_naive())
}

/// Normalize a source date; `today` anchors the relative markers
#[must_use]
pub fn normalize_date_on(raw: &str, format: DateFormat, today: NaiveDate) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let parsed = parse_relative(trimmed, today).or_else(|| match format {
        DateFormat::EpochSeconds => parse_epoch(trimmed),
        DateFormat::YearMonthDay => parse_numeric(first_token(trimmed), NumericOrder::Ymd),
        DateFormat::DayMonthYear => parse_numeric(first_token(trimmed), NumericOrder::Dmy),
        DateFormat::MonthDayYear => parse_numeric(first_token(trimmed), NumericOrder::Mdy),
        DateFormat::Iso8601 => parse_iso(trimmed),
        DateFormat::Rfc1123 => DateTime::parse_from_rfc2822(trimmed)
            .ok()
            .map(|date| date.with_timezone(&Utc).date_naive()),
        DateFormat::Relative => None,
    });

    parsed.map_or_else(
        || trimmed.to_string(),
        |date| date.format(DISPLAY_DATE_FORMAT).to_string(),
    )
}

fn first_token(raw: &str) -> &str {
    raw.split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or(raw)
}

fn parse_epoch(raw: &str) -> Option<NaiveDate> {
    let seconds: i64 = raw.parse().ok()?;
    DateTime::from_timestamp(seconds, 0).map(|date| date.date_naive())
}

fn parse_iso(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc).date_naive());
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(date.date());
    }
    parse_numeric(first_token(raw), NumericOrder::Ymd)
}

#[derive(Clone, Copy)]
enum NumericOrder {
    Ymd,
    Dmy,
    Mdy,
}

fn parse_numeric(token: &str, order: NumericOrder) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split(['-', '/', '.']).collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    let (year, month, day) = match order {
        NumericOrder::Ymd => (*a, *b, *c),
        NumericOrder::Dmy => (*c, *b, *a),
        NumericOrder::Mdy => (*c, *a, *b),
    };

    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn relative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)^(\d+|an?)\s*(sec|min|hour|hr|day|week|month|mo|year|yr)[a-z.]*(\s+ago)?\b")
                .ok()
        })
        .as_ref()
}

fn parse_relative(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("today") || lower.starts_with("just now") {
        return Some(today);
    }
    if lower.starts_with("yesterday") || lower.starts_with("y-day") {
        return today.checked_sub_signed(Duration::days(1));
    }

    let captures = relative_pattern()?.captures(&lower)?;
    let amount: i64 = match captures.get(1)?.as_str() {
        "a" | "an" => 1,
        digits => digits.parse().ok()?,
    };
    let days = match captures.get(2)?.as_str() {
        "sec" | "min" | "hour" | "hr" => 0,
        "day" => amount,
        "week" => amount * 7,
        "month" | "mo" => amount * 30,
        _ => amount * 365,
    };
    today.checked_sub_signed(Duration::days(days))
}

/// Static mapping between a source's own category codes and [`Category`]
#[derive(Debug, Clone, Copy)]
pub struct CategoryTable {
    entries: &'static [(&'static str, Category)],
}

impl CategoryTable {
    #[must_use]
    pub const fn new(entries: &'static [(&'static str, Category)]) -> Self {
        Self { entries }
    }

    /// Exact (case-insensitive) lookup without fallback
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<Category> {
        let code = code.trim();
        self.entries
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(code))
            .map(|(_, category)| *category)
    }

    /// Canonical category for a source code, `Other` when unknown
    #[must_use]
    pub fn category_for(&self, code: &str) -> Category {
        self.lookup(code).unwrap_or(Category::Other)
    }

    /// First source code registered for a category
    #[must_use]
    pub fn code_for(&self, category: Category) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, candidate)| *candidate == category)
            .map(|(code, _)| *code)
    }
}
