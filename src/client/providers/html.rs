//! Small helpers over `scraper` used by the HTML sources. All of them return
//! `Option` so a missing element simply drops the row being read.

use scraper::{ElementRef, Selector};

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Whitespace-collapsed text content of an element
pub(crate) fn text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the element's first non-blank text node, ignoring child markup after it
pub(crate) fn own_text(element: ElementRef<'_>) -> Option<String> {
    element
        .text()
        .map(str::trim)
        .find(|chunk| !chunk.is_empty())
        .map(ToString::to_string)
}

/// First descendant matching `css`
pub(crate) fn find<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    element.select(&selector).next()
}

/// Attribute of the first descendant matching `css`
pub(crate) fn find_attr(element: ElementRef<'_>, css: &str, name: &str) -> Option<String> {
    find(element, css)?
        .value()
        .attr(name)
        .map(|value| value.trim().to_string())
}

/// Non-empty text of the first descendant matching `css`
pub(crate) fn find_text(element: ElementRef<'_>, css: &str) -> Option<String> {
    let value = text(find(element, css)?);
    (!value.is_empty()).then_some(value)
}

/// Direct `td` cells of a table row
pub(crate) fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "td")
        .collect()
}

/// Resolve a possibly relative link against the source root
pub(crate) fn absolute(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_text_helpers() {
        let document = Html::parse_fragment(
            r#"<div id="row"><span class="size">1.2 GB</span><a href="/x"> Some
            Name </a></div>"#,
        );
        let row = document.select(&selector("#row").unwrap()).next().unwrap();

        assert_eq!(find_text(row, "a").as_deref(), Some("Some Name"));
        assert_eq!(find_attr(row, "a", "href").as_deref(), Some("/x"));
        assert!(find(row, "table").is_none());
    }

    #[test]
    fn test_own_text_ignores_trailing_markup() {
        let document = Html::parse_fragment(r#"<p id="s"> 1.5 GB <span class="seeds">12</span></p>"#);
        let cell = document.select(&selector("#s").unwrap()).next().unwrap();
        assert_eq!(own_text(cell).as_deref(), Some("1.5 GB"));
    }

    #[test]
    fn test_absolute_links() {
        assert_eq!(absolute("https://a.b/", "/torrent/1"), "https://a.b/torrent/1");
        assert_eq!(absolute("https://a.b", "torrent/1"), "https://a.b/torrent/1");
        assert_eq!(absolute("https://a.b", "//cdn.b/x"), "https://cdn.b/x");
        assert_eq!(absolute("https://a.b", "http://c.d/x"), "http://c.d/x");
    }
}
