//! Capability discovery (`t=caps`) documents.

use roxmltree::{Document, Node};
use std::collections::BTreeSet;

/// Category ids an indexer advertises
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    categories: BTreeSet<String>,
}

impl Capabilities {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: ids.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn supports(&self, id: &str) -> bool {
        self.categories.contains(id)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Flatten a caps document's category tree into an id set.
///
/// Returns `None` for malformed XML, an `<error>` document, or a listing with
/// no categories at all.
#[must_use]
pub fn parse_capabilities(body: &str) -> Option<Capabilities> {
    let document = Document::parse(body).ok()?;
    let root = document.root_element();
    if !root.has_tag_name("caps") {
        return None;
    }

    let mut ids = BTreeSet::new();
    collect(root, &mut ids);
    (!ids.is_empty()).then_some(Capabilities { categories: ids })
}

fn collect(node: Node<'_, '_>, ids: &mut BTreeSet<String>) {
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "categories" => collect(child, ids),
            "category" | "subcat" => {
                if let Some(id) = child.attribute("id").map(str::trim) {
                    if !id.is_empty() {
                        ids.insert(id.to_string());
                    }
                }
                collect(child, ids);
            }
            // server, limits, searching, tags and anything newer
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_categories_are_flattened() {
        let caps = parse_capabilities(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <caps>
              <server title="Jackett"/>
              <searching><search available="yes" supportedParams="q"/></searching>
              <categories>
                <category id="5000" name="TV"><subcat id="5070" name="TV/Anime"/></category>
              </categories>
            </caps>"#,
        )
        .unwrap();

        assert_eq!(caps.categories().collect::<Vec<_>>(), vec!["5000", "5070"]);
        assert!(caps.supports("5070"));
        assert!(!caps.supports("2000"));
    }

    #[test]
    fn test_unusable_documents() {
        assert_eq!(parse_capabilities(r#"<error code="100" description="Invalid API Key"/>"#), None);
        assert_eq!(parse_capabilities("<caps><categories/></caps>"), None);
        assert_eq!(parse_capabilities("<caps><categories>"), None);
        assert_eq!(parse_capabilities("not xml"), None);
    }
}
