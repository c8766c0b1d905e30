//! Search result feeds: RSS with `torznab:attr` / `newznab:attr` extensions.

use super::categories::category_for_id;
use crate::client::normalize::{format_size, normalize_date, DateFormat};
use crate::client::providers::{RowDraft, SourceDescriptor};
use crate::client::record::{Category, Record, TorrentId};
use roxmltree::{Document, Node};
use tracing::debug;

/// Fields collected from one `<item>` before validation
#[derive(Debug, Default)]
struct ItemFields {
    title: Option<String>,
    comments: Option<String>,
    pub_date: Option<String>,
    size: Option<u64>,
    seeders: Option<u32>,
    peers: Option<u32>,
    magnet: Option<String>,
    info_hash: Option<String>,
    max_category: Option<u32>,
}

impl ItemFields {
    fn visit(&mut self, item: Node<'_, '_>) {
        for child in item.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "title" => self.title = element_text(child),
                "comments" => self.comments = element_text(child),
                "pubDate" => self.pub_date = element_text(child),
                "size" => {
                    if let Some(size) = element_text(child).and_then(|s| s.parse().ok()) {
                        self.size = Some(size);
                    }
                }
                "link" => {
                    if let Some(link) = element_text(child) {
                        self.offer_magnet(&link);
                    }
                }
                "enclosure" => {
                    if let Some(url) = child.attribute("url") {
                        self.offer_magnet(url);
                    }
                }
                "attr" => self.visit_attr(child),
                // guid, description, jackettindexer, ...
                _ => {}
            }
        }
    }

    fn visit_attr(&mut self, attr: Node<'_, '_>) {
        let (Some(name), Some(value)) = (attr.attribute("name"), attr.attribute("value")) else {
            return;
        };
        let value = value.trim();
        match name {
            "seeders" => self.seeders = value.parse().ok().or(self.seeders),
            "peers" => self.peers = value.parse().ok().or(self.peers),
            "magneturl" => self.offer_magnet(value),
            "infohash" => self.info_hash = Some(value.to_string()),
            "size" => self.size = value.parse().ok().or(self.size),
            "category" => {
                if let Ok(id) = value.parse::<u32>() {
                    self.max_category = Some(self.max_category.map_or(id, |max| max.max(id)));
                }
            }
            _ => {}
        }
    }

    /// Keep the first magnet found; http links to .torrent files are ignored
    fn offer_magnet(&mut self, candidate: &str) {
        if self.magnet.is_none() && candidate.trim_start().starts_with("magnet:") {
            self.magnet = Some(candidate.trim().to_string());
        }
    }

    fn into_row(self) -> Option<(RowDraft, TorrentId)> {
        let id = TorrentId::from_parts(self.magnet.as_deref(), self.info_hash.as_deref())?;
        Some((
            RowDraft {
                name: self.title?,
                size: format_size(self.size?),
                seeders: self.seeders?,
                peers: self.peers?,
                date: normalize_date(&self.pub_date?, DateFormat::Rfc1123),
                category: Some(self.max_category.map_or(Category::Other, category_for_id)),
                description_url: self.comments?,
            },
            id,
        ))
    }
}

fn element_text(node: Node<'_, '_>) -> Option<String> {
    let text = node.text()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn visit_container(node: Node<'_, '_>, rows: &mut Vec<(RowDraft, TorrentId)>) {
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "channel" => visit_container(child, rows),
            "item" => {
                let mut fields = ItemFields::default();
                fields.visit(child);
                match fields.into_row() {
                    Some(row) => rows.push(row),
                    None => debug!("Dropping incomplete Torznab item"),
                }
            }
            // channel metadata: title, link, atom:link, ...
            _ => {}
        }
    }
}

pub(crate) fn parse_rows(body: &str) -> Vec<(RowDraft, TorrentId)> {
    let Ok(document) = Document::parse(body) else {
        debug!("Torznab feed is not well-formed XML");
        return Vec::new();
    };
    let root = document.root_element();
    if !root.has_tag_name("rss") {
        debug!("Torznab feed root is <{}>", root.tag_name().name());
        return Vec::new();
    }

    let mut rows = Vec::new();
    visit_container(root, &mut rows);
    rows
}

/// Parse a Torznab search feed into records attributed to `descriptor`
#[must_use]
pub fn parse_feed(body: &str, descriptor: &SourceDescriptor) -> Vec<Record> {
    parse_rows(body)
        .into_iter()
        .map(|(draft, id)| draft.into_record(descriptor, id))
        .collect()
}
