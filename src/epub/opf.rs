//! OPF (Open Packaging Format) parser
//!
//! Parses the package document into metadata, manifest and spine. Manifest
//! hrefs are resolved against the package document's own location here, so
//! everything downstream works with absolute in-package paths.

use roxmltree::{Document, Node};
use std::collections::{BTreeMap, HashMap};

use super::path::resolve;
use super::{ManifestItem, MetadataEntry, PackageDocument};
use crate::error::{EpubError, Result};

/// Parse the package document at `path`.
pub fn parse_package(path: &str, content: &str) -> Result<PackageDocument> {
    let doc = Document::parse(content).map_err(|source| EpubError::MalformedXml {
        path: path.to_string(),
        source,
    })?;

    let metadata = parse_metadata(&required_element(&doc, path, "metadata")?);
    let manifest = parse_manifest(&required_element(&doc, path, "manifest")?, path);
    let spine = parse_spine(&required_element(&doc, path, "spine")?);

    tracing::debug!(
        "Parsed {}: {} metadata entries, {} manifest items, {} spine entries",
        path,
        metadata.len(),
        manifest.len(),
        spine.len()
    );

    Ok(PackageDocument::new(path, metadata, manifest, spine))
}

fn required_element<'a, 'input>(
    doc: &'a Document<'input>,
    path: &str,
    name: &'static str,
) -> Result<Node<'a, 'input>> {
    doc.descendants()
        .find(|node| node.is_element() && node.tag_name().name() == name)
        .ok_or_else(|| EpubError::MalformedPackage {
            path: path.to_string(),
            element: name,
        })
}

/// Every element child becomes one entry keyed by its qualified name.
/// A repeated name replaces the earlier entry.
fn parse_metadata(metadata: &Node) -> HashMap<String, MetadataEntry> {
    let mut entries = HashMap::new();

    for node in metadata.children().filter(Node::is_element) {
        let attributes: BTreeMap<String, String> = node
            .attributes()
            .map(|attr| {
                (
                    attribute_name(&node, attr.namespace(), attr.name()),
                    attr.value().to_string(),
                )
            })
            .collect();

        entries.insert(
            tag_name(&node),
            MetadataEntry {
                attributes,
                text: text_content(&node),
            },
        );
    }

    entries
}

fn parse_manifest(manifest: &Node, package_path: &str) -> Vec<ManifestItem> {
    let mut items = Vec::new();

    for node in manifest
        .descendants()
        .filter(|node| node.tag_name().name() == "item")
    {
        let (Some(id), Some(href)) = (node.attribute("id"), node.attribute("href")) else {
            tracing::warn!(
                "Skipping manifest item without id or href in {}",
                package_path
            );
            continue;
        };

        items.push(ManifestItem {
            id: id.to_string(),
            href: resolve(href, package_path),
            media_type: node.attribute("media-type").unwrap_or_default().to_string(),
            properties: node.attribute("properties").map(|s| s.to_string()),
        });
    }

    items
}

fn parse_spine(spine: &Node) -> Vec<String> {
    spine
        .descendants()
        .filter(|node| node.tag_name().name() == "itemref")
        .filter_map(|node| node.attribute("idref"))
        .map(|idref| idref.to_string())
        .collect()
}

/// Element name as written in the source, prefix included (`dc:title`).
fn tag_name(node: &Node) -> String {
    let source = &node.document().input_text()[node.range()];
    let written = source
        .trim_start_matches('<')
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or_default();

    if written.is_empty() {
        node.tag_name().name().to_string()
    } else {
        written.to_string()
    }
}

/// Attribute name with its prefix. Unprefixed attributes never carry a
/// namespace, so a namespaced one always had a prefix bound to its URI.
fn attribute_name(node: &Node, namespace: Option<&str>, name: &str) -> String {
    let prefix = namespace.and_then(|uri| {
        node.namespaces()
            .find(|ns| ns.uri() == uri && ns.name().is_some())
            .and_then(|ns| ns.name())
            .or_else(|| node.lookup_prefix(uri))
    });

    match prefix {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    }
}

/// Concatenated text of all descendant text nodes
fn text_content(node: &Node) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}
