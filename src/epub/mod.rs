//! EPUB package model
//!
//! Holds the types shared by the loading stages: the parsed package document
//! (metadata, manifest, spine), the decoded file store and the reserved
//! package files.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub mod archive;
pub mod container;
pub mod media_type;
pub mod opf;
pub mod path;

pub use archive::{decode_entry, Archive, ArchiveEntry, DecodedFile};
pub use container::{package_path, validate};
pub use opf::parse_package;

/// Fixed location of the container descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Fixed location of the mimetype declaration.
pub const MIMETYPE_PATH: &str = "mimetype";

/// The only mimetype accepted by the validator.
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// One child element of `<metadata>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
    #[serde(rename = "_text")]
    pub text: String,
}

/// Manifest item from the package document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    /// Absolute in-package path, already resolved against the package document.
    pub href: String,
    pub media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
}

/// Parsed package document.
///
/// Built once per run by [`parse_package`] and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDocument {
    path: String,
    metadata: HashMap<String, MetadataEntry>,
    manifest: Vec<ManifestItem>,
    spine: Vec<String>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
    #[serde(skip)]
    by_href: HashMap<String, usize>,
}

impl PackageDocument {
    /// Assemble a package document and build its id and href indices.
    ///
    /// A manifest id that appears twice keeps the position of its first
    /// occurrence and the contents of its last.
    pub fn new(
        path: impl Into<String>,
        metadata: HashMap<String, MetadataEntry>,
        items: Vec<ManifestItem>,
        spine: Vec<String>,
    ) -> Self {
        let mut manifest: Vec<ManifestItem> = Vec::with_capacity(items.len());
        let mut by_id = HashMap::with_capacity(items.len());

        for item in items {
            match by_id.get(&item.id) {
                Some(&index) => manifest[index] = item,
                None => {
                    by_id.insert(item.id.clone(), manifest.len());
                    manifest.push(item);
                }
            }
        }

        let by_href = manifest
            .iter()
            .enumerate()
            .map(|(index, item)| (item.href.clone(), index))
            .collect();

        Self {
            path: path.into(),
            metadata,
            manifest,
            spine,
            by_id,
            by_href,
        }
    }

    /// Location of the package document inside the archive
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &HashMap<String, MetadataEntry> {
        &self.metadata
    }

    /// Text content of a metadata element, e.g. `dc:title`
    pub fn metadata_text(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(|entry| entry.text.as_str())
    }

    /// Manifest items in document order
    pub fn manifest(&self) -> &[ManifestItem] {
        &self.manifest
    }

    /// Spine idrefs in reading order
    pub fn spine(&self) -> &[String] {
        &self.spine
    }

    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.by_id.get(id).map(|&index| &self.manifest[index])
    }

    /// Manifest item whose resolved href equals `href`
    pub fn item_by_href(&self, href: &str) -> Option<&ManifestItem> {
        self.by_href.get(href).map(|&index| &self.manifest[index])
    }

    /// Spine entries paired with their manifest item, if one exists
    pub fn spine_items(&self) -> impl Iterator<Item = (&str, Option<&ManifestItem>)> + '_ {
        self.spine
            .iter()
            .map(move |idref| (idref.as_str(), self.item(idref)))
    }
}

/// Decoded content of an archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum FileContent {
    /// Plain text, XML, HTML or CSS
    Text(String),
    /// Binary content pre-encoded as a `data:` URI
    Embedded(String),
}

impl FileContent {
    pub fn as_str(&self) -> &str {
        match self {
            FileContent::Text(text) => text,
            FileContent::Embedded(uri) => uri,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            FileContent::Text(text) => text,
            FileContent::Embedded(uri) => uri,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            FileContent::Embedded(_) => None,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, FileContent::Embedded(_))
    }
}

/// Decoded package files keyed by absolute in-package path.
///
/// Owned by a single run; the inliner overwrites CSS and XHTML entries in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStore {
    files: BTreeMap<String, FileContent>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&FileContent> {
        self.files.get(path)
    }

    /// Text content at `path`, if the entry exists and was decoded as text
    pub fn text(&self, path: &str) -> Option<&str> {
        self.files.get(path).and_then(FileContent::as_text)
    }

    pub fn insert(&mut self, path: impl Into<String>, content: FileContent) -> Option<FileContent> {
        self.files.insert(path.into(), content)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileContent)> + '_ {
        self.files.iter().map(|(path, content)| (path.as_str(), content))
    }
}

/// Reserved package files kept out of the [`FileStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMeta {
    pub container_xml: Option<String>,
    pub mimetype: Option<String>,
}
