//! Container descriptor (`META-INF/container.xml`) and package validation

use super::{PackageMeta, CONTAINER_PATH, EPUB_MIMETYPE};
use crate::error::{EpubError, Result};

/// Find the package document path named by the container descriptor.
pub fn package_path(container_xml: &str) -> Result<String> {
    let doc = roxmltree::Document::parse(container_xml).map_err(|source| {
        EpubError::MalformedXml {
            path: CONTAINER_PATH.to_string(),
            source,
        }
    })?;

    doc.descendants()
        .find(|node| node.tag_name().name() == "rootfile")
        .and_then(|node| node.attribute("full-path"))
        .map(str::to_string)
        .ok_or(EpubError::MissingRootFile)
}

/// Check the reserved package files.
pub fn validate(meta: &PackageMeta) -> Result<()> {
    if meta.container_xml.is_none() {
        return Err(EpubError::MissingContainer);
    }

    match meta.mimetype.as_deref() {
        None => Err(EpubError::MissingMimetype),
        Some(EPUB_MIMETYPE) => Ok(()),
        Some(other) => Err(EpubError::InvalidMimetype(other.to_string())),
    }
}
