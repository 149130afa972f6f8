//! Media type lookup for package resources

use regex::Regex;
use std::sync::OnceLock;

use super::PackageDocument;

fn textual_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(plain|xml|html|css)\w*$").expect("valid regex"))
}

/// Whether content of this media type should be decoded as text
/// instead of being embedded as a data URI.
pub fn is_textual(media_type: &str) -> bool {
    textual_pattern().is_match(media_type)
}

/// Best guess for resources missing from the manifest: `image/<ext>`.
pub fn guess_from_extension(path: &str) -> Option<String> {
    let (_, extension) = path.rsplit_once('.')?;
    if extension.is_empty()
        || !extension
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(format!("image/{}", extension))
}

impl PackageDocument {
    /// Media type of the resource at an absolute in-package path.
    ///
    /// The manifest wins when it declares the path; otherwise the type is
    /// guessed from the extension, since packages routinely reference files
    /// (cover images in particular) they never declare. A declared item
    /// without a `media-type` has no type at all and decodes as text.
    pub fn media_type_for(&self, path: &str) -> Option<String> {
        match self.item_by_href(path) {
            Some(item) if item.media_type.is_empty() => None,
            Some(item) => Some(item.media_type.clone()),
            None => guess_from_extension(path),
        }
    }
}
