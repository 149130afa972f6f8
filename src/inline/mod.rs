//! Resource inlining
//!
//! Rewrites stylesheets and XHTML documents so that every internal image and
//! stylesheet reference is replaced by embedded content. Stylesheets are
//! rewritten first: the XHTML pass copies their already-inlined text into
//! `<style>` elements.

use std::borrow::Cow;

use crate::epub::archive::data_uri;
use crate::epub::path::resolve;
use crate::epub::{FileContent, FileStore, PackageDocument};

pub mod css;
pub mod html;

pub use css::inline_stylesheet;
pub use html::inline_document;

pub const CSS_MEDIA_TYPE: &str = "text/css";
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Switches for the XHTML pass
#[derive(Debug, Clone, Copy)]
pub struct InlineOptions {
    /// Replace `<link type="text/css">` in `<head>` with inline `<style>`
    pub inline_stylesheets: bool,
}

impl Default for InlineOptions {
    fn default() -> Self {
        Self {
            inline_stylesheets: true,
        }
    }
}

/// Counters collected while inlining
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineReport {
    pub stylesheets: usize,
    pub documents: usize,
    /// `url()` and image references replaced with data URIs
    pub references_embedded: usize,
    /// `<link>` elements replaced with `<style>`
    pub links_inlined: usize,
    /// References whose target is not in the file store
    pub references_missing: usize,
    /// Per-element rewrites the rewriter rejected
    pub rewrite_failures: usize,
}

/// Read-only view used to look up embedded content while rewriting
#[derive(Clone, Copy)]
pub struct Resources<'a> {
    pub package: &'a PackageDocument,
    pub store: &'a FileStore,
}

impl<'a> Resources<'a> {
    pub fn new(package: &'a PackageDocument, store: &'a FileStore) -> Self {
        Self { package, store }
    }

    /// Embeddable form of `reference` as seen from the file at `referrer`.
    ///
    /// Binary entries were stored as data URIs when decoded. Text entries
    /// (SVG images, for instance) are encoded here with their media type.
    pub fn embedded(&self, reference: &str, referrer: &str) -> Option<Cow<'a, str>> {
        let target = resolve(reference, referrer);
        match self.store.get(&target)? {
            FileContent::Embedded(uri) => Some(Cow::Borrowed(uri.as_str())),
            FileContent::Text(text) => {
                let media_type = self
                    .package
                    .media_type_for(&target)
                    .unwrap_or_else(|| "text/plain".to_string());
                Some(Cow::Owned(data_uri(&media_type, text.as_bytes())))
            }
        }
    }
}

/// Whether a reference already carries its content inline
pub fn is_data_reference(reference: &str) -> bool {
    reference
        .trim_start()
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Rewrite every CSS and XHTML manifest item in `store`.
///
/// All stylesheets are rewritten before any document, so inlined `<style>`
/// elements carry stylesheets whose own references are already embedded.
/// Other entries are left untouched.
pub fn inline_resources(
    package: &PackageDocument,
    store: &mut FileStore,
    options: InlineOptions,
) -> InlineReport {
    let mut report = InlineReport::default();

    for item in package
        .manifest()
        .iter()
        .filter(|item| item.media_type == CSS_MEDIA_TYPE)
    {
        let Some(css) = store.text(&item.href) else {
            tracing::warn!("Stylesheet {} is declared but not present as text", item.href);
            continue;
        };
        let rewritten = inline_stylesheet(css, &item.href, Resources::new(package, store), &mut report);
        store.insert(item.href.clone(), FileContent::Text(rewritten));
        report.stylesheets += 1;
    }

    for item in package
        .manifest()
        .iter()
        .filter(|item| item.media_type == XHTML_MEDIA_TYPE)
    {
        let Some(html) = store.text(&item.href) else {
            tracing::warn!("Document {} is declared but not present as text", item.href);
            continue;
        };
        let rewritten = inline_document(
            html,
            &item.href,
            Resources::new(package, store),
            options,
            &mut report,
        );
        store.insert(item.href.clone(), FileContent::Text(rewritten));
        report.documents += 1;
    }

    tracing::info!(
        "Inlined {} stylesheets and {} documents ({} references embedded, {} missing)",
        report.stylesheets,
        report.documents,
        report.references_embedded,
        report.references_missing
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::ManifestItem;
    use std::collections::HashMap;

    fn item(id: &str, href: &str, media_type: &str) -> ManifestItem {
        ManifestItem {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: None,
        }
    }

    #[test]
    fn test_data_reference_detection() {
        assert!(is_data_reference("data:image/png;base64,AAAA"));
        assert!(is_data_reference("  DATA:image/png;base64,AAAA"));
        assert!(!is_data_reference("database.png"));
        assert!(!is_data_reference("img/a.png"));
        assert!(!is_data_reference(""));
    }

    #[test]
    fn test_text_resources_are_encoded_on_demand() {
        let package = PackageDocument::new(
            "OEBPS/content.opf",
            HashMap::new(),
            vec![item("logo", "OEBPS/img/logo.svg", "image/svg+xml")],
            Vec::new(),
        );
        let mut store = FileStore::new();
        store.insert("OEBPS/img/logo.svg", FileContent::Text("<svg/>".to_string()));

        let resources = Resources::new(&package, &store);
        assert_eq!(
            resources.embedded("img/logo.svg", "OEBPS/chap1.xhtml").as_deref(),
            Some("data:image/svg+xml;base64,PHN2Zy8+")
        );
        assert!(resources.embedded("img/none.svg", "OEBPS/chap1.xhtml").is_none());
    }

    #[test]
    fn test_stylesheets_inlined_before_documents() {
        // the document is listed first; its <style> must still carry the rewritten CSS
        let package = PackageDocument::new(
            "OEBPS/content.opf",
            HashMap::new(),
            vec![
                item("c1", "OEBPS/Text/c1.xhtml", XHTML_MEDIA_TYPE),
                item("css", "OEBPS/Styles/main.css", CSS_MEDIA_TYPE),
                item("bg", "OEBPS/Images/bg.png", "image/png"),
            ],
            vec!["c1".to_string()],
        );

        let mut store = FileStore::new();
        store.insert(
            "OEBPS/Text/c1.xhtml",
            FileContent::Text(
                r#"<html><head><link href="../Styles/main.css" rel="stylesheet" type="text/css"/></head><body/></html>"#
                    .to_string(),
            ),
        );
        store.insert(
            "OEBPS/Styles/main.css",
            FileContent::Text("body { background: url(../Images/bg.png) }".to_string()),
        );
        store.insert(
            "OEBPS/Images/bg.png",
            FileContent::Embedded("data:image/png;base64,iVBO".to_string()),
        );
        store.insert("OEBPS/notes.txt", FileContent::Text("untouched".to_string()));

        let report = inline_resources(&package, &mut store, InlineOptions::default());

        assert_eq!(
            store.text("OEBPS/Styles/main.css"),
            Some("body { background: url(data:image/png;base64,iVBO) }")
        );
        let html = store.text("OEBPS/Text/c1.xhtml").unwrap();
        assert!(html.contains("url(data:image/png;base64,iVBO)"));
        assert!(html.contains(r#"data-orig-href="../Styles/main.css""#));
        assert!(!html.contains("<link"));
        assert_eq!(store.text("OEBPS/notes.txt"), Some("untouched"));

        assert_eq!(report.stylesheets, 1);
        assert_eq!(report.documents, 1);
        assert_eq!(report.links_inlined, 1);
    }

    #[test]
    fn test_declared_but_absent_items_are_skipped() {
        let package = PackageDocument::new(
            "content.opf",
            HashMap::new(),
            vec![
                item("css", "gone.css", CSS_MEDIA_TYPE),
                item("c1", "gone.xhtml", XHTML_MEDIA_TYPE),
            ],
            Vec::new(),
        );
        let mut store = FileStore::new();

        let report = inline_resources(&package, &mut store, InlineOptions::default());
        assert_eq!(report, InlineReport::default());
        assert!(store.is_empty());
    }
}
