//! Image and stylesheet inlining for XHTML documents
//!
//! Documents are parsed as XML with roxmltree and rewritten by splicing the
//! source at the byte ranges of the matched elements and attributes, so
//! everything else is kept exactly as written. Markup that is not
//! well-formed XML (HTML-style void tags, undeclared entities) goes through
//! the lol_html rewriter instead.

use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use roxmltree::{Attribute, Document, Node, ParsingOptions};
use std::cell::Cell;
use std::ops::Range;

use super::{is_data_reference, InlineOptions, InlineReport, Resources};
use crate::epub::path::resolve;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

#[derive(Default)]
struct Counters {
    embedded: Cell<usize>,
    links: Cell<usize>,
    missing: Cell<usize>,
    failed: Cell<usize>,
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

/// Reference lookups for one document, shared by both rewriters
struct Inliner<'a> {
    doc_path: &'a str,
    resources: Resources<'a>,
    counters: Counters,
}

impl<'a> Inliner<'a> {
    /// Data URI for an image reference, `None` when it stays as written
    fn embed(&self, reference: &str) -> Option<String> {
        if is_data_reference(reference) {
            return None;
        }
        match self.resources.embedded(reference, self.doc_path) {
            Some(uri) => Some(uri.into_owned()),
            None => {
                tracing::warn!(
                    "{}: no entry for image {}, leaving as is",
                    self.doc_path,
                    reference
                );
                bump(&self.counters.missing);
                None
            }
        }
    }

    /// Current text of a linked stylesheet
    fn stylesheet(&self, href: &str) -> Option<&'a str> {
        let target = resolve(href, self.doc_path);
        let css = self.resources.store.text(&target);
        if css.is_none() {
            tracing::warn!(
                "{}: stylesheet {} not found, keeping link",
                self.doc_path,
                target
            );
            bump(&self.counters.missing);
        }
        css
    }

    fn finish(self, report: &mut InlineReport) {
        report.references_embedded += self.counters.embedded.get();
        report.links_inlined += self.counters.links.get();
        report.references_missing += self.counters.missing.get();
        report.rewrite_failures += self.counters.failed.get();
    }
}

/// Rewrite one XHTML document.
///
/// - `img@src` and `image@xlink:href` (or plain `href`) become data URIs.
/// - `link[type="text/css"]` inside `head` becomes a `<style>` element holding
///   the stylesheet's current text, with the original href in `data-orig-href`.
///
/// Failures are handled per element: the element is logged and left as it
/// was. If the rewriter fails on the document as a whole, the original text
/// is returned.
pub fn inline_document(
    html: &str,
    doc_path: &str,
    resources: Resources<'_>,
    options: InlineOptions,
    report: &mut InlineReport,
) -> String {
    let inliner = Inliner {
        doc_path,
        resources,
        counters: Counters::default(),
    };

    let parse_options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let rewritten = match Document::parse_with_options(html, parse_options) {
        Ok(doc) => Ok(rewrite_xml(&doc, html, &inliner, options)),
        Err(e) => {
            tracing::debug!("{}: not well-formed XML ({}), rewriting as HTML", doc_path, e);
            rewrite_html(html, &inliner, options)
        }
    };

    inliner.finish(report);

    match rewritten {
        Ok(rewritten) => rewritten,
        Err(e) => {
            tracing::warn!("{}: HTML rewrite failed, keeping original: {}", doc_path, e);
            report.rewrite_failures += 1;
            html.to_string()
        }
    }
}

fn rewrite_xml(
    doc: &Document<'_>,
    source: &str,
    inliner: &Inliner<'_>,
    options: InlineOptions,
) -> String {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for node in doc.descendants().filter(Node::is_element) {
        match node.tag_name().name() {
            "img" => {
                if let Some(src) = plain_attribute(node, "src") {
                    embed_attribute(source, src, inliner, &mut edits);
                }
            }
            "image" => {
                let href = node
                    .attributes()
                    .find(|a| a.name() == "href" && a.namespace() == Some(XLINK_NS))
                    .or_else(|| plain_attribute(node, "href"));
                if let Some(href) = href {
                    embed_attribute(source, href, inliner, &mut edits);
                }
            }
            "link" if options.inline_stylesheets && is_stylesheet_link(node) => {
                let Some(href) = node.attribute("href") else {
                    continue;
                };
                if let Some(css) = inliner.stylesheet(href) {
                    let body = html_escape::encode_text(css);
                    edits.push((node.range(), style_element(href, &body)));
                    bump(&inliner.counters.links);
                }
            }
            _ => {}
        }
    }

    splice(source, edits)
}

fn plain_attribute<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Attribute<'a, 'input>> {
    node.attributes()
        .find(|a| a.name() == name && a.namespace().is_none())
}

fn is_stylesheet_link(node: Node<'_, '_>) -> bool {
    node.attribute("type") == Some("text/css")
        && node
            .ancestors()
            .skip(1)
            .any(|a| a.is_element() && a.tag_name().name() == "head")
}

fn embed_attribute(
    source: &str,
    attr: Attribute<'_, '_>,
    inliner: &Inliner<'_>,
    edits: &mut Vec<(Range<usize>, String)>,
) {
    let Some(uri) = inliner.embed(attr.value()) else {
        return;
    };
    match attribute_value_range(source, attr.position()) {
        Some(range) => {
            edits.push((range, uri));
            bump(&inliner.counters.embedded);
        }
        None => {
            tracing::warn!(
                "{}: failed to process image url {}: value not found in source",
                inliner.doc_path,
                attr.value()
            );
            bump(&inliner.counters.failed);
        }
    }
}

/// Byte range of the quoted value of the attribute starting at `position`
fn attribute_value_range(source: &str, position: usize) -> Option<Range<usize>> {
    let rest = source.get(position..)?;
    let eq = rest.find('=')?;
    let after = &rest[eq + 1..];
    let value = after.trim_start();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;

    let start = position + eq + 1 + (after.len() - value.len()) + 1;
    let len = source[start..].find(quote)?;
    Some(start..start + len)
}

/// Apply replacements given in document order; overlapping ones are dropped.
fn splice(source: &str, edits: Vec<(Range<usize>, String)>) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    out
}

fn rewrite_html(
    html: &str,
    inliner: &Inliner<'_>,
    options: InlineOptions,
) -> Result<String, lol_html::errors::RewritingError> {
    let doc_path = inliner.doc_path;
    let counters = &inliner.counters;

    let mut handlers = vec![
        element!("img[src]", |el| {
            let Some(src) = el.get_attribute("src") else {
                return Ok(());
            };
            if let Some(uri) = inliner.embed(&src) {
                match el.set_attribute("src", &uri) {
                    Ok(()) => bump(&counters.embedded),
                    Err(e) => {
                        tracing::warn!("{}: failed to process image url {}: {}", doc_path, src, e);
                        bump(&counters.failed);
                    }
                }
            }
            Ok(())
        }),
        element!("image", |el| {
            let attr = if el.has_attribute("xlink:href") {
                "xlink:href"
            } else {
                "href"
            };
            let Some(href) = el.get_attribute(attr) else {
                return Ok(());
            };
            if let Some(uri) = inliner.embed(&href) {
                match el.set_attribute(attr, &uri) {
                    Ok(()) => bump(&counters.embedded),
                    Err(e) => {
                        tracing::warn!("{}: failed to process image url {}: {}", doc_path, href, e);
                        bump(&counters.failed);
                    }
                }
            }
            Ok(())
        }),
    ];

    if options.inline_stylesheets {
        handlers.push(element!(r#"head link[type="text/css"]"#, |el| {
            let Some(href) = el.get_attribute("href") else {
                return Ok(());
            };
            if let Some(css) = inliner.stylesheet(&href) {
                let body = css.replace("</style", "<\\/style");
                el.replace(&style_element(&href, &body), ContentType::Html);
                bump(&counters.links);
            }
            Ok(())
        }));
    }

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    );
    rewritten
}

fn style_element(href: &str, body: &str) -> String {
    format!(
        r#"<style type="text/css" data-orig-href="{}">{}</style>"#,
        html_escape::encode_double_quoted_attribute(href),
        body
    )
}
