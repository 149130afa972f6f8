//! `url()` rewriting for stylesheets

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::{is_data_reference, InlineReport, Resources};

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)url\((.*?)\)").expect("valid regex"))
}

/// Replace every non-data `url()` in `css` with the embedded content of its target.
///
/// References are resolved against `css_path`. Occurrences whose target is
/// not in the store are left as written.
pub fn inline_stylesheet(
    css: &str,
    css_path: &str,
    resources: Resources<'_>,
    report: &mut InlineReport,
) -> String {
    url_pattern()
        .replace_all(css, |caps: &Captures| {
            let reference = caps[1].trim().trim_matches(|c: char| c == '"' || c == '\'');
            if is_data_reference(reference) {
                return caps[0].to_string();
            }

            match resources.embedded(reference, css_path) {
                Some(uri) => {
                    report.references_embedded += 1;
                    format!("url({})", uri)
                }
                None => {
                    tracing::debug!("{}: no entry for url({}), leaving as is", css_path, reference);
                    report.references_missing += 1;
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
