//! Relative reference resolution inside a package
//!
//! Every href in an EPUB is relative to the file that mentions it. Paths are
//! resolved with a plain directory stack: `..` pops, anything else pushes.
//! There is no `.` normalisation and no percent-decoding, so the result is
//! directly comparable with archive entry names.

/// Resolve `reference` against the location of `referrer`.
///
/// `referrer` is a file path; its final component is dropped before the
/// reference's directories are applied.
pub fn resolve(reference: &str, referrer: &str) -> String {
    let mut reference_dirs: Vec<&str> = reference.split('/').collect();
    let file_name = reference_dirs.pop().unwrap_or_default();

    let mut location: Vec<&str> = referrer.split('/').collect();
    location.pop();

    for segment in reference_dirs {
        if segment == ".." {
            location.pop();
        } else {
            location.push(segment);
        }
    }

    location.push(file_name);
    location.join("/")
}
