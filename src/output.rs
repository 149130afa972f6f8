//! Writing a processed book to disk

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::epub::{PackageDocument, PackageMeta};
use crate::processor::ProcessedBook;

/// Name of the summary file written next to the package files
pub const SUMMARY_FILE: &str = "package.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    package: &'a PackageDocument,
    meta: &'a PackageMeta,
    files: Vec<&'a str>,
}

/// Write every stored file under `dir`, plus a JSON summary of the package.
///
/// Content is written exactly as stored, so binary entries appear as their
/// data URI text. Entries whose path would escape `dir` are skipped.
/// Returns the number of package files written.
pub fn write_book(book: &ProcessedBook, dir: &Path) -> io::Result<usize> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(book.files.len());
    for (path, content) in book.files.iter() {
        let Some(target) = contained_path(dir, path) else {
            tracing::warn!("Skipping entry with unsafe path: {}", path);
            continue;
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content.as_str())?;
        written.push(path);
    }

    let summary = Summary {
        package: &book.package,
        meta: &book.meta,
        files: written.clone(),
    };
    let file = fs::File::create(dir.join(SUMMARY_FILE))?;
    serde_json::to_writer_pretty(io::BufWriter::new(file), &summary)?;

    tracing::info!("Wrote {} files to {}", written.len(), dir.display());
    Ok(written.len())
}

/// `dir/path` when `path` is relative and has no `..` or root components
fn contained_path(dir: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    let safe = !path.is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));

    safe.then(|| dir.join(relative))
}
