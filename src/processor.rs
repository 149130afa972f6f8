//! Package processing pipeline
//!
//! Runs the stages in a fixed order: open the archive, read the container
//! descriptor, parse the package document, decode every entry one at a time,
//! validate the reserved files, then inline resources. Each step is reported
//! through a [`Progress`] callback.

use crate::config::Config;
use crate::epub::{
    decode_entry, package_path, parse_package, validate, Archive, DecodedFile, FileContent,
    FileStore, ManifestItem, PackageDocument, PackageMeta, CONTAINER_PATH, MIMETYPE_PATH,
};
use crate::error::{EpubError, Result};
use crate::inline::{inline_resources, InlineOptions, InlineReport};

/// Pipeline step notification.
///
/// [`Progress::code`] gives the numeric step code: 1 archive opened,
/// 2 entry decoded, 3 package read, 4 post-processing, 5 finished, -1 fatal
/// archive failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Opening,
    Opened { entries: usize },
    Decoded { name: String },
    PackageRead,
    PostProcessing,
    Finished,
    Failed,
}

impl Progress {
    pub fn code(&self) -> i32 {
        match self {
            Progress::Opening | Progress::Opened { .. } => 1,
            Progress::Decoded { .. } => 2,
            Progress::PackageRead => 3,
            Progress::PostProcessing => 4,
            Progress::Finished => 5,
            Progress::Failed => -1,
        }
    }
}

/// Notifier that forwards progress to the log
pub fn log_progress(progress: Progress) {
    match progress {
        Progress::Opening => tracing::info!("Opening archive"),
        Progress::Opened { entries } => tracing::info!("Archive has {} entries", entries),
        Progress::Decoded { name } => tracing::debug!("Decoded {}", name),
        Progress::PackageRead => tracing::info!("Package read"),
        Progress::PostProcessing => tracing::info!("Inlining resources"),
        Progress::Finished => tracing::info!("Finished"),
        Progress::Failed => tracing::error!("Archive could not be processed"),
    }
}

/// Result of one processing run
#[derive(Debug, Clone)]
pub struct ProcessedBook {
    pub package: PackageDocument,
    pub meta: PackageMeta,
    pub files: FileStore,
    pub report: InlineReport,
}

impl ProcessedBook {
    /// Spine entries in reading order with their final content
    pub fn chapters(
        &self,
    ) -> impl Iterator<Item = (&str, Option<&ManifestItem>, Option<&FileContent>)> + '_ {
        self.package.spine_items().map(move |(idref, item)| {
            let content = item.and_then(|item| self.files.get(&item.href));
            (idref, item, content)
        })
    }
}

/// EPUB processor - turns an archive into a self-contained file set
#[derive(Debug, Clone, Default)]
pub struct EpubProcessor {
    config: Config,
}

impl EpubProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process an archive, reporting each step to `notify`.
    ///
    /// Archive failures are reported as [`Progress::Failed`] before the error
    /// is returned. Structural failures are only returned.
    pub fn process<F>(&self, data: &[u8], mut notify: F) -> Result<ProcessedBook>
    where
        F: FnMut(Progress),
    {
        notify(Progress::Opening);

        let result = self.run(data, &mut notify);
        if let Err(e) = &result {
            if e.is_archive_failure() {
                tracing::error!("Archive failure: {}", e);
                notify(Progress::Failed);
            }
        }
        result
    }

    /// Run [`process`](Self::process) on tokio's blocking pool.
    pub async fn process_async<F>(&self, data: Vec<u8>, notify: F) -> Result<ProcessedBook>
    where
        F: FnMut(Progress) + Send + 'static,
    {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || processor.process(&data, notify)).await?
    }

    fn run<F>(&self, data: &[u8], notify: &mut F) -> Result<ProcessedBook>
    where
        F: FnMut(Progress),
    {
        let mut archive = Archive::open(data)?;
        notify(Progress::Opened {
            entries: archive.len(),
        });

        // The manifest is unknown until the package document is read, so both
        // bootstrap files are decoded untyped, as text.
        if !archive.contains(CONTAINER_PATH) {
            return Err(EpubError::MissingContainer);
        }
        let container_xml = decode_entry(archive.read(CONTAINER_PATH)?, None)
            .content
            .into_string();

        let opf_path = package_path(&container_xml)?;
        if !archive.contains(&opf_path) {
            return Err(EpubError::MissingPackageDocument(opf_path));
        }
        let opf_text = decode_entry(archive.read(&opf_path)?, None)
            .content
            .into_string();
        let package = parse_package(&opf_path, &opf_text)?;
        tracing::info!(
            "Package {}: {} manifest items, {} spine entries",
            opf_path,
            package.manifest().len(),
            package.spine().len()
        );

        let mut meta = PackageMeta::default();
        let mut files = FileStore::new();
        let entries = archive.entries().to_vec();

        for name in entries {
            let decoded = if name == CONTAINER_PATH {
                DecodedFile {
                    path: name.clone(),
                    content: FileContent::Text(container_xml.clone()),
                }
            } else if name == opf_path {
                DecodedFile {
                    path: name.clone(),
                    content: FileContent::Text(opf_text.clone()),
                }
            } else {
                let entry = archive.read(&name)?;
                let media_type = package.media_type_for(&name);
                decode_entry(entry, media_type.as_deref())
            };

            store_decoded(decoded, &mut meta, &mut files);
            notify(Progress::Decoded { name });
        }

        if self.config.validate {
            validate(&meta)?;
        }

        notify(Progress::PackageRead);
        notify(Progress::PostProcessing);

        let report = inline_resources(
            &package,
            &mut files,
            InlineOptions {
                inline_stylesheets: self.config.inline_stylesheets,
            },
        );

        notify(Progress::Finished);

        Ok(ProcessedBook {
            package,
            meta,
            files,
            report,
        })
    }
}

/// Divert reserved files to the package meta, everything else to the store.
fn store_decoded(decoded: DecodedFile, meta: &mut PackageMeta, files: &mut FileStore) {
    match decoded.path.as_str() {
        CONTAINER_PATH => meta.container_xml = Some(decoded.content.into_string()),
        MIMETYPE_PATH => meta.mimetype = Some(decoded.content.into_string()),
        _ => {
            files.insert(decoded.path, decoded.content);
        }
    }
}
