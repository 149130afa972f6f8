//! Error types for EPUB processing

use thiserror::Error;

/// Result type alias for package processing
pub type Result<T> = std::result::Result<T, EpubError>;

/// Failures of the decompression layer.
///
/// Any of these aborts the run; the pipeline reports them through
/// [`crate::Progress::Failed`] before returning.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to read ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to read entry '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),
}

/// Errors produced while resolving and parsing an EPUB package
#[derive(Error, Debug)]
pub enum EpubError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("XML parse error in {path}: {source}")]
    MalformedXml {
        path: String,
        #[source]
        source: roxmltree::Error,
    },

    #[error("No rootfile with a full-path attribute in META-INF/container.xml")]
    MissingRootFile,

    #[error("Invalid package document {path}: missing <{element}> element")]
    MalformedPackage { path: String, element: &'static str },

    #[error("Package document not found in archive: {0}")]
    MissingPackageDocument(String),

    #[error("META-INF/container.xml file not found")]
    MissingContainer,

    #[error("Mimetype file not found")]
    MissingMimetype,

    #[error("Incorrect mimetype {0}")]
    InvalidMimetype(String),

    #[error("Processing task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl EpubError {
    /// Whether this failure belongs on the numeric progress channel (`-1`)
    /// rather than only being returned.
    pub fn is_archive_failure(&self) -> bool {
        matches!(self, EpubError::Archive(_))
    }
}
