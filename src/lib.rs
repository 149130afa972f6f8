//! EPUB Inliner
//!
//! Unpacks an EPUB archive and rewrites its stylesheets and XHTML documents so
//! that every internal image and stylesheet reference is embedded:
//! - Container and package document (OPF) parsing
//! - Manifest-driven media types with an extension fallback
//! - CSS `url()` and XHTML `img`/`image`/`link` inlining
//!
//! The whole archive is processed in one pass into an in-memory file set.
//!
//! ```no_run
//! use epub_inliner::{EpubProcessor, Config};
//!
//! let data = std::fs::read("book.epub").unwrap();
//! let book = EpubProcessor::new(Config::default())
//!     .process(&data, |progress| println!("step {}", progress.code()))
//!     .unwrap();
//! for (idref, _item, content) in book.chapters() {
//!     println!("{}: {} bytes", idref, content.map_or(0, |c| c.as_str().len()));
//! }
//! ```

pub mod config;
pub mod epub;
pub mod error;
pub mod inline;
pub mod output;
pub mod processor;

// Re-export common types
pub use config::Config;
pub use epub::{FileContent, FileStore, ManifestItem, MetadataEntry, PackageDocument, PackageMeta};
pub use error::{ArchiveError, EpubError, Result};
pub use inline::InlineReport;
pub use processor::{log_progress, EpubProcessor, ProcessedBook, Progress};
