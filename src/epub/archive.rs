//! ZIP archive access and entry decoding
//!
//! Entries are listed once when the archive is opened and then read one at a
//! time by name. Decoding turns raw bytes into either text or a `data:` URI,
//! depending on the media type known for the entry at that point.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::media_type::is_textual;
use super::{FileContent, CONTAINER_PATH, MIMETYPE_PATH};
use crate::error::ArchiveError;

/// Raw bytes of one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub raw_bytes: Vec<u8>,
}

/// An archive entry after decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFile {
    pub path: String,
    pub content: FileContent,
}

/// An opened EPUB archive
pub struct Archive<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
    entries: Vec<String>,
}

impl<'a> Archive<'a> {
    /// Open an archive from raw bytes and list its file entries in archive order.
    pub fn open(data: &'a [u8]) -> Result<Self, ArchiveError> {
        let mut zip = ZipArchive::new(Cursor::new(data))?;

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            if file.is_file() {
                entries.push(file.name().to_string());
            }
        }

        tracing::debug!("Opened archive with {} file entries", entries.len());
        Ok(Self { zip, entries })
    }

    /// File entry names in archive order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|name| name == path)
    }

    /// Decompress one entry by name
    pub fn read(&mut self, path: &str) -> Result<ArchiveEntry, ArchiveError> {
        let mut file = match self.zip.by_name(path) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ArchiveError::EntryNotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut raw_bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut raw_bytes)
            .map_err(|source| ArchiveError::Read {
                path: path.to_string(),
                source,
            })?;

        Ok(ArchiveEntry {
            path: path.to_string(),
            raw_bytes,
        })
    }
}

/// Whether an entry is one of the reserved package files
pub fn is_reserved(path: &str) -> bool {
    path == CONTAINER_PATH || path == MIMETYPE_PATH
}

/// Decode an entry to text or to an embeddable data URI.
///
/// `media_type` is `None` while the manifest is still unknown, or when
/// nothing can be guessed for the path; such entries are read as text.
pub fn decode_entry(entry: ArchiveEntry, media_type: Option<&str>) -> DecodedFile {
    let content = match media_type {
        Some(mime) if !is_reserved(&entry.path) && !is_textual(mime) => {
            FileContent::Embedded(data_uri(mime, &entry.raw_bytes))
        }
        _ => FileContent::Text(decode_text(&entry.path, entry.raw_bytes)),
    };

    DecodedFile {
        path: entry.path,
        content,
    }
}

/// Build a base64 `data:` URI
pub fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, BASE64.encode(bytes))
}

fn decode_text(path: &str, bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Entry {} is not valid UTF-8, replacing invalid sequences", path);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
