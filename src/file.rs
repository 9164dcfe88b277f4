//! Reading input documents from disk

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;

use crate::error::{PDFDecryptError, PDFDecryptResult};

/// File name reported when no file has been opened
pub const DEFAULT_FILENAME: &str = "document.pdf";

/// Contents of a file read from disk, together with its display name
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    content: Vec<u8>,
}

impl InputFile {
    /// Read a file. A missing file is `FileNotFound`, any other failure
    /// `FileUnreadable`.
    pub fn open(path: impl AsRef<Path>) -> PDFDecryptResult<Self> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => PDFDecryptError::FileNotFound(path.to_path_buf()),
            _ => PDFDecryptError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            },
        })?;
        debug!("Read {} bytes from {}", content.len(), path.display());
        Ok(Self {
            name: display_name(path),
            content,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// Base name of a path, or the default name when it has none
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}
