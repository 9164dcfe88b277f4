//! Error types for the PDF decrypter

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for PDF decryption operations
#[derive(Error, Debug)]
pub enum PDFDecryptError {
    /// Malformed PDF structure
    #[error("Malformed PDF structure: {0}")]
    MalformedPDF(String),

    /// Object address that cannot be normalised
    #[error("Invalid object address: {0}")]
    InvalidAddress(String),

    /// Compression error
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// The document carries no encryption dictionary
    #[error("Document is not encrypted")]
    NotEncrypted,

    /// No document content has been supplied
    #[error("No document has been supplied")]
    NoDocument,

    /// Unsupported stream filter
    #[error("Unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    /// Unsupported row predictor
    #[error("Unsupported predictor: {0}")]
    UnsupportedPredictor(i64),

    /// Unsupported security handler revision
    #[error("Unsupported revision: {0}")]
    UnsupportedRevision(i64),

    /// Unsupported security handler
    #[error("Unsupported security handler: {0}")]
    UnsupportedSecurityHandler(String),

    /// Invalid key length
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(usize),

    /// Password has not been set
    #[error("Password has not been set")]
    PasswordNotSet,

    /// Decryption requested before a password was verified
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// Authentication failed (wrong password)
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Object not found
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Key material could not be prepared
    #[error("Decryption unavailable: {0}")]
    DecryptionUnavailable(String),

    /// Input file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input file exists but cannot be read
    #[error("Unable to read {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Result type for PDF decryption operations
pub type PDFDecryptResult<T> = Result<T, PDFDecryptError>;

/// Coarse classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MalformedInput,
    UnsupportedFeature,
    AuthenticationRequired,
    AuthenticationFailed,
    ObjectNotFound,
    DecryptionUnavailable,
    Io,
}

impl PDFDecryptError {
    /// Create a new malformed PDF error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPDF(msg.into())
    }

    /// Create a new object not found error
    pub fn object_not_found(what: impl Into<String>) -> Self {
        Self::ObjectNotFound(what.into())
    }

    /// Category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedPDF(_)
            | Self::InvalidAddress(_)
            | Self::CompressionError(_)
            | Self::NotEncrypted
            | Self::NoDocument => ErrorCategory::MalformedInput,
            Self::UnsupportedFilter(_)
            | Self::UnsupportedPredictor(_)
            | Self::UnsupportedRevision(_)
            | Self::UnsupportedSecurityHandler(_)
            | Self::InvalidKeyLength(_) => ErrorCategory::UnsupportedFeature,
            Self::PasswordNotSet | Self::AuthenticationRequired(_) => {
                ErrorCategory::AuthenticationRequired
            }
            Self::AuthenticationFailed => ErrorCategory::AuthenticationFailed,
            Self::ObjectNotFound(_) => ErrorCategory::ObjectNotFound,
            Self::DecryptionUnavailable(_) => ErrorCategory::DecryptionUnavailable,
            Self::FileNotFound(_) | Self::FileUnreadable { .. } | Self::IoError(_) => {
                ErrorCategory::Io
            }
        }
    }

    /// Check if error is authentication related
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::AuthenticationRequired | ErrorCategory::AuthenticationFailed
        )
    }

    /// Check if error is related to PDF structure
    pub fn is_structure_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::MalformedInput | ErrorCategory::ObjectNotFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_error_categories() {
        assert!(PDFDecryptError::AuthenticationFailed.is_auth_error());
        assert!(PDFDecryptError::PasswordNotSet.is_auth_error());
        assert!(PDFDecryptError::malformed("bad").is_structure_error());
        assert!(PDFDecryptError::object_not_found("12").is_structure_error());
        assert!(!PDFDecryptError::UnsupportedRevision(7).is_structure_error());
        assert_eq!(
            PDFDecryptError::UnsupportedPredictor(15).category(),
            ErrorCategory::UnsupportedFeature
        );
        assert_eq!(
            PDFDecryptError::DecryptionUnavailable("no key".into()).category(),
            ErrorCategory::DecryptionUnavailable
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PDFDecryptError::malformed("Unbalanced dictionary").to_string(),
            "Malformed PDF structure: Unbalanced dictionary"
        );
        assert_eq!(
            PDFDecryptError::FileNotFound(PathBuf::from("missing.pdf")).to_string(),
            "File not found: missing.pdf"
        );
        let unreadable = PDFDecryptError::FileUnreadable {
            path: PathBuf::from("locked.pdf"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(unreadable.category(), ErrorCategory::Io);
        assert!(unreadable.to_string().starts_with("Unable to read locked.pdf"));
    }

    #[test]
    fn test_io_conversion() {
        let err: PDFDecryptError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, PDFDecryptError::IoError(_)));
    }
}
