//! PDF Decrypter for Rust
//!
//! Recovers the plaintext of PDF documents protected by the standard
//! security handler (revisions 2 to 6). Strings and streams are decrypted
//! with RC4, AES-128 or AES-256 and the document is written back with its
//! cross-reference data rebuilt.

use std::fmt;
use std::path::Path;

use log::debug;

pub mod crypto;
pub mod error;
pub mod file;
pub mod pdf;
pub mod security;

pub use error::{ErrorCategory, PDFDecryptError, PDFDecryptResult};

use crypto::DecryptionEngine;
use file::{InputFile, DEFAULT_FILENAME};
use pdf::Document;
use security::{CryptFilterMethod, EncryptData, Password, StandardSecurityHandler};

/// Encryption algorithms of the standard security handler
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptionAlgorithm {
    /// RC4 encryption with 40-bit key (PDF 1.3)
    RC4_40,
    /// RC4 encryption with 128-bit key (PDF 1.4)
    RC4_128,
    /// AES encryption with 128-bit key (PDF 1.6)
    AES_128,
    /// AES encryption with 256-bit key (PDF 1.7+/2.0)
    AES_256,
}

impl EncryptionAlgorithm {
    fn from_data(data: &EncryptData) -> Self {
        match data.method() {
            _ if data.version() >= 5 => Self::AES_256,
            Some(CryptFilterMethod::AesV3) => Self::AES_256,
            Some(CryptFilterMethod::AesV2) => Self::AES_128,
            _ if data.length() <= 40 => Self::RC4_40,
            _ => Self::RC4_128,
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionAlgorithm::RC4_40 => write!(f, "RC4-40"),
            EncryptionAlgorithm::RC4_128 => write!(f, "RC4-128"),
            EncryptionAlgorithm::AES_128 => write!(f, "AES-128"),
            EncryptionAlgorithm::AES_256 => write!(f, "AES-256"),
        }
    }
}

/// Access permissions recorded in `P`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDFPermissions(u32);

impl PDFPermissions {
    /// Print the document
    pub const PRINT: u32 = 1 << 2;
    /// Modify the document
    pub const MODIFY: u32 = 1 << 3;
    /// Copy text and graphics
    pub const COPY: u32 = 1 << 4;
    /// Add or modify annotations
    pub const ANNOTATE: u32 = 1 << 5;
    /// Fill form fields
    pub const FILL_FORMS: u32 = 1 << 8;
    /// Extract text and graphics for accessibility
    pub const EXTRACT: u32 = 1 << 9;
    /// Assemble the document
    pub const ASSEMBLE: u32 = 1 << 10;
    /// Print in high quality
    pub const PRINT_HIGH: u32 = 1 << 11;

    /// Permissions from the signed `P` entry
    pub fn from_p(p: i32) -> Self {
        Self(p as u32)
    }

    /// Raw permission bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Check if specific permission is granted
    pub fn has_permission(&self, permission: u32) -> bool {
        (self.0 & permission) == permission
    }
}

/// Encryption parameters of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub algorithm: EncryptionAlgorithm,
    pub version: i64,
    pub revision: i64,
    pub permissions: PDFPermissions,
    pub encrypt_metadata: bool,
}

/// Decryption session for one document and one password
#[derive(Debug, Default)]
pub struct PDFDecrypter {
    content: Option<Vec<u8>>,
    filename: Option<String>,
    password: Option<Password>,
    document: Option<Document>,
    handler: Option<StandardSecurityHandler>,
}

impl PDFDecrypter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document from a file
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> PDFDecryptResult<()> {
        let file = InputFile::open(path)?;
        self.filename = Some(file.name().to_string());
        self.set_document_content(file.into_content());
        Ok(())
    }

    /// Load the document from memory
    pub fn set_document_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = Some(content.into());
        self.document = None;
        self.handler = None;
    }

    /// Set the candidate password. Any earlier verification is discarded.
    pub fn set_password(&mut self, password: impl Into<Vec<u8>>) {
        self.password = Some(Password::new(password));
        self.handler = None;
    }

    /// Display name of the loaded file
    pub fn filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(DEFAULT_FILENAME)
    }

    /// Check the password against the document
    pub fn verify_password(&mut self) -> PDFDecryptResult<bool> {
        if self.content.is_none() {
            return Err(PDFDecryptError::NoDocument);
        }
        let password = self.password.clone().ok_or(PDFDecryptError::PasswordNotSet)?;
        let dictionary = self.document()?.find_encrypt_dictionary()?;
        let mut handler = StandardSecurityHandler::new(&dictionary, password)?;
        let verified = handler.verify_password()?;
        self.handler = Some(handler);
        Ok(verified)
    }

    /// Decrypt the document and return the unencrypted bytes
    pub fn decrypt(&mut self) -> PDFDecryptResult<Vec<u8>> {
        let verified = match self.handler.as_ref().map(|h| h.password().is_verified()) {
            Some(verified) => verified,
            None => self.verify_password()?,
        };
        if !verified {
            return Err(PDFDecryptError::AuthenticationFailed);
        }

        self.document()?;
        let (Some(document), Some(handler)) = (self.document.as_ref(), self.handler.as_mut()) else {
            return Err(PDFDecryptError::NoDocument);
        };
        if !handler.prepare()? {
            return Err(PDFDecryptError::DecryptionUnavailable(
                "no file key could be derived".to_string(),
            ));
        }
        debug!("Decrypting {} as {:?}", self.filename.as_deref().unwrap_or(DEFAULT_FILENAME), handler.state());
        DecryptionEngine::new(handler).decrypt_document(document)
    }

    /// Encryption parameters of the loaded document
    pub fn encryption_info(&mut self) -> PDFDecryptResult<EncryptionInfo> {
        let data = EncryptData::new(&self.document()?.find_encrypt_dictionary()?)?;
        Ok(EncryptionInfo {
            algorithm: EncryptionAlgorithm::from_data(&data),
            version: data.version(),
            revision: data.revision(),
            permissions: PDFPermissions::from_p(data.permissions()),
            encrypt_metadata: data.encrypt_metadata(),
        })
    }

    /// Handler of the last verification
    pub fn security_handler(&self) -> Option<&StandardSecurityHandler> {
        self.handler.as_ref()
    }

    /// Parsed document, parsing it on first use
    fn document(&mut self) -> PDFDecryptResult<&Document> {
        if self.document.is_none() {
            let content = self.content.as_deref().ok_or(PDFDecryptError::NoDocument)?;
            self.document = Some(Document::parse(content)?);
        }
        self.document.as_ref().ok_or(PDFDecryptError::NoDocument)
    }
}

/// Decrypt a document held in memory
pub fn decrypt(document: &[u8], password: &[u8]) -> PDFDecryptResult<Vec<u8>> {
    if document.is_empty() {
        return Err(PDFDecryptError::NoDocument);
    }
    let mut decrypter = PDFDecrypter::new();
    decrypter.set_document_content(document);
    decrypter.set_password(password);
    decrypter.decrypt()
}

/// Check a password against a document held in memory
pub fn verify(document: &[u8], password: &[u8]) -> PDFDecryptResult<bool> {
    if document.is_empty() {
        return Err(PDFDecryptError::NoDocument);
    }
    let mut decrypter = PDFDecrypter::new();
    decrypter.set_document_content(document);
    decrypter.set_password(password);
    decrypter.verify_password()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::AuthState;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const R2: &[u8] = include_bytes!("../tests/samples/r2_rc4_40.pdf");
    const R4: &[u8] = include_bytes!("../tests/samples/r4_aes128.pdf");
    const R5: &[u8] = include_bytes!("../tests/samples/r5_aes256_metadata.pdf");
    const R6: &[u8] = include_bytes!("../tests/samples/r6_aes256_xref_stream.pdf");

    #[test_log::test]
    fn test_permissions() {
        let perms = PDFPermissions::from_p(-44);
        assert!(perms.has_permission(PDFPermissions::PRINT));
        assert!(perms.has_permission(PDFPermissions::COPY));
        assert!(!perms.has_permission(PDFPermissions::MODIFY));
        assert!(!perms.has_permission(PDFPermissions::ANNOTATE));
        assert!(perms.has_permission(PDFPermissions::PRINT_HIGH));
    }

    #[rstest]
    #[case(R2, EncryptionAlgorithm::RC4_40, 1, 2, true)]
    #[case(R4, EncryptionAlgorithm::AES_128, 4, 4, false)]
    #[case(R5, EncryptionAlgorithm::AES_256, 5, 5, false)]
    #[case(R6, EncryptionAlgorithm::AES_256, 5, 6, true)]
    fn test_encryption_info(
        #[case] document: &[u8],
        #[case] algorithm: EncryptionAlgorithm,
        #[case] version: i64,
        #[case] revision: i64,
        #[case] encrypt_metadata: bool,
    ) -> PDFDecryptResult<()> {
        let mut decrypter = PDFDecrypter::new();
        decrypter.set_document_content(document);
        let info = decrypter.encryption_info()?;
        assert_eq!(info.algorithm, algorithm);
        assert_eq!((info.version, info.revision), (version, revision));
        assert_eq!(info.encrypt_metadata, encrypt_metadata);
        Ok(())
    }

    #[test_log::test]
    fn test_session_errors() {
        let mut decrypter = PDFDecrypter::new();
        assert!(matches!(decrypter.decrypt(), Err(PDFDecryptError::NoDocument)));

        decrypter.set_document_content(R2);
        assert!(matches!(decrypter.decrypt(), Err(PDFDecryptError::PasswordNotSet)));
        assert!(matches!(decrypter.verify_password(), Err(PDFDecryptError::PasswordNotSet)));

        decrypter.set_password("wrong");
        assert!(matches!(decrypter.decrypt(), Err(PDFDecryptError::AuthenticationFailed)));
    }

    #[test_log::test]
    fn test_password_change_resets_verification() -> PDFDecryptResult<()> {
        let mut decrypter = PDFDecrypter::new();
        decrypter.set_document_content(R2);
        decrypter.set_password("wrong");
        assert!(!decrypter.verify_password()?);

        decrypter.set_password("user");
        assert!(decrypter.security_handler().is_none());
        assert!(decrypter.verify_password()?);
        assert_eq!(decrypter.security_handler().map(|h| h.state()), Some(AuthState::UserAuthenticated));
        Ok(())
    }

    #[test_log::test]
    fn test_filename_default() {
        assert_eq!(PDFDecrypter::new().filename(), "document.pdf");
    }

    #[test_log::test]
    fn test_free_functions() -> PDFDecryptResult<()> {
        assert!(matches!(decrypt(b"", b"user"), Err(PDFDecryptError::NoDocument)));
        assert!(verify(R2, b"owner")?);
        assert!(!verify(R2, b"nobody")?);
        Ok(())
    }

    #[test_log::test]
    fn test_not_encrypted() {
        let plain = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\nxref\n0 2\n\
                      0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\n\
                      startxref\n43\n%%EOF\n";
        assert!(matches!(decrypt(plain, b"x"), Err(PDFDecryptError::NotEncrypted)));
    }
}
