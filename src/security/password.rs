//! Candidate password and its authentication outcome

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::PDFDecryptResult;
use crate::pdf::{ensure_not_empty, StringObject};

/// Which password a candidate turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PasswordType {
    Owner = 1,
    User = 2,
}

/// Password bytes, wiped on drop
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Password {
    content: Vec<u8>,
    #[zeroize(skip)]
    verified: bool,
    #[zeroize(skip)]
    kind: Option<PasswordType>,
}

impl Password {
    /// New unverified password. Empty passwords are allowed.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            verified: false,
            kind: None,
        }
    }

    pub fn set_type(&mut self, kind: PasswordType) {
        self.kind = Some(kind);
    }

    pub fn kind(&self) -> Option<PasswordType> {
        self.kind
    }

    /// Mark as verified against the document
    pub fn verify(&mut self) {
        self.verified = true;
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Forget a previous verification outcome
    pub(crate) fn reset(&mut self) {
        self.verified = false;
        self.kind = None;
    }
}

impl StringObject for Password {
    fn content(&self) -> &[u8] {
        &self.content
    }

    fn set(&mut self, content: Vec<u8>) -> PDFDecryptResult<()> {
        ensure_not_empty(&content)?;
        self.content.zeroize();
        self.content = content;
        self.reset();
        Ok(())
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("content", &"<redacted>")
            .field("verified", &self.verified)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn test_set_resets_outcome() -> PDFDecryptResult<()> {
        let mut password = Password::new("owner");
        password.verify();
        password.set_type(PasswordType::Owner);
        assert!(password.is_verified());

        password.set(b"user".to_vec())?;
        assert_eq!(password.content(), b"user");
        assert!(!password.is_verified());
        assert_eq!(password.kind(), None);
        Ok(())
    }

    #[test]
    fn test_empty_password() {
        let mut password = Password::new("");
        assert!(password.is_empty());
        assert!(password.set(Vec::new()).is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let rendered = format!("{:?}", Password::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(PasswordType::User as u8, 2);
    }
}
