//! Standard security handler: password authentication, key material and
//! per-object decryption

use std::fmt;

use log::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::aes::aes256_ecb_decrypt_block;
use crate::error::{PDFDecryptError, PDFDecryptResult};
use crate::pdf::{Dictionary, StringObject};

mod authentication;
mod encrypt_data;
mod key_derivation;
mod object_encryption;
mod password;

pub use encrypt_data::{CryptFilterMethod, EncryptData};
pub use key_derivation::{
    complete_encryption_key, compute_decryption_key, compute_hash, pad_password, unpad_password, PADDING,
};
pub use object_encryption::compute_object_key;
pub use password::{Password, PasswordType};

/// Authentication progress of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    OwnerAuthenticated,
    UserAuthenticated,
    Failed,
}

/// Decrypter for documents protected by the standard security handler
pub struct StandardSecurityHandler {
    data: EncryptData,
    password: Password,
    decryption_key: Option<Zeroizing<Vec<u8>>>,
    recovered_user_password: Option<Zeroizing<Vec<u8>>>,
    state: AuthState,
}

impl StandardSecurityHandler {
    /// Handler for an encryption dictionary that carries the document `ID`
    pub fn new(dictionary: &Dictionary, password: Password) -> PDFDecryptResult<Self> {
        Ok(Self::with_data(EncryptData::new(dictionary)?, password))
    }

    pub fn with_data(data: EncryptData, password: Password) -> Self {
        Self {
            data,
            password,
            decryption_key: None,
            recovered_user_password: None,
            state: AuthState::Unauthenticated,
        }
    }

    pub fn encrypt_data(&self) -> &EncryptData {
        &self.data
    }

    pub fn password(&self) -> &Password {
        &self.password
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// File key, once authentication or preparation produced one
    pub fn decryption_key(&self) -> Option<&[u8]> {
        self.decryption_key.as_deref().map(Vec::as_slice)
    }

    /// User password recovered from `O` by an owner login (revisions 2 to 4)
    pub fn recovered_user_password(&self) -> Option<&[u8]> {
        self.recovered_user_password.as_deref().map(Vec::as_slice)
    }

    /// Make the handler ready to decrypt content. Requires a verified
    /// password and returns whether a file key is available.
    pub fn prepare(&mut self) -> PDFDecryptResult<bool> {
        let kind = match (self.password.is_verified(), self.password.kind()) {
            (true, Some(kind)) => kind,
            _ => {
                return Err(PDFDecryptError::AuthenticationRequired(
                    "the correct password has not been verified".to_string(),
                ))
            }
        };

        if self.data.method().is_none() {
            let method = if self.data.version() == 5 || self.data.length() == 256 {
                Some(CryptFilterMethod::AesV3)
            } else if self.data.version() < 4 || self.data.length() == 40 {
                Some(CryptFilterMethod::V2)
            } else {
                None
            };
            debug!("Crypt filter method inferred as {:?}", method.map(|m| m.name()));
            self.data.set_method(method);
        }

        if self.decryption_key.is_none() && self.data.version() == 5 {
            match complete_encryption_key(&self.data, self.password.content(), kind) {
                Ok(key) => {
                    self.check_perms(&key);
                    self.decryption_key = Some(key);
                }
                Err(e) => warn!("Unable to derive the file key: {}", e),
            }
        }

        Ok(self.decryption_key.is_some())
    }

    #[cfg(test)]
    pub(crate) fn set_decryption_key(&mut self, key: &[u8]) {
        self.decryption_key = Some(Zeroizing::new(key.to_vec()));
    }

    /// Compare the decrypted `Perms` block with `P`
    fn check_perms(&self, key: &[u8]) {
        let Some(perms) = self.data.perms() else {
            return;
        };
        match aes256_ecb_decrypt_block(key, perms) {
            Some(block) if &block[9..12] == b"adb" && block[..4] == self.data.permissions().to_le_bytes() => {
                debug!("Perms entry matches P");
            }
            Some(_) => warn!("Perms entry does not match P; continuing"),
            None => warn!("Perms entry cannot be decrypted; continuing"),
        }
    }
}

impl fmt::Debug for StandardSecurityHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardSecurityHandler")
            .field("data", &self.data)
            .field("password", &self.password)
            .field("state", &self.state)
            .field("has_key", &self.decryption_key.is_some())
            .finish()
    }
}
