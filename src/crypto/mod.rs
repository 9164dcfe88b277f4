//! Cipher primitives and the decryption engine

pub mod aes;
pub mod rc4;
mod engine;

pub use engine::DecryptionEngine;
pub(crate) use self::aes::AESProvider;
pub(crate) use self::rc4::RC4Provider;

/// Content cipher applied to a single string or stream
pub(crate) trait CryptoProvider {
    /// Decrypt `data` under `key`. `None` means the data could not be
    /// decrypted and should be left as it is.
    fn decrypt(&self, data: &[u8], key: &[u8]) -> Option<Vec<u8>>;
}
