//! Per-object content decryption (Algorithm 1)

use log::trace;
use zeroize::Zeroizing;

use crate::crypto::{AESProvider, CryptoProvider, RC4Provider};
use super::{CryptFilterMethod, StandardSecurityHandler};

/// AES salt appended to the object key input
const AES_SALT: &[u8] = b"sAlT";

/// Object key: `MD5(key ‖ num[0..3] ‖ gen[0..2] ‖ "sAlT" if AES)`,
/// truncated to `min(key length + 5, 16)` bytes
pub fn compute_object_key(file_key: &[u8], number: u32, generation: u16, aes: bool) -> Zeroizing<Vec<u8>> {
    let mut input = Zeroizing::new(Vec::with_capacity(file_key.len() + 9));
    input.extend_from_slice(file_key);
    input.extend_from_slice(&number.to_le_bytes()[..3]);
    input.extend_from_slice(&generation.to_le_bytes());
    if aes {
        input.extend_from_slice(AES_SALT);
    }
    let digest = md5::compute(&*input).0;
    Zeroizing::new(digest[..(file_key.len() + 5).min(16)].to_vec())
}

impl StandardSecurityHandler {
    /// Decrypt one string or stream of object `number`. `None` means the
    /// data should be left unchanged.
    ///
    /// Without a known crypt filter method the first call probes AES and
    /// fixes the method for every later call.
    pub fn decrypt(&mut self, data: &[u8], number: u32, generation: u16) -> Option<Vec<u8>> {
        let file_key = Zeroizing::new(self.decryption_key.as_deref()?.clone());

        if self.data.version() >= 5 {
            return AESProvider::default().decrypt(data, &file_key);
        }

        match self.data.method() {
            Some(CryptFilterMethod::V2) => {
                RC4Provider.decrypt(data, &compute_object_key(&file_key, number, generation, false))
            }
            Some(_) => {
                AESProvider::default().decrypt(data, &compute_object_key(&file_key, number, generation, true))
            }
            None => {
                let aes_key = compute_object_key(&file_key, number, generation, true);
                if let Some(plain) = AESProvider::strict().decrypt(data, &aes_key) {
                    trace!("Object {} decrypts as AES, using AESV2 from now on", number);
                    self.data.set_method(Some(CryptFilterMethod::AesV2));
                    return Some(plain);
                }
                trace!("Object {} does not decrypt as AES, using RC4 from now on", number);
                self.data.set_method(Some(CryptFilterMethod::V2));
                RC4Provider.decrypt(data, &compute_object_key(&file_key, number, generation, false))
            }
        }
    }
}
