//! AES-CBC helpers for the AESV2 and AESV3 crypt filter methods

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use cbc::{Decryptor, Encryptor};

use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::CryptoProvider;

type Aes128CbcDec = Decryptor<aes::Aes128>;
type Aes256CbcDec = Decryptor<aes::Aes256>;
type Aes128CbcEnc = Encryptor<aes::Aes128>;
type Aes256CbcEnc = Encryptor<aes::Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

fn encrypt_blocks<E: KeyIvInit + BlockEncryptMut>(key: &[u8], iv: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let cipher = E::new_from_slices(key, iv).ok()?;
    let mut buf = data.to_vec();
    cipher.encrypt_padded_mut::<NoPadding>(&mut buf, data.len()).ok()?;
    Some(buf)
}

fn decrypt_blocks<D: KeyIvInit + BlockDecryptMut>(key: &[u8], iv: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    let cipher = D::new_from_slices(key, iv).ok()?;
    let mut buf = data.to_vec();
    cipher.decrypt_padded_mut::<NoPadding>(&mut buf).ok()?;
    Some(buf)
}

/// Encrypt with AES-CBC, zero-extending the plaintext to a whole number of
/// blocks. The IV is not prepended to the output.
pub fn aes_cbc_encrypt(key: &[u8], plaintext: &[u8], iv: &[u8]) -> PDFDecryptResult<Vec<u8>> {
    let mut data = plaintext.to_vec();
    let rem = data.len() % BLOCK_SIZE;
    if rem != 0 {
        data.resize(data.len() + BLOCK_SIZE - rem, 0);
    }

    let encrypted = match key.len() {
        16 => encrypt_blocks::<Aes128CbcEnc>(key, iv, &data),
        32 => encrypt_blocks::<Aes256CbcEnc>(key, iv, &data),
        other => return Err(PDFDecryptError::InvalidKeyLength(other)),
    };
    encrypted.ok_or_else(|| PDFDecryptError::malformed("AES initialisation vector must be 16 bytes"))
}

/// Decrypt AES-CBC blocks without removing any padding.
///
/// Returns `None` for an unaligned ciphertext, or a key that is neither 16
/// nor 32 bytes. An empty ciphertext decrypts to nothing.
pub fn aes_cbc_decrypt_raw(key: &[u8], ciphertext: &[u8], iv: &[u8]) -> Option<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 || !matches!(key.len(), 16 | 32) {
        return None;
    }
    match key.len() {
        _ if ciphertext.is_empty() => Some(Vec::new()),
        16 => decrypt_blocks::<Aes128CbcDec>(key, iv, ciphertext),
        _ => decrypt_blocks::<Aes256CbcDec>(key, iv, ciphertext),
    }
}

/// Decrypt AES-CBC and require valid PKCS#7 padding
pub fn aes_cbc_decrypt_strict(key: &[u8], ciphertext: &[u8], iv: &[u8]) -> Option<Vec<u8>> {
    let plain = aes_cbc_decrypt_raw(key, ciphertext, iv)?;
    pkcs7_unpad(&plain).map(<[u8]>::to_vec)
}

/// Decrypt AES-CBC, removing PKCS#7 padding when it is valid and otherwise
/// returning the blocks as zero-padded plaintext.
pub fn aes_cbc_decrypt(key: &[u8], ciphertext: &[u8], iv: &[u8]) -> Option<Vec<u8>> {
    let plain = aes_cbc_decrypt_raw(key, ciphertext, iv)?;
    match pkcs7_unpad(&plain) {
        Some(unpadded) => Some(unpadded.to_vec()),
        None => Some(plain),
    }
}

/// Decrypt one AES-256 block in ECB mode
pub fn aes256_ecb_decrypt_block(key: &[u8], block: &[u8]) -> Option<[u8; BLOCK_SIZE]> {
    if block.len() != BLOCK_SIZE {
        return None;
    }
    let cipher = aes::Aes256::new_from_slice(key).ok()?;
    let mut buf = aes::Block::clone_from_slice(block);
    cipher.decrypt_block(&mut buf);
    let mut out = [0u8; BLOCK_SIZE];
    out.copy_from_slice(&buf);
    Some(out)
}

/// Strip PKCS#7 padding, or `None` if the padding is invalid
pub fn pkcs7_unpad(data: &[u8]) -> Option<&[u8]> {
    let pad_len = *data.last()? as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return None;
    }
    let start = data.len() - pad_len;
    if data[start..].iter().all(|&b| b as usize == pad_len) {
        Some(&data[..start])
    } else {
        None
    }
}

/// AES provider for data laid out as `IV || ciphertext`
#[derive(Debug, Default)]
pub(crate) struct AESProvider {
    strict: bool,
}

impl AESProvider {
    /// Provider that accepts only correctly padded plaintext
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

impl CryptoProvider for AESProvider {
    fn decrypt(&self, data: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        if data.len() < BLOCK_SIZE {
            return None;
        }
        let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
        if self.strict {
            aes_cbc_decrypt_strict(key, ciphertext, iv)
        } else {
            aes_cbc_decrypt(key, ciphertext, iv)
        }
    }
}
