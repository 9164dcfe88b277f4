//! RC4 stream cipher used by the V2 crypt filter method

use ::rc4::consts::{
    U1, U10, U11, U12, U13, U14, U15, U16, U2, U256, U3, U4, U5, U6, U7, U8, U9,
};
use ::rc4::{KeyInit, Rc4, StreamCipher};

use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::CryptoProvider;

/// Longest key the RC4 key schedule can use
const MAX_KEY_LEN: usize = 256;

/// XOR the RC4 keystream into `data` in place. Keys are 1 to 256 bytes.
pub fn rc4_apply(key: &[u8], data: &mut [u8]) -> PDFDecryptResult<()> {
    match key.len() {
        1 => rc4_apply_sized::<U1>(key, data),
        2 => rc4_apply_sized::<U2>(key, data),
        3 => rc4_apply_sized::<U3>(key, data),
        4 => rc4_apply_sized::<U4>(key, data),
        5 => rc4_apply_sized::<U5>(key, data),
        6 => rc4_apply_sized::<U6>(key, data),
        7 => rc4_apply_sized::<U7>(key, data),
        8 => rc4_apply_sized::<U8>(key, data),
        9 => rc4_apply_sized::<U9>(key, data),
        10 => rc4_apply_sized::<U10>(key, data),
        11 => rc4_apply_sized::<U11>(key, data),
        12 => rc4_apply_sized::<U12>(key, data),
        13 => rc4_apply_sized::<U13>(key, data),
        14 => rc4_apply_sized::<U14>(key, data),
        15 => rc4_apply_sized::<U15>(key, data),
        16 => rc4_apply_sized::<U16>(key, data),
        // the key schedule reads key[i % len], so repeating the key out to
        // 256 bytes gives the same state
        17..=MAX_KEY_LEN => {
            let expanded: Vec<u8> = key.iter().copied().cycle().take(MAX_KEY_LEN).collect();
            rc4_apply_sized::<U256>(&expanded, data)
        }
        n => Err(PDFDecryptError::InvalidKeyLength(n)),
    }
}

fn rc4_apply_sized<K>(key: &[u8], data: &mut [u8]) -> PDFDecryptResult<()>
where
    Rc4<K>: KeyInit + StreamCipher,
{
    let mut cipher =
        Rc4::<K>::new_from_slice(key).map_err(|_| PDFDecryptError::InvalidKeyLength(key.len()))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// One-shot RC4 over `data`
pub fn rc4(key: &[u8], data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
    let mut out = data.to_vec();
    rc4_apply(key, &mut out)?;
    Ok(out)
}

/// RC4 provider for the V2 crypt filter method
#[derive(Debug, Default)]
pub(crate) struct RC4Provider;

impl CryptoProvider for RC4Provider {
    fn decrypt(&self, data: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        rc4(key, data).ok()
    }
}
