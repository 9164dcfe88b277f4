//! Key derivation for the standard security handler (revisions 2 to 6)

use log::trace;
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::crypto::aes::{aes_cbc_decrypt_raw, aes_cbc_encrypt};
use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::encrypt_data::EncryptData;
use super::password::PasswordType;

/// Password padding string
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41,
    0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80,
    0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Longest password used by revision 6
const MAX_R6_PASSWORD: usize = 127;

/// Pad or truncate a password to 32 bytes
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Strip trailing padding from a recovered 32-byte password
pub fn unpad_password(padded: &[u8]) -> Vec<u8> {
    let end = (0..padded.len())
        .find(|&i| {
            let tail = &padded[i..];
            tail.len() <= PADDING.len() && tail == &PADDING[..tail.len()]
        })
        .unwrap_or(padded.len());
    padded[..end].to_vec()
}

/// Bytes `start..end` of an entry, or `MalformedPDF`
pub(crate) fn slice<'a>(bytes: &'a [u8], start: usize, end: usize, what: &str) -> PDFDecryptResult<&'a [u8]> {
    bytes
        .get(start..end)
        .ok_or_else(|| PDFDecryptError::malformed(format!("/{} is too short", what)))
}

/// Key length in bytes for revisions 3 and 4
pub(crate) fn key_length(data: &EncryptData) -> usize {
    (data.length() / 8).clamp(5, 16) as usize
}

fn md5(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

/// Algorithm 2: file key from a password. With `owner` set this yields the
/// RC4 key that protects the `O` entry instead.
pub fn compute_decryption_key(data: &EncryptData, password: &[u8], owner: bool) -> Zeroizing<Vec<u8>> {
    let n = key_length(data);
    let mut input = Zeroizing::new(pad_password(password).to_vec());
    if !owner {
        let o = data.owner();
        input.extend_from_slice(&o[..o.len().min(32)]);
        input.extend_from_slice(&data.permissions().to_le_bytes());
        input.extend_from_slice(data.id());
        if data.revision() >= 4 && !data.encrypt_metadata() {
            input.extend_from_slice(&[0xff; 4]);
        }
    }

    let mut digest = Zeroizing::new(md5(&input));
    if data.revision() >= 3 {
        for _ in 0..50 {
            *digest = md5(&digest[..n]);
        }
    }

    let len = if data.revision() == 2 { 5 } else { n };
    Zeroizing::new(digest[..len].to_vec())
}

/// Algorithm 2.B. Hashes `password ‖ salt ‖ user_key`; revision 6 then
/// iterates until the termination predicate holds. Returns the 32-byte hash
/// and the number of rounds run.
pub fn compute_hash(
    password: &[u8],
    salt: &[u8],
    user_key: &[u8],
    revision: i64,
) -> PDFDecryptResult<(Zeroizing<Vec<u8>>, usize)> {
    let password = if revision >= 6 {
        &password[..password.len().min(MAX_R6_PASSWORD)]
    } else {
        password
    };

    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    hasher.update(user_key);
    let mut k = Zeroizing::new(hasher.finalize().to_vec());

    let mut round = 0;
    if revision >= 6 {
        loop {
            let mut block = Zeroizing::new(Vec::with_capacity(password.len() + k.len() + user_key.len()));
            block.extend_from_slice(password);
            block.extend_from_slice(&k);
            block.extend_from_slice(user_key);
            let k1 = Zeroizing::new(block.repeat(64));

            let e = Zeroizing::new(aes_cbc_encrypt(&k[..16], &k1, &k[16..32])?);
            let selector: u32 = e[..16].iter().map(|&b| u32::from(b)).sum();
            *k = match selector % 3 {
                0 => Sha256::digest(&*e).to_vec(),
                1 => Sha384::digest(&*e).to_vec(),
                _ => Sha512::digest(&*e).to_vec(),
            };

            round += 1;
            let last = e.last().copied().unwrap_or_default() as usize;
            if round >= 64 && last <= round - 32 {
                break;
            }
        }
        trace!("Revision 6 hash finished after {} rounds", round);
    }

    k.truncate(32);
    Ok((k, round))
}

/// Recover the V5 file key from `OE` or `UE`
pub fn complete_encryption_key(
    data: &EncryptData,
    password: &[u8],
    kind: PasswordType,
) -> PDFDecryptResult<Zeroizing<Vec<u8>>> {
    let u = data.user();
    let o = data.owner();
    let (key_hash, encrypted) = match kind {
        PasswordType::Owner => {
            let salt = slice(o, 40, 48, "O")?;
            let (hash, _) = compute_hash(password, salt, slice(u, 0, 48, "U")?, data.revision())?;
            let oe = data
                .owner_encryption()
                .ok_or_else(|| PDFDecryptError::malformed("Encryption dictionary without /OE"))?;
            (hash, oe)
        }
        PasswordType::User => {
            let salt = slice(u, 40, 48, "U")?;
            let (hash, _) = compute_hash(password, salt, &[], data.revision())?;
            let ue = data
                .user_encryption()
                .ok_or_else(|| PDFDecryptError::malformed("Encryption dictionary without /UE"))?;
            (hash, ue)
        }
    };

    let encrypted = slice(encrypted, 0, 32, if kind == PasswordType::Owner { "OE" } else { "UE" })?;
    let key = aes_cbc_decrypt_raw(&key_hash, encrypted, &[0u8; 16])
        .ok_or_else(|| PDFDecryptError::malformed("Unable to decrypt the file key"))?;
    Ok(Zeroizing::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::Dictionary;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(b"", b"")]
    #[case(b"user", b"user")]
    #[case(b"0123456789abcdef0123456789abcdefXYZ", b"0123456789abcdef0123456789abcdef")]
    fn test_pad_unpad(#[case] password: &[u8], #[case] expected: &[u8]) {
        let padded = pad_password(password);
        assert_eq!(unpad_password(&padded), expected.to_vec());
    }

    #[test_log::test]
    fn test_padding_prefix() {
        let padded = pad_password(b"ab");
        assert_eq!(&padded[..2], b"ab");
        assert_eq!(&padded[2..], &PADDING[..30]);
    }

    fn encrypt_data(text: &str) -> PDFDecryptResult<EncryptData> {
        EncryptData::new(&Dictionary::parse(text.as_bytes())?)
    }

    #[test_log::test]
    fn test_key_lengths() -> PDFDecryptResult<()> {
        let r2 = encrypt_data("<</Filter /Standard /V 1 /R 2 /O <00> /U <00> /P -4>>")?;
        assert_eq!(compute_decryption_key(&r2, b"test", false).len(), 5);
        let r3 = encrypt_data("<</Filter /Standard /V 2 /R 3 /Length 128 /O <00> /U <00> /P -4>>")?;
        assert_eq!(compute_decryption_key(&r3, b"test", false).len(), 16);
        assert_eq!(compute_decryption_key(&r3, b"test", true).len(), 16);
        Ok(())
    }

    #[test_log::test]
    fn test_r2_user_key_vector() -> PDFDecryptResult<()> {
        // MD5(pad("") ‖ O ‖ P ‖ ID), first 5 bytes
        let data = encrypt_data(
            "<</Filter /Standard /V 1 /R 2 /P -4 \
             /O <0000000000000000000000000000000000000000000000000000000000000000> /U <00> \
             /ID <00112233445566778899aabbccddeeff>>>",
        )?;
        let mut input = PADDING.to_vec();
        input.extend_from_slice(&[0u8; 32]);
        input.extend_from_slice(&(-4i32).to_le_bytes());
        input.extend_from_slice(&hex::decode("00112233445566778899aabbccddeeff").unwrap());
        assert_eq!(
            compute_decryption_key(&data, b"", false).to_vec(),
            md5::compute(&input).0[..5].to_vec()
        );
        Ok(())
    }

    #[test_log::test]
    fn test_r5_hash_is_single_sha256() -> PDFDecryptResult<()> {
        let (hash, rounds) = compute_hash(b"pw", b"saltsalt", b"", 5)?;
        assert_eq!(rounds, 0);
        assert_eq!(hash.to_vec(), Sha256::digest(b"pwsaltsalt").to_vec());
        Ok(())
    }

    #[rstest]
    #[case::user(
        b"user",
        "cf680830b495a636",
        Vec::new(),
        "f262a49fdc2b8e7d0440f417cdc783f5fc7c40ba284634021a55a18f1b47e351",
        76
    )]
    #[case::owner(
        b"owner",
        "a2277b7483cc3979",
        (0u8..48).collect(),
        "bec781c98bc424e4a8487525c431f6ca1778692bfd67f4e0894a635d2f4f8c40",
        75
    )]
    fn test_r6_hash_vectors(
        #[case] password: &[u8],
        #[case] salt: &str,
        #[case] user_key: Vec<u8>,
        #[case] expected: &str,
        #[case] expected_rounds: usize,
    ) -> PDFDecryptResult<()> {
        let salt = hex::decode(salt).unwrap();
        let (hash, rounds) = compute_hash(password, &salt, &user_key, 6)?;
        assert_eq!(hex::encode(&*hash), expected);
        assert_eq!(rounds, expected_rounds);
        Ok(())
    }

    #[test_log::test]
    fn test_r6_password_truncated() -> PDFDecryptResult<()> {
        let long = vec![b'a'; 200];
        let (full, _) = compute_hash(&long, b"saltsalt", b"", 6)?;
        let (truncated, _) = compute_hash(&long[..MAX_R6_PASSWORD], b"saltsalt", b"", 6)?;
        assert_eq!(full.to_vec(), truncated.to_vec());
        Ok(())
    }
}
