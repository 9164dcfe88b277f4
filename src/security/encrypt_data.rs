//! Normalised encryption dictionary

use log::debug;

use crate::error::{PDFDecryptError, PDFDecryptResult};
use crate::pdf::{Dictionary, Value};

/// Crypt filter method (`CFM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptFilterMethod {
    /// RC4
    V2,
    /// AES-128-CBC
    AesV2,
    /// AES-256-CBC
    AesV3,
}

impl CryptFilterMethod {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"V2" => Some(Self::V2),
            b"AESV2" => Some(Self::AesV2),
            b"AESV3" => Some(Self::AesV3),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::V2 => "V2",
            Self::AesV2 => "AESV2",
            Self::AesV3 => "AESV3",
        }
    }

    pub fn is_aes(&self) -> bool {
        !matches!(self, Self::V2)
    }
}

/// Encryption parameters of the standard security handler
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptData {
    version: i64,
    revision: i64,
    length: i64,
    owner: Vec<u8>,
    user: Vec<u8>,
    owner_encryption: Option<Vec<u8>>,
    user_encryption: Option<Vec<u8>>,
    perms: Option<Vec<u8>>,
    permissions: i32,
    encrypt_metadata: bool,
    method: Option<CryptFilterMethod>,
    id: Vec<u8>,
}

impl EncryptData {
    /// Read an encryption dictionary whose `ID` entry holds the document
    /// identifier
    pub fn new(dictionary: &Dictionary) -> PDFDecryptResult<Self> {
        match dictionary.get_name("Filter") {
            Some(b"Standard") => {}
            Some(other) => {
                return Err(PDFDecryptError::UnsupportedSecurityHandler(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
            None => {
                return Err(PDFDecryptError::UnsupportedSecurityHandler(
                    "missing /Filter".to_string(),
                ))
            }
        }

        let version = dictionary.get_integer("V").unwrap_or(0);
        let revision = dictionary
            .get_integer("R")
            .ok_or_else(|| PDFDecryptError::malformed("Encryption dictionary without /R"))?;

        let crypt_filter = crypt_filter(dictionary);
        let length = match dictionary.get_integer("Length") {
            Some(length) => length,
            None if version == 4 => match crypt_filter.and_then(|cf| cf.get_integer("Length")) {
                Some(bytes) if bytes <= 32 => bytes * 8,
                Some(bits) => bits,
                None => 128,
            },
            None if version >= 5 => 256,
            None => 40,
        };

        let required = |key: &str| {
            dictionary
                .get_bytes(key)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| PDFDecryptError::malformed(format!("Encryption dictionary without /{}", key)))
        };
        let optional = |key: &str| dictionary.get_bytes(key).map(<[u8]>::to_vec);

        let encrypt_metadata = match dictionary.get("EncryptMetadata") {
            Some(Value::Boolean(value)) => *value,
            Some(Value::Name(name)) | Some(Value::Raw(name)) => !name.eq_ignore_ascii_case(b"false"),
            _ => true,
        };

        let data = Self {
            version,
            revision,
            length,
            owner: required("O")?,
            user: required("U")?,
            owner_encryption: optional("OE"),
            user_encryption: optional("UE"),
            perms: optional("Perms"),
            permissions: dictionary.get_integer("P").unwrap_or(0) as i32,
            encrypt_metadata,
            method: crypt_filter
                .and_then(|cf| cf.get_name("CFM"))
                .and_then(CryptFilterMethod::from_name),
            id: optional("ID").unwrap_or_default(),
        };
        debug!(
            "Encryption: V {} R {} Length {} CFM {:?} EncryptMetadata {}",
            data.version,
            data.revision,
            data.length,
            data.method.map(|m| m.name()),
            data.encrypt_metadata
        );
        Ok(data)
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Key length in bits
    pub fn length(&self) -> i64 {
        self.length
    }

    /// `O` entry
    pub fn owner(&self) -> &[u8] {
        &self.owner
    }

    /// `U` entry
    pub fn user(&self) -> &[u8] {
        &self.user
    }

    /// `OE` entry
    pub fn owner_encryption(&self) -> Option<&[u8]> {
        self.owner_encryption.as_deref()
    }

    /// `UE` entry
    pub fn user_encryption(&self) -> Option<&[u8]> {
        self.user_encryption.as_deref()
    }

    pub fn perms(&self) -> Option<&[u8]> {
        self.perms.as_deref()
    }

    /// `P` entry
    pub fn permissions(&self) -> i32 {
        self.permissions
    }

    pub fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    pub fn method(&self) -> Option<CryptFilterMethod> {
        self.method
    }

    pub fn set_method(&mut self, method: Option<CryptFilterMethod>) {
        self.method = method;
    }

    /// First element of the document `ID`
    pub fn id(&self) -> &[u8] {
        &self.id
    }
}

/// Crypt filter named by `StmF`, falling back to `StdCF`
fn crypt_filter(dictionary: &Dictionary) -> Option<&Dictionary> {
    let filters = dictionary.get_dictionary("CF")?;
    let name = dictionary
        .get_name("StmF")
        .and_then(|n| std::str::from_utf8(n).ok())
        .unwrap_or("StdCF");
    filters
        .get_dictionary(name)
        .or_else(|| filters.get_dictionary("StdCF"))
}
