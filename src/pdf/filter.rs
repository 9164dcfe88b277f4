//! PDF stream filters

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::trace;

use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::dict::Value;

/// PDF stream filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    FlateDecode,
}

impl Filter {
    /// Create filter from name
    pub fn from_name(name: &[u8]) -> PDFDecryptResult<Self> {
        match name {
            b"FlateDecode" => Ok(Filter::FlateDecode),
            other => Err(PDFDecryptError::UnsupportedFilter(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    /// Decode data using this filter
    pub fn decode(&self, data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        match self {
            Filter::FlateDecode => decode_flate(data),
        }
    }

    /// Encode data using this filter
    pub fn encode(&self, data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        match self {
            Filter::FlateDecode => encode_flate(data),
        }
    }
}

fn decode_flate(data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::with_capacity(data.len() * 2);
    decoder
        .read_to_end(&mut output)
        .map_err(|e| PDFDecryptError::CompressionError(e.to_string()))?;
    Ok(output)
}

fn encode_flate(data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PDFDecryptError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PDFDecryptError::CompressionError(e.to_string()))
}

/// Ordered list of filters applied to a stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    /// Build from a `/Filter` value: a single name or an array of names
    pub fn from_value(value: Option<&Value>) -> PDFDecryptResult<Self> {
        let filters = match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Name(name)) => vec![Filter::from_name(name)?],
            Some(value) => match value.as_array() {
                Some(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::Name(name) => Filter::from_name(name),
                        other => Err(PDFDecryptError::malformed(format!(
                            "Invalid filter entry: {}",
                            String::from_utf8_lossy(&other.to_bytes())
                        ))),
                    })
                    .collect::<PDFDecryptResult<Vec<_>>>()?,
                None => {
                    return Err(PDFDecryptError::malformed(format!(
                        "Invalid filter value: {}",
                        String::from_utf8_lossy(&value.to_bytes())
                    )))
                }
            },
        };
        Ok(Self { filters })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Decode with every filter in declared order
    pub fn decode(&self, data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        let mut data = data.to_vec();
        for filter in &self.filters {
            trace!("Decoding {} bytes with {:?}", data.len(), filter);
            data = filter.decode(&data)?;
        }
        Ok(data)
    }

    /// Encode with every filter in reverse order
    pub fn encode(&self, data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        let mut data = data.to_vec();
        for filter in self.filters.iter().rev() {
            trace!("Encoding {} bytes with {:?}", data.len(), filter);
            data = filter.encode(&data)?;
        }
        Ok(data)
    }
}
