//! Stream payload extraction and decoding

use log::trace;

use crate::error::PDFDecryptResult;
use super::dict::{Dictionary, Value};
use super::filter::FilterChain;
use super::lexer::is_whitespace;
use super::predictor::Predictor;

const STREAM: &[u8] = b"stream";
const ENDSTREAM: &[u8] = b"endstream";

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Extract the payload of a stream whose dictionary ended just before
/// `rest`. Returns `None` when no `stream` keyword follows.
pub(crate) fn extract_stream(rest: &[u8], dictionary: &Dictionary) -> Option<Vec<u8>> {
    let keyword = rest.iter().position(|&b| !is_whitespace(b))?;
    if !rest[keyword..].starts_with(STREAM) {
        return None;
    }

    let mut start = keyword + STREAM.len();
    if rest[start..].starts_with(b"\r\n") {
        start += 2;
    } else if matches!(rest.get(start), Some(b'\n') | Some(b'\r')) {
        start += 1;
    }

    // Trust a direct Length when endstream really follows it
    if let Some(length) = dictionary.get_integer("Length").and_then(|l| usize::try_from(l).ok()) {
        if let Some(after) = rest.get(start + length..) {
            let tail = after.iter().position(|&b| !is_whitespace(b)).unwrap_or(after.len());
            if after[tail..].starts_with(ENDSTREAM) {
                trace!("Stream of {} bytes located by Length", length);
                return Some(rest[start..start + length].to_vec());
            }
        }
    }

    let end = match find(&rest[start..], ENDSTREAM) {
        Some(pos) => start + pos,
        None => rest.len(),
    };
    let mut data_end = end;
    if rest[start..data_end].ends_with(b"\r\n") {
        data_end -= 2;
    } else if matches!(rest[start..data_end].last(), Some(b'\n') | Some(b'\r')) {
        data_end -= 1;
    }
    trace!("Stream of {} bytes located by endstream", data_end - start);
    Some(rest[start..data_end].to_vec())
}

/// Filters and predictor declared by a stream dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCodec {
    filters: FilterChain,
    predictor: Predictor,
    columns: usize,
}

impl StreamCodec {
    /// Read `/Filter` and `/DecodeParms` (`Predictor`, `Columns`)
    pub fn from_dictionary(dictionary: &Dictionary) -> PDFDecryptResult<Self> {
        let filters = FilterChain::from_value(dictionary.get("Filter"))?;
        let params = match dictionary.get("DecodeParms") {
            Some(Value::Dictionary(Dictionary::Sequence(items))) => {
                items.iter().find_map(Value::as_dictionary).cloned()
            }
            Some(Value::Dictionary(params)) => Some(params.clone()),
            _ => None,
        };

        let (predictor, columns) = match params {
            Some(params) => (
                Predictor::from_code(params.get_integer("Predictor").unwrap_or(1))?,
                params
                    .get_integer("Columns")
                    .and_then(|c| usize::try_from(c).ok())
                    .unwrap_or(1),
            ),
            None => (Predictor::None, 1),
        };

        Ok(Self { filters, predictor, columns })
    }

    pub fn predictor(&self) -> Predictor {
        self.predictor
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Undo filters, then prediction
    pub fn decode(&self, data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        let inflated = self.filters.decode(data)?;
        self.predictor.decode(self.columns, &inflated)
    }

    /// Apply prediction, then filters
    pub fn encode(&self, data: &[u8]) -> PDFDecryptResult<Vec<u8>> {
        let predicted = self.predictor.encode(self.columns, data)?;
        self.filters.encode(&predicted)
    }
}
