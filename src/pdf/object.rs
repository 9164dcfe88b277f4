//! Addressable document objects

use std::fmt;

use log::trace;

use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::dict::{Dictionary, Value};
use super::lexer::is_whitespace;
use super::stream::{extract_stream, find};

/// Structural keywords that introduce an object without a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Xref,
    Trailer,
    StartXref,
}

impl Marker {
    pub fn keyword(&self) -> &'static str {
        match self {
            Marker::Xref => "xref",
            Marker::Trailer => "trailer",
            Marker::StartXref => "startxref",
        }
    }

    /// Case-insensitive keyword lookup
    pub fn from_keyword(word: &[u8]) -> Option<Self> {
        [Marker::Xref, Marker::Trailer, Marker::StartXref]
            .into_iter()
            .find(|m| word.eq_ignore_ascii_case(m.keyword().as_bytes()))
    }
}

/// Normalised object address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Object { number: u32, generation: u16 },
    Marker(Marker),
}

impl Address {
    pub fn object(number: u32, generation: u16) -> Self {
        Address::Object { number, generation }
    }

    /// Normalise `N G obj`, `N G R` or a marker keyword
    pub fn parse(text: &str) -> PDFDecryptResult<Self> {
        let invalid = || PDFDecryptError::InvalidAddress(text.to_string());
        let trimmed = text.trim();
        if let Some(marker) = Marker::from_keyword(trimmed.as_bytes()) {
            return Ok(Address::Marker(marker));
        }

        let digits_end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let number = trimmed[..digits_end].parse::<u32>().map_err(|_| invalid())?;
        let rest = trimmed[digits_end..].trim_start();
        let generation_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let generation = rest[..generation_end].parse::<u16>().map_err(|_| invalid())?;
        match rest[generation_end..].trim_start() {
            "obj" | "R" => Ok(Address::object(number, generation)),
            _ => Err(invalid()),
        }
    }

    pub fn number(&self) -> Option<u32> {
        match self {
            Address::Object { number, .. } => Some(*number),
            Address::Marker(_) => None,
        }
    }

    pub fn generation(&self) -> Option<u16> {
        match self {
            Address::Object { generation, .. } => Some(*generation),
            Address::Marker(_) => None,
        }
    }

    pub fn marker(&self) -> Option<Marker> {
        match self {
            Address::Marker(marker) => Some(*marker),
            Address::Object { .. } => None,
        }
    }

    /// Identity shared by every occurrence of this address
    pub fn id(&self) -> ObjectId {
        match self {
            Address::Object { number, .. } => ObjectId::Number(*number),
            Address::Marker(marker) => ObjectId::Marker(*marker),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Object { number, generation } => write!(f, "{} {} obj", number, generation),
            Address::Marker(marker) => f.write_str(marker.keyword()),
        }
    }
}

/// Object number or structural marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Number(u32),
    Marker(Marker),
}

/// Key of an object in a document. The latest occurrence of an id is live;
/// earlier occurrences carry a document-wide sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub id: ObjectId,
    pub superseded: Option<u32>,
}

impl ObjectKey {
    pub fn live(id: ObjectId) -> Self {
        Self { id, superseded: None }
    }

    pub fn number(number: u32) -> Self {
        Self::live(ObjectId::Number(number))
    }

    pub fn marker(marker: Marker) -> Self {
        Self::live(ObjectId::Marker(marker))
    }

    pub fn is_live(&self) -> bool {
        self.superseded.is_none()
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.id, ObjectId::Marker(_))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            ObjectId::Number(n) => write!(f, "{}", n)?,
            ObjectId::Marker(m) => f.write_str(m.keyword())?,
        }
        if let Some(sequence) = self.superseded {
            write!(f, "#{}", sequence)?;
        }
        Ok(())
    }
}

/// Content of an object: a dictionary with an optional stream, or a value
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    Dictionary {
        dictionary: Dictionary,
        stream: Option<Vec<u8>>,
    },
    Value(Vec<u8>),
}

/// One addressable unit of a PDF document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentObject {
    address: Address,
    offset: usize,
    body: ObjectBody,
    padding: usize,
}

impl DocumentObject {
    /// Object holding a dictionary and an optional stream. `Length` is
    /// kept in step with the stream when the dictionary declares it.
    pub fn with_dictionary(address: Address, dictionary: Dictionary, stream: Option<Vec<u8>>) -> Self {
        let mut object = Self {
            address,
            offset: 0,
            body: ObjectBody::Dictionary { dictionary, stream: None },
            padding: 0,
        };
        object.set_stream(stream);
        object
    }

    /// Object holding a plain value
    pub fn with_value(address: Address, value: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            offset: 0,
            body: ObjectBody::Value(value.into()),
            padding: 0,
        }
    }

    /// Parse an object from its source bytes. `raw` starts at the address
    /// token, which is `header_len` bytes long.
    pub fn parse(address: Address, raw: &[u8], header_len: usize, offset: usize) -> PDFDecryptResult<Self> {
        let body = raw.get(header_len..).unwrap_or_default();
        let start = body.iter().position(|&b| !is_whitespace(b)).unwrap_or(body.len());
        let body = &body[start..];

        let mut object = if body.starts_with(b"<<") {
            let (dictionary, consumed) = Dictionary::parse_prefix(body).map_err(|e| {
                PDFDecryptError::malformed(format!("Object {}: {}", address, e))
            })?;
            let stream = extract_stream(&body[consumed..], &dictionary);
            trace!(
                "Parsed {} with dictionary{}",
                address,
                if stream.is_some() { " and stream" } else { "" }
            );
            Self {
                address,
                offset: 0,
                body: ObjectBody::Dictionary { dictionary, stream },
                padding: 0,
            }
        } else {
            let terminator: Option<&[u8]> = match address {
                Address::Object { .. } => Some(b"endobj"),
                Address::Marker(Marker::StartXref) => Some(b"%%EOF"),
                Address::Marker(_) => None,
            };
            let end = terminator.and_then(|t| find(body, t)).unwrap_or(body.len());
            Self::with_value(address, trim(&body[..end]))
        };
        object.offset = offset;
        Ok(object)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn set_padding(&mut self, padding: usize) {
        self.padding = padding;
    }

    pub fn body(&self) -> &ObjectBody {
        &self.body
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        match &self.body {
            ObjectBody::Dictionary { dictionary, .. } => Some(dictionary),
            ObjectBody::Value(_) => None,
        }
    }

    pub fn dictionary_mut(&mut self) -> Option<&mut Dictionary> {
        match &mut self.body {
            ObjectBody::Dictionary { dictionary, .. } => Some(dictionary),
            ObjectBody::Value(_) => None,
        }
    }

    pub fn stream(&self) -> Option<&[u8]> {
        match &self.body {
            ObjectBody::Dictionary { stream, .. } => stream.as_deref(),
            ObjectBody::Value(_) => None,
        }
    }

    /// Replace the stream and refresh `Length`. Ignored for value objects.
    pub fn set_stream(&mut self, data: Option<Vec<u8>>) {
        if let ObjectBody::Dictionary { dictionary, stream } = &mut self.body {
            if dictionary.contains_key("Length") {
                let length = data.as_ref().map_or(0, Vec::len);
                dictionary.insert("Length", Value::Integer(length as i64));
            }
            *stream = data;
        }
    }

    pub fn value(&self) -> Option<&[u8]> {
        match &self.body {
            ObjectBody::Value(value) => Some(value),
            ObjectBody::Dictionary { .. } => None,
        }
    }

    /// Whether this is a cross-reference stream
    pub fn is_xref_stream(&self) -> bool {
        self.dictionary()
            .and_then(|d| d.get_name("Type"))
            .is_some_and(|t| t == b"XRef")
    }

    /// Serialise without trailing padding
    fn write_body(&self, output: &mut Vec<u8>) {
        output.push(b'\n');
        output.extend_from_slice(self.address.to_string().as_bytes());
        output.push(b'\n');
        match &self.body {
            ObjectBody::Dictionary { dictionary, stream } => {
                dictionary.write_to(output);
                if let Some(data) = stream {
                    output.extend_from_slice(b"\nstream\n");
                    output.extend_from_slice(data);
                    output.extend_from_slice(b"\r\nendstream");
                }
            }
            ObjectBody::Value(value) => output.extend_from_slice(value),
        }
        match self.address {
            Address::Object { .. } => output.extend_from_slice(b"\nendobj"),
            Address::Marker(Marker::StartXref) => output.extend_from_slice(b"\n%%EOF"),
            Address::Marker(_) => {}
        }
    }

    /// Serialised length without padding
    pub fn natural_len(&self) -> usize {
        let mut output = Vec::new();
        self.write_body(&mut output);
        output.len()
    }

    /// Serialised length including padding
    pub fn len(&self) -> usize {
        self.natural_len() + self.padding
    }

    /// Write the object to output
    pub fn write_to(&self, output: &mut Vec<u8>) {
        self.write_body(output);
        output.extend(std::iter::repeat(b' ').take(self.padding));
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::new();
        self.write_to(&mut output);
        output
    }
}

pub(crate) fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !is_whitespace(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !is_whitespace(b)).map_or(start, |p| p + 1);
    &bytes[start..end.max(start)]
}
