//! Cross-reference tables and streams

use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;
use log::{trace, warn};

use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::dict::Value;
use super::object::{DocumentObject, ObjectKey};
use super::stream::StreamCodec;

/// How the document stores its cross-reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    /// Classic `xref` sections followed by `trailer` dictionaries
    Table,
    /// `/Type /XRef` stream objects
    Stream,
}

/// Cross-reference structure of a document
#[derive(Debug, Clone, PartialEq)]
pub struct XRefInfo {
    pub kind: XRefKind,
    /// Cross-reference objects, newest first
    pub chain: Vec<ObjectKey>,
    /// Referencing object (`startxref`, trailer or xref stream with `Prev`)
    /// to the cross-reference object it points at
    pub links: IndexMap<ObjectKey, ObjectKey>,
}

impl XRefInfo {
    pub fn new(kind: XRefKind) -> Self {
        Self {
            kind,
            chain: Vec::new(),
            links: IndexMap::new(),
        }
    }

    /// Newest cross-reference object
    pub fn newest(&self) -> Option<ObjectKey> {
        self.chain.first().copied()
    }

    /// Target of a recorded link
    pub fn link(&self, from: &ObjectKey) -> Option<ObjectKey> {
        self.links.get(from).copied()
    }
}

/// Single entry of a classic cross-reference section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    pub offset: u64,
    pub generation: u32,
    pub in_use: bool,
}

/// Run of consecutive entries starting at an object number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefSubsection {
    pub start: u32,
    pub entries: Vec<XRefEntry>,
}

/// Parsed body of a classic `xref` section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XRefTable {
    subsections: Vec<XRefSubsection>,
}

impl XRefTable {
    /// Parse the text following the `xref` keyword
    pub fn parse(text: &[u8]) -> PDFDecryptResult<Self> {
        let mut tokens = text
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty());
        let mut subsections = Vec::new();

        while let Some(start) = tokens.next() {
            let start: u32 = parse_number(start, "xref start number")?;
            let count: u32 = parse_number(
                tokens.next().ok_or_else(|| PDFDecryptError::malformed("Missing xref count"))?,
                "xref count",
            )?;

            let mut entries = Vec::new();
            for _ in 0..count {
                let mut field = || {
                    tokens
                        .next()
                        .ok_or_else(|| PDFDecryptError::malformed("Truncated xref entry"))
                };
                let offset = parse_number(field()?, "xref offset")?;
                let generation = parse_number(field()?, "xref generation")?;
                let in_use = match field()? {
                    b"n" => true,
                    b"f" => false,
                    other => {
                        return Err(PDFDecryptError::malformed(format!(
                            "Invalid xref entry type '{}'",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                entries.push(XRefEntry { offset, generation, in_use });
            }
            subsections.push(XRefSubsection { start, entries });
        }

        Ok(Self { subsections })
    }

    pub fn subsections(&self) -> &[XRefSubsection] {
        &self.subsections
    }

    /// Look up the entry for an object number
    pub fn entry(&self, number: u32) -> Option<&XRefEntry> {
        self.subsections.iter().find_map(|s| {
            number
                .checked_sub(s.start)
                .and_then(|i| s.entries.get(i as usize))
        })
    }

    /// Point every in-use entry at the current offset of its object.
    /// Entries whose object no longer exists become free.
    pub fn relocate(&mut self, offsets: impl Fn(u32) -> Option<usize>) {
        for subsection in &mut self.subsections {
            for (i, entry) in subsection.entries.iter_mut().enumerate() {
                if !entry.in_use {
                    continue;
                }
                let number = subsection.start + i as u32;
                match offsets(number) {
                    Some(offset) => entry.offset = offset as u64,
                    None => {
                        trace!("Object {} is gone, marking its xref entry free", number);
                        entry.offset = 0;
                        entry.in_use = false;
                    }
                }
            }
        }
    }

    /// Serialise with 20-byte entries. The final entry's line break is
    /// supplied by the object that follows.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut lines = Vec::new();
        for subsection in &self.subsections {
            lines.push(format!("{} {}", subsection.start, subsection.entries.len()));
            for entry in &subsection.entries {
                lines.push(format!(
                    "{:010} {:05} {} ",
                    entry.offset,
                    entry.generation,
                    if entry.in_use { 'n' } else { 'f' }
                ));
            }
        }
        lines.join("\n").into_bytes()
    }
}

/// Rebuild the text of a classic `xref` section against current offsets.
/// Returns `None` when the section cannot be parsed.
pub fn rebuild_xref_table(text: &[u8], offsets: impl Fn(u32) -> Option<usize>) -> Option<Vec<u8>> {
    match XRefTable::parse(text) {
        Ok(mut table) => {
            table.relocate(offsets);
            Some(table.to_bytes())
        }
        Err(e) => {
            warn!("Leaving cross-reference section unchanged: {}", e);
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(token: &[u8], what: &str) -> PDFDecryptResult<T> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| {
            PDFDecryptError::malformed(format!(
                "Invalid {} '{}'",
                what,
                String::from_utf8_lossy(token)
            ))
        })
}

fn field_widths(object: &DocumentObject) -> PDFDecryptResult<[usize; 3]> {
    let widths = object
        .dictionary()
        .and_then(|d| d.get_array("W"))
        .ok_or_else(|| PDFDecryptError::malformed("Cross-reference stream without /W"))?;
    if widths.len() != 3 {
        return Err(PDFDecryptError::malformed("/W must have three entries"));
    }
    let mut out = [0usize; 3];
    for (slot, value) in out.iter_mut().zip(widths) {
        *slot = value
            .as_integer()
            .and_then(|w| usize::try_from(w).ok())
            .filter(|w| *w <= 8)
            .ok_or_else(|| PDFDecryptError::malformed("Invalid /W field width"))?;
    }
    Ok(out)
}

/// Object number ranges covered by a cross-reference stream
fn index_ranges(object: &DocumentObject) -> PDFDecryptResult<Vec<(u32, u32)>> {
    let dictionary = object
        .dictionary()
        .ok_or_else(|| PDFDecryptError::malformed("Cross-reference stream without dictionary"))?;
    match dictionary.get_array("Index") {
        Some(index) => index
            .chunks(2)
            .map(|pair| match pair {
                [start, count] => {
                    let start = start.as_integer().and_then(|v| u32::try_from(v).ok());
                    let count = count.as_integer().and_then(|v| u32::try_from(v).ok());
                    start
                        .zip(count)
                        .ok_or_else(|| PDFDecryptError::malformed("Invalid /Index entry"))
                }
                _ => Err(PDFDecryptError::malformed("/Index must hold pairs")),
            })
            .collect(),
        None => {
            let size = dictionary
                .get_integer("Size")
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| PDFDecryptError::malformed("Cross-reference stream without /Size"))?;
            Ok(vec![(0, size)])
        }
    }
}

fn read_field(record: &[u8], width: usize) -> u64 {
    if width == 0 {
        0
    } else {
        BigEndian::read_uint(record, width)
    }
}

/// Rebuild a cross-reference stream so that every type-1 entry holds the
/// current offset of its object. `prev` replaces an existing `/Prev`.
pub fn rebuild_xref_stream(
    object: &DocumentObject,
    offsets: impl Fn(u32) -> Option<usize>,
    prev: Option<usize>,
) -> PDFDecryptResult<DocumentObject> {
    let dictionary = object
        .dictionary()
        .ok_or_else(|| PDFDecryptError::malformed("Cross-reference stream without dictionary"))?;
    let payload = object
        .stream()
        .ok_or_else(|| PDFDecryptError::malformed("Cross-reference stream without data"))?;

    let [w0, w1, w2] = field_widths(object)?;
    let width = w0 + w1 + w2;
    if width == 0 {
        return Err(PDFDecryptError::malformed("/W describes empty records"));
    }

    let codec = StreamCodec::from_dictionary(dictionary)?;
    let mut records = codec.decode(payload)?;

    let numbers = index_ranges(object)?
        .into_iter()
        .flat_map(|(start, count)| (0..count).map(move |i| start.saturating_add(i)));

    for (record, number) in records.chunks_exact_mut(width).zip(numbers) {
        let kind = if w0 == 0 { 1 } else { read_field(record, w0) };
        if kind != 1 {
            continue;
        }
        match offsets(number) {
            None => {
                trace!("Object {} is gone, zeroing its xref record", number);
                record.fill(0);
            }
            Some(_) if w1 == 0 => {}
            Some(offset) => {
                let offset = offset as u64;
                if w1 < 8 && offset >> (8 * w1) != 0 {
                    return Err(PDFDecryptError::malformed(format!(
                        "Offset {} of object {} does not fit in {} bytes",
                        offset, number, w1
                    )));
                }
                BigEndian::write_uint(&mut record[w0..w0 + w1], offset, w1);
            }
        }
    }

    let mut dictionary = dictionary.clone();
    if let Some(prev) = prev {
        if dictionary.contains_key("Prev") {
            dictionary.insert("Prev", Value::Integer(prev as i64));
        }
    }
    let encoded = codec.encode(&records)?;
    Ok(DocumentObject::with_dictionary(object.address(), dictionary, Some(encoded)))
}
