//! Document model: object collection, cross-reference discovery and layout

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::dict::{Dictionary, Value};
use super::object::{trim, Address, DocumentObject, Marker, ObjectId, ObjectKey};
use super::parser::split_objects;
use super::string::HexadecimalString;
use super::xref::{rebuild_xref_stream, rebuild_xref_table, XRefInfo, XRefKind};

/// Where the encryption dictionary lives
#[derive(Debug, Clone, PartialEq)]
pub enum EncryptEntry {
    /// Indirect object holding the dictionary
    Object(ObjectKey),
    /// Dictionary written directly into the trailer
    Inline(Dictionary),
}

/// A PDF document as an ordered collection of addressable objects
#[derive(Debug, Clone)]
pub struct Document {
    header: Vec<u8>,
    objects: IndexMap<ObjectKey, DocumentObject>,
    encrypt: Option<EncryptEntry>,
    metadata_object: Option<ObjectKey>,
    id: Vec<u8>,
    xref: XRefInfo,
}

impl Document {
    /// Extra room reserved after every rebuilt cross-reference stream
    pub const XREF_OBJECT_PADDING: usize = 50;
    /// Extra room reserved after the linearization dictionary
    pub const LINEARIZED_OBJECT_PADDING: usize = 10;
    /// Layout passes attempted before giving up on a fixed point
    pub const MAX_LAYOUT_PASSES: usize = 16;

    /// Empty document with the given header
    pub fn new(header: impl Into<Vec<u8>>) -> Self {
        Self {
            header: header.into(),
            objects: IndexMap::new(),
            encrypt: None,
            metadata_object: None,
            id: Vec::new(),
            xref: XRefInfo::new(XRefKind::Table),
        }
    }

    /// Parse a document from its bytes
    pub fn parse(data: &[u8]) -> PDFDecryptResult<Self> {
        let raw_objects = split_objects(data);
        let first = raw_objects
            .first()
            .ok_or_else(|| PDFDecryptError::malformed("No objects found in document"))?;

        let mut document = Self::new(trim_end(&data[..first.occurrence.offset]));

        let mut last_seen: HashMap<ObjectId, usize> = HashMap::new();
        for (i, raw) in raw_objects.iter().enumerate() {
            last_seen.insert(raw.occurrence.address.id(), i);
        }

        let mut sequence = 0;
        for (i, raw) in raw_objects.iter().enumerate() {
            let occurrence = raw.occurrence;
            let id = occurrence.address.id();
            let superseded = if last_seen.get(&id) == Some(&i) {
                None
            } else {
                sequence += 1;
                Some(sequence)
            };
            let object = DocumentObject::parse(
                occurrence.address,
                raw.raw,
                occurrence.header_len,
                occurrence.offset,
            )?;
            document.objects.insert(ObjectKey { id, superseded }, object);
        }

        document.set_properties()?;
        debug!(
            "Parsed document: {} objects, {} superseded, {:?} xref with {} sections",
            document.objects.len(),
            sequence,
            document.xref.kind,
            document.xref.chain.len()
        );
        Ok(document)
    }

    /// Discover the cross-reference chain and the trailer entries
    fn set_properties(&mut self) -> PDFDecryptResult<()> {
        let kind = if self.objects.keys().any(|k| k.id == ObjectId::Marker(Marker::Xref)) {
            XRefKind::Table
        } else {
            XRefKind::Stream
        };
        let chain = self.find_xref_objects(kind)?;
        let links = self.find_links(kind);
        self.xref = XRefInfo { kind, chain, links };

        let mut encrypt = None;
        let mut root = None;
        let mut id = None;
        for key in &self.xref.chain {
            let Some(trailer) = self.trailer_dictionary(key) else {
                continue;
            };
            if encrypt.is_none() {
                encrypt = trailer.get("Encrypt").cloned();
            }
            if root.is_none() {
                root = trailer.get_reference("Root");
            }
            if id.is_none() {
                id = trailer
                    .get_array("ID")
                    .and_then(|ids| ids.first())
                    .and_then(Value::as_bytes)
                    .map(<[u8]>::to_vec);
            }
        }

        self.encrypt = match encrypt {
            Some(Value::Reference(number, _)) => {
                let key = ObjectKey::number(number);
                if !self.objects.contains_key(&key) {
                    return Err(PDFDecryptError::object_not_found(format!(
                        "encryption dictionary {} 0 R",
                        number
                    )));
                }
                Some(EncryptEntry::Object(key))
            }
            Some(Value::Dictionary(dictionary)) if !dictionary.is_sequence() => {
                Some(EncryptEntry::Inline(dictionary))
            }
            Some(_) => return Err(PDFDecryptError::malformed("Invalid /Encrypt entry")),
            None => None,
        };

        self.metadata_object = root
            .and_then(|(number, _)| self.object(number))
            .and_then(DocumentObject::dictionary)
            .and_then(|d| d.get_reference("Metadata"))
            .map(|(number, _)| ObjectKey::number(number))
            .filter(|key| self.objects.contains_key(key));
        self.id = id.unwrap_or_default();

        debug!(
            "Trailer: encrypt {:?}, metadata {:?}, ID {} bytes",
            self.encrypt.as_ref().map(|e| match e {
                EncryptEntry::Object(key) => key.to_string(),
                EncryptEntry::Inline(_) => "inline".to_string(),
            }),
            self.metadata_object.map(|k| k.to_string()),
            self.id.len()
        );
        Ok(())
    }

    /// Follow `startxref` and `Prev` from the newest section to the oldest
    fn find_xref_objects(&self, kind: XRefKind) -> PDFDecryptResult<Vec<ObjectKey>> {
        let start = self
            .get(&ObjectKey::marker(Marker::StartXref))
            .and_then(|o| o.value())
            .and_then(parse_offset)
            .and_then(|offset| self.find_object_at(offset).ok());

        let start = match (start, kind) {
            (Some(key), _) => key,
            (None, XRefKind::Table) => ObjectKey::marker(Marker::Xref),
            (None, XRefKind::Stream) => {
                return Err(PDFDecryptError::object_not_found(
                    "cross-reference stream at startxref",
                ))
            }
        };

        let mut chain = vec![start];
        let mut visited: HashSet<ObjectKey> = chain.iter().copied().collect();
        let mut current = start;
        while let Some(previous) = self
            .trailer_dictionary(&current)
            .and_then(|d| d.get_integer("Prev"))
            .and_then(|p| usize::try_from(p).ok())
            .and_then(|p| self.find_object_at(p).ok())
        {
            if !visited.insert(previous) {
                debug!("Cross-reference chain loops back to {}", previous);
                break;
            }
            chain.push(previous);
            current = previous;
        }
        Ok(chain)
    }

    /// Record where every `startxref`, trailer `Prev` and stream `Prev` points
    fn find_links(&self, kind: XRefKind) -> IndexMap<ObjectKey, ObjectKey> {
        let mut links = IndexMap::new();
        for (key, object) in &self.objects {
            let target = match key.id {
                ObjectId::Marker(Marker::StartXref) => object.value().and_then(parse_offset),
                ObjectId::Marker(Marker::Trailer) if kind == XRefKind::Table => prev_of(object),
                ObjectId::Number(_) if object.is_xref_stream() => prev_of(object),
                _ => None,
            };
            if let Some(target) = target.and_then(|offset| self.find_object_at(offset).ok()) {
                trace!("{} points at {}", key, target);
                links.insert(*key, target);
            }
        }
        links
    }

    /// Trailer dictionary belonging to a cross-reference object: the
    /// following `trailer` for a table section, the stream dictionary itself
    /// for a cross-reference stream.
    fn trailer_dictionary(&self, key: &ObjectKey) -> Option<&Dictionary> {
        match key.id {
            ObjectId::Marker(Marker::Xref) => {
                let position = self.objects.get_index_of(key)?;
                self.objects
                    .iter()
                    .skip(position + 1)
                    .find(|(k, _)| k.id != ObjectId::Marker(Marker::Xref) && k.is_marker())
                    .filter(|(k, _)| k.id == ObjectId::Marker(Marker::Trailer))
                    .and_then(|(_, o)| o.dictionary())
            }
            _ => self.objects.get(key)?.dictionary(),
        }
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn set_header(&mut self, header: impl Into<Vec<u8>>) {
        self.header = header.into();
    }

    /// Objects in document order
    pub fn objects(&self) -> impl Iterator<Item = (&ObjectKey, &DocumentObject)> {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&DocumentObject> {
        self.objects.get(key)
    }

    /// Live object with the given number
    pub fn object(&self, number: u32) -> Option<&DocumentObject> {
        self.objects.get(&ObjectKey::number(number))
    }

    /// Live object with the given number, or `ObjectNotFound`
    pub fn resolve(&self, number: u32) -> PDFDecryptResult<&DocumentObject> {
        self.object(number)
            .ok_or_else(|| PDFDecryptError::object_not_found(format!("object {}", number)))
    }

    /// Key of the object recorded at a byte offset
    pub fn find_object_at(&self, offset: usize) -> PDFDecryptResult<ObjectKey> {
        self.objects
            .iter()
            .find(|(_, o)| o.offset() == offset)
            .map(|(k, _)| *k)
            .ok_or_else(|| PDFDecryptError::object_not_found(format!("object at offset {}", offset)))
    }

    pub fn xref(&self) -> &XRefInfo {
        &self.xref
    }

    pub fn set_xref(&mut self, xref: XRefInfo) {
        self.xref = xref;
    }

    pub fn encrypt_entry(&self) -> Option<&EncryptEntry> {
        self.encrypt.as_ref()
    }

    /// Object number of an indirect encryption dictionary
    pub fn encrypt_object(&self) -> Option<ObjectKey> {
        match self.encrypt {
            Some(EncryptEntry::Object(key)) => Some(key),
            _ => None,
        }
    }

    pub fn metadata_object(&self) -> Option<ObjectKey> {
        self.metadata_object
    }

    /// First element of the trailer `ID`, empty when absent
    pub fn document_id(&self) -> &[u8] {
        &self.id
    }

    /// The encryption dictionary with `ID` set to the document identifier
    pub fn find_encrypt_dictionary(&self) -> PDFDecryptResult<Dictionary> {
        let mut dictionary = match &self.encrypt {
            None => return Err(PDFDecryptError::NotEncrypted),
            Some(EncryptEntry::Object(key)) => self
                .objects
                .get(key)
                .and_then(DocumentObject::dictionary)
                .cloned()
                .ok_or_else(|| PDFDecryptError::malformed("Encryption object is not a dictionary"))?,
            Some(EncryptEntry::Inline(dictionary)) => dictionary.clone(),
        };
        dictionary.insert("ID", Value::Hex(HexadecimalString::new(self.id.clone())));
        Ok(dictionary)
    }

    /// Append an object after the current last one
    pub fn add_object(&mut self, key: ObjectKey, mut object: DocumentObject) -> PDFDecryptResult<()> {
        if self.objects.contains_key(&key) {
            return Err(PDFDecryptError::malformed(format!("Duplicate object {}", key)));
        }
        let offset = match self.objects.last() {
            Some((_, previous)) => previous.offset() + previous.len(),
            None => self.header.len() + 1,
        };
        object.set_offset(offset);
        trace!("Added {} at offset {}", key, offset);
        self.objects.insert(key, object);
        Ok(())
    }

    /// Replace an object in place. A change in length shifts every object
    /// that follows it.
    pub fn override_object(&mut self, key: &ObjectKey, mut object: DocumentObject) -> PDFDecryptResult<()> {
        let current = self
            .objects
            .get_mut(key)
            .ok_or_else(|| PDFDecryptError::object_not_found(key.to_string()))?;
        let offset = current.offset();
        let old_len = current.len();
        object.set_offset(offset);
        let new_len = object.len();
        *current = object;

        if new_len != old_len {
            for other in self.objects.values_mut() {
                if other.offset() > offset {
                    let moved = (other.offset() + new_len)
                        .checked_sub(old_len)
                        .ok_or_else(|| PDFDecryptError::malformed("Object offset underflow"))?;
                    other.set_offset(moved);
                }
            }
        }
        Ok(())
    }

    /// Serialised document
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.length());
        output.extend_from_slice(&self.header);
        for object in self.objects.values() {
            object.write_to(&mut output);
        }
        output.push(b'\n');
        output
    }

    /// Length of the serialised document
    pub fn length(&self) -> usize {
        self.header.len() + self.objects.values().map(DocumentObject::len).sum::<usize>() + 1
    }

    fn live_offset(&self, number: u32) -> Option<usize> {
        self.object(number).map(DocumentObject::offset)
    }

    fn link_offset(&self, from: &ObjectKey) -> Option<usize> {
        self.xref
            .link(from)
            .and_then(|target| self.objects.get(&target))
            .map(DocumentObject::offset)
    }

    /// Lay the document out so that every offset recorded in
    /// cross-reference data, `startxref` and the linearization dictionary
    /// is correct, then serialise it.
    pub fn create(&mut self) -> PDFDecryptResult<Vec<u8>> {
        let mut allotments = self.allotments();

        for pass in 0..Self::MAX_LAYOUT_PASSES {
            let mut changed = false;
            match self.xref.kind {
                XRefKind::Stream => changed |= self.layout_xref_streams(&mut allotments)?,
                XRefKind::Table => changed |= self.layout_xref_tables(&mut allotments)?,
            }
            changed |= self.layout_startxref(&mut allotments)?;
            changed |= self.layout_linearized(&mut allotments)?;

            debug!("Layout pass {}: {}", pass + 1, if changed { "changed" } else { "stable" });
            if !changed {
                return Ok(self.to_bytes());
            }
        }
        Err(PDFDecryptError::malformed(format!(
            "Document layout did not settle after {} passes",
            Self::MAX_LAYOUT_PASSES
        )))
    }

    /// Room reserved for objects whose rebuilt form may grow
    fn allotments(&self) -> HashMap<ObjectKey, usize> {
        let mut allotments = HashMap::new();

        if let Some((key, first)) = self.objects.first() {
            if first.dictionary().is_some_and(|d| d.contains_key("Linearized")) {
                allotments.insert(*key, first.len() + Self::LINEARIZED_OBJECT_PADDING);
            }
        }

        if self.xref.kind == XRefKind::Stream {
            let last_object = self.objects.keys().rev().find(|k| !k.is_marker()).copied();
            for key in &self.xref.chain {
                if Some(*key) == last_object {
                    continue;
                }
                if let Some(object) = self.objects.get(key) {
                    allotments.insert(*key, object.len() + Self::XREF_OBJECT_PADDING);
                }
            }
        }
        allotments
    }

    /// Store a rebuilt object, padded to its allotment. Returns whether the
    /// serialised form changed.
    fn install(
        &mut self,
        key: &ObjectKey,
        mut object: DocumentObject,
        allotments: &mut HashMap<ObjectKey, usize>,
    ) -> PDFDecryptResult<bool> {
        object.set_padding(0);
        if let Some(allotment) = allotments.get_mut(key) {
            let natural = object.natural_len();
            if natural > *allotment {
                trace!("{} outgrew its allotment: {} > {}", key, natural, allotment);
                *allotment = natural;
            }
            object.set_padding(*allotment - natural);
        }

        let current = self
            .objects
            .get(key)
            .ok_or_else(|| PDFDecryptError::object_not_found(key.to_string()))?;
        if current.to_bytes() == object.to_bytes() {
            return Ok(false);
        }
        self.override_object(key, object)?;
        Ok(true)
    }

    fn layout_xref_streams(&mut self, allotments: &mut HashMap<ObjectKey, usize>) -> PDFDecryptResult<bool> {
        let mut changed = false;
        for key in self.xref.chain.clone() {
            let Some(object) = self.objects.get(&key) else {
                continue;
            };
            let prev = self.link_offset(&key);
            let rebuilt = rebuild_xref_stream(object, |n| self.live_offset(n), prev)?;
            changed |= self.install(&key, rebuilt, allotments)?;
        }
        Ok(changed)
    }

    fn layout_xref_tables(&mut self, allotments: &mut HashMap<ObjectKey, usize>) -> PDFDecryptResult<bool> {
        let mut changed = false;
        let keys: Vec<ObjectKey> = self.objects.keys().filter(|k| k.is_marker()).copied().collect();
        for key in keys {
            let Some(object) = self.objects.get(&key) else {
                continue;
            };
            let rebuilt = match key.id {
                ObjectId::Marker(Marker::Xref) => object
                    .value()
                    .and_then(|text| rebuild_xref_table(text, |n| self.live_offset(n)))
                    .map(|text| DocumentObject::with_value(object.address(), text)),
                ObjectId::Marker(Marker::Trailer) => {
                    match (object.dictionary(), self.link_offset(&key)) {
                        (Some(dictionary), Some(prev)) if dictionary.contains_key("Prev") => {
                            let mut dictionary = dictionary.clone();
                            dictionary.insert("Prev", Value::Integer(prev as i64));
                            Some(DocumentObject::with_dictionary(object.address(), dictionary, None))
                        }
                        _ => None,
                    }
                }
                _ => None,
            };
            if let Some(rebuilt) = rebuilt {
                changed |= self.install(&key, rebuilt, allotments)?;
            }
        }
        Ok(changed)
    }

    fn layout_startxref(&mut self, allotments: &mut HashMap<ObjectKey, usize>) -> PDFDecryptResult<bool> {
        let mut changed = false;
        let keys: Vec<ObjectKey> = self
            .objects
            .keys()
            .filter(|k| k.id == ObjectId::Marker(Marker::StartXref))
            .copied()
            .collect();
        for key in keys {
            let target = match self.link_offset(&key) {
                Some(offset) => Some(offset),
                None if key.is_live() => self
                    .xref
                    .newest()
                    .and_then(|newest| self.objects.get(&newest))
                    .map(DocumentObject::offset),
                None => None,
            };
            if let Some(offset) = target {
                let rebuilt = DocumentObject::with_value(Address::Marker(Marker::StartXref), offset.to_string());
                changed |= self.install(&key, rebuilt, allotments)?;
            }
        }
        Ok(changed)
    }

    fn layout_linearized(&mut self, allotments: &mut HashMap<ObjectKey, usize>) -> PDFDecryptResult<bool> {
        let Some((key, first)) = self.objects.first() else {
            return Ok(false);
        };
        let Some(dictionary) = first.dictionary().filter(|d| d.contains_key("Linearized")) else {
            return Ok(false);
        };
        let (key, address) = (*key, first.address());
        let mut dictionary = dictionary.clone();
        dictionary.insert("L", Value::Integer(self.length() as i64));
        let rebuilt = DocumentObject::with_dictionary(address, dictionary, first.stream().map(<[u8]>::to_vec));
        self.install(&key, rebuilt, allotments)
    }
}

fn trim_end(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    &bytes[..end]
}

fn parse_offset(text: &[u8]) -> Option<usize> {
    std::str::from_utf8(trim(text)).ok()?.parse().ok()
}

fn prev_of(object: &DocumentObject) -> Option<usize> {
    object
        .dictionary()
        .and_then(|d| d.get_integer("Prev"))
        .and_then(|p| usize::try_from(p).ok())
}
