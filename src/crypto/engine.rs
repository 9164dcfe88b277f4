//! Decryption engine: rebuilds a document with every string and stream
//! decrypted

use log::{debug, trace, warn};

use crate::error::PDFDecryptResult;
use crate::pdf::{
    Dictionary, Document, DocumentObject, HexadecimalString, LiteralString, ObjectBody, ObjectId, ObjectKey,
    Value,
};
use crate::pdf::StringObject;
use crate::security::StandardSecurityHandler;

/// Walks a parsed document and produces its unencrypted serialisation
pub struct DecryptionEngine<'a> {
    handler: &'a mut StandardSecurityHandler,
}

/// Location of the object being decrypted
#[derive(Clone, Copy)]
struct Target {
    number: u32,
    generation: u16,
}

impl<'a> DecryptionEngine<'a> {
    /// Engine for a handler that has been authenticated and prepared
    pub fn new(handler: &'a mut StandardSecurityHandler) -> Self {
        Self { handler }
    }

    /// Decrypt every object of `source` and serialise the result
    pub fn decrypt_document(&mut self, source: &Document) -> PDFDecryptResult<Vec<u8>> {
        let encrypt_number = source.encrypt_object().and_then(|key| match key.id {
            ObjectId::Number(number) => Some(number),
            ObjectId::Marker(_) => None,
        });
        let plain_metadata = if self.handler.encrypt_data().encrypt_metadata() {
            None
        } else {
            source.metadata_object().map(|key| key.id)
        };

        let mut document = Document::new(source.header());
        document.set_xref(source.xref().clone());

        for (key, object) in source.objects() {
            if encrypt_number.is_some_and(|n| key.id == ObjectId::Number(n)) {
                trace!("Dropping encryption dictionary {}", key);
                continue;
            }
            let decrypted = if plain_metadata == Some(key.id) {
                trace!("Keeping metadata {} unencrypted", key);
                object.clone()
            } else if key.is_marker() || object.is_xref_stream() || source.xref().chain.contains(key) {
                without_encrypt(object)
            } else {
                self.decrypt_object(key, object)
            };
            document.add_object(*key, decrypted)?;
        }

        debug!("Decrypted {} objects, laying out document", document.object_count());
        document.create()
    }

    fn decrypt_object(&mut self, key: &ObjectKey, object: &DocumentObject) -> DocumentObject {
        let address = object.address();
        let target = match (address.number(), address.generation()) {
            (Some(number), Some(generation)) => Target { number, generation },
            _ => return object.clone(),
        };

        match object.body() {
            ObjectBody::Dictionary { dictionary, stream } => {
                let mut dictionary = dictionary.clone();
                self.decrypt_dictionary(&mut dictionary, target);

                let stream = stream.as_ref().map(|data| match self.decrypt_bytes(data, target) {
                    Some(plain) => plain,
                    None => {
                        warn!("Unable to decrypt the stream of {}; keeping it as is", key);
                        data.clone()
                    }
                });
                DocumentObject::with_dictionary(address, dictionary, stream)
            }
            ObjectBody::Value(value) => match self.decrypt_value_body(value, target) {
                Some(body) => DocumentObject::with_value(address, body),
                None => object.clone(),
            },
        }
    }

    /// Strings and arrays written directly as the object body
    fn decrypt_value_body(&mut self, body: &[u8], target: Target) -> Option<Vec<u8>> {
        let is_string = body.starts_with(b"(") || (body.starts_with(b"<") && !body.starts_with(b"<<"));
        if !is_string && !body.starts_with(b"[") {
            return None;
        }
        let mut value = match Value::parse(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unable to parse the body of object {}: {}", target.number, e);
                return None;
            }
        };
        self.decrypt_value(&mut value, target);
        Some(value.to_bytes())
    }

    fn decrypt_dictionary(&mut self, dictionary: &mut Dictionary, target: Target) {
        match dictionary {
            Dictionary::Mapping(entries) => {
                let signature = entries
                    .get(b"Type".as_slice())
                    .and_then(Value::as_name)
                    .is_some_and(|t| t == b"Sig");
                for (name, value) in entries.iter_mut() {
                    if name == b"ID" || (signature && name == b"Contents") {
                        continue;
                    }
                    self.decrypt_value(value, target);
                }
            }
            Dictionary::Sequence(items) => {
                for value in items.iter_mut() {
                    self.decrypt_value(value, target);
                }
            }
        }
    }

    fn decrypt_value(&mut self, value: &mut Value, target: Target) {
        match value {
            Value::Dictionary(dictionary) => self.decrypt_dictionary(dictionary, target),
            Value::Literal(string) => {
                if let Some(plain) = self.decrypt_bytes(string.content(), target) {
                    *string = LiteralString::new(plain);
                }
            }
            Value::Hex(string) => {
                if let Some(plain) = self.decrypt_bytes(string.bin(), target) {
                    *string = HexadecimalString::new(plain);
                }
            }
            _ => {}
        }
    }

    fn decrypt_bytes(&mut self, data: &[u8], target: Target) -> Option<Vec<u8>> {
        self.handler.decrypt(data, target.number, target.generation)
    }
}

/// Copy of a marker or cross-reference stream without its `Encrypt` entry
fn without_encrypt(object: &DocumentObject) -> DocumentObject {
    let mut copy = object.clone();
    if let Some(dictionary) = copy.dictionary_mut() {
        dictionary.remove("Encrypt");
    }
    copy
}
