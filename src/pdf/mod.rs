//! PDF object model: parsing, cross-reference data and serialisation

mod dict;
mod document;
mod filter;
mod lexer;
mod object;
mod parser;
mod predictor;
mod stream;
mod string;
mod xref;

pub use dict::{Dictionary, Value};
pub use document::{Document, EncryptEntry};
pub use filter::{Filter, FilterChain};
pub use object::{Address, DocumentObject, Marker, ObjectBody, ObjectId, ObjectKey};
pub use parser::{scan_objects, split_objects, Occurrence, RawObject};
pub use predictor::Predictor;
pub use stream::StreamCodec;
pub use string::{HexadecimalString, LiteralString, StringObject};
pub use xref::{rebuild_xref_stream, rebuild_xref_table, XRefEntry, XRefInfo, XRefKind, XRefSubsection, XRefTable};

pub(crate) use string::ensure_not_empty;
