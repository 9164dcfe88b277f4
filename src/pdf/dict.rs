//! PDF dictionary and array values

use indexmap::IndexMap;

use crate::error::{PDFDecryptError, PDFDecryptResult};
use super::lexer::{Lexer, Token};
use super::string::{HexadecimalString, LiteralString, StringObject};

/// Deepest dictionary/array nesting accepted by the parser
pub const MAX_NESTING_DEPTH: usize = 64;

/// Keys whose hexadecimal values are kept as raw binary strings
const BINARY_KEYS: [&[u8]; 4] = [b"O", b"U", b"OE", b"UE"];

/// Dictionary value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// Name without the leading slash
    Name(Vec<u8>),
    Literal(LiteralString),
    Hex(HexadecimalString),
    Reference(u32, u16), // object number, generation
    Dictionary(Dictionary),
    /// Any other bare token, written back verbatim
    Raw(Vec<u8>),
}

impl Value {
    pub fn name(name: &str) -> Self {
        Self::Name(name.as_bytes().to_vec())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Content of a literal or hexadecimal string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Literal(s) => Some(s.content()),
            Self::Hex(s) => Some(s.bin()),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<(u32, u16)> {
        match self {
            Self::Reference(number, generation) => Some((*number, *generation)),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Elements of an array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Dictionary(Dictionary::Sequence(items)) => Some(items),
            _ => None,
        }
    }

    /// Parse a single value, e.g. the body of a non-dictionary object
    pub fn parse(bytes: &[u8]) -> PDFDecryptResult<Self> {
        let mut lexer = Lexer::new(bytes);
        let value = parse_value(&mut lexer, 0)?;
        if !lexer.at_end() {
            return Err(PDFDecryptError::malformed(format!(
                "Unexpected content after value at offset {}",
                lexer.position()
            )));
        }
        Ok(value)
    }

    /// Serialise the value
    pub fn write_to(&self, output: &mut Vec<u8>) {
        match self {
            Self::Null => output.extend_from_slice(b"null"),
            Self::Boolean(true) => output.extend_from_slice(b"true"),
            Self::Boolean(false) => output.extend_from_slice(b"false"),
            Self::Integer(n) => output.extend_from_slice(n.to_string().as_bytes()),
            Self::Real(r) => output.extend_from_slice(format_real(*r).as_bytes()),
            Self::Name(n) => {
                output.push(b'/');
                output.extend_from_slice(n);
            }
            Self::Literal(s) => {
                output.push(b'(');
                output.extend_from_slice(&s.escaped());
                output.push(b')');
            }
            Self::Hex(s) => {
                output.push(b'<');
                output.extend_from_slice(s.hex().as_bytes());
                output.push(b'>');
            }
            Self::Reference(number, generation) => {
                output.extend_from_slice(format!("{} {} R", number, generation).as_bytes())
            }
            Self::Dictionary(d) => d.write_to(output),
            Self::Raw(raw) => output.extend_from_slice(raw),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::new();
        self.write_to(&mut output);
        output
    }
}

impl From<Dictionary> for Value {
    fn from(d: Dictionary) -> Self {
        Self::Dictionary(d)
    }
}

fn format_real(r: f64) -> String {
    if r.is_finite() {
        format!("{}", r)
    } else {
        "0".to_string()
    }
}

/// PDF dictionary (`<< >>`) or array (`[ ]`)
#[derive(Debug, Clone, PartialEq)]
pub enum Dictionary {
    Mapping(IndexMap<Vec<u8>, Value>),
    Sequence(Vec<Value>),
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl Dictionary {
    /// Create new empty mapping
    pub fn new() -> Self {
        Self::Mapping(IndexMap::new())
    }

    /// Create new array
    pub fn sequence(items: Vec<Value>) -> Self {
        Self::Sequence(items)
    }

    /// Parse input that holds exactly one dictionary or array
    pub fn parse(bytes: &[u8]) -> PDFDecryptResult<Self> {
        let (dictionary, consumed) = Self::parse_prefix(bytes)?;
        let mut lexer = Lexer::new(&bytes[consumed..]);
        if !lexer.at_end() {
            return Err(PDFDecryptError::malformed(
                "Unexpected content after dictionary",
            ));
        }
        Ok(dictionary)
    }

    /// Parse the dictionary or array at the start of `bytes`, returning it
    /// together with the number of bytes consumed
    pub fn parse_prefix(bytes: &[u8]) -> PDFDecryptResult<(Self, usize)> {
        let mut lexer = Lexer::new(bytes);
        match parse_value(&mut lexer, 0)? {
            Value::Dictionary(d) => Ok((d, lexer.position())),
            _ => Err(PDFDecryptError::malformed(
                "Expected a dictionary or an array",
            )),
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Mapping(m) => m.len(),
            Self::Sequence(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Mapping(m) => m.get(key.as_bytes()),
            Self::Sequence(_) => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Self::Mapping(m) => m.get_mut(key.as_bytes()),
            Self::Sequence(_) => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set value. Arrays have no keys, so inserting into one is a no-op.
    pub fn insert(&mut self, key: &str, value: Value) {
        if let Self::Mapping(m) = self {
            m.insert(key.as_bytes().to_vec(), value);
        }
    }

    /// Remove a key, keeping the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match self {
            Self::Mapping(m) => m.shift_remove(key.as_bytes()),
            Self::Sequence(_) => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        let keys = match self {
            Self::Mapping(m) => Some(m.keys().map(Vec::as_slice)),
            Self::Sequence(_) => None,
        };
        keys.into_iter().flatten()
    }

    /// Values in order, for mappings and arrays alike
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Self::Mapping(m) => Box::new(m.values()),
            Self::Sequence(s) => Box::new(s.iter()),
        }
    }

    /// Get integer value
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    /// Get name value
    pub fn get_name(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Value::as_name)
    }

    /// Get the content of a literal or hexadecimal string
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Value::as_bytes)
    }

    /// Get reference value
    pub fn get_reference(&self, key: &str) -> Option<(u32, u16)> {
        self.get(key).and_then(Value::as_reference)
    }

    pub fn get_dictionary(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(Value::as_dictionary)
    }

    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_array)
    }

    /// Write dictionary to output
    pub fn write_to(&self, output: &mut Vec<u8>) {
        match self {
            Self::Mapping(m) => {
                output.extend_from_slice(b"<<");
                for (key, value) in m {
                    output.extend_from_slice(b" /");
                    output.extend_from_slice(key);
                    output.push(b' ');
                    value.write_to(output);
                }
                output.extend_from_slice(b" >>");
            }
            Self::Sequence(items) => {
                output.push(b'[');
                for (i, value) in items.iter().enumerate() {
                    if i > 0 {
                        output.push(b' ');
                    }
                    value.write_to(output);
                }
                output.push(b']');
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::new();
        self.write_to(&mut output);
        output
    }
}

fn parse_value(lexer: &mut Lexer<'_>, depth: usize) -> PDFDecryptResult<Value> {
    let token = lexer
        .next_token()?
        .ok_or_else(|| PDFDecryptError::malformed("Unexpected end of input"))?;
    value_from_token(lexer, token, depth)
}

fn value_from_token(lexer: &mut Lexer<'_>, token: Token, depth: usize) -> PDFDecryptResult<Value> {
    match token {
        Token::DictOpen => parse_mapping(lexer, depth + 1),
        Token::ArrayOpen => parse_sequence(lexer, depth + 1),
        Token::Name(name) => Ok(Value::Name(name)),
        Token::Literal(body) => Ok(Value::Literal(LiteralString::from_escaped(&body))),
        Token::Hex(body) => Ok(Value::Hex(HexadecimalString::from_hex(&body)?)),
        Token::Bare(bare) => parse_bare(lexer, bare),
        Token::DictClose | Token::ArrayClose => Err(PDFDecryptError::malformed(format!(
            "Unbalanced closing bracket at offset {}",
            lexer.position()
        ))),
    }
}

fn check_depth(depth: usize) -> PDFDecryptResult<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(PDFDecryptError::malformed(format!(
            "Nesting deeper than {} levels",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

fn parse_mapping(lexer: &mut Lexer<'_>, depth: usize) -> PDFDecryptResult<Value> {
    check_depth(depth)?;
    let mut entries = IndexMap::new();
    loop {
        match lexer.next_token()? {
            Some(Token::DictClose) => break,
            Some(Token::Name(key)) => {
                let mut value = parse_value(lexer, depth)?;
                if BINARY_KEYS.iter().any(|k| *k == key.as_slice()) {
                    if let Value::Hex(hex) = value {
                        value = Value::Literal(LiteralString::new(hex.into_bytes()));
                    }
                }
                entries.insert(key, value);
            }
            Some(other) => {
                return Err(PDFDecryptError::malformed(format!(
                    "Expected a name key, found {:?}",
                    other
                )))
            }
            None => return Err(PDFDecryptError::malformed("Unbalanced dictionary")),
        }
    }
    Ok(Value::Dictionary(Dictionary::Mapping(entries)))
}

fn parse_sequence(lexer: &mut Lexer<'_>, depth: usize) -> PDFDecryptResult<Value> {
    check_depth(depth)?;
    let mut items = Vec::new();
    loop {
        match lexer.next_token()? {
            Some(Token::ArrayClose) => break,
            Some(token) => items.push(value_from_token(lexer, token, depth)?),
            None => return Err(PDFDecryptError::malformed("Unbalanced array")),
        }
    }
    Ok(Value::Dictionary(Dictionary::Sequence(items)))
}

fn parse_bare(lexer: &mut Lexer<'_>, bare: Vec<u8>) -> PDFDecryptResult<Value> {
    match bare.as_slice() {
        b"true" => return Ok(Value::Boolean(true)),
        b"false" => return Ok(Value::Boolean(false)),
        b"null" => return Ok(Value::Null),
        _ => {}
    }

    let text = String::from_utf8_lossy(&bare);
    if let Ok(number) = text.parse::<i64>() {
        if let Some(reference) = try_reference(lexer, number)? {
            return Ok(reference);
        }
        return Ok(Value::Integer(number));
    }
    if is_real(&bare) {
        if let Ok(real) = text.parse::<f64>() {
            return Ok(Value::Real(real));
        }
    }
    Ok(Value::Raw(bare))
}

fn is_real(bare: &[u8]) -> bool {
    let digits = bare.strip_prefix(b"-").or_else(|| bare.strip_prefix(b"+")).unwrap_or(bare);
    !digits.is_empty()
        && digits.iter().all(|b| b.is_ascii_digit() || *b == b'.')
        && digits.iter().filter(|b| **b == b'.').count() <= 1
        && digits.iter().any(u8::is_ascii_digit)
}

/// `N G R` lookahead after an integer
fn try_reference(lexer: &mut Lexer<'_>, number: i64) -> PDFDecryptResult<Option<Value>> {
    let Ok(number) = u32::try_from(number) else {
        return Ok(None);
    };
    let mut lookahead = lexer.clone();
    let Some(Token::Bare(generation)) = lookahead.next_token()? else {
        return Ok(None);
    };
    let Some(generation) = std::str::from_utf8(&generation)
        .ok()
        .and_then(|g| g.parse::<u16>().ok())
    else {
        return Ok(None);
    };
    match lookahead.next_token()? {
        Some(Token::Bare(keyword)) if keyword == b"R" => {
            *lexer = lookahead;
            Ok(Some(Value::Reference(number, generation)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn test_parse_trailer_dictionary() -> PDFDecryptResult<()> {
        let dict = Dictionary::parse(
            b"<< /Size 6 /Root 1 0 R /Info 5 0 R\n/ID [<0A1B> (raw)] /Encrypt 4 0 R >>",
        )?;
        assert_eq!(dict.get_integer("Size"), Some(6));
        assert_eq!(dict.get_reference("Root"), Some((1, 0)));
        assert_eq!(dict.get_reference("Encrypt"), Some((4, 0)));
        let id = dict.get_array("ID").unwrap();
        assert_eq!(id.len(), 2);
        assert_eq!(id[0].as_bytes(), Some(&[0x0a, 0x1b][..]));
        assert_eq!(id[1].as_bytes(), Some(&b"raw"[..]));
        assert_eq!(
            dict.keys().collect::<Vec<_>>(),
            vec![&b"Size"[..], b"Root", b"Info", b"ID", b"Encrypt"]
        );
        Ok(())
    }

    #[test]
    fn test_scalar_types() -> PDFDecryptResult<()> {
        let dict = Dictionary::parse(
            b"<</A true /B false /C null /D -12 /E 3.5 /F .25 /G /Name /I Foo#20>>",
        )?;
        assert_eq!(dict.get("A"), Some(&Value::Boolean(true)));
        assert_eq!(dict.get("B"), Some(&Value::Boolean(false)));
        assert_eq!(dict.get("C"), Some(&Value::Null));
        assert_eq!(dict.get_integer("D"), Some(-12));
        assert_eq!(dict.get("E"), Some(&Value::Real(3.5)));
        assert_eq!(dict.get("F"), Some(&Value::Real(0.25)));
        assert_eq!(dict.get_name("G"), Some(&b"Name"[..]));
        assert_eq!(dict.get("I"), Some(&Value::Raw(b"Foo#20".to_vec())));
        Ok(())
    }

    #[test]
    fn test_integers_in_arrays_are_not_references() -> PDFDecryptResult<()> {
        let dict = Dictionary::parse(b"[1 2 3 0 R 4]")?;
        assert_eq!(
            dict,
            Dictionary::Sequence(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Reference(3, 0),
                Value::Integer(4),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_binary_keys_decode_hex() -> PDFDecryptResult<()> {
        let dict = Dictionary::parse(b"<</O <28BF4E5E> /U (user) /X <28BF>>>")?;
        assert_eq!(
            dict.get("O"),
            Some(&Value::Literal(LiteralString::new(vec![0x28, 0xbf, 0x4e, 0x5e])))
        );
        assert!(matches!(dict.get("X"), Some(Value::Hex(_))));
        assert_eq!(dict.get_bytes("U"), Some(&b"user"[..]));
        Ok(())
    }

    #[test]
    fn test_serialise_round_trip() -> PDFDecryptResult<()> {
        let source = b"<</Type /Annot /Rect [0 0 612.5 792] /T (a\\(b\\)\\r) /C <FF00> /P 3 0 R /N << /Deep [true null] >>>>";
        let dict = Dictionary::parse(source)?;
        let written = dict.to_bytes();
        assert_eq!(
            String::from_utf8_lossy(&written),
            "<< /Type /Annot /Rect [0 0 612.5 792] /T (a\\(b\\)\\r) /C <FF00> /P 3 0 R /N << /Deep [true null] >> >>"
        );
        assert_eq!(Dictionary::parse(&written)?, dict);
        Ok(())
    }

    #[test]
    fn test_mutation_is_reflected_in_output() -> PDFDecryptResult<()> {
        let mut dict = Dictionary::parse(b"<</Length 10 /Encrypt 4 0 R /Filter /FlateDecode>>")?;
        dict.insert("Length", Value::Integer(42));
        assert!(dict.remove("Encrypt").is_some());
        assert_eq!(dict.to_bytes(), b"<< /Length 42 /Filter /FlateDecode >>".to_vec());
        Ok(())
    }

    #[test]
    fn test_unbalanced_input_is_rejected() {
        assert!(Dictionary::parse(b"<</A [1 2>>").is_err());
        assert!(Dictionary::parse(b"<</A 1").is_err());
        assert!(Dictionary::parse(b"[1 2]]").is_err());
        assert!(Dictionary::parse(b"/NotADictionary").is_err());
        assert!(Dictionary::parse(b"<</A 1>> trailing").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let mut deep = Vec::new();
        deep.extend(std::iter::repeat(b'[').take(MAX_NESTING_DEPTH + 1));
        deep.extend(std::iter::repeat(b']').take(MAX_NESTING_DEPTH + 1));
        assert!(Dictionary::parse(&deep).is_err());

        let mut shallow = Vec::new();
        shallow.extend(std::iter::repeat(b'[').take(MAX_NESTING_DEPTH));
        shallow.extend(std::iter::repeat(b']').take(MAX_NESTING_DEPTH));
        assert!(Dictionary::parse(&shallow).is_ok());
    }

    #[test]
    fn test_parse_prefix_reports_consumed() -> PDFDecryptResult<()> {
        let input = b"<< /Length 5 >>\nstream\nhello";
        let (dict, consumed) = Dictionary::parse_prefix(input)?;
        assert_eq!(dict.get_integer("Length"), Some(5));
        assert_eq!(&input[consumed..consumed + 1], b"\n");
        Ok(())
    }

    #[test]
    fn test_value_parse() -> PDFDecryptResult<()> {
        assert_eq!(Value::parse(b" 12 0 R ")?, Value::Reference(12, 0));
        assert_eq!(Value::parse(b"(text)")?.as_bytes(), Some(&b"text"[..]));
        assert!(Value::parse(b"(text) extra").is_err());
        Ok(())
    }
}
