//! PDF string objects: literal `( )` and hexadecimal `< >` strings

use std::fmt;

use crate::error::{PDFDecryptError, PDFDecryptResult};

/// Common behaviour of byte-string values
pub trait StringObject {
    /// Raw content bytes
    fn content(&self) -> &[u8];

    /// Replace the content. Empty content is rejected.
    fn set(&mut self, content: Vec<u8>) -> PDFDecryptResult<()>;

    /// Length of the content in bytes
    fn len(&self) -> usize {
        self.content().len()
    }

    /// Whether the content is empty
    fn is_empty(&self) -> bool {
        self.content().is_empty()
    }
}

pub(crate) fn ensure_not_empty(content: &[u8]) -> PDFDecryptResult<()> {
    if content.is_empty() {
        return Err(PDFDecryptError::malformed(
            "Unable to set content. Given content is empty",
        ));
    }
    Ok(())
}

/// Literal string, stored unescaped
#[derive(Clone, PartialEq, Eq, Default)]
pub struct LiteralString {
    content: Vec<u8>,
}

impl LiteralString {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self { content: content.into() }
    }

    /// Build from the escaped text found between the outer parentheses
    pub fn from_escaped(escaped: &[u8]) -> Self {
        Self::new(Self::unescape(escaped))
    }

    /// Escaped form suitable for writing between parentheses
    pub fn escaped(&self) -> Vec<u8> {
        Self::escape(&self.content)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.content
    }

    /// Escape backslashes, parentheses and control characters
    pub fn escape(raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len() + raw.len() / 8);
        for &b in raw {
            match b {
                b'\\' => out.extend_from_slice(b"\\\\"),
                b'(' => out.extend_from_slice(b"\\("),
                b')' => out.extend_from_slice(b"\\)"),
                b'\n' => out.extend_from_slice(b"\\n"),
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\t' => out.extend_from_slice(b"\\t"),
                0x08 => out.extend_from_slice(b"\\b"),
                0x0c => out.extend_from_slice(b"\\f"),
                _ => out.push(b),
            }
        }
        out
    }

    /// Resolve escape sequences of a literal string body
    pub fn unescape(escaped: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(escaped.len());
        let mut i = 0;
        while i < escaped.len() {
            let b = escaped[i];
            i += 1;
            if b != b'\\' {
                out.push(b);
                continue;
            }
            let Some(&next) = escaped.get(i) else {
                break;
            };
            i += 1;
            match next {
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0c),
                b'0'..=b'7' => {
                    let mut value = u32::from(next - b'0');
                    let mut digits = 1;
                    while digits < 3 {
                        match escaped.get(i) {
                            Some(&d @ b'0'..=b'7') => {
                                value = value * 8 + u32::from(d - b'0');
                                i += 1;
                                digits += 1;
                            }
                            _ => break,
                        }
                    }
                    out.push((value & 0xff) as u8);
                }
                // line continuation
                b'\r' => {
                    if escaped.get(i) == Some(&b'\n') {
                        i += 1;
                    }
                }
                b'\n' => {}
                other => out.push(other),
            }
        }
        out
    }
}

impl StringObject for LiteralString {
    fn content(&self) -> &[u8] {
        &self.content
    }

    fn set(&mut self, content: Vec<u8>) -> PDFDecryptResult<()> {
        ensure_not_empty(&content)?;
        self.content = content;
        Ok(())
    }
}

impl fmt::Debug for LiteralString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", String::from_utf8_lossy(&self.escaped()))
    }
}

/// Hexadecimal string, stored as raw bytes
#[derive(Clone, PartialEq, Eq, Default)]
pub struct HexadecimalString {
    content: Vec<u8>,
}

impl HexadecimalString {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self { content: content.into() }
    }

    /// Parse hex digits. Whitespace is ignored and an odd final digit is
    /// completed with `0`.
    pub fn from_hex(text: &[u8]) -> PDFDecryptResult<Self> {
        let mut digits: Vec<u8> = text
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        if digits.len() % 2 == 1 {
            digits.push(b'0');
        }
        let content = hex::decode(&digits).map_err(|e| {
            PDFDecryptError::malformed(format!("Invalid hexadecimal string: {}", e))
        })?;
        Ok(Self { content })
    }

    /// Upper-case hexadecimal view
    pub fn hex(&self) -> String {
        hex::encode_upper(&self.content)
    }

    /// Binary view
    pub fn bin(&self) -> &[u8] {
        &self.content
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.content
    }
}

impl StringObject for HexadecimalString {
    fn content(&self) -> &[u8] {
        &self.content
    }

    fn set(&mut self, content: Vec<u8>) -> PDFDecryptResult<()> {
        ensure_not_empty(&content)?;
        self.content = content;
        Ok(())
    }
}

impl fmt::Debug for HexadecimalString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(b"plain", b"plain")]
    #[case(b"a\\(b\\)c", b"a(b)c")]
    #[case(b"back\\\\slash", b"back\\slash")]
    #[case(b"\\n\\r\\t\\b\\f", b"\n\r\t\x08\x0c")]
    #[case(b"\\101\\102\\7", b"AB\x07")]
    #[case(b"\\0053", b"\x053")]
    #[case(b"split\\\r\nline", b"splitline")]
    #[case(b"split\\\nline", b"splitline")]
    #[case(b"\\q", b"q")]
    fn test_unescape(#[case] escaped: &[u8], #[case] raw: &[u8]) {
        assert_eq!(LiteralString::unescape(escaped), raw.to_vec());
    }

    #[test_log::test]
    fn test_escape_binary_survives_unescape() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let escaped = LiteralString::escape(&raw);
        assert!(!escaped.contains(&b'\r'));
        assert_eq!(LiteralString::unescape(&escaped), raw);
    }

    #[test_log::test]
    fn test_set_rejects_empty() {
        let mut literal = LiteralString::new(b"x".to_vec());
        assert!(matches!(
            literal.set(Vec::new()),
            Err(PDFDecryptError::MalformedPDF(_))
        ));
        literal.set(b"value".to_vec()).unwrap();
        assert_eq!(literal.content(), b"value");
        assert_eq!(literal.len(), 5);

        let mut hex = HexadecimalString::default();
        assert!(hex.is_empty());
        assert!(hex.set(Vec::new()).is_err());
    }

    #[test_log::test]
    fn test_hex_views() -> PDFDecryptResult<()> {
        let hex = HexadecimalString::from_hex(b"48 65 6c\n6C 6f")?;
        assert_eq!(hex.bin(), b"Hello");
        assert_eq!(hex.hex(), "48656C6C6F");

        let odd = HexadecimalString::from_hex(b"901FA")?;
        assert_eq!(odd.bin(), &[0x90, 0x1f, 0xa0]);

        assert!(HexadecimalString::from_hex(b"zz").is_err());
        Ok(())
    }
}
