//! Byte-level tokenizer for PDF dictionary and array syntax

use crate::error::{PDFDecryptError, PDFDecryptResult};

/// Token produced by [`Lexer`]
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    DictOpen,
    DictClose,
    ArrayOpen,
    ArrayClose,
    /// Name without the leading slash
    Name(Vec<u8>),
    /// Literal string body, still escaped
    Literal(Vec<u8>),
    /// Hex string body, still in hex digits
    Hex(Vec<u8>),
    /// Number, keyword or any other run of regular characters
    Bare(Vec<u8>),
}

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0c | 0x00)
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

pub(crate) fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Cursor over a byte slice. Cloning the lexer is a cheap checkpoint.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Skip whitespace and comments
    pub fn skip_whitespace(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(&c) = self.data.get(self.pos) {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Whether only whitespace and comments remain
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.data.len()
    }

    /// Read the next token, or `None` at the end of input
    pub fn next_token(&mut self) -> PDFDecryptResult<Option<Token>> {
        self.skip_whitespace();
        let Some(&b) = self.data.get(self.pos) else {
            return Ok(None);
        };

        let token = match b {
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                self.pos += 2;
                Token::DictOpen
            }
            b'>' if self.data.get(self.pos + 1) == Some(&b'>') => {
                self.pos += 2;
                Token::DictClose
            }
            b'[' => {
                self.pos += 1;
                Token::ArrayOpen
            }
            b']' => {
                self.pos += 1;
                Token::ArrayClose
            }
            b'/' => {
                self.pos += 1;
                Token::Name(self.take_regular().to_vec())
            }
            b'(' => Token::Literal(self.read_literal()?),
            b'<' => Token::Hex(self.read_hex()?),
            _ if is_regular(b) => Token::Bare(self.take_regular().to_vec()),
            other => {
                return Err(PDFDecryptError::malformed(format!(
                    "Unexpected character '{}' at offset {}",
                    other as char, self.pos
                )))
            }
        };
        Ok(Some(token))
    }

    fn take_regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.data.get(self.pos).is_some_and(|&b| is_regular(b)) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn read_literal(&mut self) -> PDFDecryptResult<Vec<u8>> {
        let start = self.pos;
        // skip the opening parenthesis
        self.pos += 1;
        let body_start = self.pos;
        let mut depth = 1usize;
        while let Some(&b) = self.data.get(self.pos) {
            match b {
                b'\\' => {
                    self.pos += 2;
                    continue;
                }
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = self.data[body_start..self.pos].to_vec();
                        self.pos += 1;
                        return Ok(body);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(PDFDecryptError::malformed(format!(
            "Unterminated literal string at offset {}",
            start
        )))
    }

    fn read_hex(&mut self) -> PDFDecryptResult<Vec<u8>> {
        let start = self.pos;
        self.pos += 1;
        let body_start = self.pos;
        while let Some(&b) = self.data.get(self.pos) {
            if b == b'>' {
                let body = self.data[body_start..self.pos].to_vec();
                self.pos += 1;
                return Ok(body);
            }
            self.pos += 1;
        }
        Err(PDFDecryptError::malformed(format!(
            "Unterminated hexadecimal string at offset {}",
            start
        )))
    }
}
