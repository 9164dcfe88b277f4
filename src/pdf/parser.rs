//! Object discovery over raw document bytes

use log::{debug, trace};

use super::object::{Address, Marker};
use super::stream::find;

/// An address token found in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub address: Address,
    /// Byte position of the address token
    pub offset: usize,
    /// Length of the address token
    pub header_len: usize,
}

/// Located object: its occurrence and the raw bytes of its body
#[derive(Debug, Clone, Copy)]
pub struct RawObject<'a> {
    pub occurrence: Occurrence,
    pub raw: &'a [u8],
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn at_word_end(data: &[u8], pos: usize) -> bool {
    data.get(pos).map_or(true, |&b| !is_word(b))
}

fn skip_digits(data: &[u8], mut pos: usize) -> usize {
    while data.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    pos
}

fn skip_spaces(data: &[u8], mut pos: usize) -> usize {
    while data.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

/// Match `N G obj` at `start`, returning the address and token length
fn match_object_header(data: &[u8], start: usize) -> Option<(Address, usize)> {
    let number_end = skip_digits(data, start);
    let generation_start = skip_spaces(data, number_end);
    if generation_start == number_end {
        return None;
    }
    let generation_end = skip_digits(data, generation_start);
    if generation_end == generation_start {
        return None;
    }
    let keyword = skip_spaces(data, generation_end);
    if keyword == generation_end || !data[keyword..].starts_with(b"obj") || !at_word_end(data, keyword + 3) {
        return None;
    }

    let number = std::str::from_utf8(&data[start..number_end]).ok()?.parse().ok()?;
    let generation = std::str::from_utf8(&data[generation_start..generation_end])
        .ok()?
        .parse()
        .ok()?;
    Some((Address::object(number, generation), keyword + 3 - start))
}

/// Match a structural keyword at `start`
fn match_marker(data: &[u8], start: usize) -> Option<(Address, usize)> {
    for marker in [Marker::StartXref, Marker::Trailer, Marker::Xref] {
        let keyword = marker.keyword().as_bytes();
        let end = start + keyword.len();
        if data.len() >= end && data[start..end].eq_ignore_ascii_case(keyword) && at_word_end(data, end) {
            // `/XRef` and friends are names, not sections
            if start > 0 && data[start - 1] == b'/' {
                return None;
            }
            return Some((Address::Marker(marker), keyword.len()));
        }
    }
    None
}

/// Skip a stream payload that starts at `start` (the `stream` keyword)
fn skip_stream(data: &[u8], start: usize) -> Option<usize> {
    let after = start + b"stream".len();
    if !data[start..].starts_with(b"stream") || !matches!(data.get(after), Some(b'\r') | Some(b'\n')) {
        return None;
    }
    Some(match find(&data[after..], b"endstream") {
        Some(pos) => after + pos + b"endstream".len(),
        None => data.len(),
    })
}

/// Find every object address in document order
pub fn scan_objects(data: &[u8]) -> Vec<Occurrence> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let boundary = pos == 0 || !is_word(data[pos - 1]);
        if !boundary {
            pos += 1;
            continue;
        }

        let b = data[pos];
        if b.is_ascii_digit() {
            if let Some((address, header_len)) = match_object_header(data, pos) {
                trace!("Found {} at offset {}", address, pos);
                found.push(Occurrence { address, offset: pos, header_len });
                pos += header_len;
            } else {
                pos = skip_digits(data, pos);
            }
            continue;
        }

        if let Some((address, header_len)) = match_marker(data, pos) {
            trace!("Found {} at offset {}", address, pos);
            found.push(Occurrence { address, offset: pos, header_len });
            pos += header_len;
            continue;
        }

        if b == b's' {
            if let Some(end) = skip_stream(data, pos) {
                pos = end;
                continue;
            }
        }
        pos += 1;
    }
    debug!("Found {} object addresses", found.len());
    found
}

/// Cut the document into per-object byte ranges. Each body runs up to the
/// next address; the last runs through the following `%%EOF`.
pub fn split_objects(data: &[u8]) -> Vec<RawObject<'_>> {
    let occurrences = scan_objects(data);
    occurrences
        .iter()
        .enumerate()
        .map(|(i, occurrence)| {
            let end = match occurrences.get(i + 1) {
                Some(next) => next.offset,
                None => find(&data[occurrence.offset..], b"%%EOF")
                    .map_or(data.len(), |p| occurrence.offset + p + b"%%EOF".len()),
            };
            RawObject {
                occurrence: *occurrence,
                raw: &data[occurrence.offset..end],
            }
        })
        .collect()
}
