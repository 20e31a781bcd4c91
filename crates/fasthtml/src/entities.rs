//! Character reference decoding.
//!
//! Contract:
//! - Named references are decoded from a fixed table (`&amp;`, `&lt;`, `&nbsp;`,
//!   `&copy;`, ...) and must be semicolon-terminated. Names are case-sensitive.
//! - Numeric references decode only when well-formed and semicolon-terminated:
//!   `&#123;` (at most 7 digits) and `&#x1F4A9;` (at most 6 hex digits).
//! - Only valid Unicode scalar values decode.
//! - Anything else stays literal.
//!
//! Not HTML5-spec-complete; the behavior is kept narrow and stable.

use crate::fast_map::FastMap;
use memchr::memchr;
use std::sync::OnceLock;

const MAX_HEX_DIGITS: usize = 6; // 0x10FFFF
const MAX_DEC_DIGITS: usize = 7; // 1114111
const MAX_NAME_LEN: usize = 8;

const NAMED: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{00A0}'),
    ("AMP", '&'),
    ("LT", '<'),
    ("GT", '>'),
    ("QUOT", '"'),
    ("copy", '\u{00A9}'),
    ("reg", '\u{00AE}'),
    ("trade", '\u{2122}'),
    ("hellip", '\u{2026}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201C}'),
    ("rdquo", '\u{201D}'),
    ("laquo", '\u{00AB}'),
    ("raquo", '\u{00BB}'),
    ("middot", '\u{00B7}'),
    ("bull", '\u{2022}'),
    ("times", '\u{00D7}'),
    ("divide", '\u{00F7}'),
    ("deg", '\u{00B0}'),
    ("plusmn", '\u{00B1}'),
    ("para", '\u{00B6}'),
    ("sect", '\u{00A7}'),
    ("cent", '\u{00A2}'),
    ("pound", '\u{00A3}'),
    ("yen", '\u{00A5}'),
    ("euro", '\u{20AC}'),
    ("iexcl", '\u{00A1}'),
    ("iquest", '\u{00BF}'),
    ("shy", '\u{00AD}'),
];

fn named_table() -> &'static FastMap<char> {
    static TABLE: OnceLock<FastMap<char>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = FastMap::new();
        for &(name, ch) in NAMED {
            if let Err(err) = table.add(name, ch) {
                log::warn!(target: "fasthtml.scanner", "entity table: {err}");
            }
        }
        table
    })
}

/// One piece of decoded input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Piece<'a> {
    /// Input copied through unchanged.
    Literal(&'a str),
    /// A decoded character reference.
    Decoded(char),
}

/// Iterator over the literal runs and decoded references of a string, each
/// paired with its byte offset in that string.
#[derive(Clone, Debug)]
pub struct Entities<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Entities<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for Entities<'a> {
    type Item = (usize, Piece<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        let rest = bytes.get(start..).filter(|rest| !rest.is_empty())?;

        if rest[0] != b'&' {
            let end = memchr(b'&', rest).map_or(bytes.len(), |i| start + i);
            self.pos = end;
            return Some((start, Piece::Literal(&self.src[start..end])));
        }
        if let Some((ch, end)) = parse_reference(self.src, start) {
            self.pos = end;
            return Some((start, Piece::Decoded(ch)));
        }
        // Keep the '&' and continue with the bytes after it as plain text.
        self.pos = start + 1;
        Some((start, Piece::Literal(&self.src[start..start + 1])))
    }
}

/// Decode the reference starting at `start` (which holds `&`). Returns the
/// character and the offset just past the `;`.
fn parse_reference(src: &str, start: usize) -> Option<(char, usize)> {
    let bytes = src.as_bytes();
    match (bytes.get(start + 1), bytes.get(start + 2)) {
        (Some(b'#'), Some(b'x' | b'X')) => {
            let digits = start + 3;
            let end = scan_numeric(bytes, digits, MAX_HEX_DIGITS, true)?;
            let ch = u32::from_str_radix(&src[digits..end], 16)
                .ok()
                .and_then(char::from_u32)?;
            Some((ch, end + 1))
        }
        (Some(b'#'), _) => {
            let digits = start + 2;
            let end = scan_numeric(bytes, digits, MAX_DEC_DIGITS, false)?;
            let ch = src[digits..end].parse::<u32>().ok().and_then(char::from_u32)?;
            Some((ch, end + 1))
        }
        _ => {
            let name_start = start + 1;
            let mut j = name_start;
            while j < bytes.len() && j - name_start <= MAX_NAME_LEN && bytes[j].is_ascii_alphanumeric()
            {
                j += 1;
            }
            if bytes.get(j) != Some(&b';') || j == name_start {
                return None;
            }
            let name = &src[name_start..j];
            let mut chars = name.chars();
            let c1 = chars.next()?;
            let c2 = chars.next().unwrap_or('\0');
            let table = named_table();
            if !table.possibly_contains(c1, c2, name.len()) {
                return None;
            }
            table.get(name).map(|&ch| (ch, j + 1))
        }
    }
}

/// Bounded digit scan. Returns the offset of the terminating `;`.
fn scan_numeric(bytes: &[u8], start: usize, max_digits: usize, is_hex: bool) -> Option<usize> {
    let mut j = start;
    let mut digits = 0usize;
    while j < bytes.len() {
        let b = bytes[j];
        if b == b';' {
            return (digits > 0).then_some(j);
        }
        if digits == max_digits {
            return None;
        }
        let ok = if is_hex {
            b.is_ascii_hexdigit()
        } else {
            b.is_ascii_digit()
        };
        if !ok {
            return None;
        }
        digits += 1;
        j += 1;
    }
    None
}

/// Decode all character references in `s`.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (_, piece) in Entities::new(s) {
        match piece {
            Piece::Literal(text) => out.push_str(text),
            Piece::Decoded(ch) => out.push(ch),
        }
    }
    out
}
