//! Growable byte accumulator that assembles one token's text.
//!
//! ASCII characters are written as single bytes (for ASCII-compatible
//! encodings). Anything else is encoded through the configured encoding.
//! `finalize` decodes the buffered bytes back into text with the same
//! encoding, so characters the encoding cannot represent come back as the
//! substitution byte.
//!
//! Overflow policy: the buffer grows on demand. An optional hard limit turns
//! growth past the limit into `AccumulatorError::CapacityExceeded`; the
//! rejected write leaves the contents untouched.

use encoding_rs::{EncoderResult, Encoding, UTF_8};
use std::fmt;

/// Bytes preallocated per accumulator.
pub const INITIAL_CAPACITY: usize = 16 * 1024;

/// Byte written in place of a character the encoding cannot represent.
pub const SUBSTITUTION_BYTE: u8 = b'?';

// Longest single-character output of any encoding_rs encoder (ISO-2022-JP
// wraps two bytes in two three-byte escape sequences).
const MAX_ENCODED_CHAR: usize = 16;

/// What to do with a character the encoding cannot represent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmappablePolicy {
    /// Write `SUBSTITUTION_BYTE` and count it in `lossy_count`.
    #[default]
    Substitute,
    /// Reject the character with `AccumulatorError::LossyConversion`.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccumulatorError {
    CapacityExceeded { limit: usize },
    LossyConversion { ch: char },
}

impl fmt::Display for AccumulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccumulatorError::CapacityExceeded { limit } => {
                write!(f, "accumulated text would exceed {limit} bytes")
            }
            AccumulatorError::LossyConversion { ch } => {
                write!(f, "U+{:04X} cannot be represented in the target encoding", *ch as u32)
            }
        }
    }
}

impl std::error::Error for AccumulatorError {}

pub struct TextAccumulator {
    buffer: Vec<u8>,
    text: String,
    encoding: &'static Encoding,
    ascii_fast_path: bool,
    limit: Option<usize>,
    policy: UnmappablePolicy,
    lossy: u64,
}

impl TextAccumulator {
    /// Accumulator for `encoding`.
    ///
    /// Encodings without an encoder of their own (UTF-16) use their output
    /// encoding, UTF-8.
    pub fn new(encoding: &'static Encoding) -> Self {
        let encoding = encoding.output_encoding();
        Self {
            buffer: Vec::with_capacity(INITIAL_CAPACITY),
            text: String::new(),
            encoding,
            ascii_fast_path: encoding.is_ascii_compatible(),
            limit: None,
            policy: UnmappablePolicy::default(),
            lossy: 0,
        }
    }

    /// Cap the accumulated text at `limit` bytes.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_policy(mut self, policy: UnmappablePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn is_utf8(&self) -> bool {
        self.encoding == UTF_8
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Append one character.
    #[inline]
    pub fn append(&mut self, ch: char) -> Result<(), AccumulatorError> {
        if self.ascii_fast_path && ch.is_ascii() {
            self.reserve(1)?;
            self.buffer.push(ch as u8);
            return Ok(());
        }
        self.append_encoded(ch)
    }

    /// Append a run of text.
    ///
    /// On error, the characters before the failing one have been written.
    pub fn append_str(&mut self, text: &str) -> Result<(), AccumulatorError> {
        if self.is_utf8() {
            self.reserve(text.len())?;
            self.buffer.extend_from_slice(text.as_bytes());
            return Ok(());
        }
        for ch in text.chars() {
            self.append(ch)?;
        }
        Ok(())
    }

    /// Write `SUBSTITUTION_BYTE` explicitly.
    pub fn push_substitute(&mut self) -> Result<(), AccumulatorError> {
        self.reserve(1)?;
        self.buffer.push(SUBSTITUTION_BYTE);
        Ok(())
    }

    /// Decode the buffered bytes onto the finalized text and reset the write
    /// cursor. Finalized text is kept until `clear`.
    pub fn finalize(&mut self) -> &str {
        if !self.buffer.is_empty() {
            let (decoded, _) = self.encoding.decode_without_bom_handling(&self.buffer);
            self.text.push_str(&decoded);
            self.buffer.clear();
        }
        &self.text
    }

    /// Finalize and move the text out, leaving the accumulator empty.
    pub fn take_text(&mut self) -> String {
        self.finalize();
        std::mem::take(&mut self.text)
    }

    /// Reset to an empty state. Buffer capacity is retained.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.text.is_empty()
    }

    /// Bytes written since the last `finalize`.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Current byte capacity of the write buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Characters replaced by `SUBSTITUTION_BYTE` so far.
    pub fn lossy_count(&self) -> u64 {
        self.lossy
    }

    fn reserve(&mut self, additional: usize) -> Result<(), AccumulatorError> {
        if let Some(limit) = self.limit {
            let used = self.text.len() + self.buffer.len();
            if used.saturating_add(additional) > limit {
                return Err(AccumulatorError::CapacityExceeded { limit });
            }
        }
        self.buffer.reserve(additional);
        Ok(())
    }

    fn append_encoded(&mut self, ch: char) -> Result<(), AccumulatorError> {
        let mut utf8 = [0u8; 4];
        let src = ch.encode_utf8(&mut utf8);
        if self.is_utf8() {
            self.reserve(src.len())?;
            self.buffer.extend_from_slice(src.as_bytes());
            return Ok(());
        }

        let mut dst = [0u8; MAX_ENCODED_CHAR];
        let mut encoder = self.encoding.new_encoder();
        let (result, _, written) = encoder.encode_from_utf8_without_replacement(src, &mut dst, true);
        match result {
            EncoderResult::InputEmpty => {
                self.reserve(written)?;
                self.buffer.extend_from_slice(&dst[..written]);
                Ok(())
            }
            EncoderResult::Unmappable(_) | EncoderResult::OutputFull => match self.policy {
                UnmappablePolicy::Substitute => {
                    self.push_substitute()?;
                    self.lossy += 1;
                    Ok(())
                }
                UnmappablePolicy::Strict => Err(AccumulatorError::LossyConversion { ch }),
            },
        }
    }
}

impl Default for TextAccumulator {
    fn default() -> Self {
        Self::new(UTF_8)
    }
}

impl fmt::Debug for TextAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextAccumulator")
            .field("encoding", &self.encoding.name())
            .field("buffered", &self.buffer.len())
            .field("finalized", &self.text.len())
            .field("limit", &self.limit)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{ISO_2022_JP, UTF_16LE, WINDOWS_1251, WINDOWS_1252};

    #[test]
    fn ascii_is_written_byte_for_byte() {
        let mut acc = TextAccumulator::default();
        for ch in "hello".chars() {
            acc.append(ch).unwrap();
        }
        assert_eq!(acc.buffered_len(), 5);
        assert_eq!(acc.finalize(), "hello");
        assert_eq!(acc.buffered_len(), 0);
    }

    #[test]
    fn finalize_concatenates_across_cycles_until_clear() {
        let mut acc = TextAccumulator::default();
        acc.append_str("Hello, ").unwrap();
        assert_eq!(acc.finalize(), "Hello, ");
        acc.append_str("wörld").unwrap();
        assert_eq!(acc.finalize(), "Hello, wörld");
        assert_eq!(acc.finalize(), "Hello, wörld");

        acc.clear();
        assert!(acc.is_empty());
        assert_eq!(acc.finalize(), "");
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut acc = TextAccumulator::default();
        acc.append_str(&"x".repeat(INITIAL_CAPACITY * 2)).unwrap();
        let grown = acc.capacity();
        assert!(grown >= INITIAL_CAPACITY * 2);
        acc.clear();
        assert_eq!(acc.capacity(), grown);
    }

    #[test]
    fn buffer_grows_past_initial_capacity_without_limit() {
        let mut acc = TextAccumulator::default();
        for _ in 0..INITIAL_CAPACITY * 3 {
            acc.append('a').unwrap();
        }
        assert_eq!(acc.finalize().len(), INITIAL_CAPACITY * 3);
    }

    #[test]
    fn limit_rejects_overflow_and_keeps_contents() {
        let mut acc = TextAccumulator::default().with_limit(Some(4));
        acc.append_str("abcd").unwrap();
        assert_eq!(
            acc.append('e'),
            Err(AccumulatorError::CapacityExceeded { limit: 4 })
        );
        assert_eq!(acc.finalize(), "abcd");
    }

    #[test]
    fn limit_counts_finalized_text_and_whole_characters() {
        let mut acc = TextAccumulator::default().with_limit(Some(5));
        acc.append_str("abcd").unwrap();
        acc.finalize();
        // 'é' is two bytes in UTF-8: it does not fit in the last byte.
        assert_eq!(
            acc.append('é'),
            Err(AccumulatorError::CapacityExceeded { limit: 5 })
        );
        acc.append('e').unwrap();
        assert_eq!(acc.finalize(), "abcde");
    }

    #[test]
    fn single_byte_encoding_round_trips_mappable_characters() {
        let mut acc = TextAccumulator::new(WINDOWS_1251);
        acc.append('Ж').unwrap();
        assert_eq!(acc.buffered_len(), 1, "Cyrillic fits in one windows-1251 byte");
        acc.append_str(" ok").unwrap();
        assert_eq!(acc.finalize(), "Ж ok");
        assert_eq!(acc.lossy_count(), 0);
    }

    #[test]
    fn unmappable_character_is_substituted_and_counted() {
        // &#1329; (ARMENIAN CAPITAL LETTER AYB) has no windows-1251 byte.
        let mut acc = TextAccumulator::new(WINDOWS_1251);
        acc.append_str("a").unwrap();
        acc.append('\u{531}').unwrap();
        acc.append_str("b").unwrap();
        assert_eq!(acc.finalize(), "a?b");
        assert_eq!(acc.lossy_count(), 1);
    }

    #[test]
    fn strict_policy_reports_lossy_conversion() {
        let mut acc = TextAccumulator::new(WINDOWS_1251).with_policy(UnmappablePolicy::Strict);
        acc.append('a').unwrap();
        assert_eq!(
            acc.append('\u{531}'),
            Err(AccumulatorError::LossyConversion { ch: '\u{531}' })
        );
        assert_eq!(acc.finalize(), "a");
        assert_eq!(acc.lossy_count(), 0);
    }

    #[test]
    fn append_str_stops_at_first_strict_failure() {
        let mut acc = TextAccumulator::new(WINDOWS_1252).with_policy(UnmappablePolicy::Strict);
        let err = acc.append_str("€1 Ж 2").unwrap_err();
        assert_eq!(err, AccumulatorError::LossyConversion { ch: 'Ж' });
        assert_eq!(acc.finalize(), "€1 ");
    }

    #[test]
    fn utf16_uses_utf8_output_encoding() {
        let acc = TextAccumulator::new(UTF_16LE);
        assert_eq!(acc.encoding(), UTF_8);
        assert!(acc.is_utf8());
    }

    #[test]
    fn stateful_encoding_round_trips_per_character() {
        let mut acc = TextAccumulator::new(ISO_2022_JP);
        acc.append_str("a日b").unwrap();
        assert_eq!(acc.finalize(), "a日b");
    }

    #[test]
    fn take_text_moves_out_and_resets() {
        let mut acc = TextAccumulator::default();
        acc.append_str("chunk").unwrap();
        assert_eq!(acc.take_text(), "chunk");
        assert!(acc.is_empty());
        assert_eq!(acc.take_text(), "");
    }
}
