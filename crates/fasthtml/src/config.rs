//! Scanner configuration.

use encoding_rs::{Encoding, UTF_8};
use std::fmt;

/// Smallest effective text limit; every character fits in a run this long.
pub const MIN_TEXT_LIMIT: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScannerConfig {
    /// Decode character references in text and attribute values.
    pub decode_entities: bool,
    /// Record each token's source span (`Token::raw`).
    pub keep_raw: bool,
    /// Encoding text is accumulated in. Characters it cannot represent come
    /// out as `?`.
    pub encoding: &'static Encoding,
    /// Record a `LossyConversion` issue for each such character.
    pub strict_encoding: bool,
    /// Split text runs longer than this many accumulated bytes. Values below
    /// `MIN_TEXT_LIMIT` are raised to it.
    pub text_limit: Option<usize>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            decode_entities: true,
            keep_raw: false,
            encoding: UTF_8,
            strict_encoding: false,
            text_limit: None,
        }
    }
}

impl ScannerConfig {
    /// Default configuration with the encoding named by a WHATWG label
    /// (`"utf-8"`, `"latin1"`, `"windows-1251"`, ...).
    pub fn with_encoding_label(label: &str) -> Result<Self, ConfigError> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))?;
        Ok(Self {
            encoding,
            ..Self::default()
        })
    }

    pub(crate) fn effective_text_limit(&self) -> Option<usize> {
        self.text_limit.map(|limit| limit.max(MIN_TEXT_LIMIT))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    UnknownEncoding(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownEncoding(label) => write!(f, "unknown encoding label {label:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}
