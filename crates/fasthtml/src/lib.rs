//! Streaming, non-DOM HTML tokenizer.
//!
//! `Scanner` pulls typed tokens out of an in-memory document. Tag and
//! attribute names are recognized through a `Vocabulary` built on a
//! two-character `DispatchTable` and a `FastMap`, and text is assembled in a
//! `TextAccumulator`. The `chunk` module wraps tokens into immutable `Chunk`s
//! for callers that want tag helpers instead of raw tokens.

pub mod accumulator;
pub mod chunk;
pub mod config;
pub mod dispatch;
pub mod entities;
pub mod error;
pub mod fast_map;
pub mod perf_fixtures;
pub mod scanner;
pub mod span;
pub mod token;
pub mod token_fmt;
pub mod vocabulary;

pub use accumulator::{AccumulatorError, TextAccumulator, UnmappablePolicy};
pub use chunk::{
    Chunk, ChunkKind, Chunks, ReadError, TagType, combine, parse, parse_reader, parse_with,
    read_document, tag_content,
};
pub use config::{ConfigError, ScannerConfig};
pub use dispatch::{DispatchError, DispatchId, DispatchSlot, DispatchTable, Registration};
pub use entities::decode_entities;
pub use error::{ScanIssue, ScanIssueCode};
pub use fast_map::{FastMap, FastMapError, FastMapStats};
pub use scanner::{Scanner, ScannerStats};
pub use span::Span;
pub use token::{Param, Quote, Token, TokenFlags, TokenKind};
pub use vocabulary::{AttrId, TagId, Vocabulary, VocabularyBuilder, VocabularyError};
