//! Caller-facing chunk layer over the scanner.
//!
//! A `Chunk` is an immutable value built from a `Token`, carrying the
//! regenerated HTML and tag helpers. Two chunks are equal when their kind and
//! regenerated HTML are equal.

use crate::config::ScannerConfig;
use crate::error::ScanIssue;
use crate::scanner::Scanner;
use crate::token::{Param, Token, TokenKind};
use crate::vocabulary::Vocabulary;
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Text,
    Tag,
    Comment,
    Script,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagType {
    Open,
    Close,
    /// `<name/>`.
    SelfClose,
}

#[derive(Clone, Debug)]
pub struct Chunk {
    kind: ChunkKind,
    html: String,
    text: String,
    name: Arc<str>,
    tag_type: Option<TagType>,
    params: Vec<Param>,
}

impl Chunk {
    /// Text chunk. Its HTML is the text itself.
    pub fn text(text: impl Into<String>) -> Self {
        Self::from(Token::text(text))
    }

    /// Tag chunk. The name is lower-cased.
    pub fn tag(name: &str, tag_type: TagType, params: Vec<Param>) -> Self {
        let name: Arc<str> = Arc::from(name.to_ascii_lowercase());
        let token = match tag_type {
            TagType::Open => Token::open_tag(name, params),
            TagType::Close => {
                let mut token = Token::close_tag(name);
                token.params = params;
                token
            }
            TagType::SelfClose => Token::self_closing_tag(name, params),
        };
        Self::from(token)
    }

    /// Copy of this tag with parameter `name` set to `value`: replaced in
    /// place when present, appended otherwise. Other kinds are returned as is.
    pub fn with_param(self, name: &str, value: impl Into<String>) -> Self {
        let Some(tag_type) = self.tag_type else {
            return self;
        };
        let name = name.to_ascii_lowercase();
        let value = value.into();
        let mut params = self.params;
        match params.iter_mut().find(|param| *param.name == *name) {
            Some(param) => param.value = value,
            None => params.push(Param::new(name, value)),
        }
        Self::tag(&self.name, tag_type, params)
    }

    /// Copy of this tag without parameters.
    pub fn without_params(self) -> Self {
        match self.tag_type {
            Some(tag_type) => Self::tag(&self.name, tag_type, Vec::new()),
            None => self,
        }
    }

    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    /// Regenerated HTML.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Text content, comment text or script body; empty for tags.
    pub fn text_content(&self) -> &str {
        &self.text
    }

    /// Lower-cased tag name, `None` for non-tags.
    pub fn tag_name(&self) -> Option<&str> {
        self.tag_type.map(|_| &*self.name)
    }

    /// Comment marker (`!--`, `![CDATA[`, `!doctype`, ...) or the element
    /// of a script body. Empty for text.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag_type(&self) -> Option<TagType> {
        self.tag_type
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|param| param.name.eq_ignore_ascii_case(name))
            .map(|param| param.value.as_str())
    }

    pub fn param_matches(&self, name: &str, value: &str) -> bool {
        self.param(name) == Some(value)
    }

    pub fn param_matches_regex(&self, name: &str, regex: &Regex) -> bool {
        self.param(name).is_some_and(|value| regex.is_match(value))
    }

    /// Open tag called `name` whose parameters include every `(name, value)`
    /// pair in `params`.
    pub fn is_open_tag(&self, name: &str, params: &[(&str, &str)]) -> bool {
        self.tag_type == Some(TagType::Open)
            && self.name.eq_ignore_ascii_case(name)
            && params
                .iter()
                .all(|(param, value)| self.param_matches(param, value))
    }

    fn is_tag_named(&self, name: &str) -> bool {
        self.tag_type.is_some() && self.name.eq_ignore_ascii_case(name)
    }
}

impl From<Token> for Chunk {
    fn from(token: Token) -> Self {
        let html = token.generate_html();
        let (kind, tag_type) = match token.kind {
            TokenKind::Text => (ChunkKind::Text, None),
            TokenKind::OpenTag => (ChunkKind::Tag, Some(TagType::Open)),
            TokenKind::CloseTag if token.flags.self_closing => {
                (ChunkKind::Tag, Some(TagType::SelfClose))
            }
            TokenKind::CloseTag => (ChunkKind::Tag, Some(TagType::Close)),
            TokenKind::Comment => (ChunkKind::Comment, None),
            TokenKind::Script => (ChunkKind::Script, None),
        };
        Self {
            kind,
            html,
            text: token.text,
            name: token.name,
            tag_type,
            params: token.params,
        }
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.html == other.html
    }
}

impl Eq for Chunk {}

impl Hash for Chunk {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.html.hash(state);
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

/// Lazy chunk sequence over a document.
#[derive(Debug)]
pub struct Chunks<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Chunks<'a> {
    /// Conditions the scanner recovered from so far.
    pub fn issues(&self) -> &[ScanIssue] {
        self.scanner.issues()
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        self.scanner.next_token().map(Chunk::from)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Chunks of `html` with the default vocabulary. Nothing is scanned until
/// the sequence is iterated.
pub fn parse(html: &str, decode_entities: bool) -> Chunks<'_> {
    let config = ScannerConfig {
        decode_entities,
        ..ScannerConfig::default()
    };
    parse_with(html, Vocabulary::html(), config)
}

pub fn parse_with(html: &str, vocabulary: Arc<Vocabulary>, config: ScannerConfig) -> Chunks<'_> {
    Chunks {
        scanner: Scanner::new(html, vocabulary, config),
    }
}

#[derive(Debug)]
pub enum ReadError {
    Io(std::io::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Io(err) => write!(f, "failed to read document: {err}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError::Io(err)
    }
}

/// Read a whole document into memory and decode it.
///
/// A byte order mark takes precedence over `encoding`; without either the
/// document is decoded as UTF-8. Malformed sequences become U+FFFD.
pub fn read_document<R: Read>(
    mut reader: R,
    encoding: Option<&'static Encoding>,
) -> Result<String, ReadError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let (text, used, had_errors) = encoding.unwrap_or(UTF_8).decode(&bytes);
    if had_errors {
        log::debug!(
            target: "fasthtml.scanner",
            "document is not valid {}; malformed sequences replaced",
            used.name()
        );
    }
    Ok(text.into_owned())
}

/// Read, decode and parse a whole document. `config.encoding` is used to
/// decode the input as well.
pub fn parse_reader<R: Read>(reader: R, config: ScannerConfig) -> Result<Vec<Chunk>, ReadError> {
    let html = read_document(reader, Some(config.encoding))?;
    Ok(parse_with(&html, Vocabulary::html(), config).collect())
}

/// Concatenated HTML of `chunks`.
pub fn combine<I>(chunks: I) -> String
where
    I: IntoIterator,
    I::Item: Borrow<Chunk>,
{
    chunks.into_iter().fold(String::new(), |mut out, chunk| {
        out.push_str(as_chunk(&chunk).html());
        out
    })
}

/// Chunks between the first open tag matching `name` and `params` and its
/// balancing close tag, both excluded.
///
/// Self-closing tags do not affect the balance. Without a balancing close
/// tag, everything after the open tag is returned.
pub fn tag_content<'p, I>(
    chunks: I,
    name: &'p str,
    params: &'p [(&'p str, &'p str)],
) -> impl Iterator<Item = I::Item> + 'p
where
    I: IntoIterator,
    I::IntoIter: 'p,
    I::Item: Borrow<Chunk>,
{
    let mut balance = 1usize;
    chunks
        .into_iter()
        .skip_while(move |chunk| !as_chunk(chunk).is_open_tag(name, params))
        .skip(1)
        .take_while(move |chunk| {
            let chunk = as_chunk(chunk);
            if chunk.is_tag_named(name) {
                match chunk.tag_type {
                    Some(TagType::Open) => balance += 1,
                    Some(TagType::Close) => balance -= 1,
                    Some(TagType::SelfClose) | None => {}
                }
            }
            balance > 0
        })
}

fn as_chunk<C: Borrow<Chunk>>(chunk: &C) -> &Chunk {
    chunk.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(html: &str) -> Vec<Chunk> {
        parse(html, true).collect()
    }

    #[test]
    fn kinds_and_tag_types() {
        let parsed = chunks("<p>a<br/></p><!-- c --><script>s</script>");
        let summary: Vec<(ChunkKind, Option<TagType>)> = parsed
            .iter()
            .map(|chunk| (chunk.kind(), chunk.tag_type()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChunkKind::Tag, Some(TagType::Open)),
                (ChunkKind::Text, None),
                (ChunkKind::Tag, Some(TagType::SelfClose)),
                (ChunkKind::Tag, Some(TagType::Close)),
                (ChunkKind::Comment, None),
                (ChunkKind::Tag, Some(TagType::Open)),
                (ChunkKind::Script, None),
                (ChunkKind::Tag, Some(TagType::Close)),
            ]
        );
        assert_eq!(parsed[4].text_content(), " c ");
        assert_eq!(parsed[4].name(), "!--");
        assert_eq!(parsed[4].tag_name(), None);
        assert_eq!(parsed[6].text_content(), "s");
    }

    #[test]
    fn equality_is_kind_and_html() {
        let parsed = chunks("<a href='x'>");
        let built = Chunk::tag("A", TagType::Open, vec![Param::new("href", "x")]);
        assert_eq!(parsed[0], built);
        assert_ne!(Chunk::text("<b>"), Chunk::tag("b", TagType::Open, vec![]));
        assert_eq!(Chunk::text("x").to_string(), "x");
    }

    #[test]
    fn with_param_replaces_or_appends() {
        let chunk = Chunk::tag("img", TagType::SelfClose, vec![Param::new("src", "a.png")]);
        let chunk = chunk.with_param("SRC", "b.png").with_param("alt", "logo");
        assert_eq!(chunk.html(), "<img src=b.png alt=logo/>");
        assert_eq!(chunk.param("src"), Some("b.png"));
        assert_eq!(chunk.clone().without_params().html(), "<img/>");

        let text = Chunk::text("plain").with_param("x", "y");
        assert_eq!(text.html(), "plain");
    }

    #[test]
    fn param_predicates() {
        let parsed = chunks("<div class=\"item big\" id=main>");
        let div = &parsed[0];
        assert!(div.has_param("id"));
        assert!(div.has_param("ID"));
        assert!(!div.has_param("style"));
        assert!(div.param_matches("class", "item big"));
        assert!(!div.param_matches("class", "item"));
        let re = Regex::new(r"\bbig\b").unwrap();
        assert!(div.param_matches_regex("class", &re));
        assert!(!div.param_matches_regex("title", &re));
        assert!(div.is_open_tag("div", &[("id", "main")]));
        assert!(div.is_open_tag("DIV", &[]));
        assert!(!div.is_open_tag("div", &[("id", "other")]));
        assert!(!div.is_open_tag("span", &[]));
    }

    #[test]
    fn combine_reproduces_normalized_html() {
        let parsed = chunks("<P CLASS='a'>x &amp; y</P>");
        assert_eq!(combine(&parsed), "<p class=a>x & y</p>");
        assert_eq!(combine(parsed), "<p class=a>x & y</p>");
    }

    #[test]
    fn tag_content_balances_nested_tags() {
        let html = "<div id=a>1<div>2</div><div/>3</div>4";
        let inner = combine(tag_content(parse(html, true), "div", &[("id", "a")]));
        assert_eq!(inner, "1<div>2</div><div/>3");
    }

    #[test]
    fn tag_content_without_match_or_close() {
        let parsed = chunks("<p>x</p>");
        assert_eq!(tag_content(&parsed, "div", &[]).count(), 0);

        let parsed = chunks("<ul><li>a<li>b");
        let items: Vec<&Chunk> = tag_content(&parsed, "ul", &[]).collect();
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn entity_decoding_switch() {
        assert_eq!(combine(parse("a&lt;b", false)), "a&lt;b");
        assert_eq!(combine(parse("a&lt;b", true)), "a<b");
    }

    #[test]
    fn read_document_sniffs_bom_and_labels() {
        let utf8_bom = b"\xEF\xBB\xBF<p>caf\xC3\xA9</p>";
        assert_eq!(read_document(&utf8_bom[..], None).unwrap(), "<p>café</p>");

        let latin1 = b"<p>caf\xE9</p>";
        assert_eq!(
            read_document(&latin1[..], Some(encoding_rs::WINDOWS_1252)).unwrap(),
            "<p>café</p>"
        );

        let utf16 = b"\xFF\xFE<\x00b\x00>\x00";
        assert_eq!(read_document(&utf16[..], None).unwrap(), "<b>");
    }

    #[test]
    fn read_errors_surface() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("boom"))
            }
        }
        let err = read_document(Failing, None).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn parse_reader_uses_the_configured_encoding() {
        let config = ScannerConfig::with_encoding_label("latin1").unwrap();
        let parsed = parse_reader(&b"<b>\xE9</b>"[..], config).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].text_content(), "é");
    }
}
