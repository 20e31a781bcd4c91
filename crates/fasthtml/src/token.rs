//! Token model and HTML regeneration.

use crate::span::Span;
use std::fmt::Write;
use std::sync::{Arc, OnceLock};

/// Comment token name for `<!-- ... -->`.
pub const COMMENT_NAME: &str = "!--";
/// Comment token name for `<![CDATA[ ... ]]>`.
pub const CDATA_NAME: &str = "![CDATA[";

/// Values longer than this are always quoted on regeneration.
///
/// Length is counted in `char`s (Unicode scalar values), so a character
/// outside the Basic Multilingual Plane counts once, not as two UTF-16 units.
pub const SHORT_VALUE_MAX: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Text,
    OpenTag,
    CloseTag,
    Comment,
    Script,
}

/// Quote character a parameter value was written with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Quote {
    #[default]
    None,
    Single,
    Double,
}

impl Quote {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'\'' => Quote::Single,
            b'"' => Quote::Double,
            _ => Quote::None,
        }
    }

    pub fn as_char(self) -> Option<char> {
        match self {
            Quote::None => None,
            Quote::Single => Some('\''),
            Quote::Double => Some('"'),
        }
    }
}

/// Tag parameter (attribute).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Lower-cased name.
    pub name: Arc<str>,
    /// Value, empty for a bare name.
    pub value: String,
    pub quote: Quote,
}

impl Param {
    pub fn new(name: impl Into<Arc<str>>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            quote: Quote::None,
        }
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = quote;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TokenFlags {
    /// Close tag, either `</name>` or self-closing `<name/>`.
    pub closing: bool,
    /// The closing slash came at the end of the tag (`<br/>`).
    pub self_closing: bool,
    /// Character references were decoded in this token.
    pub had_entities: bool,
    /// A `&lt;` reference was decoded in this token.
    pub lt_entity: bool,
}

/// One recognized unit of markup.
///
/// Tokens are plain values: the scanner builds a new one per call and never
/// touches it again once returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Lower-cased tag name; empty for text.
    pub name: Arc<str>,
    /// Text content, comment/CDATA/declaration body, or script body.
    pub text: String,
    /// Parameters in source order.
    pub params: Vec<Param>,
    pub flags: TokenFlags,
    /// Source span, present when raw capture is enabled.
    pub raw: Option<Span>,
}

impl Token {
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Text, empty_name(), text.into())
    }

    pub fn open_tag(name: impl Into<Arc<str>>, params: Vec<Param>) -> Self {
        let mut token = Self::new(TokenKind::OpenTag, name.into(), String::new());
        token.params = params;
        token
    }

    pub fn close_tag(name: impl Into<Arc<str>>) -> Self {
        let mut token = Self::new(TokenKind::CloseTag, name.into(), String::new());
        token.flags.closing = true;
        token
    }

    pub fn self_closing_tag(name: impl Into<Arc<str>>, params: Vec<Param>) -> Self {
        let mut token = Self::close_tag(name);
        token.params = params;
        token.flags.self_closing = true;
        token
    }

    pub fn comment(name: impl Into<Arc<str>>, text: impl Into<String>) -> Self {
        Self::new(TokenKind::Comment, name.into(), text.into())
    }

    pub fn script(name: impl Into<Arc<str>>, text: impl Into<String>) -> Self {
        Self::new(TokenKind::Script, name.into(), text.into())
    }

    fn new(kind: TokenKind, name: Arc<str>, text: String) -> Self {
        Self {
            kind,
            name,
            text,
            params: Vec::new(),
            flags: TokenFlags::default(),
            raw: None,
        }
    }

    pub fn is_tag(&self) -> bool {
        matches!(self.kind, TokenKind::OpenTag | TokenKind::CloseTag)
    }

    /// First parameter called `name`.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| &*param.name == name)
    }

    /// Value of parameter `name`, or `""` when absent.
    pub fn param_value(&self, name: &str) -> &str {
        self.param(name).map_or("", |param| param.value.as_str())
    }

    /// Same kind, name, text and parameter name/value pairs. Quote style and
    /// raw span are ignored.
    pub fn same_structure(&self, other: &Token) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.text == other.text
            && self.flags.self_closing == other.flags.self_closing
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.name == b.name && a.value == b.value)
    }

    /// Regenerate HTML from this token's fields.
    ///
    /// This is a normalized rendering, not the original source text; use raw
    /// capture to recover the source.
    pub fn generate_html(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + self.text.len() + 8);
        self.write_html(&mut out);
        out
    }

    /// Append `generate_html` output to `out`.
    pub fn write_html(&self, out: &mut String) {
        match self.kind {
            TokenKind::OpenTag => {
                out.push('<');
                out.push_str(&self.name);
                self.write_params(out);
                out.push('>');
            }
            TokenKind::CloseTag => {
                if !self.params.is_empty() || self.flags.self_closing {
                    out.push('<');
                    out.push_str(&self.name);
                    self.write_params(out);
                    out.push_str("/>");
                } else {
                    out.push_str("</");
                    out.push_str(&self.name);
                    out.push('>');
                }
            }
            TokenKind::Script => {
                if self.text.is_empty() {
                    out.push_str("<script>n/a</script>");
                } else {
                    out.push_str(&self.text);
                }
            }
            TokenKind::Comment => match &*self.name {
                COMMENT_NAME if self.text.is_empty() => out.push_str("<!-- n/a -->"),
                COMMENT_NAME => {
                    out.push_str("<!--");
                    out.push_str(&self.text);
                    out.push_str("-->");
                }
                CDATA_NAME if self.text.is_empty() => out.push_str("<![CDATA[ n/a \n]]>"),
                CDATA_NAME => {
                    out.push_str("<![CDATA[");
                    out.push_str(&self.text);
                    out.push_str("]]>");
                }
                _ => {
                    out.push('<');
                    out.push_str(&self.name);
                    out.push_str(&self.text);
                    out.push('>');
                }
            },
            TokenKind::Text => out.push_str(&self.text),
        }
    }

    fn write_params(&self, out: &mut String) {
        for param in &self.params {
            out.push(' ');
            write_param(out, param);
        }
    }
}

/// Shared empty name used by text tokens.
pub(crate) fn empty_name() -> Arc<str> {
    static EMPTY: OnceLock<Arc<str>> = OnceLock::new();
    Arc::clone(EMPTY.get_or_init(|| Arc::from("")))
}

pub(crate) fn comment_name() -> Arc<str> {
    static NAME: OnceLock<Arc<str>> = OnceLock::new();
    Arc::clone(NAME.get_or_init(|| Arc::from(COMMENT_NAME)))
}

pub(crate) fn cdata_name() -> Arc<str> {
    static NAME: OnceLock<Arc<str>> = OnceLock::new();
    Arc::clone(NAME.get_or_init(|| Arc::from(CDATA_NAME)))
}

/// Render `name[=value]`.
///
/// Long values are quoted with the recorded quote (single quote when the
/// value was unquoted). Short values are left bare unless they contain
/// space, tab, CR, LF or a quote; those are single-quoted.
///
/// A bare short value containing `>` or ending in `/` does not survive a
/// re-scan: `a>b` ends the tag early and `/x/` makes the tag self-closing.
/// Callers that need re-scannable output must quote those values themselves.
pub fn write_param(out: &mut String, param: &Param) {
    out.push_str(&param.name);
    let value = param.value.as_str();
    if value.is_empty() {
        return;
    }
    out.push('=');
    if value.chars().count() > SHORT_VALUE_MAX {
        let quote = param.quote.as_char().unwrap_or('\'');
        write_quoted(out, value, quote);
        return;
    }
    if value
        .bytes()
        .any(|b| matches!(b, b' ' | b'\t' | b'\'' | b'"' | b'\n' | b'\r'))
    {
        write_quoted(out, value, '\'');
    } else {
        out.push_str(value);
    }
}

fn write_quoted(out: &mut String, value: &str, quote: char) {
    out.push(quote);
    escape_quote_into(out, value, quote);
    out.push(quote);
}

/// Copy `value` into `out`, writing every `quote` as a numeric character
/// reference.
pub fn escape_quote_into(out: &mut String, value: &str, quote: char) {
    let mut rest = value;
    while let Some(pos) = rest.find(quote) {
        out.push_str(&rest[..pos]);
        let _ = write!(out, "&#{};", quote as u32);
        rest = &rest[pos + quote.len_utf8()..];
    }
    out.push_str(rest);
}
