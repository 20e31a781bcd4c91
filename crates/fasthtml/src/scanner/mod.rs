//! Pull scanner that turns an in-memory document into `Token`s.
//!
//! Each `next_token` call yields one token: a text run, an open or close tag,
//! a comment/CDATA/declaration, or a `script`/`style` body. The cursor only
//! moves forward and scanning never fails.
//!
//! Recovery policy for malformed markup:
//! - `<` not followed by a letter, `/` + letter, `!` or `?` is literal text and
//!   joins the surrounding text run.
//! - A tag cut off by end of input (including inside a quoted value) is text
//!   from its `<` to the end.
//! - A `<` where an attribute name is expected ends the broken tag: its bytes
//!   up to that `<` are text and scanning resumes at the new `<`.
//! - An unterminated comment, CDATA section or declaration runs to the end of
//!   input.
//! - An unterminated `script`/`style` body runs to the end of input and no
//!   close tag is produced.
//! - Repeated attributes keep the first occurrence.
//!
//! Each recovery is recorded as a `ScanIssue`.

mod rawtext;

use crate::accumulator::{AccumulatorError, TextAccumulator, UnmappablePolicy};
use crate::config::ScannerConfig;
use crate::entities::{Entities, Piece};
use crate::error::{ScanIssue, ScanIssueCode};
use crate::span::Span;
use crate::token::{Param, Quote, Token, TokenFlags, TokenKind, cdata_name, comment_name};
use crate::vocabulary::{TagId, Vocabulary};
use memchr::{memchr, memchr2, memmem};
use rawtext::find_close_tag;
use std::sync::Arc;

const COMMENT_START: &[u8] = b"<!--";
const COMMENT_END: &[u8] = b"-->";
const CDATA_START: &[u8] = b"<![CDATA[";
const CDATA_END: &[u8] = b"]]>";

#[derive(Clone, Debug, PartialEq, Eq)]
enum ScannerState {
    Data,
    /// Inside a `script`/`style` body.
    RawText { tag: Arc<str> },
    Done,
}

/// Scanner instrumentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScannerStats {
    pub tokens_emitted: u64,
    pub state_transitions: u64,
    pub recoveries: u64,
}

/// Recorded issues and the recovery count, kept in step.
#[derive(Debug, Default)]
struct IssueLog {
    issues: Vec<ScanIssue>,
    recoveries: u64,
}

impl IssueLog {
    fn record(&mut self, code: ScanIssueCode, position: usize) {
        self.issues.push(ScanIssue { code, position });
        self.recoveries = self.recoveries.saturating_add(1);
        log::debug!(target: "fasthtml.scanner", "recovered: {code} at byte {position}");
    }
}

/// Markup parsed ahead of the text run that precedes it.
#[derive(Debug)]
struct Pending {
    start: usize,
    end: usize,
    token: Token,
}

pub struct Scanner<'a> {
    source: &'a str,
    vocabulary: Arc<Vocabulary>,
    config: ScannerConfig,
    cursor: usize,
    state: ScannerState,
    /// Markup found at the end of the current text run.
    pending: Option<Pending>,
    /// End of a text run that was split at the text limit.
    run_end: Option<usize>,
    text: TextAccumulator,
    values: TextAccumulator,
    issues: IssueLog,
    stats: ScannerStats,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str, vocabulary: Arc<Vocabulary>, config: ScannerConfig) -> Self {
        let policy = if config.strict_encoding {
            UnmappablePolicy::Strict
        } else {
            UnmappablePolicy::Substitute
        };
        let text = TextAccumulator::new(config.encoding)
            .with_limit(config.effective_text_limit())
            .with_policy(policy);
        let values = TextAccumulator::new(config.encoding).with_policy(policy);
        Self {
            source,
            vocabulary,
            config,
            cursor: 0,
            state: ScannerState::Data,
            pending: None,
            run_end: None,
            text,
            values,
            issues: IssueLog::default(),
            stats: ScannerStats::default(),
        }
    }

    /// Scanner over `source` with the default HTML vocabulary and configuration.
    pub fn with_defaults(source: &'a str) -> Self {
        Self::new(source, Vocabulary::html(), ScannerConfig::default())
    }

    /// Byte offset of the next unread input.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    /// Conditions recovered from so far, in scan order.
    pub fn issues(&self) -> &[ScanIssue] {
        &self.issues.issues
    }

    pub fn stats(&self) -> ScannerStats {
        ScannerStats {
            recoveries: self.issues.recoveries,
            ..self.stats
        }
    }

    /// Source text of `token`, when it was scanned with raw capture on.
    pub fn raw_text(&self, token: &Token) -> Option<&'a str> {
        token.raw.and_then(|span| span.slice(self.source))
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            let token = match &self.state {
                ScannerState::Done => return None,
                ScannerState::RawText { tag } => {
                    let tag = Arc::clone(tag);
                    self.scan_raw_text(tag)
                }
                ScannerState::Data => self.scan_data(),
            };
            if let Some(token) = token {
                return Some(self.emit(token));
            }
        }
    }

    fn transition_to(&mut self, next: ScannerState) {
        if self.state == next {
            return;
        }
        #[cfg(any(test, feature = "debug-stats"))]
        {
            log::trace!(
                target: "fasthtml.scanner",
                "state {:?} -> {:?} @{}",
                self.state,
                next,
                self.cursor
            );
        }
        self.state = next;
        self.stats.state_transitions = self.stats.state_transitions.saturating_add(1);
    }

    fn emit(&mut self, token: Token) -> Token {
        if token.kind == TokenKind::OpenTag && is_raw_text_element(&token.name) {
            self.transition_to(ScannerState::RawText {
                tag: Arc::clone(&token.name),
            });
        }
        self.stats.tokens_emitted = self.stats.tokens_emitted.saturating_add(1);
        log::trace!(
            target: "fasthtml.scanner",
            "emit {:?} {:?} @{}",
            token.kind,
            token.name,
            self.cursor
        );
        token
    }

    fn issue(&mut self, code: ScanIssueCode, position: usize) {
        self.issues.record(code, position);
    }

    fn span(&self, start: usize, end: usize) -> Option<Span> {
        self.config.keep_raw.then(|| Span::new(start, end))
    }

    /// `None` means "state changed, ask again".
    fn scan_data(&mut self) -> Option<Token> {
        if let Some(pending) = self.pending.take_if(|pending| pending.start == self.cursor) {
            self.cursor = pending.end;
            return Some(pending.token);
        }
        let start = self.cursor;
        if start >= self.source.len() {
            self.transition_to(ScannerState::Done);
            return None;
        }
        let end = match self.run_end.take() {
            Some(end) => end,
            None => self.find_run_end(start),
        };
        if end == start {
            // Markup right at the cursor; it is pending now.
            return None;
        }
        let (token, stop) = self.text_token(start, end);
        if stop < end {
            self.run_end = Some(end);
        }
        self.cursor = stop;
        Some(token)
    }

    /// End of the text run starting at `start`. Markup found at the end is
    /// parsed and left in `pending`.
    fn find_run_end(&mut self, start: usize) -> usize {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut pos = start;
        loop {
            let Some(lt) = bytes
                .get(pos..)
                .and_then(|rest| memchr(b'<', rest))
                .map(|i| pos + i)
            else {
                return bytes.len();
            };
            if !starts_markup(bytes, lt) {
                self.issue(ScanIssueCode::StrayLessThan, lt);
                pos = lt + 1;
                continue;
            }
            match self.parse_markup(lt) {
                Ok((token, end)) => {
                    self.pending = Some(Pending {
                        start: lt,
                        end,
                        token,
                    });
                    return lt;
                }
                Err(resume) => pos = resume,
            }
        }
    }

    /// Text token for `start..end`, possibly cut short by the text limit.
    /// Returns the token and where it stopped.
    fn text_token(&mut self, start: usize, end: usize) -> (Token, usize) {
        let source = self.source;
        let run = &source[start..end];
        self.text.clear();
        let mut flags = TokenFlags::default();
        let mut stop = end;

        if self.config.decode_entities {
            for (offset, piece) in Entities::new(run) {
                let at = start + offset;
                let appended = match piece {
                    Piece::Literal(literal) => {
                        append_run(&mut self.text, &mut self.issues, at, literal)
                    }
                    Piece::Decoded(ch) => {
                        append_char(&mut self.text, &mut self.issues, at, ch).map(|()| {
                            flags.had_entities = true;
                            flags.lt_entity |= ch == '<';
                        })
                    }
                };
                if let Err(split) = appended {
                    stop = split;
                    break;
                }
            }
        } else if let Err(split) = append_run(&mut self.text, &mut self.issues, start, run) {
            stop = split;
        }

        if stop < end {
            self.issue(ScanIssueCode::TextLimitExceeded, stop);
        }
        let mut token = Token::text(self.text.take_text());
        token.flags = flags;
        token.raw = self.span(start, stop);
        (token, stop)
    }

    /// Parse the markup starting at `lt`. `Err(resume)` means the bytes from
    /// `lt` up to `resume` are text.
    fn parse_markup(&mut self, lt: usize) -> Result<(Token, usize), usize> {
        let source = self.source;
        let bytes = source.as_bytes();
        match bytes.get(lt + 1) {
            Some(b'!') => Ok(self.parse_bang(lt)),
            Some(b'?') => Ok(self.parse_declaration(lt, 1)),
            Some(b'/') => self.parse_close_tag(lt),
            Some(b) if b.is_ascii_alphabetic() => self.parse_open_tag(lt),
            _ => {
                self.issue(ScanIssueCode::StrayLessThan, lt);
                Err(lt + 1)
            }
        }
    }

    fn parse_bang(&mut self, lt: usize) -> (Token, usize) {
        let source = self.source;
        let bytes = source.as_bytes();
        let rest = &bytes[lt..];
        if rest.starts_with(b"<!-->") {
            return self.delimited(lt, lt + 4, lt + 4, lt + 5, comment_name());
        }
        if rest.starts_with(b"<!--->") {
            return self.delimited(lt, lt + 4, lt + 4, lt + 6, comment_name());
        }
        if rest.starts_with(COMMENT_START) {
            return self.parse_delimited(lt, COMMENT_START.len(), COMMENT_END, comment_name());
        }
        if rest.starts_with(CDATA_START) {
            return self.parse_delimited(lt, CDATA_START.len(), CDATA_END, cdata_name());
        }
        self.parse_declaration(lt, 1)
    }

    /// `<!--...-->` or `<![CDATA[...]]>`; runs to end of input when the
    /// terminator is missing.
    fn parse_delimited(
        &mut self,
        lt: usize,
        open_len: usize,
        close: &[u8],
        name: Arc<str>,
    ) -> (Token, usize) {
        let source = self.source;
        let bytes = source.as_bytes();
        let body = lt + open_len;
        match memmem::find(&bytes[body..], close) {
            Some(i) => self.delimited(lt, body, body + i, body + i + close.len(), name),
            None => {
                self.issue(ScanIssueCode::UnterminatedComment, lt);
                self.delimited(lt, body, bytes.len(), bytes.len(), name)
            }
        }
    }

    fn delimited(
        &self,
        lt: usize,
        body: usize,
        body_end: usize,
        end: usize,
        name: Arc<str>,
    ) -> (Token, usize) {
        let mut token = Token::comment(name, &self.source[body..body_end]);
        token.raw = self.span(lt, end);
        (token, end)
    }

    /// `<!name ...>` or `<?name ...?>`: a comment-kind token named by the
    /// lower-cased marker and name, holding the rest of the markup verbatim.
    fn parse_declaration(&mut self, lt: usize, marker_len: usize) -> (Token, usize) {
        let source = self.source;
        let bytes = source.as_bytes();
        let name_start = lt + 1 + marker_len;
        let name_end = scan_while(bytes, name_start, is_tag_name_byte);
        let name: Arc<str> = Arc::from(self.source[lt + 1..name_end].to_ascii_lowercase());
        match memchr(b'>', &bytes[name_end..]) {
            Some(i) => self.delimited(lt, name_end, name_end + i, name_end + i + 1, name),
            None => {
                self.issue(ScanIssueCode::UnterminatedComment, lt);
                self.delimited(lt, name_end, bytes.len(), bytes.len(), name)
            }
        }
    }

    fn parse_close_tag(&mut self, lt: usize) -> Result<(Token, usize), usize> {
        let source = self.source;
        let bytes = source.as_bytes();
        let name_start = lt + 2;
        let name_end = scan_while(bytes, name_start, is_tag_name_byte);
        // Anything up to `>` is ignored.
        let end = match memchr2(b'>', b'<', &bytes[name_end..]).map(|i| name_end + i) {
            Some(gt) if bytes[gt] == b'>' => gt + 1,
            Some(next_lt) => {
                self.issue(ScanIssueCode::UnterminatedTag, lt);
                return Err(next_lt);
            }
            None => {
                self.issue(ScanIssueCode::UnterminatedTag, lt);
                return Err(bytes.len());
            }
        };
        let (_, name) = self.tag_name(name_start, name_end);
        let mut token = Token::close_tag(name);
        token.raw = self.span(lt, end);
        Ok((token, end))
    }

    fn parse_open_tag(&mut self, lt: usize) -> Result<(Token, usize), usize> {
        let source = self.source;
        let bytes = source.as_bytes();
        let len = bytes.len();
        let name_start = lt + 1;
        let name_end = scan_while(bytes, name_start, is_tag_name_byte);
        let (tag_id, name) = self.tag_name(name_start, name_end);

        let mut params: Vec<Param> = Vec::new();
        let mut flags = TokenFlags::default();
        let mut k = name_end;
        let end = loop {
            k = scan_while(bytes, k, |b| b.is_ascii_whitespace());
            let Some(&b) = bytes.get(k) else {
                self.issue(ScanIssueCode::UnterminatedTag, lt);
                return Err(len);
            };
            match b {
                b'>' => break k + 1,
                b'/' if bytes.get(k + 1) == Some(&b'>') => {
                    flags.closing = true;
                    flags.self_closing = true;
                    break k + 2;
                }
                b'<' => {
                    self.issue(ScanIssueCode::UnterminatedTag, lt);
                    return Err(k);
                }
                b'/' | b'=' | b'"' | b'\'' => k += 1,
                _ => {
                    let attr_start = k;
                    k = scan_while(bytes, k, is_attr_name_byte);
                    let attr_end = k;
                    k = scan_while(bytes, k, |b| b.is_ascii_whitespace());

                    let mut value = String::new();
                    let mut quote = Quote::None;
                    if bytes.get(k) == Some(&b'=') {
                        k = scan_while(bytes, k + 1, |b| b.is_ascii_whitespace());
                        let (value_start, value_end) = match bytes.get(k) {
                            Some(&q @ (b'"' | b'\'')) => {
                                quote = Quote::from_byte(q);
                                let Some(i) = memchr(q, &bytes[k + 1..]) else {
                                    self.issue(ScanIssueCode::UnterminatedTag, lt);
                                    return Err(len);
                                };
                                let range = (k + 1, k + 1 + i);
                                k = range.1 + 1;
                                range
                            }
                            _ => {
                                let value_start = k;
                                k = scan_unquoted_value(bytes, k);
                                (value_start, k)
                            }
                        };
                        value = self.attr_value(value_start, value_end, &mut flags);
                    }

                    let attr_name = self.attr_name(tag_id, attr_start, attr_end);
                    if params.iter().any(|param| param.name == attr_name) {
                        self.issue(ScanIssueCode::DuplicateAttribute, attr_start);
                        continue;
                    }
                    params.push(Param {
                        name: attr_name,
                        value,
                        quote,
                    });
                }
            }
        };

        let mut token = if flags.self_closing {
            Token::self_closing_tag(name, params)
        } else {
            Token::open_tag(name, params)
        };
        token.flags.had_entities = flags.had_entities;
        token.flags.lt_entity = flags.lt_entity;
        token.raw = self.span(lt, end);
        Ok((token, end))
    }

    /// Canonical tag name for `start..end`: the vocabulary's shared name when
    /// it is known, a fresh lower-cased copy otherwise.
    fn tag_name(&self, start: usize, end: usize) -> (Option<TagId>, Arc<str>) {
        let raw = &self.source[start..end];
        match self.vocabulary.match_tag(raw.as_bytes()) {
            Some(id) => match self.vocabulary.tag_name(id) {
                Some(name) => (Some(id), Arc::clone(name)),
                None => (None, Arc::from(raw.to_ascii_lowercase())),
            },
            None => (None, Arc::from(raw.to_ascii_lowercase())),
        }
    }

    fn attr_name(&self, tag: Option<TagId>, start: usize, end: usize) -> Arc<str> {
        let raw = &self.source[start..end];
        self.vocabulary
            .match_attr(tag, raw.as_bytes())
            .and_then(|id| self.vocabulary.attr_name(id))
            .map_or_else(|| Arc::from(raw.to_ascii_lowercase()), Arc::clone)
    }

    fn attr_value(&mut self, start: usize, end: usize, flags: &mut TokenFlags) -> String {
        let source = self.source;
        let raw = &source[start..end];
        if raw.is_empty() {
            return String::new();
        }
        self.values.clear();
        if self.config.decode_entities {
            for (offset, piece) in Entities::new(raw) {
                let at = start + offset;
                let appended = match piece {
                    Piece::Literal(literal) => {
                        append_run(&mut self.values, &mut self.issues, at, literal)
                    }
                    Piece::Decoded(ch) => {
                        flags.had_entities = true;
                        flags.lt_entity |= ch == '<';
                        append_char(&mut self.values, &mut self.issues, at, ch)
                    }
                };
                debug_assert!(appended.is_ok(), "attribute values have no length limit");
            }
        } else {
            let appended = append_run(&mut self.values, &mut self.issues, start, raw);
            debug_assert!(appended.is_ok(), "attribute values have no length limit");
        }
        self.values.take_text()
    }

    /// `script`/`style` body, then its close tag.
    fn scan_raw_text(&mut self, tag: Arc<str>) -> Option<Token> {
        let start = self.cursor;
        let source = self.source;
        let bytes = source.as_bytes();
        match find_close_tag(&bytes[start..], tag.as_bytes()) {
            Some((rel_start, rel_end)) => {
                if rel_start > 0 {
                    let body_end = start + rel_start;
                    let mut token = Token::script(Arc::clone(&tag), &self.source[start..body_end]);
                    token.raw = self.span(start, body_end);
                    self.cursor = body_end;
                    return Some(token);
                }
                let end = start + rel_end;
                let mut token = Token::close_tag(tag);
                token.raw = self.span(start, end);
                self.cursor = end;
                self.transition_to(ScannerState::Data);
                Some(token)
            }
            None => {
                self.issue(ScanIssueCode::UnterminatedRawText, start);
                let end = bytes.len();
                self.cursor = end;
                self.transition_to(ScannerState::Done);
                (end > start).then(|| {
                    let mut token = Token::script(tag, &self.source[start..end]);
                    token.raw = self.span(start, end);
                    token
                })
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

impl std::iter::FusedIterator for Scanner<'_> {}

impl std::fmt::Debug for Scanner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("cursor", &self.cursor)
            .field("len", &self.source.len())
            .field("state", &self.state)
            .field("issues", &self.issues.issues.len())
            .finish()
    }
}

/// Append a literal run. `Err` carries the offset where the text limit was hit.
fn append_run(
    acc: &mut TextAccumulator,
    issues: &mut IssueLog,
    at: usize,
    run: &str,
) -> Result<(), usize> {
    // UTF-8 bulk appends are all-or-nothing, so a failure leaves nothing to undo.
    if acc.is_utf8() && acc.append_str(run).is_ok() {
        return Ok(());
    }
    for (offset, ch) in run.char_indices() {
        append_char(acc, issues, at + offset, ch)?;
    }
    Ok(())
}

fn append_char(
    acc: &mut TextAccumulator,
    issues: &mut IssueLog,
    at: usize,
    ch: char,
) -> Result<(), usize> {
    match acc.append(ch) {
        Ok(()) => Ok(()),
        Err(AccumulatorError::LossyConversion { .. }) => {
            // A substitute that does not fit is retried in the next run; record it once.
            acc.push_substitute().map_err(|_| at)?;
            issues.record(ScanIssueCode::LossyConversion, at);
            Ok(())
        }
        Err(AccumulatorError::CapacityExceeded { .. }) => Err(at),
    }
}

fn is_raw_text_element(name: &str) -> bool {
    matches!(name, "script" | "style")
}

/// `<` followed by something that can open markup.
fn starts_markup(bytes: &[u8], lt: usize) -> bool {
    match bytes.get(lt + 1) {
        Some(b'!' | b'?') => true,
        Some(b'/') => bytes.get(lt + 2).is_some_and(|b| b.is_ascii_alphabetic()),
        Some(b) => b.is_ascii_alphabetic(),
        None => false,
    }
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_attr_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'=' | b'<' | b'"' | b'\'')
}

/// Unquoted values end at whitespace, `>`, or a `/>` that closes the tag.
fn scan_unquoted_value(bytes: &[u8], mut i: usize) -> usize {
    while let Some(&b) = bytes.get(i) {
        if b.is_ascii_whitespace() || b == b'>' || (b == b'/' && bytes.get(i + 1) == Some(&b'>')) {
            break;
        }
        i += 1;
    }
    i
}

fn scan_while(bytes: &[u8], mut i: usize, pred: impl Fn(u8) -> bool) -> usize {
    while i < bytes.len() && pred(bytes[i]) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests;
