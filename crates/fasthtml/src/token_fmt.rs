//! Deterministic token formatting for golden and snapshot tests.
//!
//! One line per token, parameters in scan order.

use crate::span::Span;
use crate::token::{Token, TokenKind};
use std::fmt::Write;

#[derive(Debug, PartialEq, Eq)]
pub enum TokenFmtError {
    InvalidSpan { span: Span },
}

impl std::fmt::Display for TokenFmtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenFmtError::InvalidSpan { span } => {
                write!(f, "invalid span: {}..{}", span.start, span.end)
            }
        }
    }
}

impl std::error::Error for TokenFmtError {}

/// `KIND name=... [attrs=[...]] [text="..."] [flags]`.
pub fn format_token(token: &Token) -> String {
    let mut out = String::new();
    match token.kind {
        TokenKind::Text => {
            out.push_str("TEXT text=\"");
            escape_text_into(&mut out, &token.text);
            out.push('"');
        }
        TokenKind::OpenTag | TokenKind::CloseTag => {
            out.push_str(if token.kind == TokenKind::OpenTag {
                "OPEN"
            } else {
                "CLOSE"
            });
            out.push_str(" name=");
            out.push_str(&token.name);
            if token.kind == TokenKind::OpenTag || !token.params.is_empty() {
                out.push_str(" attrs=[");
                for (i, param) in token.params.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&param.name);
                    if !param.value.is_empty() {
                        out.push_str("=\"");
                        escape_text_into(&mut out, &param.value);
                        out.push('"');
                    }
                }
                out.push(']');
            }
            if token.flags.self_closing {
                out.push_str(" self_closing");
            }
        }
        TokenKind::Comment | TokenKind::Script => {
            out.push_str(if token.kind == TokenKind::Comment {
                "COMMENT"
            } else {
                "SCRIPT"
            });
            out.push_str(" name=");
            out.push_str(&token.name);
            out.push_str(" text=\"");
            escape_text_into(&mut out, &token.text);
            out.push('"');
        }
    }
    if token.flags.had_entities {
        out.push_str(" entities");
    }
    if token.flags.lt_entity {
        out.push_str(" lt");
    }
    out
}

/// `format_token` followed by ` raw="..."` resolved against `source`.
pub fn format_token_with_raw(token: &Token, source: &str) -> Result<String, TokenFmtError> {
    let mut out = format_token(token);
    if let Some(span) = token.raw {
        let raw = span
            .slice(source)
            .ok_or(TokenFmtError::InvalidSpan { span })?;
        out.push_str(" raw=\"");
        escape_text_into(&mut out, raw);
        out.push('"');
    }
    Ok(out)
}

pub fn escape_text_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' || ch == '\u{7f}' => {
                let _ = write!(out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
}
