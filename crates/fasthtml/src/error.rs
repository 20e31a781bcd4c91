//! Non-fatal scan diagnostics.
//!
//! Scanning never fails. Conditions the scanner recovered from are recorded
//! as `ScanIssue`s and can be inspected with `Scanner::issues`.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanIssueCode {
    /// `<` that does not start markup; kept as text.
    StrayLessThan,
    /// Tag cut off by end of input or by another `<`; kept as text.
    UnterminatedTag,
    /// Comment, CDATA section or declaration without its terminator.
    UnterminatedComment,
    /// `script`/`style` body without a closing tag.
    UnterminatedRawText,
    /// Repeated attribute name; the first occurrence is kept.
    DuplicateAttribute,
    /// Character the configured encoding cannot represent (strict mode).
    LossyConversion,
    /// Text run split at the configured text limit.
    TextLimitExceeded,
}

impl ScanIssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanIssueCode::StrayLessThan => "stray-less-than",
            ScanIssueCode::UnterminatedTag => "unterminated-tag",
            ScanIssueCode::UnterminatedComment => "unterminated-comment",
            ScanIssueCode::UnterminatedRawText => "unterminated-raw-text",
            ScanIssueCode::DuplicateAttribute => "duplicate-attribute",
            ScanIssueCode::LossyConversion => "lossy-conversion",
            ScanIssueCode::TextLimitExceeded => "text-limit-exceeded",
        }
    }
}

impl fmt::Display for ScanIssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered condition at a byte offset of the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanIssue {
    pub code: ScanIssueCode,
    pub position: usize,
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.code, self.position)
    }
}
