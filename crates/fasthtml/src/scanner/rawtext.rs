//! Close-tag search for `script`/`style` bodies.

use memchr::memchr;

/// Find `</name` followed by optional ASCII whitespace and `>`, matching the
/// name ASCII-case-insensitively. Returns the offsets of the `<` and just past
/// the `>`.
///
/// Matches only start at ASCII `<`, which never occurs inside a UTF-8
/// multi-byte sequence, so both offsets are char boundaries.
pub(super) fn find_close_tag(haystack: &[u8], name: &[u8]) -> Option<(usize, usize)> {
    let len = haystack.len();
    let n = name.len() + 2;
    let mut i = 0;
    while i + n <= len {
        i += memchr(b'<', &haystack[i..])?;
        if i + n > len {
            return None;
        }
        if haystack[i + 1] == b'/' && haystack[i + 2..i + n].eq_ignore_ascii_case(name) {
            let mut k = i + n;
            while k < len && haystack[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && haystack[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 1;
    }
    None
}
