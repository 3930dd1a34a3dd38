//! Locale-insensitive collation keys for string index values.
//!
//! Index keys order strings by a collation key rather than by raw UTF-8
//! bytes, so that range scans agree with dictionary order: case is a
//! tiebreak, not a primary difference, and accented characters sort next to
//! their base letter (`a < B < b́ < G < k < z`).
//!
//! The key has two weight levels:
//!
//! - **Primary**: the NFD decomposition with combining marks removed and
//!   characters lowercase-folded, re-encoded as UTF-8. Two strings with equal
//!   primary weights differ only in case or diacritics.
//! - **Secondary**: the original UTF-8 bytes, appended after a `0x01`
//!   separator. This makes the key total, so equal-primary strings still
//!   order deterministically.
//!
//! Input is truncated to a configured byte budget (on a character boundary)
//! before weighing. Two long strings sharing a truncated prefix therefore
//! produce the same key; equality queries recover exactness through the
//! residual filter downstream.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Default truncation budget for string index values, in input bytes.
pub const DEFAULT_STRING_KEY_MAX_BYTES: usize = 64;

/// Separator between the primary and secondary weight levels.
///
/// Sorts below every byte UTF-8 produces for non-control characters, so a
/// prefix string orders before its extensions ("a" < "ab").
const LEVEL_SEPARATOR: u8 = 0x01;

/// Computes the collation key for `input`, truncated to `max_bytes` of input.
#[must_use]
pub fn collation_key(input: &str, max_bytes: usize) -> Vec<u8> {
    weigh(truncate_on_boundary(input, max_bytes))
}

/// Computes the collation key for `input` without truncation.
///
/// Used for in-memory comparisons (sort stages, residual filters) that must
/// agree with index order but are not bound by the key byte budget.
#[must_use]
pub fn collation_key_unbounded(input: &str) -> Vec<u8> {
    weigh(input)
}

/// Returns `true` if encoding `input` loses information to truncation.
#[must_use]
pub fn is_truncated(input: &str, max_bytes: usize) -> bool {
    input.len() > max_bytes
}

fn weigh(input: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(input.len() * 2 + 1);
    for c in input.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        for folded in c.to_lowercase() {
            let mut utf8 = [0u8; 4];
            key.extend_from_slice(folded.encode_utf8(&mut utf8).as_bytes());
        }
    }
    key.push(LEVEL_SEPARATOR);
    key.extend_from_slice(input.as_bytes());
    key
}

fn truncate_on_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Vec<u8> {
        collation_key(s, DEFAULT_STRING_KEY_MAX_BYTES)
    }

    #[test]
    fn case_is_secondary() {
        // Dictionary order, not byte order: "a" < "B" even though b'B' < b'a'.
        assert!(key("a") < key("B"));
        assert!(key("B") < key("G"));
        assert!(key("G") < key("k"));
        assert!(key("k") < key("z"));
    }

    #[test]
    fn equal_primary_still_total() {
        assert_ne!(key("abc"), key("ABC"));
        let mut keys = vec![key("ABC"), key("abc")];
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn prefix_orders_before_extension() {
        assert!(key("a") < key("aa"));
        assert!(key("aa") < key("ab"));
        assert!(key("ab") < key("b"));
    }

    #[test]
    fn combining_marks_sort_with_base() {
        // "é" (e + acute) sorts between "e"-prefixed and "f"-prefixed strings.
        assert!(key("e") < key("\u{e9}"));
        assert!(key("\u{e9}") < key("f"));
    }

    #[test]
    fn truncation_collapses_long_strings() {
        let prefix = "x".repeat(64);
        let a = format!("{prefix} tail one");
        let b = format!("{prefix} tail two");
        assert_eq!(collation_key(&a, 64), collation_key(&b, 64));
        assert_ne!(collation_key_unbounded(&a), collation_key_unbounded(&b));
        assert!(is_truncated(&a, 64));
        assert!(!is_truncated("short", 64));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 3-byte characters; a 64-byte budget lands mid-character.
        let s = "\u{65e5}".repeat(30);
        let k = collation_key(&s, 64);
        assert!(!k.is_empty());
    }
}
