//! Delimiter occurrence search and payload slicing
//!
//! Offsets are byte offsets into the string passed in. Regex matches always
//! fall on `char` boundaries, so every offset here is safe to slice at.

use regex::Regex;

use crate::table::TargetPattern;

// =============================================================================
// Occurrences
// =============================================================================

/// One occurrence of a delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOffset {
    /// Start position, absolute within the searched string
    pub start: usize,
    /// Length of the matched text
    pub len: usize,
}

impl MatchOffset {
    /// Position just past the occurrence.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Non-empty, ordered list of non-overlapping occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrences(Vec<MatchOffset>);

impl Occurrences {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[MatchOffset] {
        &self.0
    }

    /// Select an occurrence by signed index.
    ///
    /// `0..n` counts from the first occurrence, `-1` is the last, `-n` the
    /// first. Anything outside `[-n, n-1]` yields `None`.
    pub fn select(&self, index: isize) -> Option<MatchOffset> {
        let n = self.0.len() as isize;
        let resolved = if index < 0 { n + index } else { index };
        if (0..n).contains(&resolved) {
            Some(self.0[resolved as usize])
        } else {
            None
        }
    }
}

/// Find every occurrence of `delimiter` in `text`.
///
/// The search is repeated on the residual suffix after each occurrence, so
/// anchors such as `^` match at the start of each suffix. A zero-width
/// occurrence is recorded once and the search resumes one character later.
/// Returns `None` when there is no occurrence at all.
pub fn find_all_occurrences(text: &str, delimiter: &Regex) -> Option<Occurrences> {
    let mut found = Vec::new();
    let mut base = 0usize;

    while base < text.len() {
        let m = match delimiter.find(&text[base..]) {
            Some(m) => m,
            None => break,
        };

        let offset = MatchOffset {
            start: base + m.start(),
            len: m.len(),
        };
        found.push(offset);
        base = offset.end();

        if m.is_empty() {
            match text[base..].chars().next() {
                Some(c) => base += c.len_utf8(),
                None => break,
            }
        }
    }

    if found.is_empty() {
        None
    } else {
        Some(Occurrences(found))
    }
}

// =============================================================================
// Payload Slicing
// =============================================================================

/// Outcome of locating the payload inside a wrapper URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice<'a> {
    /// Payload text, still encoded
    Payload(&'a str),
    /// The start delimiter does not occur at all
    NoStartMarker,
    /// A configured occurrence index does not exist in this address
    IndexOutOfRange,
}

/// Cut the payload out of `href` using the target's delimiters.
///
/// The payload starts right after the selected start occurrence. The end
/// delimiter is searched in the remainder only; without any end occurrence
/// the payload runs to the end of the remainder.
pub fn slice_payload<'a>(href: &'a str, target: &TargetPattern) -> Slice<'a> {
    let starts = match find_all_occurrences(href, target.start_delimiter()) {
        Some(starts) => starts,
        None => return Slice::NoStartMarker,
    };
    let start = match starts.select(target.start_index()) {
        Some(start) => start,
        None => return Slice::IndexOutOfRange,
    };

    let partial = &href[start.end()..];

    match find_all_occurrences(partial, target.end_delimiter()) {
        Some(ends) => match ends.select(target.end_index()) {
            Some(end) => Slice::Payload(&partial[..end.start]),
            None => Slice::IndexOutOfRange,
        },
        None => Slice::Payload(partial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TargetSpec;

    fn re(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    fn offsets(text: &str, pattern: &str) -> Vec<(usize, usize)> {
        find_all_occurrences(text, &re(pattern))
            .map(|o| o.as_slice().iter().map(|m| (m.start, m.len)).collect())
            .unwrap_or_default()
    }

    fn target(start: &str, start_index: isize, end: &str, end_index: isize) -> TargetPattern {
        TargetPattern::from_spec(&TargetSpec {
            domains: vec!["*".to_string()],
            wrapper: ".".to_string(),
            start: start.to_string(),
            start_index,
            end: end.to_string(),
            end_index,
            decode: false,
        })
        .unwrap()
    }

    #[test]
    fn test_no_occurrence_is_none() {
        assert!(find_all_occurrences("https://example.com/", &re("q=")).is_none());
        assert!(find_all_occurrences("", &re("q=")).is_none());
    }

    #[test]
    fn test_offsets_are_absolute() {
        assert_eq!(offsets("a=1&b=2&c=3", "&"), vec![(3, 1), (7, 1)]);
        assert_eq!(offsets("xxabxxabab", "ab"), vec![(2, 2), (6, 2), (8, 2)]);
    }

    #[test]
    fn test_occurrence_at_position_zero() {
        let found = find_all_occurrences("q=abc", &re("q=")).unwrap();
        assert_eq!(found.select(0), Some(MatchOffset { start: 0, len: 2 }));
    }

    #[test]
    fn test_found_occurrences_not_empty() {
        let found = find_all_occurrences("value", &re("$")).unwrap();
        assert!(!found.is_empty());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_zero_width_end_anchor() {
        // "&" then the end anchor inside "tail"
        assert_eq!(offsets("val&tail", "(&|$)"), vec![(3, 1), (8, 0)]);
        // Only the end anchor
        assert_eq!(offsets("value", "(&|$)"), vec![(5, 0)]);
        // Match consuming the rest leaves no suffix to search
        assert_eq!(offsets("value&", "(&|$)"), vec![(5, 1)]);
    }

    #[test]
    fn test_zero_width_terminates() {
        let found = offsets("abc", "x*");
        assert_eq!(found, vec![(0, 0), (1, 0), (2, 0)]);
    }

    #[test]
    fn test_anchor_matches_each_suffix() {
        assert_eq!(offsets("aaa", "^a"), vec![(0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_multibyte_offsets() {
        assert_eq!(offsets("é&ü&", "&"), vec![(2, 1), (5, 1)]);
        assert_eq!(offsets("éü", "x*"), vec![(0, 0), (2, 0)]);
    }

    #[test]
    fn test_select_signed() {
        let found = find_all_occurrences("a&b&c&d", &re("&")).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found.select(-1), found.select(2));
        assert_eq!(found.select(-3), found.select(0));
        assert_eq!(found.select(-2).unwrap().start, 3);
    }

    #[test]
    fn test_select_out_of_range() {
        let found = find_all_occurrences("a&b", &re("&")).unwrap();
        assert_eq!(found.select(1), None);
        assert_eq!(found.select(-2), None);
        assert_eq!(found.select(isize::MIN), None);
    }

    #[test]
    fn test_slice_first_param() {
        let t = target("q=", 0, "(&|$)", 0);
        assert_eq!(slice_payload("r?q=abc&x=1", &t), Slice::Payload("abc"));
        assert_eq!(slice_payload("r?q=abc", &t), Slice::Payload("abc"));
    }

    #[test]
    fn test_slice_without_end_marker() {
        let t = target("u=", 0, "#", 0);
        assert_eq!(slice_payload("r?u=abc&x=1", &t), Slice::Payload("abc&x=1"));
    }

    #[test]
    fn test_slice_last_end_marker() {
        let t = target("url=", 0, "%3A", -1);
        assert_eq!(
            slice_payload("u?url=https%3A%2F%2Ffoo.test%2Fa%3Ahash", &t),
            Slice::Payload("https%3A%2F%2Ffoo.test%2Fa")
        );
    }

    #[test]
    fn test_slice_last_start_marker() {
        let t = target("/", -1, "$", 0);
        assert_eq!(slice_payload("a/b/c", &t), Slice::Payload("c"));
    }

    #[test]
    fn test_slice_missing_start() {
        let t = target("q=", 0, "(&|$)", 0);
        assert_eq!(slice_payload("r?u=abc", &t), Slice::NoStartMarker);
    }

    #[test]
    fn test_slice_index_out_of_range() {
        let t = target("q=", 1, "(&|$)", 0);
        assert_eq!(slice_payload("r?q=abc", &t), Slice::IndexOutOfRange);
        let t = target("q=", 0, "&", 2);
        assert_eq!(slice_payload("r?q=a&b", &t), Slice::IndexOutOfRange);
    }
}
