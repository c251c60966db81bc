//! Whitespace-insensitive name ordering and matching.
//!
//! Global symbol lists are sorted with [`compare_iw_ordered`] and searched
//! with the same function, so the two must agree on every pair of names. The
//! ordering has two properties the binary search relies on:
//!
//! - A name sorts immediately before all of its parameter-list variants:
//!   `foo` < `foo(int)` < `foo(int, char)` < `foobar`. The `(` that opens a
//!   parameter list sorts before any other character.
//! - Names that differ only in case are adjacent. The first pass compares
//!   case-insensitively; only names equal in that pass are ordered by a
//!   second, case-sensitive pass.
//!
//! Whitespace is ignored everywhere, so `foo (int)` and `foo(int)` compare
//! equal.

use std::cmp::Ordering;

/// Compare two search names with the index's ordering.
///
/// Names equal ignoring case are always ordered case-sensitively, whatever
/// case sensitivity a lookup later uses.
///
/// ## Example
///
/// ```rust
/// use std::cmp::Ordering;
/// use symdex_core::names::compare_iw_ordered;
///
/// assert_eq!(compare_iw_ordered("foo", "foo(int)"), Ordering::Less);
/// assert_eq!(compare_iw_ordered("foo(int)", "foobar"), Ordering::Less);
/// assert_eq!(compare_iw_ordered("foo (int)", "foo(int)"), Ordering::Equal);
/// assert_eq!(compare_iw_ordered("Foo", "foo"), Ordering::Less);
/// assert_eq!(compare_iw_ordered("FOO", "fop"), Ordering::Less);
/// ```
#[must_use]
pub fn compare_iw_ordered(left: &str, right: &str) -> Ordering
{
    match compare_pass(left.as_bytes(), right.as_bytes(), false) {
        Ordering::Equal => compare_pass(left.as_bytes(), right.as_bytes(), true),
        decided => decided,
    }
}

fn compare_pass(left: &[u8], right: &[u8], case_sensitive: bool) -> Ordering
{
    let (mut i, mut j) = (0, 0);
    loop {
        i = skip_whitespace(left, i);
        j = skip_whitespace(right, j);

        let (Some(&a), Some(&b)) = (left.get(i), right.get(j)) else {
            break;
        };
        let (a, b) = fold(a, b, case_sensitive);
        if a != b {
            break;
        }
        i += 1;
        j += 1;
    }

    match (left.get(i), right.get(j)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(b'('), None) => Ordering::Greater,
        (Some(b'('), Some(_)) => Ordering::Less,
        (Some(_), None | Some(b'(')) => Ordering::Greater,
        (Some(&a), Some(&b)) => {
            let (a, b) = fold(a, b, case_sensitive);
            a.cmp(&b)
        }
    }
}

/// Whether `symbol` is `lookup`, ignoring whitespace.
///
/// With `ignore_params`, a symbol that continues with a parameter list after
/// the looked-up name also matches, so `foo` finds `foo(int)`.
///
/// ## Example
///
/// ```rust
/// use symdex_core::names::matches_iw;
///
/// assert!(matches_iw("foo(int)", "foo", true, true));
/// assert!(!matches_iw("foo(int)", "foo", true, false));
/// assert!(matches_iw("FOO", "foo", false, false));
/// assert!(!matches_iw("foobar", "foo", true, true));
/// ```
#[must_use]
pub fn matches_iw(symbol: &str, lookup: &str, case_sensitive: bool, ignore_params: bool) -> bool
{
    let (symbol, lookup) = (symbol.as_bytes(), lookup.as_bytes());
    let (mut i, mut j) = (0, 0);
    loop {
        i = skip_whitespace(symbol, i);
        j = skip_whitespace(lookup, j);

        match (symbol.get(i), lookup.get(j)) {
            (None, None) => return true,
            (Some(&b'('), None) => return ignore_params,
            (_, None) | (None, _) => return false,
            (Some(&a), Some(&b)) => {
                let (a, b) = fold(a, b, case_sensitive);
                if a != b {
                    return false;
                }
            }
        }
        i += 1;
        j += 1;
    }
}

/// Whether `lookup` matches `symbol` or any of its scope-qualified suffixes.
///
/// `wild` matching lets `bar` find `foo::bar`. Only suffixes that start right
/// after a `::` separator are tried.
#[must_use]
pub fn matches_wild(symbol: &str, lookup: &str, case_sensitive: bool, ignore_params: bool) -> bool
{
    if matches_iw(symbol, lookup, case_sensitive, ignore_params) {
        return true;
    }
    symbol
        .match_indices("::")
        .any(|(at, sep)| matches_iw(&symbol[at + sep.len()..], lookup, case_sensitive, ignore_params))
}

fn skip_whitespace(bytes: &[u8], mut at: usize) -> usize
{
    while bytes.get(at).is_some_and(u8::is_ascii_whitespace) {
        at += 1;
    }
    at
}

const fn fold(a: u8, b: u8, case_sensitive: bool) -> (u8, u8)
{
    if case_sensitive {
        (a, b)
    } else {
        (a.to_ascii_lowercase(), b.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parameter_lists_sort_directly_after_their_name()
    {
        let mut names = vec!["foobar", "foo(char)", "fo", "foo", "foo(int)", "fop"];
        names.sort_by(|a, b| compare_iw_ordered(a, b));
        assert_eq!(names, ["fo", "foo", "foo(char)", "foo(int)", "foobar", "fop"]);
    }

    #[test]
    fn test_case_variants_are_adjacent()
    {
        let mut names = vec!["foo", "bar", "FOO", "Foo", "fop"];
        names.sort_by(|a, b| compare_iw_ordered(a, b));
        assert_eq!(names, ["bar", "FOO", "Foo", "foo", "fop"]);
    }

    #[test]
    fn test_whitespace_is_ignored()
    {
        assert_eq!(compare_iw_ordered("a b", "ab"), Ordering::Equal);
        assert!(matches_iw("std::vector<int, alloc>", "std::vector<int,alloc>", true, false));
    }

    #[test]
    fn test_prefix_sorts_first()
    {
        assert_eq!(compare_iw_ordered("ab", "abc"), Ordering::Less);
        assert_eq!(compare_iw_ordered("abc", "ab"), Ordering::Greater);
        assert_eq!(compare_iw_ordered("", ""), Ordering::Equal);
    }

    #[test]
    fn test_wild_matching_uses_scope_suffixes()
    {
        assert!(matches_wild("outer::inner::run", "run", true, false));
        assert!(matches_wild("outer::inner::run", "inner::run", true, false));
        assert!(!matches_wild("outer::inner::rerun", "run", true, false));
    }
}
