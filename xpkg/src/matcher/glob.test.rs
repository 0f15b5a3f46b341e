use super::*;
use crate::internal::test_utils::assert;

#[test]
fn star_matches_any_run() {
    assert!(fnmatch("foo-*", "foo-1.2_3"));
    assert!(fnmatch("foo-*", "foo-"));
    assert!(!fnmatch("foo-*", "bar-1.2_3"));
}

#[test]
fn question_matches_single_char() {
    assert!(fnmatch("foo-?", "foo-1"));
    assert!(!fnmatch("foo-?", "foo-12"));
}

#[test]
fn bracket_expression_matches_char_class() {
    assert!(fnmatch("foo-[0-9]", "foo-5"));
    assert!(!fnmatch("foo-[0-9]", "foo-a"));
    assert!(fnmatch("foo-[!0-9]", "foo-a"));
    assert!(!fnmatch("foo-[!0-9]", "foo-5"));
}

#[test]
fn leading_period_is_not_matched_by_wildcard() {
    assert!(!fnmatch("*", ".hidden"));
    assert!(!fnmatch("?", ".h"));
    assert!(fnmatch(".*", ".hidden"));
}

#[test]
fn exact_literal_requires_full_match() {
    assert!(fnmatch("foo", "foo"));
    assert!(!fnmatch("foo", "foobar"));
}
