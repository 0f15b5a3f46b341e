use std::cmp::Ordering;

use super::*;
use crate::internal::test_utils::assert;

#[test]
fn compares_numeric_runs_numerically() {
    assert!(compare_version_strings("1.9", "1.10") == Ordering::Less);
    assert!(compare_version_strings("2.0", "1.99") == Ordering::Greater);
}

#[test]
fn compares_non_digit_runs_lexically() {
    assert!(compare_version_strings("1.a", "1.b") == Ordering::Less);
}

#[test]
fn shorter_string_is_less_when_a_strict_prefix() {
    assert!(compare_version_strings("1.2", "1.2.3") == Ordering::Less);
}

#[test]
fn equal_versions_compare_equal() {
    assert!(compare_version_strings("1.2.3", "1.2.3") == Ordering::Equal);
}

#[test]
fn split_version_revision_extracts_trailing_digits() {
    assert!(split_version_revision("1.2_3") == ("1.2", 3));
    assert!(split_version_revision("1.2") == ("1.2", 0));
    assert!(split_version_revision("1.2_beta") == ("1.2_beta", 0));
}

#[test]
fn compare_full_treats_missing_revision_as_wildcard() {
    assert!(compare_full("1.2", 5, "1.2", None) == Ordering::Equal);
    assert!(compare_full("1.2", 5, "1.2", Some(5)) == Ordering::Equal);
    assert!(compare_full("1.2", 5, "1.2", Some(6)) == Ordering::Less);
}

#[test]
fn cmpver_is_reflexive() {
    for v in ["1.2.3_1", "foo", "0", "1.0.0-rc1_2"] {
        let (ver, rev) = split_version_revision(v);
        assert!(compare_full(ver, rev, ver, Some(rev)) == Ordering::Equal);
    }
}
