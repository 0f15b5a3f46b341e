use super::*;
use crate::internal::test_utils::assert;

#[test]
fn plain_name_matches_any_version() {
    assert!(pkgpattern_match("foo-1.2_3", "foo").unwrap());
    assert!(!pkgpattern_match("bar-1.2_3", "foo").unwrap());
}

#[test]
fn dewey_range_matches_inclusive_bounds() {
    assert!(pkgpattern_match("foo-1.2_1", "foo>=1.2").unwrap());
    assert!(pkgpattern_match("foo-1.2_1", "foo>=1,<2").unwrap());
    assert!(!pkgpattern_match("foo-2.0_1", "foo>=1,<2").unwrap());
}

#[test]
fn dewey_exact_with_revision_requires_exact_revision() {
    assert!(pkgpattern_match("foo-1.2_3", "foo==1.2_3").unwrap());
    assert!(!pkgpattern_match("foo-1.2_4", "foo==1.2_3").unwrap());
}

#[test]
fn dewey_exact_without_revision_matches_any_revision() {
    assert!(pkgpattern_match("foo-1.2_3", "foo==1.2").unwrap());
    assert!(pkgpattern_match("foo-1.2_9", "foo==1.2").unwrap());
}

#[test]
fn glob_matches_full_pkgver() {
    assert!(pkgpattern_match("foo-1.2_1", "foo-*").unwrap());
    assert!(!pkgpattern_match("bar-1.2_1", "foo-*").unwrap());
}

#[test]
fn malformed_dewey_pattern_is_rejected() {
    assert!(pkgpattern_match("foo-1.2_1", "foo>=").is_err());
    assert!(pkgpattern_match("foo-1.2_1", ">=1.2").is_err());
}

#[test]
fn virtualpkg_match_checks_any_provide() {
    let provides = ["cmd-1.0_1", "other-2.0_1"];
    assert!(virtualpkg_match(provides, "cmd>=1").unwrap());
    assert!(!virtualpkg_match(provides, "cmd>=2").unwrap());
}

#[test]
fn split_pkgver_handles_dashes_in_name() {
    assert!(split_pkgver("foo-bar-1.2.3_10") == Some(("foo-bar", "1.2.3_10")));
    assert!(split_pkgver("foo") == None);
}

#[test]
fn pkgpattern_match_is_stable_across_calls() {
    for _ in 0..3 {
        assert!(pkgpattern_match("foo-1.2_1", "foo>=1").unwrap());
    }
}
