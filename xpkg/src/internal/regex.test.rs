use super::*;

#[test]
fn pkgname_accepts_typical_names() {
    for name in ["foo", "foo-bar", "foo.bar", "foo_bar", "lib32-foo", "9base"] {
        assert!(PKGNAME.is_match(name), "{name}");
    }
}

#[test]
fn pkgname_rejects_leading_punctuation() {
    for name in ["-foo", ".foo", "", "foo bar"] {
        assert!(!PKGNAME.is_match(name), "{name}");
    }
}

#[test]
fn pkgver_requires_name_version_and_revision() {
    assert!(PKGVER.is_match("foo-1.2_1"));
    assert!(PKGVER.is_match("foo-bar-1.2.3_10"));
    assert!(!PKGVER.is_match("foo-1.2"));
    assert!(!PKGVER.is_match("foo"));
    assert!(!PKGVER.is_match("foo-1.2_"));
}

#[test]
fn soname_matches_versioned_libs() {
    assert!(SONAME.is_match("libfoo.so"));
    assert!(SONAME.is_match("libfoo.so.1"));
    assert!(SONAME.is_match("libfoo.so.1.2.3"));
    assert!(!SONAME.is_match("libfoo.a"));
}
