use super::*;
use crate::internal::test_utils::assert;

#[test]
fn clean_normalizes_dot_and_dotdot() {
    assert!(clean("/a/./b/../c") == "/a/c");
    assert!(clean("a//b///c") == "a/b/c");
    assert!(clean("/../a") == "/a");
    assert!(clean("../a") == "../a");
    assert!(clean("/") == "/");
    assert!(clean("") == ".");
}

#[test]
fn clean_is_idempotent() {
    for p in ["/a/./b/../c", "a//b///c", "/../a", "", "/", "a/b/c"] {
        assert!(clean(&clean(p)) == clean(p));
    }
}

#[test]
fn join_inserts_single_slash() {
    assert!(join("/a", &["b", "c"]).unwrap() == "/a/b/c");
    assert!(join("/a/", &["/b"]).unwrap() == "/a/b");
}

#[test]
fn join_cleans_result() {
    assert!(join("/a", &["../b"]).unwrap() == "/b");
}

#[test]
fn join_rejects_overlong_paths() {
    let huge = "x".repeat(MAX_PATH + 1);
    assert!(join("/", &[huge]).is_err());
}

#[test]
fn relative_computes_dotdot_walk() {
    assert!(relative("/a/b", "/a/c") == "../c");
    assert!(relative("/a/b", "/a/b/c") == "c");
    assert!(relative("/a/b/c", "/a") == "../..");
    assert!(relative("/a", "/a") == ".");
}

#[test]
fn relative_join_roundtrip() {
    let from = "/usr/bin";
    let r = "../lib/foo.so.1";
    let to = join(from, &[r]).unwrap();
    assert!(relative(from, &to) == clean(r));
}
