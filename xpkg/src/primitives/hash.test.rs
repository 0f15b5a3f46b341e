use std::io::Write;

use tempfile::NamedTempFile;

use super::*;
use crate::internal::test_utils::assert;

#[test]
fn sha256_hex_roundtrip() {
    let digest = Sha256Digest::of_bytes(b"hello world");
    let hex = digest.to_hex();
    assert!(Sha256Digest::from_hex(&hex) == Some(digest));
}

#[test]
fn sha256_of_file_matches_of_bytes() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"some package contents").unwrap();

    let from_file = Sha256Digest::of_file(file.path()).unwrap();
    let from_bytes = Sha256Digest::of_bytes(b"some package contents");

    assert!(from_file == from_bytes);
}

#[test]
fn from_hex_rejects_malformed_input() {
    assert!(Sha256Digest::from_hex("not-hex").is_none());
    assert!(Sha256Digest::from_hex("abcd").is_none());
}

#[test]
fn hashes_equal_is_length_sensitive() {
    assert!(hashes_equal(b"abc", b"abc"));
    assert!(!hashes_equal(b"abc", b"abcd"));
    assert!(!hashes_equal(b"abc", b"abd"));
}

#[test]
fn blake2b512_is_deterministic_and_64_bytes() {
    let a = blake2b512_of_bytes(b"message");
    let b = blake2b512_of_bytes(b"message");
    assert!(a == b);
    assert!(a.len() == 64);
}
