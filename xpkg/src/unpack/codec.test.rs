use std::io::{BufReader, Read, Write as _};

use super::*;
use crate::internal::test_utils::*;

fn gzip(data: &[u8]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

#[test]
fn wraps_gzip_stream() {
    let payload = b"hello unpack engine";
    let compressed = gzip(payload);
    let mut decoded = wrap(BufReader::new(&compressed[..])).unwrap();
    let mut out = Vec::new();
    decoded.read_to_end(&mut out).unwrap();
    assert!(out == payload);
}

#[test]
fn rejects_unrecognized_magic() {
    let garbage = b"not-a-known-archive-codec";
    assert_let!(Err(Error::Unsupported) = wrap(BufReader::new(&garbage[..])));
}
