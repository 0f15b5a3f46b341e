use std::io::Cursor;

use super::*;
use crate::internal::test_utils::{assert, assert_let};

fn append(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, data).unwrap();
}

fn sample_props() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
                "pkgname": "foo",
                "pkgver": "foo-1.0_1",
                "architecture": "x86_64",
                "installed_size": 42,
                "state": "unpacked",
    }))
    .unwrap()
}

fn sample_files() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
                "files": [{"file": "/usr/bin/foo", "sha256": "a".repeat(64)}],
    }))
    .unwrap()
}

#[test]
fn reads_header_members_and_leaves_payload_for_caller() {
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, INSTALL_MEMBER, b"#!/bin/sh\necho install\n");
    append(&mut builder, REMOVE_MEMBER, b"#!/bin/sh\necho remove\n");
    append(&mut builder, PROPS_MEMBER, &sample_props());
    append(&mut builder, FILES_MEMBER, &sample_files());
    append(&mut builder, "./usr/bin/foo", b"payload bytes");
    let bytes = builder.into_inner().unwrap();

    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let header = read_header(&mut archive).unwrap();

    assert!(header.install_script.as_deref() == Some(&b"#!/bin/sh\necho install\n"[..]));
    assert!(header.remove_script.as_deref() == Some(&b"#!/bin/sh\necho remove\n"[..]));
    assert!(header.props.pkgver == "foo-1.0_1");
    assert!(header.manifest.files.len() == 1);

    let mut remaining = archive.entries().unwrap();
    let payload = remaining.next().unwrap().unwrap();
    assert!(payload.path().unwrap().to_string_lossy() == "./usr/bin/foo");
}

#[test]
fn missing_props_is_an_error() {
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, FILES_MEMBER, &sample_files());
    let bytes = builder.into_inner().unwrap();

    let mut archive = tar::Archive::new(Cursor::new(bytes));
    assert_let!(Err(Error::MissingHeaderMember("props.plist")) = read_header(&mut archive));
}

#[test]
fn archive_without_scripts_parses_fine() {
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, PROPS_MEMBER, &sample_props());
    append(&mut builder, FILES_MEMBER, &sample_files());
    let bytes = builder.into_inner().unwrap();

    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let header = read_header(&mut archive).unwrap();

    assert!(header.install_script.is_none());
    assert!(header.remove_script.is_none());
}
