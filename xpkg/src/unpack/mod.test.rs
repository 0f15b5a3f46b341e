use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;

use tempfile::TempDir;

use super::*;
use crate::event::Event;
use crate::internal::test_utils::assert;
use crate::pkgdb::FileEntry;

fn append(builder: &mut tar::Builder<Vec<u8>>, path: &str, mode: u32, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append_data(&mut header, path, data).unwrap();
}

fn props_json(pkgver: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
                "pkgname": "foo",
                "pkgver": pkgver,
                "architecture": "x86_64",
                "installed_size": 0,
                "state": "unpacked",
    }))
    .unwrap()
}

#[derive(Default)]
struct NullSink {
    events: Vec<Event>,
}

impl EventSink for NullSink {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[test]
fn fresh_install_extracts_regular_file_conffile_and_symlink() {
    let root = TempDir::new().unwrap();
    let bin_contents = b"#!/bin/sh\necho hi\n";
    let conf_contents = b"option = default\n";

    let files = serde_json::to_vec(&serde_json::json!({
                "files": [{"file": "/usr/bin/foo", "sha256": Sha256Digest::of_bytes(bin_contents).to_hex()}],
                "conf_files": [{"file": "/etc/foo.conf", "sha256": Sha256Digest::of_bytes(conf_contents).to_hex()}],
                "links": [{"file": "/usr/bin/foo-link", "target": "foo"}],
    }))
    .unwrap();

    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "./INSTALL", 0o755, b"#!/bin/sh\n");
    append(&mut builder, "./props.plist", 0o644, &props_json("foo-1.0_1"));
    append(&mut builder, "./files.plist", 0o644, &files);
    append(&mut builder, "./usr/bin/foo", 0o755, bin_contents);
    append(&mut builder, "./etc/foo.conf", 0o644, conf_contents);
    {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        header.set_cksum();
        builder.append_link(&mut header, "./usr/bin/foo-link", "foo").unwrap();
    }
    let bytes = builder.into_inner().unwrap();

    let opts = UnpackOptions {
        rootdir: root.path(),
        noextract_globs: &[],
        preserve_globs: &[],
        keep_config: false,
        force_remove_files: false,
    };
    let mut sink = NullSink::default();
    let record = unpack(Cursor::new(bytes), "foo-1.0_1", None, &[], "foo", &opts, &mut sink).unwrap();

    assert!(record.state == State::Unpacked);
    assert!(record.install_script.is_some());
    assert!(std::fs::read(root.path().join("usr/bin/foo")).unwrap() == bin_contents);
    assert!(std::fs::read(root.path().join("etc/foo.conf")).unwrap() == conf_contents);
    assert!(std::fs::read_link(root.path().join("usr/bin/foo-link")).unwrap().to_str().unwrap() == "foo");
}

#[test]
fn locally_untouched_conffile_is_replaced_on_update() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("etc")).unwrap();
    let old_contents = b"option = old\n";
    let new_contents = b"option = new\n";
    std::fs::write(root.path().join("etc/foo.conf"), old_contents).unwrap();

    let installed = PackageRecord {
        pkgname: "foo".into(),
        pkgver: "foo-1.0_1".into(),
        architecture: "x86_64".into(),
        installed_size: 0,
        filename_size: None,
        filename_sha256: None,
        run_depends: vec![],
        provides: vec![],
        replaces: vec![],
        conflicts: vec![],
        reverts: vec![],
        shlib_provides: vec![],
        shlib_requires: vec![],
        alternatives: Default::default(),
        files: vec![],
        conf_files: vec![FileEntry::conf_file("/etc/foo.conf", Sha256Digest::of_bytes(old_contents).to_hex())],
        links: vec![],
        dirs: vec![],
        state: State::Installed,
        automatic_install: false,
        hold: false,
        repolock: false,
        install_script: None,
        remove_script: None,
        install_msg: None,
        remove_msg: None,
        install_date: None,
        metafile_sha256: None,
        repository: None,
    };

    let files = serde_json::to_vec(&serde_json::json!({
                "conf_files": [{"file": "/etc/foo.conf", "sha256": Sha256Digest::of_bytes(new_contents).to_hex()}],
    }))
    .unwrap();
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "./props.plist", 0o644, &props_json("foo-2.0_1"));
    append(&mut builder, "./files.plist", 0o644, &files);
    append(&mut builder, "./etc/foo.conf", 0o644, new_contents);
    let bytes = builder.into_inner().unwrap();

    let opts = UnpackOptions {
        rootdir: root.path(),
        noextract_globs: &[],
        preserve_globs: &[],
        keep_config: false,
        force_remove_files: false,
    };
    let mut sink = NullSink::default();
    unpack(Cursor::new(bytes), "foo-2.0_1", Some(&installed), &[], "foo", &opts, &mut sink).unwrap();

    assert!(std::fs::read(root.path().join("etc/foo.conf")).unwrap() == new_contents);
    assert!(!root.path().join("etc/foo.conf.new-2.0_1").exists());
}

#[test]
fn three_way_conffile_divergence_installs_beside_edited_file() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("etc")).unwrap();
    let orig_contents = b"option = old\n";
    let edited_contents = b"option = user-edited\n";
    let new_contents = b"option = new\n";
    std::fs::write(root.path().join("etc/foo.conf"), edited_contents).unwrap();

    let installed = PackageRecord {
        pkgname: "foo".into(),
        pkgver: "foo-1.0_1".into(),
        architecture: "x86_64".into(),
        installed_size: 0,
        filename_size: None,
        filename_sha256: None,
        run_depends: vec![],
        provides: vec![],
        replaces: vec![],
        conflicts: vec![],
        reverts: vec![],
        shlib_provides: vec![],
        shlib_requires: vec![],
        alternatives: Default::default(),
        files: vec![],
        conf_files: vec![FileEntry::conf_file("/etc/foo.conf", Sha256Digest::of_bytes(orig_contents).to_hex())],
        links: vec![],
        dirs: vec![],
        state: State::Installed,
        automatic_install: false,
        hold: false,
        repolock: false,
        install_script: None,
        remove_script: None,
        install_msg: None,
        remove_msg: None,
        install_date: None,
        metafile_sha256: None,
        repository: None,
    };

    let files = serde_json::to_vec(&serde_json::json!({
                "conf_files": [{"file": "/etc/foo.conf", "sha256": Sha256Digest::of_bytes(new_contents).to_hex()}],
    }))
    .unwrap();
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "./props.plist", 0o644, &props_json("foo-2.0_1"));
    append(&mut builder, "./files.plist", 0o644, &files);
    append(&mut builder, "./etc/foo.conf", 0o644, new_contents);
    let bytes = builder.into_inner().unwrap();

    let opts = UnpackOptions {
        rootdir: root.path(),
        noextract_globs: &[],
        preserve_globs: &[],
        keep_config: false,
        force_remove_files: false,
    };
    let mut sink = NullSink::default();
    unpack(Cursor::new(bytes), "foo-2.0_1", Some(&installed), &[], "foo", &opts, &mut sink).unwrap();

    assert!(std::fs::read(root.path().join("etc/foo.conf")).unwrap() == edited_contents);
    assert!(std::fs::read(root.path().join("etc/foo.conf.new-2.0_1")).unwrap() == new_contents);
}

#[test]
fn obsolete_paths_are_removed() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("usr/share/foo")).unwrap();
    std::fs::write(root.path().join("usr/share/foo/old-doc"), b"stale").unwrap();

    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "./props.plist", 0o644, &props_json("foo-2.0_1"));
    append(
        &mut builder,
        "./files.plist",
        0o644,
        &serde_json::to_vec(&serde_json::json!({})).unwrap(),
    );
    let bytes = builder.into_inner().unwrap();

    let opts = UnpackOptions {
        rootdir: root.path(),
        noextract_globs: &[],
        preserve_globs: &[],
        keep_config: false,
        force_remove_files: false,
    };
    let mut sink = NullSink::default();
    let obsolete = vec!["/usr/share/foo/old-doc".to_owned()];
    unpack(Cursor::new(bytes), "foo-2.0_1", None, &obsolete, "foo", &opts, &mut sink).unwrap();

    assert!(!root.path().join("usr/share/foo/old-doc").exists());
    assert!(sink.events.iter().any(|e| matches!(e, Event::RemoveFile {.. })));
}

#[test]
fn noextract_glob_skips_matching_payload_member() {
    let root = TempDir::new().unwrap();

    let files = serde_json::to_vec(&serde_json::json!({
                "files": [{"file": "/usr/share/doc/foo/README", "sha256": Sha256Digest::of_bytes(b"docs").to_hex()}],
    }))
    .unwrap();
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "./props.plist", 0o644, &props_json("foo-1.0_1"));
    append(&mut builder, "./files.plist", 0o644, &files);
    append(&mut builder, "./usr/share/doc/foo/README", 0o644, b"docs");
    let bytes = builder.into_inner().unwrap();

    let opts = UnpackOptions {
        rootdir: root.path(),
        noextract_globs: &["/usr/share/doc/*".to_owned()],
        preserve_globs: &[],
        keep_config: false,
        force_remove_files: false,
    };
    let mut sink = NullSink::default();
    unpack(Cursor::new(bytes), "foo-1.0_1", None, &[], "foo", &opts, &mut sink).unwrap();

    assert!(!root.path().join("usr/share/doc/foo/README").exists());
}

#[test]
fn pkgver_mismatch_is_rejected() {
    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "./props.plist", 0o644, &props_json("foo-1.0_1"));
    append(
        &mut builder,
        "./files.plist",
        0o644,
        &serde_json::to_vec(&serde_json::json!({})).unwrap(),
    );
    let bytes = builder.into_inner().unwrap();

    let root = TempDir::new().unwrap();
    let opts = UnpackOptions {
        rootdir: root.path(),
        noextract_globs: &[],
        preserve_globs: &[],
        keep_config: false,
        force_remove_files: false,
    };
    let mut sink = NullSink::default();
    let err = unpack(Cursor::new(bytes), "foo-9.0_1", None, &[], "foo", &opts, &mut sink).unwrap_err();
    assert!(matches!(err, Error::PkgverMismatch(..)));
}

#[test]
fn externalize_and_remove_manifest_roundtrip() {
    let metadir = TempDir::new().unwrap();
    let pkg = PackageRecord {
        pkgname: "foo".into(),
        pkgver: "foo-1.0_1".into(),
        architecture: "x86_64".into(),
        installed_size: 0,
        filename_size: None,
        filename_sha256: None,
        run_depends: vec![],
        provides: vec![],
        replaces: vec![],
        conflicts: vec![],
        reverts: vec![],
        shlib_provides: vec![],
        shlib_requires: vec![],
        alternatives: Default::default(),
        files: vec![FileEntry::file("/usr/bin/foo", "a".repeat(64))],
        conf_files: vec![],
        links: vec![],
        dirs: vec![],
        state: State::Installed,
        automatic_install: false,
        hold: false,
        repolock: false,
        install_script: None,
        remove_script: None,
        install_msg: None,
        remove_msg: None,
        install_date: None,
        metafile_sha256: None,
        repository: None,
    };

    externalize_manifest(metadir.path(), &pkg).unwrap();
    let manifest_path = metadir.path().join(".foo-files.plist");
    assert!(manifest_path.exists());
    assert!(fs::metadata(&manifest_path).unwrap().permissions().mode() & 0o777 == 0o644);

    remove_manifest(metadir.path(), "foo").unwrap();
    assert!(!manifest_path.exists());
}
