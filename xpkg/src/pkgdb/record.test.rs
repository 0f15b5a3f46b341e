use super::*;
use crate::internal::test_utils::assert;

fn sample() -> PackageRecord {
    PackageRecord {
        pkgname: "foo".into(),
        pkgver: "foo-1.2.3_4".into(),
        architecture: "x86_64".into(),
        installed_size: 1024,
        filename_size: Some(512),
        filename_sha256: None,
        run_depends: vec!["bar>=1".into()],
        provides: vec![],
        replaces: vec![],
        conflicts: vec![],
        reverts: vec![],
        shlib_provides: vec!["libfoo.so.1".into()],
        shlib_requires: vec![],
        alternatives: Default::default(),
        files: vec![FileEntry::file("/usr/bin/foo", "a".repeat(64))],
        conf_files: vec![],
        links: vec![],
        dirs: vec![FileEntry::dir("/usr/bin")],
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
    }
}

#[test]
fn name_and_version_revision_split_from_pkgver() {
    let pkg = sample();
    assert!(pkg.name() == "foo");
    assert!(pkg.version_revision() == ("1.2.3", 4));
}

#[test]
fn version_revision_falls_back_when_unparseable() {
    let mut pkg = sample();
    pkg.pkgver = "not-a-pkgver".into();
    assert!(pkg.version_revision() == ("not-a-pkgver", 0));
}

#[test]
fn transaction_action_unpacks_and_removes() {
    assert!(TransactionAction::Install.unpacks());
    assert!(!TransactionAction::Install.removes());
    assert!(TransactionAction::Update.unpacks());
    assert!(TransactionAction::Update.removes());
    assert!(TransactionAction::Remove.removes());
    assert!(!TransactionAction::Remove.unpacks());
    assert!(!TransactionAction::Configure.unpacks());
}

#[test]
fn record_round_trips_through_json_with_renamed_keys() {
    let pkg = sample();
    let json = serde_json::to_value(&pkg).unwrap();
    assert!(json["shlib-provides"] == serde_json::json!(["libfoo.so.1"]));
    assert!(json["automatic-install"] == serde_json::json!(false));
    assert!(json.get("repository").is_none());

    let back: PackageRecord = serde_json::from_value(json).unwrap();
    assert!(back == pkg);
}

#[test]
fn state_serializes_kebab_case() {
    let json = serde_json::to_value(State::HalfRemoved).unwrap();
    assert!(json == serde_json::json!("half-removed"));
}

#[test]
fn transaction_entry_new_carries_repository_and_name() {
    let mut p = sample();
    p.repository = Some("file:///repo".to_owned());
    let entry = TransactionEntry::new(p, TransactionAction::Install);
    assert!(entry.name() == "foo");
    assert!(entry.repository == Some("file:///repo".to_owned()));
    assert!(!entry.replaced);
}

#[test]
fn file_entry_constructors_shape_variants() {
    let f = FileEntry::file("/a", "sha");
    assert!(f.sha256 == Some("sha".to_owned()) && f.target.is_none());

    let l = FileEntry::link("/a", "/b");
    assert!(l.target == Some("/b".to_owned()) && l.sha256.is_none());

    let d = FileEntry::dir("/a");
    assert!(d.sha256.is_none() && d.target.is_none());
}
