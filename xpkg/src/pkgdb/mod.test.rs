use super::*;
use crate::internal::test_utils::assert;

fn installed(pkgname: &str, pkgver: &str, run_depends: &[&str], provides: &[&str]) -> PackageRecord {
    PackageRecord {
        pkgname: pkgname.to_owned(),
        pkgver: pkgver.to_owned(),
        architecture: "x86_64".into(),
        installed_size: 0,
        filename_size: None,
        filename_sha256: None,
        run_depends: run_depends.iter().map(|s| s.to_string()).collect(),
        provides: provides.iter().map(|s| s.to_string()).collect(),
        replaces: vec![],
        conflicts: vec![],
        reverts: vec![],
        shlib_provides: vec![],
        shlib_requires: vec![],
        alternatives: Default::default(),
        files: vec![],
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
    }
}

#[test]
fn lock_creates_empty_store_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let db = Pkgdb::lock(dir.path()).unwrap();
    assert!(db.packages.is_empty());
    assert!(db.path() == dir.path().join("pkgdb.plist"));
}

#[test]
fn second_lock_attempt_fails_busy() {
    let dir = tempfile::tempdir().unwrap();
    let _db = Pkgdb::lock(dir.path()).unwrap();
    let err = Pkgdb::lock(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Lock(_)));
}

#[test]
fn flush_persists_across_lock_sessions() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = Pkgdb::lock(dir.path()).unwrap();
        db.set_pkg(installed("foo", "foo-1.0_1", &[], &[]));
        assert!(db.update(true, false).unwrap());
        assert!(!db.update(true, false).unwrap());
    }
    let db = Pkgdb::lock(dir.path()).unwrap();
    assert!(db.get_pkg("foo").unwrap().is_some());
}

#[test]
fn update_reload_discards_unflushed_in_memory_changes() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(installed("foo", "foo-1.0_1", &[], &[]));
    assert!(db.update(true, false).unwrap());

    db.set_pkg(installed("bar", "bar-1.0_1", &[], &[]));
    assert!(db.get_pkg("bar").unwrap().is_some());

    db.update(false, true).unwrap();
    assert!(db.get_pkg("bar").unwrap().is_none());
    assert!(db.get_pkg("foo").unwrap().is_some());
}

#[test]
fn get_pkg_resolves_plain_pattern_and_pkgver() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(installed("foo", "foo-1.2_3", &[], &[]));

    assert!(db.get_pkg("foo").unwrap().unwrap().pkgver == "foo-1.2_3");
    assert!(db.get_pkg("foo-1.2_3").unwrap().is_some());
    assert!(db.get_pkg("foo-1.2_9").unwrap().is_none());
    assert!(db.get_pkg("foo>=1").unwrap().is_some());
    assert!(db.get_pkg("foo>=2").unwrap().is_none());
    assert!(db.get_pkg("nonexistent").unwrap().is_none());
}

#[test]
fn get_virtualpkg_consults_index_then_scans() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(installed("foo-impl", "foo-impl-1.0_1", &[], &["foo-1.0_1"]));

    assert!(db.get_virtualpkg("foo>=1").unwrap().unwrap().pkgname == "foo-impl");
    assert!(db.get_virtualpkg("foo>=2").unwrap().is_none());
}

#[test]
fn get_revdeps_builds_transitive_index_on_first_use() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(installed("foo", "foo-1.0_1", &[], &[]));
    db.set_pkg(installed("bar", "bar-1.0_1", &["foo>=1"], &[]));

    assert!(db.get_revdeps("foo") == ["bar-1.0_1".to_owned()]);
    assert!(db.get_revdeps("nonexistent").is_empty());
}

#[test]
fn foreach_cb_visits_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(installed("foo", "foo-1.0_1", &[], &[]));
    db.set_pkg(installed("bar", "bar-1.0_1", &[], &[]));

    let mut seen = Vec::new();
    db.foreach_cb(|pkg| seen.push(pkg.pkgname.clone()));
    seen.sort();
    assert!(seen == vec!["bar".to_owned(), "foo".to_owned()]);
}

#[test]
fn foreach_cb_multi_visits_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    for i in 0..20 {
        db.set_pkg(installed(&format!("pkg{i}"), &format!("pkg{i}-1.0_1"), &[], &[]));
    }

    let seen = std::sync::Mutex::new(Vec::new());
    db.foreach_cb_multi(|pkg| seen.lock().unwrap().push(pkg.pkgname.clone()));
    let mut seen = seen.into_inner().unwrap();
    seen.sort();
    assert!(seen.len() == 20);
}

#[test]
fn remove_pkg_drops_record_and_invalidates_revdeps_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(installed("foo", "foo-1.0_1", &[], &[]));
    db.set_pkg(installed("bar", "bar-1.0_1", &["foo>=1"], &[]));
    assert!(db.get_revdeps("foo").len() == 1);

    db.remove_pkg("bar");
    assert!(db.get_revdeps("foo").is_empty());
}
