use std::collections::BTreeMap;

use super::*;
use crate::internal::test_utils::assert;
use crate::pkgdb::PackageRecord;
use crate::repository::{MatchMode, Repository, RepositoryPool};

fn pkg(pkgname: &str, pkgver: &str, run_depends: &[&str]) -> PackageRecord {
    PackageRecord {
        pkgname: pkgname.to_owned(),
        pkgver: pkgver.to_owned(),
        architecture: "x86_64".into(),
        installed_size: 0,
        filename_size: Some(0),
        filename_sha256: None,
        run_depends: run_depends.iter().map(|s| s.to_string()).collect(),
        provides: vec![],
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

fn build_repodata_tar(index: &BTreeMap<String, PackageRecord>) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    let contents = serde_json::to_vec(index).unwrap();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, "./index.plist", &contents[..]).unwrap();
    builder.into_inner().unwrap()
}

fn pool(packages: &[PackageRecord]) -> RepositoryPool {
    let mut index = BTreeMap::new();
    for pkg in packages {
        index.insert(pkg.pkgname.clone(), pkg.clone());
    }
    let tar = build_repodata_tar(&index);
    let repo = Repository::open(&tar[..], "file:///repo", "x86_64", true).unwrap();
    RepositoryPool::new(vec![repo], MatchMode::FirstHit)
}

#[test]
fn trans_find_pkg_installs_when_not_installed() {
    let dir = tempfile::tempdir().unwrap();
    let db = Pkgdb::lock(dir.path()).unwrap();
    let rpool = pool(&[pkg("foo", "foo-1.0_1", &[])]);
    let cfg = ResolverConfig::default();

    let entry = trans_find_pkg("foo", false, &db, &rpool, &cfg).unwrap().unwrap();
    assert!(entry.action == TransactionAction::Install);
    assert!(entry.pkg.pkgver == "foo-1.0_1");
}

#[test]
fn trans_find_pkg_updates_when_repo_has_newer_version() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("foo", "foo-1.0_1", &[]));
    let rpool = pool(&[pkg("foo", "foo-2.0_1", &[])]);
    let cfg = ResolverConfig::default();

    let entry = trans_find_pkg("foo", false, &db, &rpool, &cfg).unwrap().unwrap();
    assert!(entry.action == TransactionAction::Update);
}

#[test]
fn trans_find_pkg_skips_update_when_not_newer() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("foo", "foo-2.0_1", &[]));
    let rpool = pool(&[pkg("foo", "foo-1.0_1", &[])]);
    let cfg = ResolverConfig::default();

    assert!(trans_find_pkg("foo", false, &db, &rpool, &cfg).unwrap().is_none());
}

#[test]
fn trans_find_pkg_reinstall_downgrades_to_update_when_repo_is_newer() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("foo", "foo-1.0_1", &[]));
    let rpool = pool(&[pkg("foo", "foo-2.0_1", &[])]);
    let cfg = ResolverConfig::default();

    let entry = trans_find_pkg("foo", true, &db, &rpool, &cfg).unwrap().unwrap();
    assert!(entry.action == TransactionAction::Update);
}

#[test]
fn trans_find_pkg_honors_hold() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut installed = pkg("foo", "foo-1.0_1", &[]);
    installed.hold = true;
    db.set_pkg(installed);
    let rpool = pool(&[pkg("foo", "foo-2.0_1", &[])]);
    let cfg = ResolverConfig::default();

    let entry = trans_find_pkg("foo", false, &db, &rpool, &cfg).unwrap().unwrap();
    assert!(entry.action == TransactionAction::Hold);
}

#[test]
fn trans_find_pkg_download_only_forces_download_action() {
    let dir = tempfile::tempdir().unwrap();
    let db = Pkgdb::lock(dir.path()).unwrap();
    let rpool = pool(&[pkg("foo", "foo-1.0_1", &[])]);
    let cfg = ResolverConfig {
        download_only: true,
        ..Default::default()
    };

    let entry = trans_find_pkg("foo", false, &db, &rpool, &cfg).unwrap().unwrap();
    assert!(entry.action == TransactionAction::Download);
}

#[test]
fn repo_deps_queues_transitive_dependencies_as_automatic() {
    let dir = tempfile::tempdir().unwrap();
    let db = Pkgdb::lock(dir.path()).unwrap();
    let rpool = pool(&[pkg("foo", "foo-1.0_1", &["bar>=1"]), pkg("bar", "bar-2.0_1", &[])]);
    let cfg = ResolverConfig::default();

    let root = trans_find_pkg("foo", false, &db, &rpool, &cfg).unwrap().unwrap();
    let mut trans = Transaction::default();
    repo_deps(&root, &db, &rpool, &cfg, &mut trans).unwrap();

    assert!(trans.entries.len() == 1);
    assert!(trans.entries[0].name() == "bar");
    assert!(trans.entries[0].pkg.automatic_install);
    assert!(trans.missing_deps.is_empty());
}

#[test]
fn repo_deps_records_missing_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let db = Pkgdb::lock(dir.path()).unwrap();
    let rpool = pool(&[pkg("foo", "foo-1.0_1", &["bar>=1"])]);
    let cfg = ResolverConfig::default();

    let root = trans_find_pkg("foo", false, &db, &rpool, &cfg).unwrap().unwrap();
    let mut trans = Transaction::default();
    repo_deps(&root, &db, &rpool, &cfg, &mut trans).unwrap();

    assert!(trans.entries.is_empty());
    assert!(trans.missing_deps == vec!["bar>=1".to_owned()]);
}

#[test]
fn remove_pkg_fails_when_not_installed() {
    let dir = tempfile::tempdir().unwrap();
    let db = Pkgdb::lock(dir.path()).unwrap();
    let err = remove_pkg("foo", false, &db).unwrap_err();
    assert!(matches!(err, Error::NotInstalled(_)));
}

#[test]
fn remove_pkg_recursive_includes_orphaned_deps() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("foo", "foo-1.0_1", &["bar>=1"]));
    let mut bar = pkg("bar", "bar-1.0_1", &[]);
    bar.automatic_install = true;
    db.set_pkg(bar);

    let trans = remove_pkg("foo", true, &db).unwrap();
    let mut names: Vec<_> = trans.entries.iter().map(|e| e.name().to_owned()).collect();
    names.sort();
    assert!(names == vec!["bar".to_owned(), "foo".to_owned()]);
}

#[test]
fn remove_pkg_non_recursive_only_queues_named_package() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("foo", "foo-1.0_1", &["bar>=1"]));
    let mut bar = pkg("bar", "bar-1.0_1", &[]);
    bar.automatic_install = true;
    db.set_pkg(bar);

    let trans = remove_pkg("foo", false, &db).unwrap();
    assert!(trans.entries.len() == 1);
    assert!(trans.entries[0].name() == "foo");
}

#[test]
fn autoremove_pkgs_finds_unreferenced_automatic_packages() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut orphan = pkg("bar", "bar-1.0_1", &[]);
    orphan.automatic_install = true;
    db.set_pkg(orphan);
    db.set_pkg(pkg("foo", "foo-1.0_1", &[]));

    let trans = autoremove_pkgs(&db);
    assert!(trans.entries.len() == 1);
    assert!(trans.entries[0].name() == "bar");
}

#[test]
fn autoremove_pkgs_keeps_automatic_packages_still_depended_on() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut dep = pkg("bar", "bar-1.0_1", &[]);
    dep.automatic_install = true;
    db.set_pkg(dep);
    db.set_pkg(pkg("foo", "foo-1.0_1", &["bar>=1"]));

    let trans = autoremove_pkgs(&db);
    assert!(trans.entries.is_empty());
}

#[test]
fn update_packages_aborts_when_self_update_available() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("xbps", "xbps-1.0_1", &[]));
    let rpool = pool(&[pkg("xbps", "xbps-2.0_1", &[])]);
    let cfg = ResolverConfig {
        self_pkgname: "xbps".to_owned(),
        ..Default::default()
    };

    let err = update_packages(&mut db, &rpool, &cfg).unwrap_err();
    assert!(matches!(err, Error::SelfUpdateRequired));
}
