use std::fs;

use super::*;
use crate::internal::test_utils::assert;
use crate::pkgdb::{FileEntry, State};

fn pkg(pkgname: &str, pkgver: &str) -> PackageRecord {
    PackageRecord {
        pkgname: pkgname.to_owned(),
        pkgver: pkgver.to_owned(),
        architecture: "x86_64".into(),
        installed_size: 1024,
        filename_size: Some(512),
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

fn entry(p: PackageRecord, action: TransactionAction) -> TransactionEntry {
    TransactionEntry::new(p, action)
}

#[test]
fn apply_replaces_queues_installed_package_for_removal() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("old", "old-1_1"));

    let mut new_pkg = pkg("new", "new-1_1");
    new_pkg.replaces = vec!["old".into()];
    let mut entries = vec![entry(new_pkg, TransactionAction::Install)];

    apply_replaces(&mut entries, &mut db).unwrap();

    let removal = entries.iter().find(|e| e.name() == "old").unwrap();
    assert!(removal.action == TransactionAction::Remove);
    assert!(removal.replaced);
}

#[test]
fn apply_replaces_rewrites_already_queued_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("old", "old-1_1"));

    let mut new_pkg = pkg("new", "new-1_1");
    new_pkg.replaces = vec!["old".into()];
    let mut entries = vec![
        entry(pkg("old", "old-2_1"), TransactionAction::Update),
        entry(new_pkg, TransactionAction::Install),
    ];

    apply_replaces(&mut entries, &mut db).unwrap();

    assert!(entries[0].action == TransactionAction::Remove);
    assert!(entries[0].replaced);
}

#[test]
fn check_revdeps_reports_broken_consumer() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut consumer = pkg("app", "app-1_1");
    consumer.run_depends = vec!["liba>=1".into()];
    db.set_pkg(consumer);
    db.set_pkg(pkg("liba", "liba-1_1"));

    let entries = vec![entry(pkg("liba", "liba-0_5"), TransactionAction::Update)];

    let broken = check_revdeps(&entries, &mut db).unwrap();

    assert!(broken.iter().any(|b| b.contains("app-1_1") && b.contains("liba-0_5")));
}

#[test]
fn check_revdeps_allows_satisfying_update() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut consumer = pkg("app", "app-1_1");
    consumer.run_depends = vec!["liba>=1".into()];
    db.set_pkg(consumer);
    db.set_pkg(pkg("liba", "liba-1_1"));

    let entries = vec![entry(pkg("liba", "liba-2_1"), TransactionAction::Update)];

    let broken = check_revdeps(&entries, &mut db).unwrap();

    assert!(broken.is_empty());
}

#[test]
fn check_revdeps_reports_break_through_virtual_package() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut consumer = pkg("app", "app-1_1");
    consumer.run_depends = vec!["mail-mta".into()];
    db.set_pkg(consumer);

    let mut provider = pkg("postfix", "postfix-1_1");
    provider.provides = vec!["mail-mta".into()];
    db.set_pkg(provider);

    let entries = vec![entry(pkg("postfix", "postfix-1_1"), TransactionAction::Remove)];

    let broken = check_revdeps(&entries, &mut db).unwrap();

    assert!(broken.iter().any(|b| b.contains("app-1_1")));
}

#[test]
fn check_conflicts_detects_collision_with_installed() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("old-mailer", "old-mailer-1_1"));

    let mut new_pkg = pkg("new-mailer", "new-mailer-1_1");
    new_pkg.conflicts = vec!["old-mailer".into()];
    let entries = vec![entry(new_pkg, TransactionAction::Install)];

    let conflicts = check_conflicts(&entries, &mut db).unwrap();

    assert!(conflicts.iter().any(|c| c.contains("old-mailer-1_1")));
}

#[test]
fn check_conflicts_ignores_package_being_removed() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    db.set_pkg(pkg("old-mailer", "old-mailer-1_1"));

    let mut new_pkg = pkg("new-mailer", "new-mailer-1_1");
    new_pkg.conflicts = vec!["old-mailer".into()];
    let entries = vec![
        entry(new_pkg, TransactionAction::Install),
        entry(pkg("old-mailer", "old-mailer-1_1"), TransactionAction::Remove),
    ];

    let conflicts = check_conflicts(&entries, &mut db).unwrap();

    assert!(conflicts.is_empty());
}

#[test]
fn check_conflicts_package_being_removed_does_not_flag_staged_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut old_mailer = pkg("old-mailer", "old-mailer-1_1");
    old_mailer.conflicts = vec!["new-mailer".into()];
    db.set_pkg(old_mailer.clone());

    let entries = vec![
        entry(pkg("new-mailer", "new-mailer-1_1"), TransactionAction::Install),
        entry(old_mailer, TransactionAction::Remove),
    ];

    let conflicts = check_conflicts(&entries, &mut db).unwrap();

    assert!(conflicts.is_empty());
}

#[test]
fn check_shlibs_reports_unresolved_soname() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut needs_lib = pkg("app", "app-1_1");
    needs_lib.shlib_requires = vec!["libfoo.so.1".into()];
    let entries = vec![entry(needs_lib, TransactionAction::Install)];

    let missing = check_shlibs(&entries, &mut db);

    assert!(missing.iter().any(|m| m.contains("libfoo.so.1")));
}

#[test]
fn check_shlibs_resolves_against_sibling_in_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut needs_lib = pkg("app", "app-1_1");
    needs_lib.shlib_requires = vec!["libfoo.so.1".into()];
    let mut provides_lib = pkg("libfoo", "libfoo-1_1");
    provides_lib.shlib_provides = vec!["libfoo.so.1".into()];

    let entries = vec![
        entry(needs_lib, TransactionAction::Install),
        entry(provides_lib, TransactionAction::Install),
    ];

    let missing = check_shlibs(&entries, &mut db);

    assert!(missing.is_empty());
}

#[test]
fn check_file_conflicts_rejects_two_new_owners_of_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut a = pkg("a", "a-1_1");
    a.files = vec![FileEntry::file("/usr/bin/tool", "a".repeat(64))];
    let mut b = pkg("b", "b-1_1");
    b.files = vec![FileEntry::file("/usr/bin/tool", "b".repeat(64))];

    let entries = vec![entry(a, TransactionAction::Install), entry(b, TransactionAction::Install)];

    let result = check_file_conflicts(&entries, &mut db, dir.path(), &[], false, false);

    assert!(result.is_err());
}

#[test]
fn check_file_conflicts_force_overwrite_allows_collision() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut a = pkg("a", "a-1_1");
    a.files = vec![FileEntry::file("/usr/bin/tool", "a".repeat(64))];
    let mut b = pkg("b", "b-1_1");
    b.files = vec![FileEntry::file("/usr/bin/tool", "b".repeat(64))];

    let entries = vec![entry(a, TransactionAction::Install), entry(b, TransactionAction::Install)];

    let result = check_file_conflicts(&entries, &mut db, dir.path(), &[], true, false);

    assert!(result.is_ok());
}

#[test]
fn check_file_conflicts_schedules_unclaimed_unmodified_file_as_obsolete() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("usr/share")).unwrap();
    let content = b"stale data";
    fs::write(dir.path().join("usr/share/stale.txt"), content).unwrap();
    let hash = crate::primitives::hash::Sha256Digest::of_bytes(content).to_hex();

    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut old = pkg("app", "app-1_1");
    old.files = vec![FileEntry::file("/usr/share/stale.txt", hash)];
    db.set_pkg(old);

    let entries = vec![entry(pkg("app", "app-2_1"), TransactionAction::Update)];

    let obsolete = check_file_conflicts(&entries, &mut db, dir.path(), &[], false, false).unwrap();

    assert!(obsolete.get("app").map(|v| v.as_slice()) == Some(&["/usr/share/stale.txt".to_owned()][..]));
}

#[test]
fn check_file_conflicts_retains_user_modified_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("etc")).unwrap();
    fs::write(dir.path().join("etc/modified.conf"), b"user edited").unwrap();

    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut old = pkg("app", "app-1_1");
    old.files = vec![FileEntry::file("/etc/modified.conf", "0".repeat(64))];
    db.set_pkg(old);

    let entries = vec![entry(pkg("app", "app-2_1"), TransactionAction::Update)];

    let obsolete = check_file_conflicts(&entries, &mut db, dir.path(), &[], false, false).unwrap();

    assert!(!obsolete.contains_key("app"));
}

#[test]
fn check_file_conflicts_respects_preserve_glob() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("etc")).unwrap();
    let content = b"keep me";
    fs::write(dir.path().join("etc/keep.conf"), content).unwrap();
    let hash = crate::primitives::hash::Sha256Digest::of_bytes(content).to_hex();

    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut old = pkg("app", "app-1_1");
    old.files = vec![FileEntry::file("/etc/keep.conf", hash)];
    db.set_pkg(old);

    let entries = vec![entry(pkg("app", "app-2_1"), TransactionAction::Update)];
    let preserve = vec!["/etc/*".to_owned()];

    let obsolete = check_file_conflicts(&entries, &mut db, dir.path(), &preserve, false, false).unwrap();

    assert!(!obsolete.contains_key("app"));
}

#[test]
fn check_file_conflicts_schedules_directory_removal_when_contents_are_also_removed() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("usr/share/app")).unwrap();
    let content = b"data";
    fs::write(dir.path().join("usr/share/app/data.txt"), content).unwrap();
    let hash = crate::primitives::hash::Sha256Digest::of_bytes(content).to_hex();

    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut old = pkg("app", "app-1_1");
    old.dirs = vec![FileEntry::dir("/usr/share/app")];
    old.files = vec![FileEntry::file("/usr/share/app/data.txt", hash)];
    db.set_pkg(old);

    let entries = vec![entry(pkg("app", "app-1_1"), TransactionAction::Remove)];

    let obsolete = check_file_conflicts(&entries, &mut db, dir.path(), &[], false, false).unwrap();

    let paths = obsolete.get("app").cloned().unwrap_or_default();
    assert!(paths.contains(&"/usr/share/app/data.txt".to_owned()));
    assert!(paths.contains(&"/usr/share/app".to_owned()));
}

#[test]
fn check_file_conflicts_keeps_directory_with_untracked_leftover() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("usr/share/app")).unwrap();
    fs::write(dir.path().join("usr/share/app/leftover.txt"), b"user file").unwrap();

    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut old = pkg("app", "app-1_1");
    old.dirs = vec![FileEntry::dir("/usr/share/app")];
    db.set_pkg(old);

    let entries = vec![entry(pkg("app", "app-1_1"), TransactionAction::Remove)];

    let obsolete = check_file_conflicts(&entries, &mut db, dir.path(), &[], false, false).unwrap();

    let dir_is_obsolete = obsolete.get("app").map(|v| v.contains(&"/usr/share/app".to_owned())).unwrap_or(false);
    assert!(!dir_is_obsolete);
}

#[test]
fn compute_stats_sums_staged_sizes_and_passes_with_free_space() {
    let dir = tempfile::tempdir().unwrap();
    let entries = vec![
        entry(pkg("a", "a-1_1"), TransactionAction::Install),
        entry(pkg("b", "b-1_1"), TransactionAction::Install),
    ];

    let stats = compute_stats(&entries, dir.path()).unwrap();

    assert!(stats.total_installed_size == 2048);
    assert!(stats.total_download_size == 1024);
}

#[test]
fn compute_stats_fails_when_download_exceeds_free_space() {
    let dir = tempfile::tempdir().unwrap();
    let mut huge = pkg("a", "a-1_1");
    huge.filename_size = Some(u64::MAX / 2);
    let entries = vec![entry(huge, TransactionAction::Install)];

    let result = compute_stats(&entries, dir.path());

    assert!(matches!(result, Err(Error::NoSpace(..))));
}
