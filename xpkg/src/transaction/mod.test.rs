use super::*;
use crate::internal::test_utils::assert;
use crate::pkgdb::{PackageRecord, State, TransactionAction, TransactionEntry};

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
fn prepare_sorts_and_collects_stats_for_a_clean_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut app = pkg("app", "app-1_1");
    app.run_depends = vec!["liba".into()];
    let entries = vec![
        entry(app, TransactionAction::Install),
        entry(pkg("liba", "liba-1_1"), TransactionAction::Install),
    ];

    let prepared = prepare(entries, vec![], &mut db, dir.path(), &[], false, false).unwrap();

    assert!(prepared.entries.iter().map(|e| e.name()).collect::<Vec<_>>() == vec!["liba", "app"]);
    assert!(prepared.broken_revdeps.is_empty());
    assert!(prepared.conflicts.is_empty());
    assert!(prepared.stats.total_installed_size == 2048);
}

#[test]
fn prepare_surfaces_conflicts_and_broken_revdeps() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();

    let mut consumer = pkg("consumer", "consumer-1_1");
    consumer.run_depends = vec!["liba>=1".into()];
    db.set_pkg(consumer);
    db.set_pkg(pkg("liba", "liba-1_1"));

    let mut new_mailer = pkg("new-mailer", "new-mailer-1_1");
    new_mailer.conflicts = vec!["old-mailer".into()];
    db.set_pkg(pkg("old-mailer", "old-mailer-1_1"));

    let entries = vec![
        entry(pkg("liba", "liba-0_5"), TransactionAction::Update),
        entry(new_mailer, TransactionAction::Install),
    ];

    let prepared = prepare(entries, vec!["missing-dep".into()], &mut db, dir.path(), &[], false, false).unwrap();

    assert!(prepared.missing_deps == vec!["missing-dep".to_owned()]);
    assert!(prepared.broken_revdeps.iter().any(|b| b.contains("liba-0_5")));
    assert!(prepared.conflicts.iter().any(|c| c.contains("old-mailer-1_1")));
}
