use super::*;
use crate::internal::test_utils::assert;
use crate::pkgdb::PackageRecord;

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
        state: crate::pkgdb::State::Installed,
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

fn names(entries: &[TransactionEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name()).collect()
}

#[test]
fn install_before_rundep_gets_moved_after() {
    // `a` is staged first but depends on `b`, staged second: `b` must end up
    // before `a` in the final order.
    let a = entry(pkg("a", "a-1_1", &["b"]), TransactionAction::Install);
    let b = entry(pkg("b", "b-1_1", &[]), TransactionAction::Install);

    let sorted = sort_transaction(vec![a, b]);

    assert!(names(&sorted) == vec!["b", "a"]);
}

#[test]
fn dependency_chain_is_linearized() {
    let a = entry(pkg("a", "a-1_1", &["b"]), TransactionAction::Install);
    let b = entry(pkg("b", "b-1_1", &["c"]), TransactionAction::Install);
    let c = entry(pkg("c", "c-1_1", &[]), TransactionAction::Install);

    let sorted = sort_transaction(vec![a, b, c]);

    assert!(names(&sorted) == vec!["c", "b", "a"]);
}

#[test]
fn dep_satisfied_outside_transaction_is_a_no_op() {
    let a = entry(pkg("a", "a-1_1", &["libc"]), TransactionAction::Install);

    let sorted = sort_transaction(vec![a]);

    assert!(names(&sorted) == vec!["a"]);
}

#[test]
fn self_edge_is_dropped() {
    let a = entry(pkg("a", "a-1_1", &["a"]), TransactionAction::Install);

    let sorted = sort_transaction(vec![a]);

    assert!(names(&sorted) == vec!["a"]);
}

#[test]
fn removals_are_pulled_to_the_head_most_recent_first() {
    let keep = entry(pkg("keep", "keep-1_1", &[]), TransactionAction::Install);
    let r1 = entry(pkg("r1", "r1-1_1", &[]), TransactionAction::Remove);
    let r2 = entry(pkg("r2", "r2-1_1", &[]), TransactionAction::Remove);

    let sorted = sort_transaction(vec![keep, r1, r2]);

    assert!(names(&sorted) == vec!["r2", "r1", "keep"]);
}

#[test]
fn dependency_cycle_does_not_loop_forever() {
    let a = entry(pkg("a", "a-1_1", &["b"]), TransactionAction::Install);
    let b = entry(pkg("b", "b-1_1", &["a"]), TransactionAction::Install);

    let sorted = sort_transaction(vec![a, b]);

    assert!(sorted.len() == 2);
    assert!(names(&sorted).contains(&"a"));
    assert!(names(&sorted).contains(&"b"));
}
