use std::collections::BTreeMap;

use super::*;
use crate::event::{Event, TracingEventSink};
use crate::internal::test_utils::assert;
use crate::pkgdb::{FileEntry, State};

struct Recorder(Vec<Event>);

impl EventSink for Recorder {
    fn emit(&mut self, event: Event) {
        self.0.push(event);
    }
}

fn pkg_with_group(pkgname: &str, pkgver: &str, group: &str, entries: &[&str]) -> PackageRecord {
    let mut alternatives = BTreeMap::new();
    alternatives.insert(group.to_owned(), entries.iter().map(|s| s.to_string()).collect());

    PackageRecord {
        pkgname: pkgname.into(),
        pkgver: pkgver.into(),
        architecture: "x86_64".into(),
        installed_size: 0,
        filename_size: None,
        filename_sha256: None,
        run_depends: vec!["libc".into()],
        provides: vec![],
        replaces: vec![],
        conflicts: vec![],
        reverts: vec![],
        shlib_provides: vec![],
        shlib_requires: vec![],
        alternatives,
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
    }
}

#[test]
fn register_first_provider_creates_group_and_links() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut sink = TracingEventSink;

    let vim = pkg_with_group("vim", "vim-8_1", "vi", &["/usr/bin/vi:/usr/bin/vim"]);
    fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
    fs::write(dir.path().join("usr/bin/vim"), b"").unwrap();

    register(dir.path(), &mut db, &vim, &mut sink).unwrap();

    assert!(db.alt_group("vi") == Some(&["vim".to_owned()][..]));
    let link = dir.path().join("usr/bin/vi");
    let target = fs::read_link(&link).unwrap();
    assert!(target == Path::new("vim"));
}

#[test]
fn second_provider_does_not_take_over_head() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut sink = TracingEventSink;
    fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
    fs::write(dir.path().join("usr/bin/vim"), b"").unwrap();
    fs::write(dir.path().join("usr/bin/nvi"), b"").unwrap();

    let vim = pkg_with_group("vim", "vim-8_1", "vi", &["/usr/bin/vi:/usr/bin/vim"]);
    let nvi = pkg_with_group("nvi", "nvi-1_1", "vi", &["/usr/bin/vi:/usr/bin/nvi"]);

    register(dir.path(), &mut db, &vim, &mut sink).unwrap();
    register(dir.path(), &mut db, &nvi, &mut sink).unwrap();

    assert!(db.alt_group("vi") == Some(&["vim".to_owned(), "nvi".to_owned()][..]));
    let target = fs::read_link(dir.path().join("usr/bin/vi")).unwrap();
    assert!(target == Path::new("vim"));
}

#[test]
fn removing_head_rotates_to_last_remaining_provider() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut sink = TracingEventSink;
    fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
    fs::write(dir.path().join("usr/bin/vim"), b"").unwrap();
    fs::write(dir.path().join("usr/bin/nvi"), b"").unwrap();

    let vim = pkg_with_group("vim", "vim-8_1", "vi", &["/usr/bin/vi:/usr/bin/vim"]);
    let nvi = pkg_with_group("nvi", "nvi-1_1", "vi", &["/usr/bin/vi:/usr/bin/nvi"]);
    db.set_pkg(nvi.clone());

    register(dir.path(), &mut db, &vim, &mut sink).unwrap();
    register(dir.path(), &mut db, &nvi, &mut sink).unwrap();

    unregister(dir.path(), &mut db, &vim, false, &mut sink).unwrap();

    assert!(db.alt_group("vi") == Some(&["nvi".to_owned()][..]));
    let target = fs::read_link(dir.path().join("usr/bin/vi")).unwrap();
    assert!(target == Path::new("nvi"));
}

#[test]
fn unregister_while_updating_leaves_order_for_reregistration() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut sink = TracingEventSink;
    fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
    fs::write(dir.path().join("usr/bin/vim"), b"").unwrap();

    let vim = pkg_with_group("vim", "vim-8_1", "vi", &["/usr/bin/vi:/usr/bin/vim"]);
    register(dir.path(), &mut db, &vim, &mut sink).unwrap();

    unregister(dir.path(), &mut db, &vim, true, &mut sink).unwrap();
    assert!(db.alt_group("vi") == Some(&[][..]) || db.alt_group("vi").is_none());
}

#[test]
fn metapackage_tie_break_picks_first_remaining() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut sink = TracingEventSink;
    fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
    fs::write(dir.path().join("usr/bin/a"), b"").unwrap();
    fs::write(dir.path().join("usr/bin/b"), b"").unwrap();
    fs::write(dir.path().join("usr/bin/meta"), b"").unwrap();

    let a = pkg_with_group("a", "a-1_1", "g", &["/usr/bin/x:/usr/bin/a"]);
    let b = pkg_with_group("b", "b-1_1", "g", &["/usr/bin/x:/usr/bin/b"]);
    let mut meta = pkg_with_group("meta", "meta-1_1", "g", &["/usr/bin/x:/usr/bin/meta"]);
    meta.run_depends.clear();
    meta.shlib_requires.clear();
    db.set_pkg(a.clone());
    db.set_pkg(b.clone());

    register(dir.path(), &mut db, &meta, &mut sink).unwrap();
    register(dir.path(), &mut db, &a, &mut sink).unwrap();
    register(dir.path(), &mut db, &b, &mut sink).unwrap();
    assert!(db.alt_group("g") == Some(&["meta".to_owned(), "a".to_owned(), "b".to_owned()][..]));

    unregister(dir.path(), &mut db, &meta, false, &mut sink).unwrap();

    // `meta` is a transitional metapackage: the *first* remaining entry
    // (`a`) wins the tie-break and is rotated to head, not `b` (the
    // most-recently-added, which the non-metapackage rule would pick).
    assert!(db.alt_group("g") == Some(&["a".to_owned(), "b".to_owned()][..]));
}

#[test]
fn register_emits_alt_group_added_for_first_provider() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut sink = Recorder(Vec::new());
    fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
    fs::write(dir.path().join("usr/bin/vim"), b"").unwrap();

    let vim = pkg_with_group("vim", "vim-8_1", "vi", &["/usr/bin/vi:/usr/bin/vim"]);
    register(dir.path(), &mut db, &vim, &mut sink).unwrap();

    assert!(
        sink.0.iter().any(|e| matches!(e, Event::AltGroupAdded { group, pkgname } if group == "vi" && pkgname == "vim"))
    );
}

#[test]
fn unregister_emits_alt_group_switched_on_full_removal() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Pkgdb::lock(dir.path()).unwrap();
    let mut sink = Recorder(Vec::new());
    fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
    fs::write(dir.path().join("usr/bin/vim"), b"").unwrap();
    fs::write(dir.path().join("usr/bin/nvi"), b"").unwrap();

    let vim = pkg_with_group("vim", "vim-8_1", "vi", &["/usr/bin/vi:/usr/bin/vim"]);
    let nvi = pkg_with_group("nvi", "nvi-1_1", "vi", &["/usr/bin/vi:/usr/bin/nvi"]);
    db.set_pkg(nvi.clone());
    register(dir.path(), &mut db, &vim, &mut sink).unwrap();
    register(dir.path(), &mut db, &nvi, &mut sink).unwrap();

    unregister(dir.path(), &mut db, &vim, false, &mut sink).unwrap();

    assert!(sink.0.iter().any(
        |e| matches!(e, Event::AltGroupSwitched { group, from, to } if group == "vi" && from == "vim" && to == "nvi")
    ));
}
