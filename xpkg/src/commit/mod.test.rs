use assert2::check;
use tempfile::TempDir;

use super::*;
use crate::pkgdb::FileEntry;
use crate::repository::MatchMode;
use crate::transaction::Stats;

#[derive(Default)]
struct NullSink {
    events: Vec<Event>,
}

impl EventSink for NullSink {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

fn append(builder: &mut tar::Builder<Vec<u8>>, path: &str, mode: u32, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append_data(&mut header, path, data).unwrap();
}

fn minimal_pkg(pkgver: &str, repository: Option<String>) -> PackageRecord {
    PackageRecord {
        pkgname: "foo".into(),
        pkgver: pkgver.into(),
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
        conf_files: vec![],
        links: vec![],
        dirs: vec![],
        state: State::NotInstalled,
        automatic_install: false,
        hold: false,
        repolock: false,
        install_script: None,
        remove_script: None,
        install_msg: None,
        remove_msg: None,
        install_date: None,
        metafile_sha256: None,
        repository,
    }
}

fn build_archive(pkgver: &str, file_contents: &[u8]) -> Vec<u8> {
    let props = serde_json::to_vec(&serde_json::json!({
                "pkgname": "foo",
                "pkgver": pkgver,
                "architecture": "x86_64",
                "installed_size": file_contents.len(),
                "state": "unpacked",
                "install-msg": "thanks for installing foo",
    }))
    .unwrap();
    let files = serde_json::to_vec(&serde_json::json!({
                "files": [{"file": "/usr/bin/foo", "sha256": Sha256Digest::of_bytes(file_contents).to_hex()}],
    }))
    .unwrap();

    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "./props.plist", 0o644, &props);
    append(&mut builder, "./files.plist", 0o644, &files);
    append(&mut builder, "./usr/bin/foo", 0o755, file_contents);
    builder.into_inner().unwrap()
}

#[test]
fn archive_paths_local_repository_uses_bare_filenames() {
    let cachedir = Path::new("/var/cache/xbps");
    let (archive, sig) = archive_paths(cachedir, "/srv/repo/current", "foo-1.0_1", "x86_64");
    check!(archive == Path::new("/srv/repo/current/foo-1.0_1.x86_64.xbps"));
    check!(sig == Path::new("/srv/repo/current/foo-1.0_1.x86_64.xbps.sig"));
}

#[test]
fn archive_paths_remote_repository_uses_cachedir() {
    let cachedir = Path::new("/var/cache/xbps");
    let (archive, sig) = archive_paths(cachedir, "https://repo.example/current", "foo-1.0_1", "x86_64");
    check!(archive == cachedir.join("foo-1.0_1.x86_64.xbps"));
    check!(sig == cachedir.join("foo-1.0_1.x86_64.xbps.sig"));
}

#[test]
fn verify_archive_without_sidecar_signature_only_checks_sha256() {
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("foo-1.0_1.x86_64.xbps");
    std::fs::write(&archive_path, b"archive bytes").unwrap();
    let sig_path = dir.path().join("foo-1.0_1.x86_64.xbps.sig");

    let mut pkg = minimal_pkg("foo-1.0_1", None);
    pkg.filename_sha256 = Some(Sha256Digest::of_bytes(b"archive bytes").to_hex());
    let rpool = RepositoryPool::new(vec![], MatchMode::FirstHit);

    check!(verify_archive(&rpool, "/srv/repo/current", &archive_path, &sig_path, &pkg).is_ok());

    pkg.filename_sha256 = Some(Sha256Digest::of_bytes(b"wrong bytes").to_hex());
    check!(verify_archive(&rpool, "/srv/repo/current", &archive_path, &sig_path, &pkg).is_err());
}

#[test]
fn commit_installs_a_fresh_package_end_to_end() {
    let rootdir = TempDir::new().unwrap();
    let repodir = TempDir::new().unwrap();

    let archive_bytes = build_archive("foo-1.0_1", b"#!/bin/sh\necho hi\n");
    std::fs::write(repodir.path().join("foo-1.0_1.x86_64.xbps"), &archive_bytes).unwrap();

    let mut handle = Handle::init(rootdir.path(), "x86_64").unwrap();
    let rpool = RepositoryPool::new(vec![], MatchMode::FirstHit);
    let repository = repodir.path().to_str().unwrap().to_owned();

    let pkg = minimal_pkg("foo-1.0_1", Some(repository));
    let entry = TransactionEntry::new(pkg, TransactionAction::Install);
    let prepared = PreparedTransaction {
        entries: vec![entry],
        missing_deps: vec![],
        broken_revdeps: vec![],
        conflicts: vec![],
        missing_shlibs: vec![],
        obsolete_files: Default::default(),
        stats: Stats { total_installed_size: 0, total_download_size: 0 },
    };

    let mut fetcher = LocalFetcher;
    let mut scripts = NullScriptRunner;
    let mut sink = NullSink::default();

    commit(&mut handle, &rpool, prepared, &mut fetcher, &mut scripts, &mut sink, CommitOptions::default()).unwrap();

    check!(std::fs::read(rootdir.path().join("usr/bin/foo")).unwrap() == b"#!/bin/sh\necho hi\n");

    let record = handle.pkgdb().unwrap().get_pkg("foo").unwrap().cloned().unwrap();
    check!(record.state == State::Installed);
    check!(record.install_date.is_some());
    check!(record.metafile_sha256.is_some());

    let showed_msg = sink
    .events
    .iter()
    .any(|e| matches!(e, Event::ShowInstallMsg { pkgname,.. } if pkgname == "foo"));
    check!(showed_msg);
}

#[test]
fn commit_download_only_stops_before_unpacking() {
    let rootdir = TempDir::new().unwrap();
    let repodir = TempDir::new().unwrap();

    let archive_bytes = build_archive("foo-1.0_1", b"#!/bin/sh\necho hi\n");
    std::fs::write(repodir.path().join("foo-1.0_1.x86_64.xbps"), &archive_bytes).unwrap();

    let mut handle = Handle::init(rootdir.path(), "x86_64").unwrap();
    let rpool = RepositoryPool::new(vec![], MatchMode::FirstHit);
    let repository = repodir.path().to_str().unwrap().to_owned();

    let pkg = minimal_pkg("foo-1.0_1", Some(repository));
    let entry = TransactionEntry::new(pkg, TransactionAction::Install);
    let prepared = PreparedTransaction {
        entries: vec![entry],
        missing_deps: vec![],
        broken_revdeps: vec![],
        conflicts: vec![],
        missing_shlibs: vec![],
        obsolete_files: Default::default(),
        stats: Stats { total_installed_size: 0, total_download_size: 0 },
    };

    let mut fetcher = LocalFetcher;
    let mut scripts = NullScriptRunner;
    let mut sink = NullSink::default();
    let opts = CommitOptions { download_only: true,..Default::default() };

    commit(&mut handle, &rpool, prepared, &mut fetcher, &mut scripts, &mut sink, opts).unwrap();

    check!(!rootdir.path().join("usr/bin/foo").exists());
    check!(handle.pkgdb().unwrap().get_pkg("foo").unwrap().is_none());
}

#[test]
fn commit_removes_an_installed_package() {
    let rootdir = TempDir::new().unwrap();
    std::fs::create_dir_all(rootdir.path().join("usr/bin")).unwrap();
    std::fs::write(rootdir.path().join("usr/bin/foo"), b"binary").unwrap();

    let mut handle = Handle::init(rootdir.path(), "x86_64").unwrap();
    let mut installed = minimal_pkg("foo-1.0_1", None);
    installed.state = State::Installed;
    installed.files = vec![FileEntry::file("/usr/bin/foo", Sha256Digest::of_bytes(b"binary").to_hex())];
    handle.pkgdb().unwrap().set_pkg(installed.clone());
    handle.pkgdb().unwrap().update(true, false).unwrap();

    let rpool = RepositoryPool::new(vec![], MatchMode::FirstHit);
    let mut entry = TransactionEntry::new(installed, TransactionAction::Remove);
    entry.repository = None;
    // `commit` recomputes obsolete files itself, so this starts empty.
    let prepared = PreparedTransaction {
        entries: vec![entry],
        missing_deps: vec![],
        broken_revdeps: vec![],
        conflicts: vec![],
        missing_shlibs: vec![],
        obsolete_files: Default::default(),
        stats: Stats { total_installed_size: 0, total_download_size: 0 },
    };

    let mut fetcher = LocalFetcher;
    let mut scripts = NullScriptRunner;
    let mut sink = NullSink::default();

    commit(&mut handle, &rpool, prepared, &mut fetcher, &mut scripts, &mut sink, CommitOptions::default()).unwrap();

    check!(!rootdir.path().join("usr/bin/foo").exists());
    check!(handle.pkgdb().unwrap().get_pkg("foo").unwrap().is_none());
}
