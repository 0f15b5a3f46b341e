use super::*;
use crate::internal::test_utils::assert;

fn pkg(pkgname: &str, pkgver: &str, run_depends: &[&str], provides: &[&str]) -> PackageRecord {
    PackageRecord {
        pkgname: pkgname.to_owned(),
        pkgver: pkgver.to_owned(),
        architecture: "x86_64".into(),
        installed_size: 0,
        filename_size: Some(0),
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

fn build_repodata_tar(
    index: &BTreeMap<String, PackageRecord>,
    stage: Option<&BTreeMap<String, PackageRecord>>,
    meta: Option<&IndexMeta>,
) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut add = |name: &str, contents: &[u8]| {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, contents).unwrap();
    };

    add("./index.plist", &serde_json::to_vec(index).unwrap());
    if let Some(stage) = stage {
        add("./stage.plist", &serde_json::to_vec(stage).unwrap());
    }
    if let Some(meta) = meta {
        add("./index-meta.plist", &serde_json::to_vec(meta).unwrap());
    }

    builder.into_inner().unwrap()
}

#[test]
fn open_parses_index_without_stage_or_meta() {
    let mut index = BTreeMap::new();
    index.insert("foo".to_owned(), pkg("foo", "foo-1.0_1", &[], &[]));
    let tar = build_repodata_tar(&index, None, None);

    let repo = Repository::open(&tar[..], "file:///repo", "x86_64", true).unwrap();
    assert!(repo.idx.len() == 1);
    assert!(repo.meta.public_key.is_none());
}

#[test]
fn stage_overrides_index_on_key_collision_when_use_stage() {
    let mut index = BTreeMap::new();
    index.insert("foo".to_owned(), pkg("foo", "foo-1.0_1", &[], &[]));
    let mut stage = BTreeMap::new();
    stage.insert("foo".to_owned(), pkg("foo", "foo-2.0_1", &[], &[]));
    let tar = build_repodata_tar(&index, Some(&stage), None);

    let with_stage = Repository::open(&tar[..], "u", "x86_64", true).unwrap();
    assert!(with_stage.idx.get("foo").unwrap().pkgver == "foo-2.0_1");

    let without_stage = Repository::open(&tar[..], "u", "x86_64", false).unwrap();
    assert!(without_stage.idx.get("foo").unwrap().pkgver == "foo-1.0_1");
}

#[test]
fn get_pkg_resolves_and_tags_repository() {
    let mut index = BTreeMap::new();
    index.insert("foo".to_owned(), pkg("foo", "foo-1.0_1", &[], &[]));
    let tar = build_repodata_tar(&index, None, None);

    let repo = Repository::open(&tar[..], "file:///repo", "x86_64", true).unwrap();
    let found = repo.get_pkg("foo>=1").unwrap().unwrap();
    assert!(found.repository == Some("file:///repo".to_owned()));
    assert!(repo.get_pkg("foo>=2").unwrap().is_none());
}

#[test]
fn get_virtualpkg_scans_provides() {
    let mut index = BTreeMap::new();
    index.insert(
        "foo-impl".to_owned(),
        pkg("foo-impl", "foo-impl-1.0_1", &[], &["foo-1.0_1"]),
    );
    let tar = build_repodata_tar(&index, None, None);
    let repo = Repository::open(&tar[..], "u", "x86_64", true).unwrap();

    assert!(repo.get_virtualpkg("foo>=1").unwrap().unwrap().pkgname == "foo-impl");
}

#[test]
fn get_revdeps_filters_by_architecture() {
    let mut index = BTreeMap::new();
    let target = pkg("foo", "foo-1.0_1", &[], &[]);
    let mut dependent = pkg("bar", "bar-1.0_1", &["foo>=1"], &[]);
    dependent.architecture = "aarch64".into();
    index.insert("foo".to_owned(), target.clone());
    index.insert("bar".to_owned(), dependent);
    let tar = build_repodata_tar(&index, None, None);
    let repo = Repository::open(&tar[..], "u", "x86_64", true).unwrap();

    assert!(repo.get_revdeps(&target, "x86_64").is_empty());
    assert!(repo.get_revdeps(&target, "aarch64") == vec!["bar-1.0_1".to_owned()]);
}

#[test]
fn pool_best_matching_picks_highest_version_across_repos() {
    let mut idx1 = BTreeMap::new();
    idx1.insert("foo".to_owned(), pkg("foo", "foo-1.0_1", &[], &[]));
    let mut idx2 = BTreeMap::new();
    idx2.insert("foo".to_owned(), pkg("foo", "foo-2.0_1", &[], &[]));

    let repo1 = Repository::open(&build_repodata_tar(&idx1, None, None)[..], "a", "x86_64", true).unwrap();
    let repo2 = Repository::open(&build_repodata_tar(&idx2, None, None)[..], "b", "x86_64", true).unwrap();

    let pool = RepositoryPool::new(vec![repo1, repo2], MatchMode::BestMatching);
    assert!(pool.get_pkg("foo").unwrap().unwrap().pkgver == "foo-2.0_1");
}

#[test]
fn pool_first_hit_picks_configured_order() {
    let mut idx1 = BTreeMap::new();
    idx1.insert("foo".to_owned(), pkg("foo", "foo-1.0_1", &[], &[]));
    let mut idx2 = BTreeMap::new();
    idx2.insert("foo".to_owned(), pkg("foo", "foo-2.0_1", &[], &[]));

    let repo1 = Repository::open(&build_repodata_tar(&idx1, None, None)[..], "a", "x86_64", true).unwrap();
    let repo2 = Repository::open(&build_repodata_tar(&idx2, None, None)[..], "b", "x86_64", true).unwrap();

    let pool = RepositoryPool::new(vec![repo1, repo2], MatchMode::FirstHit);
    assert!(pool.get_pkg("foo").unwrap().unwrap().pkgver == "foo-1.0_1");
}

#[test]
fn verify_metadata_accepts_first_seen_key_and_persists_it() {
    let (sk, pk) = crate::crypto::minisign::generate_keypair().unwrap();
    let raw = {
        let mut v = Vec::new();
        v.extend_from_slice(b"Ed");
        v.extend_from_slice(&pk.keynum);
        v.extend_from_slice(&pk.verifying_key().unwrap().to_bytes());
        v
    };
    let meta = IndexMeta {
        public_key: Some(crate::crypto::base64_encode(&raw)),
        signature_by: Some("test".to_owned()),
        public_key_size: None,
    };
    let index = BTreeMap::new();
    let tar = build_repodata_tar(&index, None, Some(&meta));
    let repo = Repository::open(&tar[..], "u", "x86_64", true).unwrap();

    let hash = crate::primitives::hash::blake2b512_of_bytes(b"index-meta contents");
    let sig = Minisig::sign(&sk, &hash, "trusted");

    let dir = tempfile::tempdir().unwrap();
    let keystore = KeyStore::open(dir.path());

    let mut prompted = false;
    repo.verify_metadata(&hash, &sig, &keystore, |_| {
            prompted = true;
            true
    })
    .unwrap();
    assert!(prompted);
    assert!(keystore.get(&pk.fingerprint).unwrap().is_some());

    // Second call: key already known, no prompt needed.
    let mut prompted_again = false;
    repo.verify_metadata(&hash, &sig, &keystore, |_| {
            prompted_again = true;
            true
    })
    .unwrap();
    assert!(!prompted_again);
}

#[test]
fn verify_metadata_rejects_when_import_declined() {
    let (_sk, pk) = crate::crypto::minisign::generate_keypair().unwrap();
    let raw = {
        let mut v = Vec::new();
        v.extend_from_slice(b"Ed");
        v.extend_from_slice(&pk.keynum);
        v.extend_from_slice(&pk.verifying_key().unwrap().to_bytes());
        v
    };
    let meta = IndexMeta {
        public_key: Some(crate::crypto::base64_encode(&raw)),
        signature_by: None,
        public_key_size: None,
    };
    let index = BTreeMap::new();
    let tar = build_repodata_tar(&index, None, Some(&meta));
    let repo = Repository::open(&tar[..], "u", "x86_64", true).unwrap();

    let (sk2, _pk2) = crate::crypto::minisign::generate_keypair().unwrap();
    let hash = crate::primitives::hash::blake2b512_of_bytes(b"contents");
    let sig = Minisig::sign(&sk2, &hash, "trusted");

    let dir = tempfile::tempdir().unwrap();
    let keystore = KeyStore::open(dir.path());

    let err = repo.verify_metadata(&hash, &sig, &keystore, |_| false).unwrap_err();
    assert!(matches!(err, Error::KeyImportRejected(_)));
}
