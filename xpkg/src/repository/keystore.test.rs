use super::*;
use crate::internal::test_utils::assert;

fn sample_key() -> (PublicKey, RepoKey) {
    let (_sk, pk) = crate::crypto::minisign::generate_keypair().unwrap();
    let raw = {
        let mut v = Vec::new();
        v.extend_from_slice(b"Ed");
        v.extend_from_slice(&pk.keynum);
        v.extend_from_slice(&pk.verifying_key().unwrap().to_bytes());
        v
    };
    let repo_key = RepoKey {
        public_key: crate::crypto::base64_encode(&raw),
        signature_by: "test-signer".to_owned(),
    };
    (pk, repo_key)
}

#[test]
fn get_returns_none_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyStore::open(dir.path());
    assert!(store.get("deadbeef00000000").unwrap().is_none());
}

#[test]
fn save_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyStore::open(dir.path());
    let (pk, repo_key) = sample_key();
    let fp = pk.fingerprint;

    store.save(&fp, &repo_key).unwrap();
    let loaded = store.get(&fp).unwrap().unwrap();
    assert!(loaded.signature_by == "test-signer");
    assert!(loaded.decode_public_key().unwrap() == pk);
}
