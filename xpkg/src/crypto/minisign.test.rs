use super::*;
use crate::internal::test_utils::assert;
use crate::primitives::hash::blake2b512_of_bytes;

#[test]
fn pubkey_encode_decode_roundtrip() {
    let (_sk, pk) = generate_keypair().unwrap();
    let encoded = pk.encode("test key");
    let decoded = PublicKey::decode(&encoded).unwrap();

    assert!(decoded == pk);
}

#[test]
fn pubkey_decode_rejects_wrong_algorithm() {
    let mut raw = vec![b'X', b'X'];
    raw.extend_from_slice(&[0u8; 8]);
    raw.extend_from_slice(&[0u8; 32]);
    let contents = format!("untrusted comment: x\n{}\n", super::super::base64_encode(&raw));

    assert!(matches!(
            PublicKey::decode(&contents),
            Err(Error::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn minisig_sign_and_verify_roundtrip() {
    let (sk, pk) = generate_keypair().unwrap();
    let hash = blake2b512_of_bytes(b"package contents");

    let sig = Minisig::sign(&sk, &hash, "timestamp:1700000000");
    assert!(sig.verify(&pk, &hash).is_ok());
}

#[test]
fn minisig_verify_fails_on_wrong_hash() {
    let (sk, pk) = generate_keypair().unwrap();
    let hash = blake2b512_of_bytes(b"package contents");
    let other_hash = blake2b512_of_bytes(b"tampered contents");

    let sig = Minisig::sign(&sk, &hash, "timestamp:1700000000");
    assert!(sig.verify(&pk, &other_hash).is_err());
}

#[test]
fn minisig_verify_fails_on_keynum_mismatch() {
    let (sk, _pk) = generate_keypair().unwrap();
    let (_sk2, pk2) = generate_keypair().unwrap();
    let hash = blake2b512_of_bytes(b"package contents");

    let sig = Minisig::sign(&sk, &hash, "c");
    assert!(matches!(sig.verify(&pk2, &hash), Err(Error::KeynumMismatch)));
}

#[test]
fn minisig_encode_decode_roundtrip() {
    let (sk, _pk) = generate_keypair().unwrap();
    let hash = blake2b512_of_bytes(b"data");
    let sig = Minisig::sign(&sk, &hash, "trusted note");

    let encoded = sig.encode("xpkg verify");
    let decoded = Minisig::decode(&encoded).unwrap();

    assert!(decoded == sig);
}
