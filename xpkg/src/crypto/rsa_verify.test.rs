use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;

use super::*;
use crate::internal::test_utils::assert;

fn test_keypair() -> (RsaPrivateKey, String) {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let public_pem = private_key
    .to_public_key()
    .to_public_key_pem(Default::default())
    .unwrap();
    (private_key, public_pem)
}

#[test]
fn verify_accepts_valid_signature() {
    let (private_key, public_pem) = test_keypair();
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let mut rng = rand::thread_rng();

    let message = b"repodata index";
    let sig = signing_key.sign_with_rng(&mut rng, message);

    assert!(verify(&public_pem, message, &sig.to_vec()).is_ok());
}

#[test]
fn verify_rejects_tampered_message() {
    let (private_key, public_pem) = test_keypair();
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let mut rng = rand::thread_rng();

    let sig = signing_key.sign_with_rng(&mut rng, b"original");

    assert!(verify(&public_pem, b"tampered", &sig.to_vec()).is_err());
}

#[test]
fn ssh_fingerprint_is_stable() {
    let (private_key, _) = test_keypair();
    let public_key = private_key.to_public_key();

    let a = ssh_fingerprint(&public_key);
    let b = ssh_fingerprint(&public_key);
    assert!(a == b);
    assert!(a.contains(':'));
}
