//! Legacy RSA-PKCS#1-v1.5/SHA-256 repository and archive signatures. Optional: enabled by the `rsa-verify` feature, for repositories
//! still signed the old way before the project moved to Ed25519/minisign.

use md5::Md5;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{ErrorKind, Reason};

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed RSA public key")]
    MalformedKey,

    #[error("malformed RSA signature")]
    MalformedSignature,

    #[error("RSA signature verification failed")]
    VerificationFailed,
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::MalformedKey | Error::MalformedSignature => Reason::Configuration,
            Error::VerificationFailed => Reason::Integrity,
        }
    }
}

/// Verifies a PKCS#1-v1.5/SHA-256 signature over `message` using a
/// PEM-encoded RSA public key.
pub fn verify(public_key_pem: &str, message: &[u8], signature: &[u8]) -> Result<(), Error> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem).map_err(|_| Error::MalformedKey)?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let sig = Signature::try_from(signature).map_err(|_| Error::MalformedSignature)?;

    verifying_key
    .verify(message, &sig)
    .map_err(|_| Error::VerificationFailed)
}

/// The OpenSSH-style fingerprint presented to the user during key import:
/// the MD5 of the SSH wire-format encoding of the RSA public key.
pub fn ssh_fingerprint(public_key: &RsaPublicKey) -> String {
    use rsa::traits::PublicKeyParts;

    let mut wire = Vec::new();
    write_ssh_string(&mut wire, b"ssh-rsa");
    write_ssh_mpint(&mut wire, &public_key.e.to_bytes_be());
    write_ssh_mpint(&mut wire, &public_key.n.to_bytes_be());

    let digest = Md5::digest(&wire);
    digest
    .iter()
    .map(|b| format!("{b:02x}"))
    .collect::<Vec<_>>()
    .join(":")
}

fn write_ssh_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_ssh_mpint(out: &mut Vec<u8>, bytes: &[u8]) {
    // mpint encoding prepends a zero byte if the high bit of the first byte
    // is set, so it's never misread as negative.
    if !bytes.is_empty() && bytes[0] & 0x80 != 0 {
        let mut padded = Vec::with_capacity(bytes.len() + 1);
        padded.push(0);
        padded.extend_from_slice(bytes);
        write_ssh_string(out, &padded);
    } else {
        write_ssh_string(out, bytes);
    }
}

#[cfg(test)]
#[path = "rsa_verify.test.rs"]
mod test;
