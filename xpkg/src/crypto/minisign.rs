//! The minisign-compatible public-key, secret-key and detached-signature
//! file formats, and the Ed25519 sign/verify operations layered
//! on top of them.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

use super::{base64_decode, base64_encode, Error, Keynum};
use crate::internal::macros::bail;

const PK_SIG_ALG: &[u8; 2] = b"Ed";
const SIG_SIG_ALG: &[u8; 2] = b"ED";
const KDF_NONE: &[u8; 2] = b"\0\0";
const KDF_SCRYPT: &[u8; 2] = b"Sc";

////////////////////////////////////////////////////////////////////////////////

/// A minisign public key: `sig_alg[2] || keynum[8] || pk[32]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub keynum: Keynum,
    pk: [u8; 32],
}

impl PublicKey {
    pub fn new(keynum: Keynum, pk: [u8; 32]) -> Self {
        PublicKey { keynum, pk }
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, Error> {
        VerifyingKey::from_bytes(&self.pk).map_err(|_| Error::MalformedFile("public key"))
    }

    /// Parses a two-line public key file: an `untrusted comment:` line
    /// followed by a base64 blob.
    pub fn decode(contents: &str) -> Result<Self, Error> {
        let (_comment, b64) = split_comment_line(contents, "untrusted comment: ")?;
        Self::from_raw(&base64_decode(b64)?)
    }

    /// Parses the raw `sig_alg[2] || keynum[8] || pk[32]` blob, without the
    /// surrounding comment/base64 file framing (used for public keys
    /// embedded elsewhere, e.g. a repository's `index-meta.plist`).
    pub fn from_raw(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() != 42 {
            bail!(Error::MalformedFile("public key"));
        }
        if &raw[0..2] != PK_SIG_ALG {
            bail!(Error::UnsupportedAlgorithm([raw[0], raw[1]]));
        }
        let keynum: Keynum = raw[2..10].try_into().unwrap();
        let pk: [u8; 32] = raw[10..42].try_into().unwrap();

        Ok(PublicKey { keynum, pk })
    }

    /// Encodes back to the two-line file format.
    pub fn encode(&self, comment: &str) -> String {
        let mut raw = Vec::with_capacity(42);
        raw.extend_from_slice(PK_SIG_ALG);
        raw.extend_from_slice(&self.keynum);
        raw.extend_from_slice(&self.pk);

        format!("untrusted comment: {comment}\n{}\n", base64_encode(&raw))
    }

    /// The hex-encoded keynum, used as the fingerprint for Ed25519 signers.
    pub fn fingerprint(&self) -> String {
        self.keynum.iter().map(|b| format!("{b:02x}")).collect()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// A minisign secret key. Only the unencrypted (`kdf_alg = "\0\0"`) form is
/// supported unless the `scrypt-seckey` feature is enabled.
pub struct SecretKey {
    pub keynum: Keynum,
    sk: [u8; 32],
    pk: [u8; 32],
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.sk.zeroize();
    }
}

impl SecretKey {
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.sk)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.keynum, self.pk)
    }

    /// Decodes an unencrypted secret key file. Encrypted (`kdf_alg = "Sc"`)
    /// files require the `scrypt-seckey` feature; without it this returns
    /// [`Error::EncryptedKeyUnsupported`].
    pub fn decode(contents: &str, passphrase: Option<&str>) -> Result<Self, Error> {
        let (_comment, b64) = split_comment_line(contents, "untrusted comment: ")?;
        let raw = base64_decode(b64)?;
        if raw.len() != 158 {
            bail!(Error::MalformedFile("secret key"));
        }
        if &raw[0..2] != PK_SIG_ALG {
            bail!(Error::UnsupportedAlgorithm([raw[0], raw[1]]));
        }
        let kdf_alg: [u8; 2] = raw[2..4].try_into().unwrap();
        let kdf_salt: [u8; 32] = raw[6..38].try_into().unwrap();
        let kdf_opslimit = u64::from_le_bytes(raw[38..46].try_into().unwrap());
        let kdf_memlimit = u64::from_le_bytes(raw[46..54].try_into().unwrap());
        let keynum: Keynum = raw[54..62].try_into().unwrap();
        let mut sk: [u8; 32] = raw[62..94].try_into().unwrap();
        let pk: [u8; 32] = raw[94..126].try_into().unwrap();
        let chk: [u8; 32] = raw[126..158].try_into().unwrap();

        if &kdf_alg == KDF_SCRYPT {
            sk = decrypt_scrypt_xor(sk, passphrase, kdf_salt, kdf_opslimit, kdf_memlimit)?;
        } else if &kdf_alg != KDF_NONE {
            bail!(Error::UnsupportedAlgorithm(kdf_alg));
        }

        let mut chk_input = Vec::with_capacity(2 + 8 + 32);
        chk_input.extend_from_slice(PK_SIG_ALG);
        chk_input.extend_from_slice(&keynum);
        chk_input.extend_from_slice(&sk);
        let expect_chk = crate::primitives::hash::blake2b512_of_bytes(&chk_input);
        if !crate::primitives::hashes_equal(&expect_chk[..32], &chk) {
            bail!(Error::MalformedFile("secret key (checksum)"));
        }

        Ok(SecretKey { keynum, sk, pk })
    }
}

#[cfg(feature = "scrypt-seckey")]
fn decrypt_scrypt_xor(
    sk: [u8; 32],
    passphrase: Option<&str>,
    salt: [u8; 32],
    opslimit: u64,
    memlimit: u64,
) -> Result<[u8; 32], Error> {
    use scrypt::{scrypt, Params};

    let passphrase = passphrase.ok_or(Error::MalformedFile("secret key (missing passphrase)"))?;
    // minisign derives (log2_n, r, p) from opslimit/memlimit; for the common
    // case (opslimit=33554432, memlimit=1073741824) this is n=2^20, r=8, p=1.
    let (log_n, r, p) = scrypt_params_for(opslimit, memlimit);
    let params = Params::new(log_n, r, p, 32).map_err(|_| Error::MalformedFile("scrypt params"))?;

    let mut stream = [0u8; 32];
    scrypt(passphrase.as_bytes(), &salt, &params, &mut stream)
    .map_err(|_| Error::MalformedFile("scrypt derivation"))?;

    let mut out = sk;
    for (b, s) in out.iter_mut().zip(stream.iter()) {
        *b ^= s;
    }
    Ok(out)
}

#[cfg(feature = "scrypt-seckey")]
fn scrypt_params_for(opslimit: u64, _memlimit: u64) -> (u8, u32, u32) {
    let log_n = if opslimit <= 1 << 25 { 18 } else { 20 };
    (log_n, 8, 1)
}

#[cfg(not(feature = "scrypt-seckey"))]
fn decrypt_scrypt_xor(
    _sk: [u8; 32],
    _passphrase: Option<&str>,
    _salt: [u8; 32],
    _opslimit: u64,
    _memlimit: u64,
) -> Result<[u8; 32], Error> {
    Err(Error::EncryptedKeyUnsupported)
}

////////////////////////////////////////////////////////////////////////////////

/// A detached minisig signature: the four logical lines of the file format
/// (untrusted comment, `sig`, trusted comment, global signature).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minisig {
    pub keynum: Keynum,
    sig: [u8; 64],
    pub trusted_comment: String,
    global_sig: [u8; 64],
}

impl Minisig {
    /// Signs the 64-byte BLAKE2b-512 hash of a message:
    /// `sig = Ed25519_sign(sk, pk, hash)`, then
    /// `global_sig = Ed25519_sign(sk, pk, sig || trusted_comment)`.
    pub fn sign(sk: &SecretKey, hash: &[u8; 64], trusted_comment: impl Into<String>) -> Self {
        let signing_key = sk.signing_key();
        let sig: [u8; 64] = signing_key.sign(hash).to_bytes();

        let trusted_comment = trusted_comment.into();
        let mut global_msg = Vec::with_capacity(64 + trusted_comment.len());
        global_msg.extend_from_slice(&sig);
        global_msg.extend_from_slice(trusted_comment.as_bytes());
        let global_sig: [u8; 64] = signing_key.sign(&global_msg).to_bytes();

        Minisig {
            keynum: sk.keynum,
            sig,
            trusted_comment,
            global_sig,
        }
    }

    /// Verifies this signature against `pubkey` and the precomputed message
    /// `hash` three-step verification.
    pub fn verify(&self, pubkey: &PublicKey, hash: &[u8; 64]) -> Result<(), Error> {
        if self.keynum != pubkey.keynum {
            bail!(Error::KeynumMismatch);
        }
        let verifying_key = pubkey.verifying_key()?;

        let sig = ed25519_dalek::Signature::from_bytes(&self.sig);
        verifying_key
        .verify(hash, &sig)
        .map_err(|_| Error::VerificationFailed)?;

        let mut global_msg = Vec::with_capacity(64 + self.trusted_comment.len());
        global_msg.extend_from_slice(&self.sig);
        global_msg.extend_from_slice(self.trusted_comment.as_bytes());
        let global_sig = ed25519_dalek::Signature::from_bytes(&self.global_sig);
        verifying_key
        .verify(&global_msg, &global_sig)
        .map_err(|_| Error::GlobalVerificationFailed)?;

        Ok(())
    }

    pub fn decode(contents: &str) -> Result<Self, Error> {
        let mut lines = contents.lines();
        let _untrusted = lines.next().ok_or(Error::MalformedFile("minisig"))?;
        let sig_line = lines.next().ok_or(Error::MalformedFile("minisig"))?;
        let trusted_line = lines.next().ok_or(Error::MalformedFile("minisig"))?;
        let global_line = lines.next().ok_or(Error::MalformedFile("minisig"))?;

        let raw = base64_decode(sig_line)?;
        if raw.len() != 74 {
            bail!(Error::MalformedFile("minisig (sig)"));
        }
        if &raw[0..2] != SIG_SIG_ALG {
            bail!(Error::UnsupportedAlgorithm([raw[0], raw[1]]));
        }
        let keynum: Keynum = raw[2..10].try_into().unwrap();
        let sig: [u8; 64] = raw[10..74].try_into().unwrap();

        let trusted_comment = trusted_line
        .strip_prefix("trusted comment: ")
        .ok_or(Error::MalformedFile("minisig (trusted comment)"))?
        .to_owned();

        let global_raw = base64_decode(global_line)?;
        if global_raw.len() != 64 {
            bail!(Error::MalformedFile("minisig (global sig)"));
        }
        let global_sig: [u8; 64] = global_raw.try_into().unwrap();

        Ok(Minisig {
                keynum,
                sig,
                trusted_comment,
                global_sig,
        })
    }

    pub fn encode(&self, untrusted_comment: &str) -> String {
        let mut sig_raw = Vec::with_capacity(74);
        sig_raw.extend_from_slice(SIG_SIG_ALG);
        sig_raw.extend_from_slice(&self.keynum);
        sig_raw.extend_from_slice(&self.sig);

        format!(
            "untrusted comment: {untrusted_comment}\n{}\ntrusted comment: {}\n{}\n",
            base64_encode(&sig_raw),
            self.trusted_comment,
            base64_encode(&self.global_sig),
        )
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Draws system randomness in chunks of at most 256 bytes, retrying on
/// `EINTR`/`EAGAIN`.
fn fill_random(buf: &mut [u8]) -> Result<(), Error> {
    for chunk in buf.chunks_mut(256) {
        loop {
            match getrandom::getrandom(chunk) {
                Ok(()) => break,
                Err(e) => {
                    let retryable = e
                    .raw_os_error()
                    .map(|code| code == libc::EINTR || code == libc::EAGAIN)
                    .unwrap_or(false);
                    if !retryable {
                        return Err(Error::Io(std::io::Error::new(
                                    std::io::ErrorKind::Other,
                                    e,
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Generates a fresh Ed25519 key pair with a random keynum.
pub fn generate_keypair() -> Result<(SecretKey, PublicKey), Error> {
    let mut seed = [0u8; 32];
    fill_random(&mut seed)?;
    let mut keynum = [0u8; 8];
    fill_random(&mut keynum)?;

    let signing_key = SigningKey::from_bytes(&seed);
    let pk = signing_key.verifying_key().to_bytes();

    let sk = SecretKey {
        keynum,
        sk: seed,
        pk,
    };
    let pubkey = PublicKey::new(keynum, pk);
    Ok((sk, pubkey))
}

////////////////////////////////////////////////////////////////////////////////

fn split_comment_line<'a>(contents: &'a str, prefix: &str) -> Result<(&'a str, &'a str), Error> {
    let mut lines = contents.lines();
    let comment_line = lines.next().ok_or(Error::MalformedFile("missing comment line"))?;
    if !comment_line.starts_with(prefix) {
        bail!(Error::MalformedFile("missing 'untrusted comment:' line"));
    }
    let b64 = lines.next().ok_or(Error::MalformedFile("missing base64 line"))?;
    Ok((&comment_line[prefix.len()..], b64))
}

#[cfg(test)]
#[path = "minisign.test.rs"]
mod test;
