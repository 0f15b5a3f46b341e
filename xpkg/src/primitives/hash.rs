//! File hashing: SHA-256 for archive integrity, BLAKE2b-512 for
//! minisign-compatible signature payloads.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blake2::Blake2b512;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const BUF_SIZE: usize = 64 * 1024;

/// A lowercase hex-encoded SHA-256 digest, as stored in `pkgd.files[].sha256`
/// and `filename-sha256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Sha256Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex_encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        hex_decode(s).map(Sha256Digest)
    }

    /// Hashes the content of `path`.
    pub fn of_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; BUF_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let digest: [u8; 32] = hasher.finalize().into();
        Ok(Sha256Digest(digest))
    }

    pub fn of_bytes(data: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(data).into();
        Sha256Digest(digest)
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Computes the BLAKE2b-512 digest of a file, as used for minisign message
/// hashes.
pub fn blake2b512_of_file(path: impl AsRef<Path>) -> io::Result<[u8; 64]> {
    let mut file = File::open(path)?;
    let mut hasher = Blake2b512::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

pub fn blake2b512_of_bytes(data: &[u8]) -> [u8; 64] {
    Blake2b512::digest(data).into()
}

/// Constant-time comparison of two fixed-size digests.
pub fn hashes_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

fn hex_decode(s: &str) -> Option<[u8; 32]> {
    use crate::internal::std_ext::ChunksExactIterator;

    if s.len() != 64 || !s.is_ascii() {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, pair) in s.as_bytes().iter().copied().chunks_exact::<2>().enumerate() {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out[i] = ((hi << 4) | lo) as u8;
    }
    Some(out)
}

#[cfg(test)]
#[path = "hash.test.rs"]
mod test;
