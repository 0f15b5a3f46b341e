//! Ed25519 signing/verification, optional legacy RSA verification, and the
//! minisign-compatible file formats used for package archives and
//! repository metadata.

pub mod minisign;
#[cfg(feature = "rsa-verify")]
pub mod rsa_verify;

use thiserror::Error;

use crate::error::{ErrorKind, Reason};

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported signature algorithm: {0:?}")]
    UnsupportedAlgorithm([u8; 2]),

    #[error("malformed {0} file")]
    MalformedFile(&'static str),

    #[error("base64 decode error")]
    Base64(#[from] base64::DecodeError),

    #[error("signature keynum does not match public key keynum")]
    KeynumMismatch,

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("global signature verification failed")]
    GlobalVerificationFailed,

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("encrypted secret keys require the scrypt-seckey feature")]
    EncryptedKeyUnsupported,
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::UnsupportedAlgorithm(_) | Error::EncryptedKeyUnsupported => {
                Reason::Configuration
            }
            Error::MalformedFile(_) | Error::Base64(_) => Reason::Configuration,
            Error::KeynumMismatch => Reason::Configuration,
            Error::VerificationFailed | Error::GlobalVerificationFailed => Reason::Integrity,
            Error::Io(_) => Reason::Resource,
        }
    }
}

/// An 8-byte minisign key number, used to match a signature to its public
/// key without a PKI.
pub type Keynum = [u8; 8];

pub(crate) fn base64_decode(s: &str) -> Result<Vec<u8>, Error> {
    Ok(base64::decode(s.trim())?)
}

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    base64::encode(bytes)
}
