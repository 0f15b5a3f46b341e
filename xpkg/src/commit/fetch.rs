//! A URL fetch with conditional-GET/caching semantics: an external
//! collaborator that turns a URL into a byte stream with conditional-GET
//! caching. `commit` and repository opening both call into a [`Fetcher`]
//! a caller supplies rather than speaking HTTP themselves.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::crypto::minisign::Minisig;
use crate::error::{ErrorKind, Reason};
use crate::event::EventSink;
use crate::primitives::hash::blake2b512_of_bytes;
use crate::repository::{KeyStore, Repository};

#[derive(Debug, Error)]
pub enum Error {
    #[error("fetch of '{0}' failed")]
    Fetch(String, #[source] io::Error),
    #[error(transparent)]
    Repository(#[from] crate::repository::Error),
    #[error(transparent)]
    Crypto(#[from] crate::crypto::Error),
    #[error("'{0}' reported not-modified with no cached copy to fall back to")]
    UnexpectedNotModified(String),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Fetch(..) => Reason::Resource,
            Error::Repository(e) => e.kind(),
            Error::Crypto(e) => e.kind(),
            Error::UnexpectedNotModified(_) => Reason::Configuration,
        }
    }
}

/// What a [`Fetcher`] returns for one request.
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// The resource's current bytes.
    Fresh(Vec<u8>),
    /// The server (or local cache layer) reports the cached copy identified
    /// by the request's `cached_sha256` is still current.
    NotModified,
}

/// The fetch collaborator. A caller's implementation owns HTTP, retries,
/// and any on-disk cache mirror; this crate only ever asks for bytes.
pub trait Fetcher {
    /// Fetches `url`. `cached_sha256`, when given, lets the implementation
    /// perform a conditional GET against its own cache and answer
    /// [`FetchResult::NotModified`] instead of re-transferring identical
    /// bytes.
    fn fetch(&mut self, url: &str, cached_sha256: Option<&str>) -> io::Result<FetchResult>;
}

/// A [`Fetcher`] that only ever serves `file://`-style local paths already
/// present on disk, for local-repository and test use; asking it for a
/// remote URL fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn fetch(&mut self, url: &str, _cached_sha256: Option<&str>) -> io::Result<FetchResult> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        std::fs::read(path).map(FetchResult::Fresh)
    }
}

/// Whether `url` names a remote repository
/// rather than a local directory.
pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Opens a repository at `url`/`architecture`: fetches
/// `<arch>-repodata` via `fetcher`, and for remote repositories with an
/// embedded public key, verifies its metadata signature against
/// `keystore`, prompting `sink` on a first-seen key.
pub fn open_repository(
    fetcher: &mut dyn Fetcher,
    keystore: &KeyStore,
    sink: &mut dyn EventSink,
    url: &str,
    architecture: &str,
    use_stage: bool,
    verify_meta: bool,
) -> Result<Repository, Error> {
    let repodata_url = format!("{}/{architecture}-repodata", url.trim_end_matches('/'));
    let bytes = match fetcher.fetch(&repodata_url, None).map_err(|e| Error::Fetch(repodata_url.clone(), e))? {
        FetchResult::Fresh(b) => b,
        FetchResult::NotModified => return Err(Error::UnexpectedNotModified(repodata_url)),
    };

    let repo = Repository::open(io::Cursor::new(bytes.clone()), url, architecture, use_stage)?;

    if verify_meta && is_remote(url) && repo.meta.public_key.is_some() {
        let sig_url = format!("{repodata_url}.sig");
        let sig_bytes = match fetcher
        .fetch(&sig_url, None)
        .map_err(|e| Error::Fetch(sig_url.clone(), e))?
        {
            FetchResult::Fresh(b) => b,
            FetchResult::NotModified => return Err(Error::UnexpectedNotModified(sig_url)),
        };
        let sig_text = String::from_utf8_lossy(&sig_bytes);
        let minisig = Minisig::decode(&sig_text)?;

        // The signed hash is the BLAKE2b-512 of the signed member, here the
        // whole fetched repodata archive (the index-meta member alone has no
        // stable standalone encoding once re-tarred).
        let hash = blake2b512_of_bytes(&bytes);
        let signature_by = repo.meta.signature_by.clone().unwrap_or_default();
        repo.verify_metadata(&hash, &minisig, keystore, |pk| {
                sink.repo_key_import(&pk.fingerprint, &signature_by)
        })?;
    }

    Ok(repo)
}

/// Computes the cache path for a fetched/verified package archive.
pub fn cached_archive_path(cachedir: &Path, pkgver: &str, architecture: &str) -> std::path::PathBuf {
    cachedir.join(format!("{pkgver}.{architecture}.xbps"))
}

pub fn cached_signature_path(cachedir: &Path, pkgver: &str, architecture: &str) -> std::path::PathBuf {
    cachedir.join(format!("{pkgver}.{architecture}.xbps.sig"))
}

#[cfg(test)]
#[path = "fetch.test.rs"]
mod test;
