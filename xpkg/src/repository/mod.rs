//! The repository layer: opening a fetched `<arch>-repodata`
//! archive, reading its three internal members, verifying its metadata
//! signature against a trusted key store, lookups, and an ordered
//! repository pool with "best matching" mode.

mod keystore;

pub use keystore::{KeyStore, RepoKey};

use std::collections::BTreeMap;
use std::io::Read;

use thiserror::Error;

use crate::crypto::minisign::{Minisig, PublicKey};
use crate::error::{ErrorKind, Reason};
use crate::matcher;
use crate::pkgdb::PackageRecord;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error reading repository archive")]
    Io(#[from] std::io::Error),
    #[error("malformed '{0}' member")]
    Malformed(&'static str, #[source] serde_json::Error),
    #[error(transparent)]
    Pattern(#[from] matcher::Error),
    #[error(transparent)]
    Crypto(#[from] crate::crypto::Error),
    #[error("repository has no embedded public key to verify against")]
    MissingKey,
    #[error("key import for '{0}' was not accepted")]
    KeyImportRejected(String),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Io(_) => Reason::Resource,
            Error::Malformed(..) => Reason::Configuration,
            Error::Pattern(e) => e.kind(),
            Error::Crypto(e) => e.kind(),
            Error::MissingKey => Reason::Configuration,
            // Unusable until the user accepts the key import; Conflict is the closest abstract bucket (EAGAIN
            // also maps there, see Reason's doc comment).
            Error::KeyImportRejected(_) => Reason::Conflict,
        }
    }
}

/// `index-meta.plist`: an optional embedded public key plus its claimed
/// signer.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct IndexMeta {
    #[serde(rename = "public-key", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(rename = "signature-by", skip_serializing_if = "Option::is_none")]
    pub signature_by: Option<String>,
    #[serde(rename = "public-key-size", skip_serializing_if = "Option::is_none")]
    pub public_key_size: Option<u32>,
}

impl IndexMeta {
    pub fn decode_public_key(&self) -> Result<Option<PublicKey>, Error> {
        let Some(b64) = &self.public_key else {
            return Ok(None);
        };
        let raw = crate::crypto::base64_decode(b64)?;
        Ok(Some(PublicKey::from_raw(&raw)?))
    }
}

const INDEX_MEMBER: &str = "./index.plist";
const INDEX_META_MEMBER: &str = "./index-meta.plist";
const STAGE_MEMBER: &str = "./stage.plist";

/// An opened `<arch>-repodata` archive: the three internal members parsed
/// and, on request, merged into a single effective index.
pub struct Repository {
    pub url: String,
    pub architecture: String,
    index: BTreeMap<String, PackageRecord>,
    stage: BTreeMap<String, PackageRecord>,
    meta: IndexMeta,
    idx: BTreeMap<String, PackageRecord>,
}

impl Repository {
    /// Reads the `<arch>-repodata` tar archive and builds
    /// the merged lookup index with `use_stage` applied.
    pub fn open<R: Read>(
        reader: R,
        url: impl Into<String>,
        architecture: impl Into<String>,
        use_stage: bool,
    ) -> Result<Self, Error> {
        let url = url.into();
        let architecture = architecture.into();

        let mut index = BTreeMap::new();
        let mut stage = BTreeMap::new();
        let mut meta = IndexMeta::default();

        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.to_string_lossy().into_owned();
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            if buf.is_empty() {
                continue;
            }
            match path.as_str() {
                INDEX_MEMBER => {
                    index = serde_json::from_slice(&buf).map_err(|e| Error::Malformed("index.plist", e))?;
                }
                INDEX_META_MEMBER => {
                    meta = serde_json::from_slice(&buf).map_err(|e| Error::Malformed("index-meta.plist", e))?;
                }
                STAGE_MEMBER => {
                    stage = serde_json::from_slice(&buf).map_err(|e| Error::Malformed("stage.plist", e))?;
                }
                _ => {}
            }
        }

        let idx = build_idx(&index, &stage, use_stage);
        Ok(Repository {
                url,
                architecture,
                index,
                stage,
                meta,
                idx,
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn idx(&self) -> &BTreeMap<String, PackageRecord> {
        &self.idx
    }

    /// Verifies `minisig` (covering `hash`, the BLAKE2b-512 of the
    /// fetched `index-meta.plist`) against the repository's embedded
    /// public key, first consulting/updating `keystore` for first-seen
    /// keys. `on_key_import` is the "user prompt"
    /// callback: returning `false` leaves the repository unusable.
    pub fn verify_metadata(
        &self,
        hash: &[u8; 64],
        minisig: &Minisig,
        keystore: &KeyStore,
        mut on_key_import: impl FnMut(&PublicKey) -> bool,
    ) -> Result<(), Error> {
        let pubkey = self.meta.decode_public_key()?.ok_or(Error::MissingKey)?;
        let fingerprint = pubkey.fingerprint;

        if keystore.get(&fingerprint)?.is_none() {
            if !on_key_import(&pubkey) {
                return Err(Error::KeyImportRejected(fingerprint));
            }
            let raw = {
                let mut v = Vec::with_capacity(42);
                v.extend_from_slice(b"Ed");
                v.extend_from_slice(&pubkey.keynum);
                v.extend_from_slice(&pubkey.verifying_key()?.to_bytes());
                v
            };
            keystore.save(
                &fingerprint,
                &RepoKey {
                    public_key: crate::crypto::base64_encode(&raw),
                    signature_by: self.meta.signature_by.clone().unwrap_or_default(),
                },
            )?;
        }

        minisig.verify(&pubkey, hash)?;
        Ok(())
    }

    /// Resolves a pkgver / pkgpattern / pkgname against this repository's
    /// merged index, augmenting the match with `repository`/`pkgname`
    /// metadata from this repository.
    pub fn get_pkg(&self, pkg: &str) -> Result<Option<PackageRecord>, Error> {
        get_pkg_impl(&self.idx, pkg).map(|found| {
                found.map(|pkg| {
                        let mut pkg = pkg.clone();
                        pkg.repository = Some(self.url.clone());
                        pkg
                })
        })
    }

    /// Scans entries whose `provides` matches `vpkg`.
    pub fn get_virtualpkg(&self, vpkg: &str) -> Result<Option<PackageRecord>, Error> {
        for pkg in self.idx.values() {
            if matcher::virtualpkg_match(pkg.provides.iter().map(String::as_str), vpkg)? {
                let mut pkg = pkg.clone();
                pkg.repository = Some(self.url.clone());
                return Ok(Some(pkg));
            }
        }
        Ok(None)
    }

    /// Linear scan matching `pkg`'s pkgver, any `provides`, or pkgname
    /// against each other entry's `run_depends`, filtered to `host_arch`
    /// or `noarch`.
    pub fn get_revdeps(&self, pkg: &PackageRecord, host_arch: &str) -> Vec<String> {
        let mut out = Vec::new();
        for candidate in self.idx.values() {
            if candidate.architecture != host_arch && candidate.architecture != "noarch" {
                continue;
            }
            let depends_on_pkg = candidate.run_depends.iter().any(|dep| {
                    matcher::pkgpattern_match(&pkg.pkgver, dep).unwrap_or(false)
                    || matcher::pkgpattern_match(&pkg.pkgname, dep).unwrap_or(false)
                    || pkg
                    .provides
                    .iter()
                    .any(|vpkg| matcher::pkgpattern_match(vpkg, dep).unwrap_or(false))
            });
            if depends_on_pkg {
                out.push(candidate.pkgver.clone());
            }
        }
        out
    }
}

fn build_idx(
    index: &BTreeMap<String, PackageRecord>,
    stage: &BTreeMap<String, PackageRecord>,
    use_stage: bool,
) -> BTreeMap<String, PackageRecord> {
    if !use_stage || stage.is_empty() {
        return index.clone();
    }
    let mut merged = index.clone();
    for (name, pkg) in stage {
        merged.insert(name.clone(), pkg.clone());
    }
    merged
}

fn get_pkg_impl<'a>(
    idx: &'a BTreeMap<String, PackageRecord>,
    pkg: &str,
) -> Result<Option<&'a PackageRecord>, Error> {
    if pkg.contains(['<', '>', '=', '*', '?', '[']) {
        let pattern: matcher::Pattern = pkg.parse()?;
        return Ok(idx
            .get(pattern.name())
            .filter(|candidate| matcher::pkgpattern_match(&candidate.pkgver, pkg).unwrap_or(false)));
    }
    if let Some((name, _)) = matcher::split_pkgver(pkg) {
        return Ok(idx.get(name).filter(|p| p.pkgver == pkg));
    }
    Ok(idx.get(pkg))
}

////////////////////////////////////////////////////////////////////////////////

/// Whether to prefer the highest version found across every configured
/// repository, or stop at the first hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    FirstHit,
    BestMatching,
}

/// The ordered list of configured repositories.
pub struct RepositoryPool {
    pub repos: Vec<Repository>,
    pub mode: MatchMode,
}

impl RepositoryPool {
    pub fn new(repos: Vec<Repository>, mode: MatchMode) -> Self {
        RepositoryPool { repos, mode }
    }

    /// `pool.get_pkg(pkg)`: in [`MatchMode::BestMatching`], consults every
    /// repository and keeps the highest-version hit; in
    /// [`MatchMode::FirstHit`], the first configured repository with a
    /// match wins.
    pub fn get_pkg(&self, pkg: &str) -> Result<Option<PackageRecord>, Error> {
        let mut best: Option<PackageRecord> = None;
        for repo in &self.repos {
            let Some(found) = repo.get_pkg(pkg)? else {
                continue;
            };
            match self.mode {
                MatchMode::FirstHit => return Ok(Some(found)),
                MatchMode::BestMatching => {
                    let is_better = match &best {
                        None => true,
                        Some(current) => {
                            matcher::compare_pkgver(&found.pkgver, &current.pkgver)
                            == std::cmp::Ordering::Greater
                        }
                    };
                    if is_better {
                        best = Some(found);
                    }
                }
            }
        }
        Ok(best)
    }

    pub fn get_virtualpkg(&self, vpkg: &str) -> Result<Option<PackageRecord>, Error> {
        for repo in &self.repos {
            if let Some(found) = repo.get_virtualpkg(vpkg)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
