//! The trusted-key store, modeled on `lib/repo_keys.c`: one
//! `keys/<fingerprint>.plist` file per accepted repository signer, shaped
//! like `index-meta.plist`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Error;
use crate::crypto::minisign::PublicKey;
use crate::primitives::atomic_file::AtomicFile;

/// The on-disk shape of `keys/<fingerprint>.plist`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepoKey {
    #[serde(rename = "public-key")]
    pub public_key: String, // base64 of sig_alg[2] || keynum[8] || pk[32]
    #[serde(rename = "signature-by")]
    pub signature_by: String,
}

impl RepoKey {
    pub fn decode_public_key(&self) -> Result<PublicKey, Error> {
        let raw = crate::crypto::base64_decode(&self.public_key)?;
        Ok(PublicKey::from_raw(&raw)?)
    }
}

/// A directory of accepted repository signer keys, fingerprint-addressed.
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        KeyStore { dir: dir.into() }
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.plist"))
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<RepoKey>, Error> {
        let path = self.path_for(fingerprint);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let key: RepoKey = serde_json::from_slice(&bytes).map_err(|e| Error::Malformed("key", e))?;
        Ok(Some(key))
    }

    pub fn save(&self, fingerprint: &str, key: &RepoKey) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(fingerprint);
        let json = serde_json::to_vec_pretty(key).expect("RepoKey serialization is infallible");
        let mut file = AtomicFile::create(&path)?;
        file.write_all(&json)?;
        file.commit()?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
