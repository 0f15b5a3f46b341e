//! The package record and the small tagged types that
//! hang off it: lifecycle `State`, the `TransactionAction` tag, and file
//! manifest entries.

#[cfg(feature = "validate")]
use garde::Validate;
use mass_cfg_attr::mass_cfg_attr;
use serde::{Deserialize, Serialize};

#[cfg(feature = "validate")]
use crate::internal::validators::{validate_absolute_path, validate_pkgname, validate_pkgver, validate_sha256_hex, validate_soname};

////////////////////////////////////////////////////////////////////////////////

/// The lifecycle state of an installed (or half-installed) package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    Unpacked,
    Installed,
    Broken,
    HalfRemoved,
    NotInstalled,
}

/// The action a package is staged for within a single transaction. An enumerated tag, not a string sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionAction {
    Install,
    Reinstall,
    Update,
    Configure,
    Remove,
    Hold,
    Download,
}

impl TransactionAction {
    /// Whether this action runs the unpack engine.
    pub fn unpacks(self) -> bool {
        matches!(
            self,
            TransactionAction::Install | TransactionAction::Reinstall | TransactionAction::Update
        )
    }

    pub fn removes(self) -> bool {
        matches!(self, TransactionAction::Remove | TransactionAction::Update)
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Conffile,
    Link,
    Dir,
}

/// One entry of `files`/`conf_files`/`links`/`dirs`: a tracked filesystem
/// path plus whatever metadata its kind carries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "validate", derive(Validate))]
#[mass_cfg_attr(feature = "validate", garde)]
#[garde(allow_unvalidated)]
pub struct FileEntry {
    #[garde(custom(validate_absolute_path))]
    pub file: String,
    #[garde(inner(custom(validate_sha256_hex)))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl FileEntry {
    pub fn file(path: impl Into<String>, sha256: impl Into<String>) -> Self {
        FileEntry {
            file: path.into(),
            sha256: Some(sha256.into()),
            target: None,
        }
    }

    pub fn conf_file(path: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self::file(path, sha256)
    }

    pub fn link(path: impl Into<String>, target: impl Into<String>) -> Self {
        FileEntry {
            file: path.into(),
            sha256: None,
            target: Some(target.into()),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        FileEntry {
            file: path.into(),
            sha256: None,
            target: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// A package record: the unit of data stored per-name in the pkgdb, and
/// also what repository indices carry per entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "validate", derive(Validate))]
#[mass_cfg_attr(feature = "validate", garde)]
#[garde(allow_unvalidated)]
pub struct PackageRecord {
    #[garde(custom(validate_pkgname))]
    pub pkgname: String,
    #[garde(custom(validate_pkgver))]
    pub pkgver: String,
    pub architecture: String,

    pub installed_size: u64,
    #[serde(rename = "filename-size", skip_serializing_if = "Option::is_none")]
    pub filename_size: Option<u64>,
    #[garde(inner(custom(validate_sha256_hex)))]
    #[serde(rename = "filename-sha256", skip_serializing_if = "Option::is_none")]
    pub filename_sha256: Option<String>,

    #[serde(default)]
    pub run_depends: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub replaces: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Pkgvers this package explicitly permits downgrading to despite the
    /// normal "candidate must be newer" update rule.
    #[serde(default)]
    pub reverts: Vec<String>,
    #[garde(inner(custom(validate_soname)))]
    #[serde(rename = "shlib-provides", default)]
    pub shlib_provides: Vec<String>,
    #[garde(inner(custom(validate_soname)))]
    #[serde(rename = "shlib-requires", default)]
    pub shlib_requires: Vec<String>,

    /// Group name -> ordered `linkpath:targetpath` specifications. The head of each group is resolved separately in the
    /// pkgdb-wide `_XBPS_ALTERNATIVES_` index, not here.
    #[serde(default)]
    pub alternatives: std::collections::BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub conf_files: Vec<FileEntry>,
    #[serde(default)]
    pub links: Vec<FileEntry>,
    #[serde(default)]
    pub dirs: Vec<FileEntry>,

    pub state: State,
    #[serde(rename = "automatic-install", default)]
    pub automatic_install: bool,
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub repolock: bool,

    #[serde(rename = "install-script", skip_serializing_if = "Option::is_none")]
    pub install_script: Option<String>,
    #[serde(rename = "remove-script", skip_serializing_if = "Option::is_none")]
    pub remove_script: Option<String>,
    #[serde(rename = "install-msg", skip_serializing_if = "Option::is_none")]
    pub install_msg: Option<String>,
    #[serde(rename = "remove-msg", skip_serializing_if = "Option::is_none")]
    pub remove_msg: Option<String>,

    #[serde(rename = "install-date", skip_serializing_if = "Option::is_none")]
    pub install_date: Option<String>,
    #[garde(inner(custom(validate_sha256_hex)))]
    #[serde(rename = "metafile-sha256", skip_serializing_if = "Option::is_none")]
    pub metafile_sha256: Option<String>,

    /// The repository a package was installed from. Set by repository
    /// lookups and persisted on installed records so `repolock` can
    /// restrict future updates to the same repository.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub repository: Option<String>,
}

impl PackageRecord {
    /// Splits `pkgver` into its bare `<name>` part.
    pub fn name(&self) -> &str {
        crate::matcher::split_pkgver(&self.pkgver)
        .map(|(name, _)| name)
        .unwrap_or(&self.pkgname)
    }

    /// Splits `pkgver` into `(version, revision)`. Falls back
    /// to treating the whole pkgver as the version when it doesn't parse
    /// as `<name>-<version>_<revision>` (e.g. a malformed record).
    pub fn version_revision(&self) -> (&str, u64) {
        let version_revision = crate::matcher::split_pkgver(&self.pkgver)
        .map(|(_, vr)| vr)
        .unwrap_or(&self.pkgver);
        match version_revision.rsplit_once('_') {
            Some((ver, rev)) if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) => {
                (ver, rev.parse().unwrap_or(0))
            }
            _ => (version_revision, 0),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// One package staged within a transaction: a record plus the
/// transaction-only bookkeeping that never belongs in the persisted pkgdb
/// entry itself.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransactionEntry {
    pub pkg: PackageRecord,
    pub action: TransactionAction,
    /// Set when this entry was queued for removal because another staged
    /// package's `replaces` pattern matched it.
    #[serde(default)]
    pub replaced: bool,
    /// The originating repository URL, carried through from the resolve
    /// step for use by the fetch phase.
    #[serde(default)]
    pub repository: Option<String>,
}

impl TransactionEntry {
    pub fn new(pkg: PackageRecord, action: TransactionAction) -> Self {
        TransactionEntry {
            repository: pkg.repository.clone(),
            pkg,
            action,
            replaced: false,
        }
    }

    pub fn name(&self) -> &str {
        self.pkg.name()
    }
}

#[cfg(test)]
#[path = "record.test.rs"]
mod test;
