//! The persistent package database: a locked, atomically
//! written store of installed package records, with derived
//! virtual-package and reverse-dependency indices.

mod record;

pub use record::{FileEntry, FileKind, PackageRecord, State, TransactionAction, TransactionEntry};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorKind, Reason};
use crate::matcher;
use crate::primitives::atomic_file::AtomicFile;
use crate::primitives::lock::{LockError, PkgdbLock};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("I/O error on '{0}'")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("malformed pkgdb at '{0}'")]
    Malformed(PathBuf, #[source] serde_json::Error),
    #[error(transparent)]
    Pattern(#[from] matcher::Error),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Lock(e) => e.kind(),
            Error::Io(..) => Reason::Resource,
            Error::Malformed(..) => Reason::Configuration,
            Error::Pattern(e) => e.kind(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct OnDisk {
    #[serde(rename = "schema-version", default)]
    schema_version: u32,
    #[serde(default)]
    packages: BTreeMap<String, PackageRecord>,
    /// The `_XBPS_ALTERNATIVES_` reserved key: group name ->
    /// ordered provider pkgnames, head is the currently active provider.
    #[serde(rename = "_XBPS_ALTERNATIVES_", default)]
    alternatives: BTreeMap<String, Vec<String>>,
}

const WILDCARD_CHARS: [char; 7] = ['<', '>', '=', '*', '?', '[', ','];

impl OnDisk {
    fn default_with_version() -> Self {
        OnDisk {
            schema_version: SCHEMA_VERSION,
            packages: BTreeMap::new(),
            alternatives: BTreeMap::new(),
        }
    }
}

/// A locked, in-memory view of the installed-package database.
/// Holding a [`Pkgdb`] holds the pkgdb lock for as long as it lives.
pub struct Pkgdb {
    _lock: PkgdbLock,
    path: PathBuf,
    packages: BTreeMap<String, PackageRecord>,
    on_disk_snapshot: BTreeMap<String, PackageRecord>,
    alternatives: BTreeMap<String, Vec<String>>,
    alternatives_snapshot: BTreeMap<String, Vec<String>>,
    vpkg_index: BTreeMap<String, Vec<String>>,
    revdeps_index: Option<BTreeMap<String, Vec<String>>>,
}

impl Pkgdb {
    /// Locks and loads the pkgdb rooted at `metadir`, creating an empty
    /// store if none exists yet.
    pub fn lock(metadir: impl AsRef<Path>) -> Result<Self, Error> {
        let metadir = metadir.as_ref();
        std::fs::create_dir_all(metadir).map_err(|e| Error::Io(metadir.to_path_buf(), e))?;

        let path = metadir.join("pkgdb.plist");
        let lock_path = metadir.join("pkgdb.lock");
        let lock = PkgdbLock::acquire(lock_path)?;

        let on_disk = Self::read(&path)?;
        let vpkg_index = build_vpkg_index(&on_disk.packages);

        Ok(Pkgdb {
                _lock: lock,
                path,
                packages: on_disk.packages.clone(),
                on_disk_snapshot: on_disk.packages,
                alternatives: on_disk.alternatives.clone(),
                alternatives_snapshot: on_disk.alternatives,
                vpkg_index,
                revdeps_index: None,
        })
    }

    fn read(path: &Path) -> Result<OnDisk, Error> {
        if !path.exists() {
            return Ok(OnDisk::default_with_version());
        }
        let bytes = std::fs::read(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        if bytes.is_empty() {
            return Ok(OnDisk::default_with_version());
        }
        let mut on_disk: OnDisk =
        serde_json::from_slice(&bytes).map_err(|e| Error::Malformed(path.to_path_buf(), e))?;
        migrate(&mut on_disk);
        Ok(on_disk)
    }

    /// Compares the in-memory store to what's on disk, optionally flushing
    /// a divergence and/or reloading from disk. Returns
    /// whether the in-memory store had diverged.
    pub fn update(&mut self, flush: bool, reload: bool) -> Result<bool, Error> {
        let changed =
        self.packages != self.on_disk_snapshot || self.alternatives != self.alternatives_snapshot;
        if flush && changed {
            self.flush()?;
        }
        if reload {
            let on_disk = Self::read(&self.path)?;
            self.vpkg_index = build_vpkg_index(&on_disk.packages);
            self.packages = on_disk.packages.clone();
            self.on_disk_snapshot = on_disk.packages;
            self.alternatives = on_disk.alternatives.clone();
            self.alternatives_snapshot = on_disk.alternatives;
            self.revdeps_index = None;
        }
        Ok(changed)
    }

    fn flush(&mut self) -> Result<(), Error> {
        let on_disk = OnDisk {
            schema_version: SCHEMA_VERSION,
            packages: self.packages.clone(),
            alternatives: self.alternatives.clone(),
        };
        let json =
        serde_json::to_vec_pretty(&on_disk).expect("PackageRecord serialization is infallible");
        let mut file = AtomicFile::create(&self.path).map_err(|e| Error::Io(self.path.clone(), e))?;
        file.write_all(&json).map_err(|e| Error::Io(self.path.clone(), e))?;
        file.commit().map_err(|e| Error::Io(self.path.clone(), e))?;
        self.on_disk_snapshot = self.packages.clone();
        self.alternatives_snapshot = self.alternatives.clone();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or replaces a package's record, keyed by its bare pkgname.
    /// Used by `commit`'s unpack/remove phases to mutate the store; the
    /// read-path lookups below are the documented surface.
    pub fn set_pkg(&mut self, record: PackageRecord) {
        self.revdeps_index = None;
        let name = record.name().to_owned();
        for provide in &record.provides {
            let vname = matcher::split_pkgver(provide)
            .map(|(n, _)| n)
            .unwrap_or(provide.as_str());
            let providers = self.vpkg_index.entry(vname.to_owned()).or_default();
            if !providers.contains(&name) {
                providers.push(name.clone());
            }
        }
        self.packages.insert(name, record);
    }

    pub fn remove_pkg(&mut self, name: &str) -> Option<PackageRecord> {
        self.revdeps_index = None;
        self.packages.remove(name)
    }

    /// Resolves a pkgver / pkgpattern / pkgname to its installed record,
    /// the same semantics as a repository lookup.
    pub fn get_pkg(&self, pkg: &str) -> Result<Option<&PackageRecord>, Error> {
        get_pkg_impl(&self.packages, pkg)
    }

    /// Consults the vpkg index first, then falls back to scanning every
    /// record's `provides`.
    pub fn get_virtualpkg(&self, vpkg: &str) -> Result<Option<&PackageRecord>, Error> {
        let pattern_name = vpkg.split(WILDCARD_CHARS).next().unwrap_or(vpkg);
        if let Some(candidates) = self.vpkg_index.get(pattern_name) {
            for name in candidates {
                if let Some(pkg) = self.packages.get(name) {
                    if matcher::virtualpkg_match(pkg.provides.iter().map(String::as_str), vpkg)? {
                        return Ok(Some(pkg));
                    }
                }
            }
            return Ok(None);
        }
        for pkg in self.packages.values() {
            if matcher::virtualpkg_match(pkg.provides.iter().map(String::as_str), vpkg)? {
                return Ok(Some(pkg));
            }
        }
        Ok(None)
    }

    /// Returns the pkgvers of every installed package that run-depends on
    /// `name`, building the transitive index on first use.
    pub fn get_revdeps(&mut self, name: &str) -> &[String] {
        if self.revdeps_index.is_none() {
            self.revdeps_index = Some(build_revdeps_index(&self.packages, &self.vpkg_index));
        }
        self.revdeps_index
        .as_ref()
        .and_then(|idx| idx.get(name))
        .map(Vec::as_slice)
        .unwrap_or(&[])
    }

    /// Read-only iteration over every installed record. Nothing here enforces the "must not mutate pkgdb"
    /// contract beyond the shared reference; it is on the caller.
    pub fn foreach_cb<F>(&self, mut f: F)
    where
    F: FnMut(&PackageRecord),
    {
        for pkg in self.packages.values() {
            f(pkg);
        }
    }

    /// Same contract as [`Pkgdb::foreach_cb`], spread across worker
    /// threads. Falls
    /// back to the sequential path for small sets, where thread spawning
    /// would cost more than it saves.
    pub fn foreach_cb_multi<F>(&self, f: F)
    where
    F: Fn(&PackageRecord) + Sync,
    {
        let workers = num_cpus::get().max(1);
        let records: Vec<&PackageRecord> = self.packages.values().collect();
        if workers <= 1 || records.len() < workers * 4 {
            records.into_iter().for_each(&f);
            return;
        }

        let chunk_size = (records.len() + workers - 1) / workers;
        std::thread::scope(|scope| {
                for chunk in records.chunks(chunk_size) {
                    let f = &f;
                    scope.spawn(move || {
                            for pkg in chunk {
                                f(pkg);
                            }
                    });
                }
        });
    }

    /// The `_XBPS_ALTERNATIVES_` reserved key: group name
    /// -> ordered provider pkgnames, head is the currently active provider.
    pub fn alt_group(&self, group: &str) -> Option<&[String]> {
        self.alternatives.get(group).map(Vec::as_slice)
    }

    pub fn alt_groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.alternatives.iter().map(|(g, p)| (g.as_str(), p.as_slice()))
    }

    /// Replaces a group's provider list, or deletes the group entirely when
    /// `providers` is empty.
    pub fn set_alt_group(&mut self, group: &str, providers: Vec<String>) {
        if providers.is_empty() {
            self.alternatives.remove(group);
        } else {
            self.alternatives.insert(group.to_owned(), providers);
        }
    }
}

fn get_pkg_impl<'a>(
    packages: &'a BTreeMap<String, PackageRecord>,
    pkg: &str,
) -> Result<Option<&'a PackageRecord>, Error> {
    if pkg.contains(WILDCARD_CHARS) {
        let pattern: matcher::Pattern = pkg.parse()?;
        return Ok(packages
            .get(pattern.name())
            .filter(|candidate| matcher::pkgpattern_match(&candidate.pkgver, pkg).unwrap_or(false)));
    }
    if let Some((name, _)) = matcher::split_pkgver(pkg) {
        // A full pkgver: exact match only.
        return Ok(packages.get(name).filter(|p| p.pkgver == pkg));
    }
    Ok(packages.get(pkg))
}

fn build_vpkg_index(packages: &BTreeMap<String, PackageRecord>) -> BTreeMap<String, Vec<String>> {
    let mut idx: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, pkg) in packages {
        for provide in &pkg.provides {
            let vname = matcher::split_pkgver(provide)
            .map(|(n, _)| n)
            .unwrap_or(provide.as_str());
            idx.entry(vname.to_owned()).or_default().push(name.clone());
        }
    }
    idx
}

/// Keys the index by every name a dependency could be satisfied through:
/// the literal dependency name itself, plus every installed package that
/// provides it as a virtual package, so `get_revdeps(P.name)` also returns
/// revdeps that depend on a virtual package `P` provides rather than on
/// `P`'s own pkgname.
fn build_revdeps_index(
    packages: &BTreeMap<String, PackageRecord>,
    vpkg_index: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, Vec<String>> {
    let mut idx: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pkg in packages.values() {
        for dep in &pkg.run_depends {
            let dep_name = dep.split(WILDCARD_CHARS).next().unwrap_or(dep);
            idx.entry(dep_name.to_owned()).or_default().push(pkg.pkgver.clone());
            if let Some(providers) = vpkg_index.get(dep_name) {
                for provider in providers {
                    if provider != dep_name {
                        idx.entry(provider.clone()).or_default().push(pkg.pkgver.clone());
                    }
                }
            }
        }
    }
    idx
}

/// Schema-version migration hook point, modeled on `lib/pkgdb_conversion.c`'s
/// version-keyed conversion table. There is exactly one schema version
/// today; this exists so a future version bump has somewhere to live.
fn migrate(on_disk: &mut OnDisk) {
    if on_disk.schema_version == 0 {
        on_disk.schema_version = SCHEMA_VERSION;
    }
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
