//! The checks pipeline run by `prepare` and the topological
//! sort that turns a resolved, checked transaction into a commit-ready
//! package order.

pub mod checks;
mod sort;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::error::{ErrorKind, Reason};
use crate::matcher;
use crate::pkgdb::{Pkgdb, TransactionEntry};

#[derive(Debug, Error)]
pub enum Error {
    #[error("package '{0}' and '{1}' both install '{2}'")]
    FileConflict(String, String, String),
    #[error("not enough free space on '{0}': need {1} bytes, have {2}")]
    NoSpace(PathBuf, u64, u64),
    #[error(transparent)]
    Pattern(#[from] matcher::Error),
    #[error(transparent)]
    Pkgdb(#[from] crate::pkgdb::Error),
    #[error("I/O error checking free space on '{0}'")]
    Io(PathBuf, #[source] std::io::Error),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::FileConflict(..) => Reason::Conflict,
            Error::NoSpace(..) => Reason::Resource,
            Error::Pattern(e) => e.kind(),
            Error::Pkgdb(e) => e.kind(),
            Error::Io(..) => Reason::Resource,
        }
    }
}

/// Aggregate size/space figures computed by [`checks::compute_stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_installed_size: u64,
    pub total_download_size: u64,
}

/// The result of running the checks pipeline over a resolved transaction:
/// diagnostics plus the sorted, commit-ready package list. Once returned,
/// the caller treats this as frozen — nothing here borrows the `Pkgdb`
/// any further.
#[derive(Debug, Serialize)]
pub struct PreparedTransaction {
    pub entries: Vec<TransactionEntry>,
    pub missing_deps: Vec<String>,
    pub broken_revdeps: Vec<String>,
    pub conflicts: Vec<String>,
    pub missing_shlibs: Vec<String>,
    pub obsolete_files: BTreeMap<String, Vec<String>>,
    pub stats: Stats,
}

/// Runs every check in order against `entries` (already resolved
/// by the [`crate::resolver`]), then sorts the result.
///
/// `force_overwrite` disables the file-collision `EEXIST` check; `force_remove_files` is the
/// separate override that forces a user-modified obsolete file or conffile
/// to be pruned anyway. File-conflict detection only sees whatever
/// `files`/`conf_files`/`links`/`dirs` data is already attached to each
/// staged entry; for packages coming straight out of a repository index
/// that's empty until the archive itself is fetched, so `commit` re-runs [`checks::check_file_conflicts`] once the real
/// archive manifests are known.
#[allow(clippy::too_many_arguments)]
pub fn prepare(
    entries: Vec<TransactionEntry>,
    missing_deps: Vec<String>,
    pkgdb: &mut Pkgdb,
    rootdir: &Path,
    preserve_globs: &[String],
    force_overwrite: bool,
    force_remove_files: bool,
) -> Result<PreparedTransaction, Error> {
    let mut entries = entries;
    checks::apply_replaces(&mut entries, pkgdb)?;
    let broken_revdeps = checks::check_revdeps(&entries, pkgdb)?;
    let conflicts = checks::check_conflicts(&entries, pkgdb)?;
    let missing_shlibs = checks::check_shlibs(&entries, pkgdb);
    let obsolete_files = checks::check_file_conflicts(
        &entries,
        pkgdb,
        rootdir,
        preserve_globs,
        force_overwrite,
        force_remove_files,
    )?;
    let stats = checks::compute_stats(&entries, rootdir)?;

    let entries = sort::sort_transaction(entries);

    Ok(PreparedTransaction {
            entries,
            missing_deps,
            broken_revdeps,
            conflicts,
            missing_shlibs,
            obsolete_files,
            stats,
    })
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
