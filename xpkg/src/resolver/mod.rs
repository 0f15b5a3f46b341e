//! The dependency resolver: `trans_find_pkg` picks the action
//! for a single user request, `repo_deps` recursively walks its
//! `run_depends`, and `update_packages`/`remove_pkg`/`autoremove_pkgs` are
//! built on top of both.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use thiserror::Error;

use crate::error::{ErrorKind, Reason};
use crate::matcher;
use crate::pkgdb::{PackageRecord, Pkgdb, State, TransactionAction, TransactionEntry};
use crate::repository::RepositoryPool;

/// Dependency recursion depth limit.
pub const MAX_DEPTH: u32 = 512;

#[derive(Debug, Error)]
pub enum Error {
    #[error("package '{0}' is not installed")]
    NotInstalled(String),
    #[error(transparent)]
    Pattern(#[from] matcher::Error),
    #[error(transparent)]
    Pkgdb(#[from] crate::pkgdb::Error),
    #[error(transparent)]
    Repository(#[from] crate::repository::Error),
    #[error("dependency recursion exceeded depth {MAX_DEPTH}")]
    DepthExceeded,
    #[error("the resolver itself has an available update; update it before a full system update")]
    SelfUpdateRequired,
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::NotInstalled(_) => Reason::NotFound,
            Error::Pattern(e) => e.kind(),
            Error::Pkgdb(e) => e.kind(),
            Error::Repository(e) => e.kind(),
            Error::DepthExceeded => Reason::Cycle,
            Error::SelfUpdateRequired => Reason::Busy,
        }
    }
}

/// The parts of per-handle configuration the resolver consults; owned by the caller (eventually `commit::Handle`) and
/// borrowed in for the duration of a resolve.
#[derive(Debug, Default, Clone)]
pub struct ResolverConfig {
    /// Package names skipped entirely during dependency resolution.
    pub ignore_pkgs: BTreeSet<String>,
    /// Under download-only mode every action becomes `download` and
    /// nothing is actually unpacked.
    pub download_only: bool,
    /// This resolver's own package name, used by `update_packages`'s
    /// self-update guard.
    pub self_pkgname: String,
}

/// A transaction being built up: the ordered (pre-sort) set of staged
/// entries plus the dependency patterns that couldn't be resolved at all.
#[derive(Debug, Default)]
pub struct Transaction {
    pub entries: Vec<TransactionEntry>,
    pub missing_deps: Vec<String>,
}

impl Transaction {
    pub fn find_by_name(&self, name: &str) -> Option<&TransactionEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name() == name)
    }
}

/// Chooses the transaction action for a user request: `pkg`
/// may be a pkgname, pkgver, or pkgpattern.
pub fn trans_find_pkg(
    pkg: &str,
    force: bool,
    pkgdb: &Pkgdb,
    rpool: &RepositoryPool,
    cfg: &ResolverConfig,
) -> Result<Option<TransactionEntry>, Error> {
    let installed = pkgdb.get_pkg(pkg)?;

    let (mut action, candidate) = match installed {
        None => (TransactionAction::Install, rpool.get_pkg(pkg)?),
        Some(installed_pkg) if force => (TransactionAction::Reinstall, lookup_candidate(pkg, installed_pkg, rpool)?),
        Some(installed_pkg) => (TransactionAction::Update, lookup_candidate(pkg, installed_pkg, rpool)?),
    };

    let Some(mut candidate) = candidate else {
        return Ok(None);
    };

    if let Some(installed_pkg) = installed {
        if action == TransactionAction::Update {
            let newer = matcher::compare_pkgver(&candidate.pkgver, &installed_pkg.pkgver) == Ordering::Greater;
            let reverted = candidate.reverts.iter().any(|r| r == &installed_pkg.pkgver);
            if !newer && !reverted {
                return Ok(None);
            }
        }
        if action == TransactionAction::Reinstall
        && matcher::compare_pkgver(&candidate.pkgver, &installed_pkg.pkgver) == Ordering::Greater
        {
            action = TransactionAction::Update;
        }

        candidate.automatic_install = installed_pkg.automatic_install;
        candidate.hold = installed_pkg.hold;
        candidate.repolock = installed_pkg.repolock;
    }

    if cfg.download_only {
        action = TransactionAction::Download;
    } else if candidate.hold && !force {
        action = TransactionAction::Hold;
    }

    Ok(Some(TransactionEntry::new(candidate, action)))
}

fn lookup_candidate(
    pkg: &str,
    installed_pkg: &PackageRecord,
    rpool: &RepositoryPool,
) -> Result<Option<PackageRecord>, Error> {
    if installed_pkg.repolock {
        let repo = installed_pkg.repository.as_deref();
        for r in &rpool.repos {
            if Some(r.url.as_str()) == repo {
                return Ok(r.get_pkg(pkg)?);
            }
        }
        return Ok(None);
    }
    Ok(rpool.get_pkg(pkg)?)
}

/// Recursively walks `entry`'s `run_depends`, queuing whatever isn't
/// already satisfied.
pub fn repo_deps(
    entry: &TransactionEntry,
    pkgdb: &Pkgdb,
    rpool: &RepositoryPool,
    cfg: &ResolverConfig,
    trans: &mut Transaction,
) -> Result<(), Error> {
    repo_deps_at_depth(entry, pkgdb, rpool, cfg, trans, 0)
}

fn repo_deps_at_depth(
    entry: &TransactionEntry,
    pkgdb: &Pkgdb,
    rpool: &RepositoryPool,
    cfg: &ResolverConfig,
    trans: &mut Transaction,
    depth: u32,
) -> Result<(), Error> {
    if depth >= MAX_DEPTH {
        return Err(Error::DepthExceeded);
    }

    for pattern in entry.pkg.run_depends.clone() {
        let dep_name = pattern.split(['<', '>', '=', '*', '?', '[']).next().unwrap_or(&pattern);

        if cfg.ignore_pkgs.contains(dep_name) {
            continue;
        }
        if matcher::virtualpkg_match(entry.pkg.provides.iter().map(String::as_str), &pattern)? {
            continue;
        }
        if let Some(queued) = trans.find_by_name(dep_name) {
            if queued.action != TransactionAction::Remove {
                continue;
            }
        }

        let installed: Option<PackageRecord> = match pkgdb.get_pkg(&pattern)? {
            Some(p) => Some(p.clone()),
            None => pkgdb.get_virtualpkg(&pattern)?.cloned(),
        };

        if !cfg.download_only {
            if let Some(installed_pkg) = &installed {
                if matcher::pkgpattern_match(&installed_pkg.pkgver, &pattern)? {
                    match installed_pkg.state {
                        State::Unpacked => {
                            trans
                            .entries
                            .push(TransactionEntry::new(installed_pkg.clone(), TransactionAction::Configure));
                            continue;
                        }
                        State::Installed => continue,
                        _ => {}
                    }
                }
            }
        }

        let found = match &installed {
            Some(installed_pkg) => resolve_missing_dep(&pattern, installed_pkg, rpool, cfg)?,
            None => resolve_missing_dep_fresh(&pattern, rpool, cfg)?,
        };

        let Some(found) = found else {
            trans.missing_deps.push(pattern.clone());
            continue;
        };

        let mut dep_entry = TransactionEntry::new(found, TransactionAction::Install);
        dep_entry.pkg.automatic_install = true;
        if !trans.contains(dep_entry.name()) {
            repo_deps_at_depth(&dep_entry, pkgdb, rpool, cfg, trans, depth + 1)?;
            trans.entries.push(dep_entry);
        }
    }
    Ok(())
}

fn resolve_missing_dep(
    pattern: &str,
    installed_pkg: &PackageRecord,
    rpool: &RepositoryPool,
    cfg: &ResolverConfig,
) -> Result<Option<PackageRecord>, Error> {
    if cfg.download_only {
        return resolve_missing_dep_fresh(pattern, rpool, cfg);
    }
    lookup_candidate(pattern, installed_pkg, rpool)
}

fn resolve_missing_dep_fresh(
    pattern: &str,
    rpool: &RepositoryPool,
    _cfg: &ResolverConfig,
) -> Result<Option<PackageRecord>, Error> {
    if let Some(found) = rpool.get_pkg(pattern)? {
        return Ok(Some(found));
    }
    Ok(rpool.get_virtualpkg(pattern)?)
}

/// Iterates the pkgdb and calls [`trans_find_pkg`] for each installed
/// package, after a self-update guard dry run.
pub fn update_packages(
    pkgdb: &mut Pkgdb,
    rpool: &RepositoryPool,
    cfg: &ResolverConfig,
) -> Result<Transaction, Error> {
    if !cfg.self_pkgname.is_empty() {
        if let Some(self_entry) = trans_find_pkg(&cfg.self_pkgname, false, pkgdb, rpool, cfg)? {
            if self_entry.action == TransactionAction::Update {
                return Err(Error::SelfUpdateRequired);
            }
        }
    }

    let mut trans = Transaction::default();
    let mut names = Vec::new();
    pkgdb.foreach_cb(|pkg| names.push(pkg.pkgname.clone()));

    for name in names {
        if let Some(entry) = trans_find_pkg(&name, false, pkgdb, rpool, cfg)? {
            repo_deps(&entry, pkgdb, rpool, cfg, &mut trans)?;
            trans.entries.push(entry);
        }
    }
    Ok(trans)
}

/// Queues `name` (and, if `recursive`, its orphaned dependencies) for
/// removal.
pub fn remove_pkg(name: &str, recursive: bool, pkgdb: &Pkgdb) -> Result<Transaction, Error> {
    if pkgdb.get_pkg(name)?.is_none() {
        return Err(Error::NotInstalled(name.to_owned()));
    }

    let mut roots = BTreeSet::new();
    roots.insert(name.to_owned());

    let names = if recursive {
        find_pkg_orphans(&roots, pkgdb)
    } else {
        roots
    };

    let mut trans = Transaction::default();
    for name in names {
        if let Some(pkg) = pkgdb.get_pkg(&name)? {
            trans.entries.push(TransactionEntry::new(pkg.clone(), TransactionAction::Remove));
        }
    }
    Ok(trans)
}

/// Computes the set of orphans that removing every package in `roots`
/// would produce: every installed package, transitively reachable only
/// through the roots, whose `automatic-install` flag is set and which
/// nothing else outside `roots` still depends on.
pub fn find_pkg_orphans(roots: &BTreeSet<String>, pkgdb: &Pkgdb) -> BTreeSet<String> {
    let mut removed: BTreeSet<String> = roots.clone();
    let mut all_automatic: BTreeSet<String> = BTreeSet::new();
    pkgdb.foreach_cb(|pkg| {
            if pkg.automatic_install {
                all_automatic.insert(pkg.pkgname.clone());
            }
    });

    // Fixed-point: repeatedly mark automatic packages orphaned once every
    // installed revdep outside the removed set is gone too.
    loop {
        let mut changed = false;
        for candidate in all_automatic.iter() {
            if removed.contains(candidate) {
                continue;
            }
            let mut still_needed = false;
            pkgdb.foreach_cb(|pkg| {
                    if removed.contains(&pkg.pkgname) {
                        return;
                    }
                    let depends_on_candidate = pkg.run_depends.iter().any(|dep| {
                            let dep_name = dep.split(['<', '>', '=', '*', '?', '[']).next().unwrap_or(dep);
                            dep_name == candidate
                    });
                    if depends_on_candidate {
                        still_needed = true;
                    }
            });
            if !still_needed {
                removed.insert(candidate.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    removed
}

/// Computes every automatic-install orphan currently in the pkgdb and
/// queues each for removal.
pub fn autoremove_pkgs(pkgdb: &Pkgdb) -> Transaction {
    let orphans = find_pkg_orphans(&BTreeSet::new(), pkgdb);
    let mut trans = Transaction::default();
    for name in orphans {
        if let Ok(Some(pkg)) = pkgdb.get_pkg(&name) {
            trans.entries.push(TransactionEntry::new(pkg.clone(), TransactionAction::Remove));
        }
    }
    trans
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
