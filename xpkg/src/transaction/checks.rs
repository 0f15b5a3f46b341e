//! The checks pipeline: replaces, reverse dependencies,
//! conflicts, shared libraries, file conflicts/obsoletes, and the final
//! free-space/stats pass.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::matcher;
use crate::pkgdb::{FileEntry, FileKind, PackageRecord, Pkgdb, TransactionAction, TransactionEntry};
use crate::primitives::hash::Sha256Digest;

use super::{Error, Stats};

/// Paths that are never scheduled for removal as "obsolete" even if no
/// package claims them anymore: the base symlinks xbps itself may own
/// outright on a merged-/usr system.
pub const BASE_SYMLINKS: &[&str] = &[
    "/bin",
    "/sbin",
    "/lib",
    "/lib32",
    "/lib64",
    "/usr/lib32",
    "/usr/lib64",
    "/var/run",
];

/// Queues an installed package replaced by a staged package's `replaces`
/// pattern, rewriting an already-staged entry in place where one exists
/// rather than pushing a duplicate removal.
pub fn apply_replaces(entries: &mut Vec<TransactionEntry>, pkgdb: &mut Pkgdb) -> Result<(), Error> {
    let mut work: Vec<(usize, String)> = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        if entry.action.unpacks() {
            for pattern in &entry.pkg.replaces {
                work.push((idx, pattern.clone()));
            }
        }
    }

    for (p_idx, pattern) in work {
        let p_name = entries[p_idx].name().to_owned();

        let Some(installed) = pkgdb.get_pkg(&pattern)?.cloned() else {
            continue;
        };
        if installed.name() == p_name {
            continue;
        }
        let i_name = installed.name().to_owned();

        if let Some(q_idx) = entries
        .iter()
        .position(|e| e.name() == i_name && e.action.unpacks())
        {
            let provides_pattern =
            matcher::virtualpkg_match(entries[p_idx].pkg.provides.iter().map(String::as_str), &pattern)?;
            let inherited_auto = entries[q_idx].pkg.automatic_install;
            entries[q_idx].action = TransactionAction::Remove;
            entries[q_idx].replaced = true;
            if provides_pattern {
                entries[p_idx].pkg.automatic_install = inherited_auto;
            }
        } else {
            let mut removal = TransactionEntry::new(installed, TransactionAction::Remove);
            removal.replaced = true;
            entries.push(removal);
        }
    }

    Ok(())
}

/// Reports installed packages whose `run_depends` would break against a
/// staged package's update/removal.
pub fn check_revdeps(entries: &[TransactionEntry], pkgdb: &mut Pkgdb) -> Result<Vec<String>, Error> {
    let mut broken = Vec::new();

    let candidates: Vec<(String, String, Vec<String>, TransactionAction)> = entries
    .iter()
    .filter(|e| matches!(e.action, TransactionAction::Update | TransactionAction::Remove))
    .map(|e| (e.name().to_owned(), e.pkg.pkgver.clone(), e.pkg.provides.clone(), e.action))
    .collect();

    for (p_name, p_pkgver, p_provides, p_action) in candidates {
        let revdeps: Vec<String> = pkgdb.get_revdeps(&p_name).to_vec();

        for r_pkgver in revdeps {
            let Some((r_name, _)) = matcher::split_pkgver(&r_pkgver) else {
                continue;
            };
            if entries
            .iter()
            .any(|e| e.name() == r_name && matches!(e.action, TransactionAction::Update | TransactionAction::Remove))
            {
                continue;
            }
            let Some(r_pkg) = pkgdb.get_pkg(r_name)?.cloned() else {
                continue;
            };
            let Some(pattern) = find_dep_pattern(&r_pkg, &p_name, &p_provides) else {
                continue;
            };

            if p_action == TransactionAction::Remove {
                broken.push(format!("{r_pkgver} breaks installed pkg {p_pkgver}"));
                continue;
            }

            if matcher::virtualpkg_match(p_provides.iter().map(String::as_str), &pattern)? {
                continue;
            }
            if !matcher::pkgpattern_match(&p_pkgver, &pattern)? {
                broken.push(format!("{r_pkgver} breaks installed pkg {p_pkgver}"));
            }
        }
    }

    Ok(broken)
}

/// Finds the dep pattern in `pkg.run_depends` that targets `name`, either
/// directly or through one of `provides` (the virtual package names `name`'s
/// package resolves through).
fn find_dep_pattern(pkg: &PackageRecord, name: &str, provides: &[String]) -> Option<String> {
    let provide_names: Vec<&str> =
    provides.iter().map(|p| matcher::split_pkgver(p).map(|(n, _)| n).unwrap_or(p.as_str())).collect();

    pkg.run_depends
    .iter()
    .find(|dep| {
            let dep_name: matcher::Pattern = match dep.parse() {
                Ok(p) => p,
                Err(_) => return false,
            };
            dep_name.name() == name || provide_names.contains(&dep_name.name())
    })
    .cloned()
}

/// Reports `conflicts` collisions between staged and installed packages
/// in either direction.
pub fn check_conflicts(entries: &[TransactionEntry], pkgdb: &mut Pkgdb) -> Result<Vec<String>, Error> {
    let mut conflicts = Vec::new();

    for p in entries.iter().filter(|p| p.action.unpacks()) {
        for pattern in &p.pkg.conflicts {
            if let Some(installed) = pkgdb.get_pkg(pattern)? {
                let being_removed = entries
                .iter()
                .any(|e| e.name() == installed.name() && e.action == TransactionAction::Remove);
                if !being_removed {
                    conflicts.push(format!("{} conflicts with installed {}", p.pkg.pkgver, installed.pkgver));
                }
            }
            for q in entries {
                if q.name() == p.name() || !q.action.unpacks() {
                    continue;
                }
                if matcher::pkgpattern_match(&q.pkg.pkgver, pattern)? {
                    conflicts.push(format!("{} conflicts with staged {}", p.pkg.pkgver, q.pkg.pkgver));
                }
            }
        }
    }

    let mut unchanged: Vec<PackageRecord> = Vec::new();
    pkgdb.foreach_cb(|pkg| {
            if !entries.iter().any(|e| e.name() == pkg.name()) {
                unchanged.push(pkg.clone());
            }
    });

    for installed in &unchanged {
        for pattern in &installed.conflicts {
            for q in entries.iter().filter(|q| q.action.unpacks()) {
                if matcher::pkgpattern_match(&q.pkg.pkgver, pattern)? {
                    conflicts.push(format!("{} conflicts with staged {}", installed.pkgver, q.pkg.pkgver));
                }
            }
        }
    }

    Ok(conflicts)
}

/// Reports `shlib-requires` entries left unresolved by the union of
/// pkgdb and transaction.
pub fn check_shlibs(entries: &[TransactionEntry], pkgdb: &mut Pkgdb) -> Vec<String> {
    // name -> (provides, requires, pkgver), the effective package set this
    // transaction would leave behind.
    let mut effective: BTreeMap<String, (Vec<String>, Vec<String>, String)> = BTreeMap::new();
    pkgdb.foreach_cb(|pkg| {
            effective.insert(
                pkg.name().to_owned(),
                (pkg.shlib_provides.clone(), pkg.shlib_requires.clone(), pkg.pkgver.clone()),
            );
    });

    for e in entries {
        if matches!(e.action, TransactionAction::Remove | TransactionAction::Hold) {
            effective.remove(e.name());
        } else {
            effective.insert(
                e.name().to_owned(),
                (e.pkg.shlib_provides.clone(), e.pkg.shlib_requires.clone(), e.pkg.pkgver.clone()),
            );
        }
    }

    let mut shprovides: BTreeMap<String, String> = BTreeMap::new();
    let mut shrequires: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (provides, requires, pkgver) in effective.values() {
        for soname in provides {
            shprovides.insert(soname.clone(), pkgver.clone());
        }
        for soname in requires {
            shrequires.entry(soname.clone()).or_default().push(pkgver.clone());
        }
    }

    let mut missing = Vec::new();
    for (soname, requirers) in &shrequires {
        if shprovides.contains_key(soname) {
            continue;
        }
        for pkgver in requirers {
            missing.push(format!("{pkgver} broken, unresolvable shlib {soname}"));
        }
    }
    missing
}

#[derive(Clone)]
struct PathOwner {
    kind: FileKind,
    sha256: Option<String>,
    target: Option<String>,
    pkgname: String,
    trans_index: usize,
}

/// Runs the file-conflict/obsolete-file pass. `preserve_globs` and `force_remove_files` mirror the user's
/// `preserve` config entries and the `FORCE_REMOVE_FILES` override
/// respectively; `force_overwrite` disables the cross-package `EEXIST`
/// check. On-disk content is only consulted for paths that exist solely
/// on the `old` side, since that's the only case where a file might be
/// gone or modified independently of anything this transaction does.
pub fn check_file_conflicts(
    entries: &[TransactionEntry],
    pkgdb: &mut Pkgdb,
    rootdir: &Path,
    preserve_globs: &[String],
    force_overwrite: bool,
    force_remove_files: bool,
) -> Result<BTreeMap<String, Vec<String>>, Error> {
    let mut old: BTreeMap<String, Vec<PathOwner>> = BTreeMap::new();
    let mut new: BTreeMap<String, Vec<PathOwner>> = BTreeMap::new();

    for (idx, e) in entries.iter().enumerate() {
        if matches!(e.action, TransactionAction::Update | TransactionAction::Remove) {
            if let Some(installed) = pkgdb.get_pkg(e.name())?.cloned() {
                collect_owners(&installed, idx, &mut old);
            }
        }
        if e.action.unpacks() {
            collect_owners(&e.pkg, idx, &mut new);
        }
    }

    let mut obsolete: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let all_paths: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    for path in all_paths {
        let news = new.get(path);
        let olds = old.get(path);

        if let Some(news) = news {
            let non_dir: Vec<&PathOwner> = news.iter().filter(|o| o.kind != FileKind::Dir).collect();
            if non_dir.len() > 1 && !force_overwrite {
                return Err(Error::FileConflict(
                        non_dir[0].pkgname.clone(),
                        non_dir[1].pkgname.clone(),
                        path.clone(),
                ));
            }
        }

        if olds.is_some() && news.is_some() {
            // Ownership persists across the transaction; nothing obsolete
            // here except the dir/dir remover bookkeeping, which this model
            // leaves to whichever entry re-asserts the directory.
            continue;
        }

        let Some(olds) = olds else { continue };
        if news.is_some() {
            continue;
        }

        for owner in olds {
            if owner.kind == FileKind::Conffile {
                // Leave conffiles with no new-side owner to the conffile
                // merger rather than unlinking them outright here.
                continue;
            }
            if matches_any(preserve_globs, path) {
                continue;
            }
            if BASE_SYMLINKS.contains(&path.as_str()) {
                continue;
            }

            let keep = match owner.kind {
                FileKind::Dir => !dir_removal_is_safe(rootdir, path, &old, &new, entries),
                FileKind::Link => {
                    let is_removal = entries
                    .get(owner.trans_index)
                    .map(|e| e.action == TransactionAction::Remove)
                    .unwrap_or(false);
                    is_removal && !force_remove_files && link_target_modified(rootdir, path, owner)
                }
                FileKind::File | FileKind::Conffile => match owner.sha256.as_deref() {
                    Some(expected) => match Sha256Digest::of_file(join_root(rootdir, path)) {
                        Ok(actual) => !force_remove_files && actual.to_hex() != expected,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true, // already gone
                        Err(_) => true,
                    },
                    None => false,
                },
            };

            if keep {
                continue;
            }

            let owner_pkgname = min_index_owner(path, &old, &new);
            obsolete.entry(owner_pkgname).or_default().push(path.clone());
        }
    }

    Ok(obsolete)
}

fn collect_owners(pkg: &PackageRecord, trans_index: usize, out: &mut BTreeMap<String, Vec<PathOwner>>) {
    let groups: [(&[FileEntry], FileKind); 4] = [
        (&pkg.files, FileKind::File),
        (&pkg.conf_files, FileKind::Conffile),
        (&pkg.links, FileKind::Link),
        (&pkg.dirs, FileKind::Dir),
    ];
    for (list, kind) in groups {
        for entry in list {
            out.entry(entry.file.clone()).or_default().push(PathOwner {
                    kind,
                    sha256: entry.sha256.clone(),
                    target: entry.target.clone(),
                    pkgname: pkg.pkgname.clone(),
                    trans_index,
            });
        }
    }
}

fn min_index_owner(path: &str, old: &BTreeMap<String, Vec<PathOwner>>, new: &BTreeMap<String, Vec<PathOwner>>) -> String {
    old.get(path)
    .into_iter()
    .flatten()
    .chain(new.get(path).into_iter().flatten())
    .min_by_key(|o| o.trans_index)
    .map(|o| o.pkgname.clone())
    .unwrap_or_default()
}

fn matches_any(globs: &[String], path: &str) -> bool {
    globs.iter().any(|g| matcher::glob_match(g, path))
}

fn join_root(rootdir: &Path, abs_path: &str) -> std::path::PathBuf {
    rootdir.join(abs_path.trim_start_matches('/'))
}

fn link_target_modified(rootdir: &Path, path: &str, owner: &PathOwner) -> bool {
    let Some(stored) = &owner.target else { return false };
    match std::fs::read_link(join_root(rootdir, path)) {
        Ok(live) => live.as_os_str() != stored.as_str(),
        Err(_) => false,
    }
}

/// Conservative directory-removal guard: only schedules a directory for
/// removal once every tracked path under it (across every package's old-side
/// manifest, not just this directory's own owners) is itself being removed
/// and not re-created, and the live directory, if present, holds nothing
/// beyond those vanishing paths. Checks are run before the unpack/remove
/// loop mutates anything, so a directory slated for removal is always still
/// physically populated with the files that are about to go; `read_dir`
/// alone can never tell "will end up empty" from "already has leftovers".
fn dir_removal_is_safe(
    rootdir: &Path,
    dir_path: &str,
    old: &BTreeMap<String, Vec<PathOwner>>,
    new: &BTreeMap<String, Vec<PathOwner>>,
    entries: &[TransactionEntry],
) -> bool {
    let prefix = format!("{dir_path}/");
    let mut vanishing: BTreeSet<String> = BTreeSet::new();

    for (path, owners) in old {
        if path != dir_path && !path.starts_with(&prefix) {
            continue;
        }
        if new.contains_key(path) {
            return false;
        }
        if !owners.iter().all(|o| entries.get(o.trans_index).map(|e| e.action.removes()).unwrap_or(false)) {
            return false;
        }
        if path != dir_path {
            vanishing.insert(path.clone());
        }
    }

    match std::fs::read_dir(join_root(rootdir, dir_path)) {
        Ok(live) => {
            for entry in live {
                let Ok(entry) = entry else { return false };
                let live_path = format!("{dir_path}/{}", entry.file_name().to_string_lossy());
                if !vanishing.contains(&live_path) {
                    return false;
                }
            }
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(_) => false,
    }
}

/// Totals the installed/download size over staged packages and checks
/// `rootdir`'s free space via `statvfs`.
pub fn compute_stats(entries: &[TransactionEntry], rootdir: &Path) -> Result<Stats, Error> {
    let mut stats = Stats::default();
    for e in entries {
        if e.action.unpacks() {
            stats.total_installed_size += e.pkg.installed_size;
            stats.total_download_size += e.pkg.filename_size.unwrap_or(0);
        }
    }

    let available = free_space(rootdir).map_err(|err| Error::Io(rootdir.to_path_buf(), err))?;
    if stats.total_download_size > available {
        return Err(Error::NoSpace(rootdir.to_path_buf(), stats.total_download_size, available));
    }

    Ok(stats)
}

fn free_space(rootdir: &Path) -> std::io::Result<u64> {
    let c_path = CString::new(rootdir.as_os_str().as_bytes())
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: `c_path` is a valid NUL-terminated string and `stat` is a
    // freshly zeroed, correctly sized out-param for `statvfs(3)`.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(test)]
#[path = "checks.test.rs"]
mod test;
