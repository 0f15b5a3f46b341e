//! The alternatives subsystem: an ordered set of providers per
//! logical symlink group, switching the active provider's symlinks when
//! packages are registered or unregistered.
//!
//! Uses [`crate::primitives::path`] to rewrite each link target relative to
//! its link, so the result stays portable across rootdirs. When a
//! metapackage and a concrete package both provide the same group, the tie
//! is broken in favor of whichever registered first and is still present.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{ErrorKind, Reason};
use crate::event::{Event, EventSink};
use crate::pkgdb::{PackageRecord, Pkgdb};
use crate::primitives::path;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error switching alternative '{0}'")]
    Io(PathBuf, #[source] io::Error),
    #[error("malformed alternatives entry: '{0}'")]
    MalformedEntry(String),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Io(..) => Reason::Resource,
            Error::MalformedEntry(_) => Reason::Configuration,
        }
    }
}

/// One parsed `<linkpath>:<targetpath>` entry from a group's provider list.
struct Spec {
    linkpath: String,
    targetpath: String,
}

fn parse_spec(entry: &str) -> Result<Spec, Error> {
    let (linkpath, targetpath) = entry
    .split_once(':')
    .ok_or_else(|| Error::MalformedEntry(entry.to_owned()))?;
    Ok(Spec {
            linkpath: linkpath.to_owned(),
            targetpath: targetpath.to_owned(),
    })
}

/// Materializes every `<linkpath>:<targetpath>` entry of `pkg`'s group
/// `group` as a relative symlink under `rootdir`.
fn materialize(rootdir: &Path, pkg: &PackageRecord, group: &str) -> Result<(), Error> {
    let Some(entries) = pkg.alternatives.get(group) else {
        return Ok(());
    };
    for entry in entries {
        let spec = parse_spec(entry)?;
        materialize_one(rootdir, &spec)?;
    }
    Ok(())
}

fn materialize_one(rootdir: &Path, spec: &Spec) -> Result<(), Error> {
    let linkpath = path::clean(&spec.linkpath);
    let targetpath = path::clean(&spec.targetpath);

    let link_dir = linkpath.rsplit_once('/').map(|(d, _)| d).unwrap_or("/");
    let link_dir = if link_dir.is_empty() { "/" } else { link_dir };
    let relative_target = path::relative(link_dir, &targetpath);

    let abs_link = join_root(rootdir, &linkpath);
    if let Some(parent) = abs_link.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Io(parent.to_path_buf(), e))?;
        set_dir_mode(parent)?;
    }

    match fs::symlink_metadata(&abs_link) {
        Ok(_) => fs::remove_file(&abs_link).map_err(|e| Error::Io(abs_link.clone(), e))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::Io(abs_link.clone(), e)),
    }

    symlink(&relative_target, &abs_link).map_err(|e| Error::Io(abs_link.clone(), e))
}

/// Removes every symlink `pkg` materialized for `group`, e.g. when it stops
/// being the active provider.
fn unmaterialize(rootdir: &Path, pkg: &PackageRecord, group: &str) -> Result<(), Error> {
    let Some(entries) = pkg.alternatives.get(group) else {
        return Ok(());
    };
    for entry in entries {
        let spec = parse_spec(entry)?;
        let linkpath = path::clean(&spec.linkpath);
        let abs_link = join_root(rootdir, &linkpath);
        match fs::remove_file(&abs_link) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(abs_link, e)),
        }
    }
    Ok(())
}

fn join_root(rootdir: &Path, abs_path: &str) -> PathBuf {
    rootdir.join(abs_path.trim_start_matches('/'))
}

#[cfg(unix)]
fn symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(unix)]
fn set_dir_mode(dir: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).map_err(|e| Error::Io(dir.to_path_buf(), e))
}

/// Whether `pkg` is a transitional metapackage for the purpose of the
/// provider tie-break rule: both `run_depends` and `shlib-requires` are
/// empty.
fn is_transitional_metapackage(pkg: &PackageRecord) -> bool {
    pkg.run_depends.is_empty() && pkg.shlib_requires.is_empty()
}

/// Registers `pkg` for each of its alternatives groups. Idempotent if `pkg` is already the head (refreshes
/// its links); a no-op write if `pkg` is already present but not head.
pub fn register(rootdir: &Path, pkgdb: &mut Pkgdb, pkg: &PackageRecord, sink: &mut dyn EventSink) -> Result<(), Error> {
    for group in pkg.alternatives.keys() {
        let providers: Vec<String> = pkgdb.alt_group(group).map(|p| p.to_vec()).unwrap_or_default();

        if providers.is_empty() {
            pkgdb.set_alt_group(group, vec![pkg.pkgname.clone()]);
            materialize(rootdir, pkg, group)?;
            sink.emit(Event::AltGroupAdded { group: group.clone(), pkgname: pkg.pkgname.clone() });
        } else if providers.first().map(String::as_str) == Some(pkg.pkgname.as_str()) {
            materialize(rootdir, pkg, group)?;
        } else if providers.iter().any(|p| p == &pkg.pkgname) {
            // Present but not head: leave the head's links untouched.
        } else {
            let mut providers = providers;
            providers.push(pkg.pkgname.clone());
            pkgdb.set_alt_group(group, providers);
        }
    }
    Ok(())
}

/// Unregisters `pkg` from every alternatives group it appears in.
/// `updating` distinguishes an in-place update, where the package returns
/// right after unpack and nothing further needs doing, from a full
/// removal, where a new head (if any remains) must materialize its links.
pub fn unregister(
    rootdir: &Path,
    pkgdb: &mut Pkgdb,
    pkg: &PackageRecord,
    updating: bool,
    sink: &mut dyn EventSink,
) -> Result<(), Error> {
    let groups: Vec<String> = pkg.alternatives.keys().cloned().collect();

    for group in groups {
        let Some(mut providers) = pkgdb.alt_group(&group).map(|p| p.to_vec()) else {
            continue;
        };
        let Some(pos) = providers.iter().position(|p| p == &pkg.pkgname) else {
            continue;
        };
        let was_head = pos == 0;

        if was_head {
            unmaterialize(rootdir, pkg, &group)?;
        }
        providers.remove(pos);

        if providers.is_empty() {
            pkgdb.set_alt_group(&group, providers);
            continue;
        }

        if was_head && updating {
            // Package returns after unpack re-registers it; leave order.
            pkgdb.set_alt_group(&group, providers);
            continue;
        }

        if was_head {
            // Full removal: rotate the tie-break winner to head and
            // materialize its links.
            let winner_idx = if is_transitional_metapackage(pkg) { 0 } else { providers.len() - 1 };
            let winner = providers.remove(winner_idx);
            let winner_pkg = pkgdb.get_pkg(&winner).ok().flatten().cloned();
            providers.insert(0, winner.clone());
            pkgdb.set_alt_group(&group, providers);
            sink.emit(Event::AltGroupSwitched { group: group.clone(), from: pkg.pkgname.clone(), to: winner.clone() });
            if let Some(winner_pkg) = winner_pkg {
                materialize(rootdir, &winner_pkg, &group)?;
            }
        } else {
            pkgdb.set_alt_group(&group, providers);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
