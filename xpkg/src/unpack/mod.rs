//! The unpack engine: streaming extraction of a package
//! archive's payload, with configuration-file three-way merging,
//! ownership/mode/time reconciliation, and obsolete-file removal.
//!
//! Modeled on `package::Package::load` for "read a tar
//! stream member-by-member, buffer the small ones, stream the rest" (the
//! header/payload split here is the same shape, just against a different
//! archive layout) and on `transaction::checks::check_file_conflicts` for
//! the obsolete-path data this module consumes rather than recomputes —
//! see `unpack`'s doc comment for why.

pub mod codec;
mod conffile;
mod header;

pub use conffile::Decision as ConfFileDecision;
pub use header::{read_header, FilesManifest, Header};

use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write as _};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::crypto::base64_encode;
use crate::error::{ErrorKind, Reason};
use crate::event::{ConfigFileAction, Event, EventSink};
use crate::matcher;
use crate::pkgdb::{FileEntry, PackageRecord, State};
use crate::primitives::hash::Sha256Digest;
use crate::primitives::path;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error while unpacking")]
    Io(#[source] io::Error),
    #[error("malformed '{0}' member")]
    Malformed(&'static str, #[source] serde_json::Error),
    #[error("archive is missing required member '{0}'")]
    MissingHeaderMember(&'static str),
    #[error("archive props.pkgver '{0}' does not match expected '{1}'")]
    PkgverMismatch(String, String),
    #[error(transparent)]
    Codec(#[from] codec::Error),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Io(_) => Reason::Resource,
            Error::Malformed(..) => Reason::Configuration,
            Error::MissingHeaderMember(_) => Reason::Configuration,
            Error::PkgverMismatch(..) => Reason::Integrity,
            Error::Codec(e) => e.kind(),
        }
    }
}

/// Per-commit options the unpack engine needs but doesn't own.
pub struct UnpackOptions<'a> {
    pub rootdir: &'a Path,
    pub noextract_globs: &'a [String],
    pub preserve_globs: &'a [String],
    /// Installs an upstream-changed conffile as
    /// `<path>.new-<version>` even in the `orig==cur!=new` row, instead of
    /// overwriting the (unmodified) current file outright.
    pub keep_config: bool,
    /// `FORCE_REMOVE_FILES` override, reused here for the
    /// "mismatch: retain unless forced" conffile/obsolete rules.
    pub force_remove_files: bool,
}

/// Unpacks a single package archive. `installed` is the
/// previous installation's record (`None` for a fresh install), supplying
/// the "orig" side of the conffile three-way merge. `obsolete_paths` is
/// this package's slice of `PreparedTransaction::obsolete_files`, as
/// recomputed by `commit`'s final file-collection pass against the now-verified archive — the unpack engine itself does
/// not recompute file-conflict/obsolete data, it only acts on what the
/// checks pipeline already decided.
pub fn unpack<R: Read + 'static>(
    reader: R,
    expected_pkgver: &str,
    installed: Option<&PackageRecord>,
    obsolete_paths: &[String],
    pkgname: &str,
    opts: &UnpackOptions,
    sink: &mut dyn EventSink,
) -> Result<PackageRecord, Error> {
    let wrapped = codec::wrap(io::BufReader::new(reader))?;
    let mut archive = tar::Archive::new(wrapped);

    let header = read_header(&mut archive)?;
    if header.props.pkgver != expected_pkgver {
        return Err(Error::PkgverMismatch(header.props.pkgver, expected_pkgver.to_owned()));
    }

    let is_root = running_as_root();
    let conf_by_path: std::collections::BTreeMap<&str, &FileEntry> =
    header.manifest.conf_files.iter().map(|e| (e.file.as_str(), e)).collect();
    let version_suffix = {
        let (version, revision) = header.props.version_revision();
        format!("{version}_{revision}")
    };

    for raw_entry in archive.entries().map_err(Error::Io)? {
        let mut entry = raw_entry.map_err(Error::Io)?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let raw_path = entry.path().map_err(Error::Io)?.to_string_lossy().into_owned();
        let relpath = archive_path_to_relpath(&raw_path);

        if matches_any(opts.noextract_globs, &relpath) {
            continue;
        }
        let dest = join_root(opts.rootdir, &relpath);
        if matches_any(opts.preserve_globs, &relpath) && dest.exists() {
            continue;
        }

        replace_mismatched_type(&dest, &entry)?;

        if let Some(conf_entry) = conf_by_path.get(relpath.as_str()) {
            extract_conffile(&mut entry, &dest, conf_entry, installed, &version_suffix, opts, sink)?;
        } else if entry.header().entry_type().is_symlink() {
            extract_symlink(&mut entry, &dest)?;
        } else {
            extract_regular_file(&mut entry, &dest, is_root)?;
        }
    }

    for obsolete_path in obsolete_paths {
        remove_obsolete(opts.rootdir, obsolete_path, pkgname, sink);
    }

    let mut record = header.props;
    record.files = header.manifest.files;
    record.conf_files = header.manifest.conf_files;
    record.links = header.manifest.links;
    record.dirs = header.manifest.dirs;
    record.install_script = header.install_script.map(|b| base64_encode(&b));
    record.remove_script = header.remove_script.map(|b| base64_encode(&b));
    record.state = State::Unpacked;

    Ok(record)
}

/// Writes the freshly-unpacked package's file manifest to
/// `<metadir>/.<pkgname>-files.plist`, atomically and with umask 022.
pub fn externalize_manifest(metadir: &Path, pkg: &PackageRecord) -> Result<(), Error> {
    if pkg.files.is_empty() && pkg.conf_files.is_empty() && pkg.links.is_empty() && pkg.dirs.is_empty() {
        return Ok(());
    }
    let manifest = FilesManifest {
        files: pkg.files.clone(),
        conf_files: pkg.conf_files.clone(),
        links: pkg.links.clone(),
        dirs: pkg.dirs.clone(),
    };
    let json = serde_json::to_vec_pretty(&manifest).expect("FilesManifest serialization is infallible");
    let dest = metadir.join(format!(".{}-files.plist", pkg.name()));
    let mut file = crate::primitives::AtomicFile::create(&dest).map_err(Error::Io)?;
    file.write_all(&json).map_err(Error::Io)?;
    file.commit().map_err(Error::Io)?;
    set_mode(&dest, 0o644)?;
    Ok(())
}

/// Removes `<metadir>/.<pkgname>-files.plist`, e.g. during removal.
pub fn remove_manifest(metadir: &Path, pkgname: &str) -> io::Result<()> {
    match fs::remove_file(metadir.join(format!(".{pkgname}-files.plist"))) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Unlinks every path in `paths`, relative to `rootdir`, attributing each
/// removal to `pkgname`.
pub fn remove_paths(rootdir: &Path, paths: &[String], pkgname: &str, sink: &mut dyn EventSink) {
    for path in paths {
        remove_obsolete(rootdir, path, pkgname, sink);
    }
}

fn remove_obsolete(rootdir: &Path, relpath: &str, pkgname: &str, sink: &mut dyn EventSink) {
    let dest = join_root(rootdir, relpath);
    match fs::symlink_metadata(&dest).map(|m| m.is_dir()) {
        Ok(true) => match fs::remove_dir(&dest) {
            Ok(()) => sink.emit(Event::RemoveFile { path: relpath.to_owned(), pkgname: pkgname.to_owned() }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => sink.emit(Event::RemoveFileFail {
                    path: relpath.to_owned(),
                    pkgname: pkgname.to_owned(),
                    reason: e.to_string(),
            }),
        },
        _ => match fs::remove_file(&dest) {
            Ok(()) => sink.emit(Event::RemoveFile { path: relpath.to_owned(), pkgname: pkgname.to_owned() }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => sink.emit(Event::RemoveFileFail {
                    path: relpath.to_owned(),
                    pkgname: pkgname.to_owned(),
                    reason: e.to_string(),
            }),
        },
    }
}

/// Strips the archive's `./` prefix and forces the path absolute before
/// cleaning, so `path::clean`'s "`..` beyond an absolute root is
/// discarded" behavior doubles as the `SECURE_NODOTDOT`/
/// `SECURE_NOABSOLUTEPATHS` guard against escaping the rootdir.
fn archive_path_to_relpath(raw: &str) -> String {
    let stripped = raw.strip_prefix("./").unwrap_or(raw);
    path::clean(&format!("/{stripped}"))
}

fn join_root(rootdir: &Path, relpath: &str) -> PathBuf {
    rootdir.join(relpath.trim_start_matches('/'))
}

fn matches_any(globs: &[String], path: &str) -> bool {
    globs.iter().any(|g| matcher::glob_match(g, path))
}

fn running_as_root() -> bool {
    // SAFETY: `geteuid` takes no arguments and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// If `dest` exists but is a different file type than the incoming entry,
/// unlink it so the type-specific extractor below can create fresh.
fn replace_mismatched_type<R: Read>(dest: &Path, entry: &tar::Entry<R>) -> Result<(), Error> {
    let Ok(meta) = fs::symlink_metadata(dest) else {
        return Ok(());
    };
    let incoming_is_symlink = entry.header().entry_type().is_symlink();
    let on_disk_is_symlink = meta.file_type().is_symlink();
    if incoming_is_symlink != on_disk_is_symlink {
        if meta.is_dir() {
            fs::remove_dir_all(dest).map_err(Error::Io)?;
        } else {
            fs::remove_file(dest).map_err(Error::Io)?;
        }
    }
    Ok(())
}

fn extract_regular_file<R: Read>(entry: &mut tar::Entry<R>, dest: &Path, is_root: bool) -> Result<(), Error> {
    let header_mode = entry.header().mode().map_err(Error::Io)?;
    let header_mtime = entry.header().mtime().map_err(Error::Io)?;
    let header_uid = entry.header().uid().map_err(Error::Io)?;
    let header_gid = entry.header().gid().map_err(Error::Io)?;

    if let Some(existing_hash) = file_hash_if_present(dest) {
        let mut incoming_bytes = Vec::new();
        entry.read_to_end(&mut incoming_bytes).map_err(Error::Io)?;
        if Sha256Digest::of_bytes(&incoming_bytes) == existing_hash {
            reconcile_metadata(dest, header_mode, header_mtime, header_uid, header_gid, is_root)?;
            return Ok(());
        }
        write_file(dest, &incoming_bytes)?;
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let mut file = File::create(dest).map_err(Error::Io)?;
        io::copy(entry, &mut file).map_err(Error::Io)?;
    }

    set_mode(dest, header_mode)?;
    set_mtime(dest, header_mtime)?;
    if is_root {
        set_owner(dest, header_uid as u32, header_gid as u32)?;
    }
    Ok(())
}

fn file_hash_if_present(dest: &Path) -> Option<Sha256Digest> {
    if !dest.is_file() {
        return None;
    }
    Sha256Digest::of_file(dest).ok()
}

fn write_file(dest: &Path, bytes: &[u8]) -> Result<(), Error> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    let mut file = OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .open(dest)
    .map_err(Error::Io)?;
    file.write_all(bytes).map_err(Error::Io)
}

fn reconcile_metadata(
    dest: &Path,
    mode: u32,
    mtime: u64,
    uid: u64,
    gid: u64,
    is_root: bool,
) -> Result<(), Error> {
    if let Ok(meta) = fs::metadata(dest) {
        if meta.permissions().mode() & 0o7777 != mode & 0o7777 {
            set_mode(dest, mode)?;
        }
        if meta.mtime() as u64 != mtime {
            set_mtime(dest, mtime)?;
        }
        if is_root && (meta.uid() as u64 != uid || meta.gid() as u64 != gid) {
            set_owner(dest, uid as u32, gid as u32)?;
        }
    }
    Ok(())
}

fn extract_symlink<R: Read>(entry: &mut tar::Entry<R>, dest: &Path) -> Result<(), Error> {
    let target = entry
    .link_name()
    .map_err(Error::Io)?
    .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::InvalidData, "symlink entry missing target")))?
    .into_owned();

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    if let Ok(existing) = fs::read_link(dest) {
        if existing == target {
            return Ok(());
        }
        fs::remove_file(dest).map_err(Error::Io)?;
    }
    std::os::unix::fs::symlink(&target, dest).map_err(Error::Io)
}

/// Conf-file three-way merge: resolves `orig`/`cur`/
/// `new` and carries out whichever [`conffile::Decision`] results,
/// emitting the matching [`ConfigFileAction`] event.
fn extract_conffile<R: Read>(
    entry: &mut tar::Entry<R>,
    dest: &Path,
    manifest_entry: &FileEntry,
    installed: Option<&PackageRecord>,
    version_suffix: &str,
    opts: &UnpackOptions,
    sink: &mut dyn EventSink,
) -> Result<(), Error> {
    let relpath = &manifest_entry.file;
    let is_symlink_conffile = entry.header().entry_type().is_symlink();

    if is_symlink_conffile {
        let new_target = entry
        .link_name()
        .map_err(Error::Io)?
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
        let orig_target = installed
        .and_then(|p| p.conf_files.iter().find(|e| &e.file == relpath))
        .and_then(|e| e.target.clone());
        let cur_target = fs::read_link(dest).ok().map(|p| p.to_string_lossy().into_owned());

        let decision = conffile::decide(
            orig_target.as_deref(),
            cur_target.as_deref(),
            &new_target,
            opts.keep_config,
        );
        return apply_conffile_decision(entry, dest, decision, relpath, version_suffix, sink, true);
    }

    let new_hash = manifest_entry.sha256.clone().unwrap_or_default();
    let orig_hash = installed
    .and_then(|p| p.conf_files.iter().find(|e| &e.file == relpath))
    .and_then(|e| e.sha256.clone());
    let cur_hash = if dest.is_file() { Sha256Digest::of_file(dest).ok().map(|h| h.to_hex()) } else { None };

    let decision = conffile::decide(orig_hash.as_deref(), cur_hash.as_deref(), &new_hash, opts.keep_config);
    apply_conffile_decision(entry, dest, decision, relpath, version_suffix, sink, false)
}

fn apply_conffile_decision<R: Read>(
    entry: &mut tar::Entry<R>,
    dest: &Path,
    decision: ConfFileDecision,
    relpath: &str,
    version_suffix: &str,
    sink: &mut dyn EventSink,
    is_symlink: bool,
) -> Result<(), Error> {
    match decision {
        ConfFileDecision::Skip => {
            sink.emit(Event::ConfigFile { path: relpath.to_owned(), action: ConfigFileAction::Kept });
            Ok(())
        }
        ConfFileDecision::KeepCurrent => {
            sink.emit(Event::ConfigFile { path: relpath.to_owned(), action: ConfigFileAction::Kept });
            Ok(())
        }
        ConfFileDecision::InstallNew => {
            if is_symlink {
                extract_symlink(entry, dest)?;
            } else {
                extract_regular_file(entry, dest, running_as_root())?;
            }
            sink.emit(Event::ConfigFile { path: relpath.to_owned(), action: ConfigFileAction::Installed });
            Ok(())
        }
        ConfFileDecision::InstallAsNew => {
            let new_path = new_suffixed_path(dest, version_suffix);
            if is_symlink {
                extract_symlink(entry, &new_path)?;
            } else {
                extract_regular_file(entry, &new_path, running_as_root())?;
            }
            sink.emit(Event::ConfigFile {
                    path: relpath.to_owned(),
                    action: ConfigFileAction::InstalledAsNew,
            });
            Ok(())
        }
    }
}

/// `<path>.new-<version>_<revision>`.
fn new_suffixed_path(dest: &Path, version_suffix: &str) -> PathBuf {
    let mut os = dest.as_os_str().to_owned();
    os.push(".new-");
    os.push(version_suffix);
    PathBuf::from(os)
}

fn set_mode(path: &Path, mode: u32) -> Result<(), Error> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(Error::Io)
}

fn set_mtime(path: &Path, mtime: u64) -> Result<(), Error> {
    let c_path = CString::new(path.as_os_str().as_bytes())
    .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    let spec = libc::timespec { tv_sec: mtime as libc::time_t, tv_nsec: 0 };
    let times = [spec, spec];
    // SAFETY: `c_path` is a valid NUL-terminated path and `times` holds two
    // well-formed `timespec`s as `utimensat(2)` expects.
    let rc = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), libc::AT_SYMLINK_NOFOLLOW) };
    if rc != 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(())
}

fn set_owner(path: &Path, uid: u32, gid: u32) -> Result<(), Error> {
    let c_path = CString::new(path.as_os_str().as_bytes())
    .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    // SAFETY: `c_path` is a valid NUL-terminated path; `lchown` leaves
    // symlinks themselves (rather than their targets) re-owned.
    let rc = unsafe { libc::lchown(c_path.as_ptr(), uid, gid) };
    if rc != 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
