//! The orchestrator: `commit` runs a [`PreparedTransaction`]
//! to completion — fetch, verify, scripts, unpack, register, configure —
//! plus [`Handle`], the process-wide state it shares across a session.
//!
//! `commit` itself holds no mutation logic of its own; it only sequences
//! calls into `pkgdb::Pkgdb`, `unpack` and `alternatives` in order, re-running
//! file-conflict detection once each archive's real manifest is fetched
//! since a repository index alone can't carry that.

pub mod fetch;
pub mod script;

pub use fetch::{FetchResult, Fetcher, LocalFetcher};
pub use script::{NullScriptRunner, ScriptAction, ScriptArgs, ScriptKind, ScriptRunner};

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::alternatives;
use crate::config::Config;
use crate::crypto::base64_decode;
use crate::crypto::minisign::Minisig;
use crate::error::{ErrorKind, Reason};
use crate::event::{Event, EventSink};
use crate::pkgdb::{PackageRecord, Pkgdb, State, TransactionAction, TransactionEntry};
use crate::primitives::hash::{blake2b512_of_file, hashes_equal, Sha256Digest};
use crate::repository::{KeyStore, RepositoryPool};
use crate::transaction::{checks, PreparedTransaction};
use crate::unpack::{self, UnpackOptions};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Pkgdb(#[from] crate::pkgdb::Error),
    #[error(transparent)]
    Config(#[from] crate::config::Error),
    #[error(transparent)]
    Repository(#[from] crate::repository::Error),
    #[error(transparent)]
    Transaction(#[from] crate::transaction::Error),
    #[error(transparent)]
    Unpack(#[from] unpack::Error),
    #[error(transparent)]
    Alternatives(#[from] alternatives::Error),
    #[error(transparent)]
    Fetch(#[from] fetch::Error),
    #[error(transparent)]
    Script(#[from] script::ScriptError),
    #[error(transparent)]
    Crypto(#[from] crate::crypto::Error),
    #[error("I/O error on '{0}'")]
    Io(PathBuf, #[source] io::Error),
    #[error("'{0}' failed SHA-256 or signature verification")]
    VerifyFailed(String),
    #[error("no cached/verified archive available for '{0}'")]
    ArchiveNotFound(String),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Pkgdb(e) => e.kind(),
            Error::Config(e) => e.kind(),
            Error::Repository(e) => e.kind(),
            Error::Transaction(e) => e.kind(),
            Error::Unpack(e) => e.kind(),
            Error::Alternatives(e) => e.kind(),
            Error::Fetch(e) => e.kind(),
            Error::Script(e) => e.kind(),
            Error::Crypto(e) => e.kind(),
            Error::Io(..) => Reason::Resource,
            Error::VerifyFailed(_) => Reason::Integrity,
            Error::ArchiveNotFound(_) => Reason::NotFound,
        }
    }
}

/// Process-wide state a resolve/prepare/commit session shares: configuration, paths, the lazily-locked pkgdb,
/// and the trusted-key store. No mmap'd-region caching — this crate reads
/// everything synchronously into memory, so there's nothing to cache.
pub struct Handle {
    pub rootdir: PathBuf,
    pub metadir: PathBuf,
    pub cachedir: PathBuf,
    pub architecture: String,
    pub config: Config,
    pub keystore: KeyStore,
    pkgdb: Option<Pkgdb>,
}

impl Handle {
    /// Populates paths, reads configuration files, and resolves the target
    /// architecture. Does not lock the pkgdb; that happens lazily on first
    /// call to [`Handle::pkgdb`].
    pub fn init(rootdir: impl Into<PathBuf>, native_arch: &str) -> Result<Self, Error> {
        let rootdir = rootdir.into();
        let config = Config::load(&rootdir)?;
        let architecture = config.target_architecture(native_arch);
        let metadir = rootdir.join("var/db/xbps");
        let cachedir = config.cachedir.clone().unwrap_or_else(|| rootdir.join("var/cache/xbps"));
        let keystore = KeyStore::open(metadir.join("keys"));
        Ok(Handle { rootdir, metadir, cachedir, architecture, config, keystore, pkgdb: None })
    }

    /// Locks and loads the pkgdb on first access, reusing it afterwards.
    pub fn pkgdb(&mut self) -> Result<&mut Pkgdb, Error> {
        if self.pkgdb.is_none() {
            self.pkgdb = Some(Pkgdb::lock(&self.metadir)?);
        }
        Ok(self.pkgdb.as_mut().expect("just populated"))
    }

    /// Opens every configured repository in order via `fetcher`.
    pub fn open_repositories(
        &self,
        fetcher: &mut dyn Fetcher,
        sink: &mut dyn EventSink,
        use_stage: bool,
        verify_meta: bool,
    ) -> Result<RepositoryPool, Error> {
        let mut repos = Vec::with_capacity(self.config.repositories.len());
        for url in &self.config.repositories {
            let repo =
            fetch::open_repository(fetcher, &self.keystore, sink, url, &self.architecture, use_stage, verify_meta)?;
            repos.push(repo);
        }
        Ok(RepositoryPool::new(repos, self.config.match_mode()))
    }

    /// Releases the pkgdb reference, flushing any pending writes.
    pub fn end(&mut self) -> Result<(), Error> {
        if let Some(mut pkgdb) = self.pkgdb.take() {
            pkgdb.update(true, false)?;
        }
        Ok(())
    }
}

/// Per-commit flags a caller (a CLI front-end, typically) sets directly
/// rather than reading from `config`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    pub download_only: bool,
    pub force_overwrite: bool,
    pub force_remove_files: bool,
    pub keep_config: bool,
}

/// Runs a [`PreparedTransaction`] to completion. Failures roll
/// forward: once the unpack loop has mutated the pkgdb for any package, the
/// pkgdb is still flushed for whatever already completed rather than rolled
/// back, so a retried `commit` can pick up where this one left off.
pub fn commit(
    handle: &mut Handle,
    rpool: &RepositoryPool,
    mut prepared: PreparedTransaction,
    fetcher: &mut dyn Fetcher,
    scripts: &mut dyn ScriptRunner,
    sink: &mut dyn EventSink,
    opts: CommitOptions,
) -> Result<(), Error> {
    let rootdir = handle.rootdir.clone();
    let metadir = handle.metadir.clone();
    let cachedir = handle.cachedir.clone();
    let architecture = handle.architecture.clone();
    let noextract = handle.config.noextract.clone();
    let preserve = handle.config.preserve.clone();

    for entry in &prepared.entries {
        sink.emit(Event::TransAddPkg { pkgver: entry.pkg.pkgver.clone(), action: entry.action });
    }

    // Fetch (remote) and verify (local, cached, or freshly fetched) every
    // archive this transaction will unpack.
    let mut archive_paths: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in &prepared.entries {
        if !entry.action.unpacks() {
            continue;
        }
        let path = fetch_and_verify(&cachedir, rpool, entry, fetcher, sink)?;
        archive_paths.insert(entry.name().to_owned(), path);
    }

    // Download-only stops before anything is unpacked.
    if opts.download_only {
        return Ok(());
    }

    // Final file-collection pass against the real archive manifests, now
    // that every archive is fetched and verified.
    reattach_manifests(&mut prepared.entries, &archive_paths)?;
    {
        let pkgdb = handle.pkgdb()?;
        prepared.obsolete_files =
        checks::check_file_conflicts(&prepared.entries, pkgdb, &rootdir, &preserve, opts.force_overwrite, opts.force_remove_files)?;
    }

    // Snapshot installed records for update/remove actions before the
    // unpack loop starts mutating the pkgdb; both the script phase and
    // alternatives unregistration need the pre-transaction record.
    let mut installed_before: BTreeMap<String, PackageRecord> = BTreeMap::new();
    {
        let pkgdb = handle.pkgdb()?;
        for entry in &prepared.entries {
            if entry.action.removes() {
                if let Some(old) = pkgdb.get_pkg(entry.name())?.cloned() {
                    installed_before.insert(entry.name().to_owned(), old);
                }
            }
        }
    }

    // Pre-install/pre-remove scripts.
    for entry in &prepared.entries {
        let update = entry.action == TransactionAction::Update;
        if entry.action.removes() {
            if let Some(old) = installed_before.get(entry.name()) {
                run_script(scripts, &rootdir, &architecture, old, ScriptKind::Remove, ScriptAction::Pre, update)?;
            }
        }
        if entry.action.unpacks() {
            run_script(scripts, &rootdir, &architecture, &entry.pkg, ScriptKind::Install, ScriptAction::Pre, update)?;
        }
    }

    // Unpack phase, in sorted order.
    let mut freshly_unpacked: BTreeMap<String, PackageRecord> = BTreeMap::new();
    for entry in &prepared.entries {
        match entry.action {
            TransactionAction::Remove => {
                let pkgdb = handle.pkgdb()?;
                if let Some(old) = installed_before.get(entry.name()) {
                    alternatives::unregister(&rootdir, pkgdb, old, false, sink)?;
                }
                if let Some(paths) = prepared.obsolete_files.get(entry.name()) {
                    unpack::remove_paths(&rootdir, paths, entry.name(), sink);
                }
                unpack::remove_manifest(&metadir, entry.name()).map_err(|e| Error::Io(metadir.clone(), e))?;
                pkgdb.remove_pkg(entry.name());
            }
            TransactionAction::Update => {
                {
                    let pkgdb = handle.pkgdb()?;
                    if let Some(old) = installed_before.get(entry.name()) {
                        alternatives::unregister(&rootdir, pkgdb, old, true, sink)?;
                    }
                }
                let record = do_unpack(
                    handle, &rootdir, &metadir, &noextract, &preserve, entry, &installed_before,
                    &prepared.obsolete_files, &archive_paths, opts, sink,
                )?;
                freshly_unpacked.insert(entry.name().to_owned(), record);
            }
            TransactionAction::Install | TransactionAction::Reinstall => {
                let record = do_unpack(
                    handle, &rootdir, &metadir, &noextract, &preserve, entry, &installed_before,
                    &prepared.obsolete_files, &archive_paths, opts, sink,
                )?;
                freshly_unpacked.insert(entry.name().to_owned(), record);
            }
            TransactionAction::Configure | TransactionAction::Hold | TransactionAction::Download => {}
        }
    }

    // Register phase. Transient per-transaction fields (`download`,
    // `transaction`,...) never existed on `PackageRecord` to begin with, so
    // there's nothing to clear here beyond what's set below.
    let install_date = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs().to_string();
    for record in freshly_unpacked.values_mut() {
        record.install_date = Some(install_date.clone());
        let manifest_path = metadir.join(format!(".{}-files.plist", record.name()));
        if manifest_path.exists() {
            let digest = Sha256Digest::of_file(&manifest_path).map_err(|e| Error::Io(manifest_path.clone(), e))?;
            record.metafile_sha256 = Some(digest.to_hex());
        }
    }
    {
        let pkgdb = handle.pkgdb()?;
        for record in freshly_unpacked.values() {
            pkgdb.set_pkg(record.clone());
        }
    }

    // Flush the pkgdb so the register phase above is durable before
    // scripts and configure run against it.
    handle.pkgdb()?.update(true, false)?;

    // Remove-script post/purge, for every package whose remove-script ran
    // in the pre-script phase above.
    for (name, old) in &installed_before {
        let update = freshly_unpacked.contains_key(name);
        run_script(scripts, &rootdir, &architecture, old, ScriptKind::Remove, ScriptAction::Post, update)?;
        run_script(scripts, &rootdir, &architecture, old, ScriptKind::Remove, ScriptAction::Purge, update)?;
    }

    // Configure phase.
    for entry in &prepared.entries {
        if !matches!(
            entry.action,
            TransactionAction::Install | TransactionAction::Reinstall | TransactionAction::Update | TransactionAction::Configure
        ) {
            continue;
        }
        let mut record = match entry.action {
            TransactionAction::Configure => entry.pkg.clone(),
            _ => freshly_unpacked
            .get(entry.name())
            .cloned()
            .ok_or_else(|| Error::ArchiveNotFound(entry.pkg.pkgver.clone()))?,
        };

        let update = entry.action == TransactionAction::Update;
        run_script(scripts, &rootdir, &architecture, &record, ScriptKind::Install, ScriptAction::Post, update)?;

        record.state = State::Installed;
        if let Some(message) = record.install_msg.clone() {
            sink.emit(Event::ShowInstallMsg { pkgname: record.name().to_owned(), message });
        }
        handle.pkgdb()?.set_pkg(record);
    }

    // Flush again to persist the configure-phase state transitions.
    handle.pkgdb()?.update(true, false)?;

    Ok(())
}

/// The cache-relative or local-repository path a package archive and its
/// detached signature live at.
fn archive_paths(cachedir: &Path, repo_url: &str, pkgver: &str, arch: &str) -> (PathBuf, PathBuf) {
    if fetch::is_remote(repo_url) {
        (fetch::cached_archive_path(cachedir, pkgver, arch), fetch::cached_signature_path(cachedir, pkgver, arch))
    } else {
        let base = Path::new(repo_url);
        (base.join(format!("{pkgver}.{arch}.xbps")), base.join(format!("{pkgver}.{arch}.xbps.sig")))
    }
}

/// Fetches a remote archive for a single package
/// (or trusts what's already on disk for a local repository or a cache
/// hit), then verifies its SHA-256 and signature. On any verification
/// failure both files are removed so a retry re-fetches cleanly.
fn fetch_and_verify(
    cachedir: &Path,
    rpool: &RepositoryPool,
    entry: &TransactionEntry,
    fetcher: &mut dyn Fetcher,
    sink: &mut dyn EventSink,
) -> Result<PathBuf, Error> {
    let pkgver = entry.pkg.pkgver.clone();
    let arch = entry.pkg.architecture.clone();
    let repo_url = entry.repository.clone().ok_or_else(|| Error::ArchiveNotFound(pkgver.clone()))?;
    let (archive_path, sig_path) = archive_paths(cachedir, &repo_url, &pkgver, &arch);

    if fetch::is_remote(&repo_url) {
        sink.emit(Event::FetchStart { pkgver: pkgver.clone(), url: repo_url.clone() });
        let base = repo_url.trim_end_matches('/');
        let archive_url = format!("{base}/{pkgver}.{arch}.xbps");
        let sig_url = format!("{archive_url}.sig");
        let cached_hash = entry.pkg.filename_sha256.as_deref();

        match fetcher.fetch(&sig_url, cached_hash).map_err(|e| fetch::Error::Fetch(sig_url.clone(), e))? {
            FetchResult::Fresh(bytes) => write_cached(&sig_path, &bytes)?,
            FetchResult::NotModified => {}
        }
        match fetcher.fetch(&archive_url, cached_hash).map_err(|e| fetch::Error::Fetch(archive_url.clone(), e))? {
            FetchResult::Fresh(bytes) => write_cached(&archive_path, &bytes)?,
            FetchResult::NotModified => {}
        }
        sink.emit(Event::FetchEnd { pkgver: pkgver.clone() });
    }

    if let Err(e) = verify_archive(rpool, &repo_url, &archive_path, &sig_path, &entry.pkg) {
        let _ = fs::remove_file(&archive_path);
        let _ = fs::remove_file(&sig_path);
        sink.emit(Event::VerifyFail { pkgver: pkgver.clone(), reason: e.to_string() });
        return Err(e);
    }
    sink.emit(Event::Verify { pkgver });
    Ok(archive_path)
}

fn write_cached(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Io(parent.to_path_buf(), e))?;
    }
    fs::write(path, bytes).map_err(|e| Error::Io(path.to_path_buf(), e))
}

/// Verifies a fetched archive: SHA-256 against the repo-recorded `filename-sha256`,
/// then signature verification against the originating repository's
/// embedded public key — already trusted, since opening the repository
/// verified its own metadata signature.
fn verify_archive(
    rpool: &RepositoryPool,
    repo_url: &str,
    archive_path: &Path,
    sig_path: &Path,
    pkg: &PackageRecord,
) -> Result<(), Error> {
    if let Some(expected_hex) = &pkg.filename_sha256 {
        let expected = Sha256Digest::from_hex(expected_hex).ok_or_else(|| Error::VerifyFailed(pkg.pkgver.clone()))?;
        let actual = Sha256Digest::of_file(archive_path).map_err(|e| Error::Io(archive_path.to_path_buf(), e))?;
        if !hashes_equal(actual.as_bytes(), expected.as_bytes()) {
            return Err(Error::VerifyFailed(pkg.pkgver.clone()));
        }
    }

    if sig_path.exists() {
        let repo = rpool.repos.iter().find(|r| r.url == repo_url).ok_or_else(|| Error::ArchiveNotFound(pkg.pkgver.clone()))?;
        if let Some(pubkey) = repo.meta.decode_public_key()? {
            let sig_text = fs::read_to_string(sig_path).map_err(|e| Error::Io(sig_path.to_path_buf(), e))?;
            let minisig = Minisig::decode(&sig_text).map_err(Error::Crypto)?;
            let hash = blake2b512_of_file(archive_path).map_err(|e| Error::Io(archive_path.to_path_buf(), e))?;
            minisig.verify(&pubkey, &hash).map_err(Error::Crypto)?;
        }
    }

    Ok(())
}

/// Re-reads each staged package's real `files.plist`/`conf_files.plist`/etc.
/// off its verified archive, replacing the thin
/// manifest a repository index carries.
fn reattach_manifests(entries: &mut [TransactionEntry], archive_paths: &BTreeMap<String, PathBuf>) -> Result<(), Error> {
    for entry in entries.iter_mut() {
        if !entry.action.unpacks() {
            continue;
        }
        let Some(path) = archive_paths.get(entry.name()) else { continue };
        let file = File::open(path).map_err(|e| Error::Io(path.clone(), e))?;
        let wrapped = unpack::codec::wrap(io::BufReader::new(file)).map_err(|e| Error::Unpack(unpack::Error::from(e)))?;
        let mut archive = tar::Archive::new(wrapped);
        let header = unpack::read_header(&mut archive)?;
        entry.pkg.files = header.manifest.files;
        entry.pkg.conf_files = header.manifest.conf_files;
        entry.pkg.links = header.manifest.links;
        entry.pkg.dirs = header.manifest.dirs;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn do_unpack(
    handle: &mut Handle,
    rootdir: &Path,
    metadir: &Path,
    noextract: &[String],
    preserve: &[String],
    entry: &TransactionEntry,
    installed_before: &BTreeMap<String, PackageRecord>,
    obsolete_files: &BTreeMap<String, Vec<String>>,
    archive_paths: &BTreeMap<String, PathBuf>,
    opts: CommitOptions,
    sink: &mut dyn EventSink,
) -> Result<PackageRecord, Error> {
    let path = archive_paths.get(entry.name()).ok_or_else(|| Error::ArchiveNotFound(entry.pkg.pkgver.clone()))?;
    let file = File::open(path).map_err(|e| Error::Io(path.clone(), e))?;
    let unpack_opts = UnpackOptions {
        rootdir,
        noextract_globs: noextract,
        preserve_globs: preserve,
        keep_config: opts.keep_config,
        force_remove_files: opts.force_remove_files,
    };
    let no_obsoletes: Vec<String> = Vec::new();
    let obsolete = obsolete_files.get(entry.name()).unwrap_or(&no_obsoletes);
    let installed = installed_before.get(entry.name());

    let mut record = match unpack::unpack(file, &entry.pkg.pkgver, installed, obsolete, entry.name(), &unpack_opts, sink) {
        Ok(record) => record,
        Err(e) => {
            sink.emit(Event::UnpackFail { pkgver: entry.pkg.pkgver.clone(), reason: e.to_string() });
            return Err(Error::Unpack(e));
        }
    };
    record.repository = entry.repository.clone();

    unpack::externalize_manifest(metadir, &record)?;

    let pkgdb = handle.pkgdb()?;
    alternatives::register(rootdir, pkgdb, &record, sink)?;

    Ok(record)
}

/// Runs `pkg`'s install/remove script at `action`, if the archive carried
/// one. A no-op when
/// the package has no such script.
fn run_script(
    scripts: &mut dyn ScriptRunner,
    rootdir: &Path,
    architecture: &str,
    pkg: &PackageRecord,
    kind: ScriptKind,
    action: ScriptAction,
    update: bool,
) -> Result<(), Error> {
    let script_b64 = match kind {
        ScriptKind::Install => &pkg.install_script,
        ScriptKind::Remove => &pkg.remove_script,
    };
    let Some(b64) = script_b64 else { return Ok(()) };
    let body = base64_decode(b64).map_err(Error::Crypto)?;
    let (version, revision) = pkg.version_revision();
    let version_revision = format!("{version}_{revision}");
    let args = ScriptArgs {
        kind,
        action,
        pkgname: pkg.name(),
        version: &version_revision,
        update,
        cross: false,
        arch: architecture,
    };
    scripts.run(rootdir, &body, args).map_err(Error::Script)
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
