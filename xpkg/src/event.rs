//! Progress and notification events: a typed enum and an `EventSink`
//! trait a caller implements to observe a transaction as it runs, in place
//! of a printf-style progress callback.

use crate::pkgdb::TransactionAction;

/// A single observable occurrence during fetch, verify, unpack, or commit.
/// Every variant that used to be a distinct callback invocation becomes one
/// enum arm here.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    FetchStart {
        pkgver: String,
        url: String,
    },
    FetchUpdate {
        pkgver: String,
        fetched: u64,
        total: u64,
    },
    FetchEnd {
        pkgver: String,
    },
    Verify {
        pkgver: String,
    },
    VerifyFail {
        pkgver: String,
        reason: String,
    },
    UnpackFail {
        pkgver: String,
        reason: String,
    },
    RemoveFile {
        path: String,
        pkgname: String,
    },
    RemoveFileFail {
        path: String,
        pkgname: String,
        reason: String,
    },
    AltGroupAdded {
        group: String,
        pkgname: String,
    },
    AltGroupSwitched {
        group: String,
        from: String,
        to: String,
    },
    ConfigFile {
        path: String,
        action: ConfigFileAction,
    },
    ShowInstallMsg {
        pkgname: String,
        message: String,
    },
    TransAddPkg {
        pkgver: String,
        action: TransactionAction,
    },
}

/// What happened to a `conf_files` entry during unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFileAction {
    Kept,
    Installed,
    InstalledAsNew,
}

/// Observes the events a transaction or unpack emits, and arbitrates
/// first-seen repository key imports.
///
/// Implementations that don't care about most events can override just
/// [`EventSink::emit`] and fall back to the default, always-reject
/// [`EventSink::repo_key_import`].
pub trait EventSink {
    fn emit(&mut self, event: Event);

    /// Whether to trust a repository's public key the first time it's
    /// seen. The default is conservative: reject every import.
    fn repo_key_import(&mut self, fingerprint: &str, signature_by: &str) -> bool {
        let _ = (fingerprint, signature_by);
        false
    }
}

/// The default sink: every event becomes a structured `tracing` record.
/// Key imports are still rejected by default; a caller that wants
/// interactive prompting should wrap or replace this sink, not subclass it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&mut self, event: Event) {
        match event {
            Event::FetchStart { pkgver, url } => {
                tracing::info!(pkgver, url, "fetch start");
            }
            Event::FetchUpdate { pkgver, fetched, total } => {
                tracing::debug!(pkgver, fetched, total, "fetch progress");
            }
            Event::FetchEnd { pkgver } => {
                tracing::info!(pkgver, "fetch end");
            }
            Event::Verify { pkgver } => {
                tracing::debug!(pkgver, "verify");
            }
            Event::VerifyFail { pkgver, reason } => {
                tracing::error!(pkgver, reason, "verify failed");
            }
            Event::UnpackFail { pkgver, reason } => {
                tracing::error!(pkgver, reason, "unpack failed");
            }
            Event::RemoveFile { path, pkgname } => {
                tracing::debug!(path, pkgname, "remove file");
            }
            Event::RemoveFileFail { path, pkgname, reason } => {
                tracing::warn!(path, pkgname, reason, "failed to remove file");
            }
            Event::AltGroupAdded { group, pkgname } => {
                tracing::debug!(group, pkgname, "alternatives group added");
            }
            Event::AltGroupSwitched { group, from, to } => {
                tracing::info!(group, from, to, "alternatives group switched");
            }
            Event::ConfigFile { path, action } => {
                tracing::info!(path, action = ?action, "configuration file");
            }
            Event::ShowInstallMsg { pkgname, message } => {
                tracing::info!(pkgname, "{message}");
            }
            Event::TransAddPkg { pkgver, action } => {
                tracing::info!(pkgver, action = ?action, "transaction entry");
            }
        }
    }

    fn repo_key_import(&mut self, fingerprint: &str, signature_by: &str) -> bool {
        tracing::warn!(fingerprint, signature_by, "rejecting unseen repository key by default");
        false
    }
}

#[cfg(test)]
#[path = "event.test.rs"]
mod test;
