//! Process spawning for `INSTALL`/`REMOVE` scripts: `commit` hands the
//! buffered script body and its invocation arguments to a [`ScriptRunner`]
//! a caller supplies, rather than `exec`-ing `/bin/sh` (optionally
//! chrooted) itself.

use std::path::Path;

use thiserror::Error;

use crate::error::{ErrorKind, Reason};

/// Which of the package archive's two script members is running, and at
/// which commit phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Install,
    Remove,
}

/// The fixed positional arguments "Pre-install script" gives:
/// `(action, pkgname, version, update?, cross?, arch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptAction {
    Pre,
    Post,
    Purge,
}

impl ScriptAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptAction::Pre => "pre",
            ScriptAction::Post => "post",
            ScriptAction::Purge => "purge",
        }
    }
}

/// The invocation a [`ScriptRunner`] receives for a single script run.
#[derive(Debug, Clone, Copy)]
pub struct ScriptArgs<'a> {
    pub kind: ScriptKind,
    pub action: ScriptAction,
    pub pkgname: &'a str,
    pub version: &'a str,
    pub update: bool,
    pub cross: bool,
    pub arch: &'a str,
}

#[derive(Debug, Error)]
#[error("script for '{pkgname}' ({action}) failed: {detail}")]
pub struct ScriptError {
    pub pkgname: String,
    pub action: &'static str,
    pub detail: String,
}

impl ErrorKind for ScriptError {
    fn kind(&self) -> Reason {
        Reason::Resource
    }
}

/// Runs a buffered `INSTALL`/`REMOVE` shell fragment inside `rootdir`,
/// chrooted there if running as uid 0 and `/bin/sh` exists in it.
/// Implementations decide how: direct exec, a chroot syscall, a container,
/// or a no-op for a caller that doesn't want script execution at all.
pub trait ScriptRunner {
    fn run(&mut self, rootdir: &Path, script: &[u8], args: ScriptArgs) -> Result<(), ScriptError>;
}

/// A [`ScriptRunner`] that runs nothing and reports success, for callers
/// who never want package scripts executed (e.g. `xpkg-dump`'s read-only
/// inspection path, or a sandboxed test harness).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScriptRunner;

impl ScriptRunner for NullScriptRunner {
    fn run(&mut self, _rootdir: &Path, _script: &[u8], _args: ScriptArgs) -> Result<(), ScriptError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "script.test.rs"]
mod test;
