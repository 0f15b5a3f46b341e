//! The abstract error taxonomy shared by every module.
//!
//! Each module defines its own `thiserror`-derived `Error` enum local to its
//! own concerns (`pkgdb::Error`, `unpack::Error`,...). [`Reason`] is the
//! cross-cutting classification layered on top of all of them, standing in
//! for the POSIX errno categories without hard-coding `libc` errno values
//! into business logic.

/// The errno-like category of an error, recoverable without matching every
/// concrete variant of every module's `Error` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Requested package, file, or key absent. (`ENOENT`)
    NotFound,
    /// Would violate an invariant: file collision, self-update required, etc.
    /// (`EEXIST`, `EAGAIN`)
    Conflict,
    /// Hash or signature verification failed. (`ERANGE`, `EPERM`)
    Integrity,
    /// Out of memory, no disk space, buffer too small. (`ENOMEM`, `ENOSPC`,
    /// `ENOBUFS`)
    Resource,
    /// Unsupported algorithm or malformed data. (`ENOTSUP`, `EINVAL`)
    Configuration,
    /// pkgdb lock held by another writer, or a self-update is required
    /// before proceeding. (`EBUSY`)
    Busy,
    /// Dependency recursion exceeded the depth limit. (`ELOOP`)
    Cycle,
}

/// Implemented by every module's `Error` enum so callers can ask for the
/// abstract category without a giant match over concrete variants.
pub trait ErrorKind {
    fn kind(&self) -> Reason;
}
