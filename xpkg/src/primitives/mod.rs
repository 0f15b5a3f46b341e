//! Leaf-level building blocks used by every other module: path cleaning,
//! atomic file writes, advisory file locking, and file hashing.

pub mod atomic_file;
pub mod hash;
pub mod lock;
pub mod path;

pub use atomic_file::AtomicFile;
pub use hash::{hashes_equal, Sha256Digest};
pub use lock::{LockError, PkgdbLock, RepoLock};
