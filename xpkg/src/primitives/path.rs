//! Path cleaning, joining and relativization.
//!
//! `libc`'s path helpers work against a caller-supplied fixed buffer and
//! return `ENOBUFS` on overflow. `String`/`PathBuf` grow as needed, so
//! nothing here can overflow a buffer, but the same ceiling is kept as a
//! sanity bound (`MAX_PATH`, mirroring `PATH_MAX`) so a pathologically deep
//! tree still fails loudly instead of growing without bound.

use thiserror::Error;

/// Mirrors POSIX `PATH_MAX`. Exceeding it maps to [`crate::Reason::Resource`],
/// the `ENOBUFS` counterpart.
pub const MAX_PATH: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path exceeds {MAX_PATH} bytes")]
    TooLong,
}

impl crate::error::ErrorKind for PathError {
    fn kind(&self) -> crate::Reason {
        crate::Reason::Resource
    }
}

/// Normalizes `.`, `..` and redundant slashes out of `path`, preserving a
/// leading `/` if present. Idempotent: `clean(clean(p)) == clean(p)`.
pub fn clean(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();

    for seg in path.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                if out.last().map(|s| *s != "..").unwrap_or(false) {
                    out.pop();
                } else if !absolute {
                    out.push("..");
                }
            }
            seg => out.push(seg),
        }
    }

    let joined = out.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

/// Concatenates `dst` with `segments`, inserting at most one `/` between
/// each part, and cleans the result. Fails with [`PathError::TooLong`] if
/// the result would exceed [`MAX_PATH`].
pub fn join<S: AsRef<str>>(dst: &str, segments: &[S]) -> Result<String, PathError> {
    let mut buf = String::from(dst);
    for seg in segments {
        if !buf.ends_with('/') && !seg.as_ref().starts_with('/') {
            buf.push('/');
        }
        buf.push_str(seg.as_ref());
    }
    let cleaned = clean(&buf);
    if cleaned.len() > MAX_PATH {
        return Err(PathError::TooLong);
    }
    Ok(cleaned)
}

/// Computes the shortest relative path from directory `from` to `to`, using
/// `..` walks. Both inputs are cleaned first.
pub fn relative(from: &str, to: &str) -> String {
    let from = clean(from);
    let to = clean(to);

    let from_segs: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let to_segs: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_segs
    .iter()
    .zip(to_segs.iter())
    .take_while(|(a, b)| a == b)
    .count();

    let ups = from_segs.len() - common;
    let mut parts: Vec<&str> = std::iter::repeat("..").take(ups).collect();
    parts.extend(to_segs[common..].iter().copied());

    if parts.is_empty() {
        ".".to_owned()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
#[path = "path.test.rs"]
mod test;
