//! Dependency pattern parsing and matching: plain names, dewey
//! version ranges, and `fnmatch`-style globs.

mod dewey;
mod glob;

use std::fmt;

use thiserror::Error;

use crate::error::{ErrorKind, Reason};
use crate::internal::macros::bail;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed dependency pattern: '{0}'")]
    MalformedPattern(String),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        Reason::Configuration
    }
}

/// A single dewey range constraint, e.g. the `>=1` in `foo>=1,<2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeweyOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for DeweyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeweyOp::Eq => "==",
            DeweyOp::Lt => "<",
            DeweyOp::Le => "<=",
            DeweyOp::Gt => ">",
            DeweyOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// A parsed dependency pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// A bare name: any version satisfies.
    Plain { name: String },
    /// A dewey version range, e.g. `foo>=1.2` or `foo>=1,<2`.
    Dewey {
        name: String,
        constraints: Vec<(DeweyOp, String)>,
    },
    /// A `fnmatch`-style glob over the full pkgver.
    Glob { name_hint: String, pattern: String },
}

impl Pattern {
    /// The package name this pattern is anchored to (the part before any
    /// version constraint or wildcard).
    pub fn name(&self) -> &str {
        match self {
            Pattern::Plain { name } => name,
            Pattern::Dewey { name,.. } => name,
            Pattern::Glob { name_hint,.. } => name_hint,
        }
    }
}

impl std::str::FromStr for Pattern {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        if let Some(idx) = pattern.find(['<', '>', '=']) {
            let name = pattern[..idx].to_owned();
            if name.is_empty() {
                bail!(Error::MalformedPattern(pattern.to_owned()));
            }
            let mut constraints = Vec::new();
            for part in pattern[idx..].split(',') {
                constraints.push(parse_constraint(part, pattern)?);
            }
            Ok(Pattern::Dewey { name, constraints })
        } else if pattern.contains(['*', '?', '[']) {
            let name_hint: String = pattern
            .chars()
            .take_while(|c| !"*?[".contains(*c))
            .collect();
            Ok(Pattern::Glob {
                    name_hint,
                    pattern: pattern.to_owned(),
            })
        } else {
            Ok(Pattern::Plain {
                    name: pattern.to_owned(),
            })
        }
    }
}

fn parse_constraint(part: &str, whole: &str) -> Result<(DeweyOp, String), Error> {
    let op_len = part
    .find(|c: char| !"<>=".contains(c))
    .ok_or_else(|| Error::MalformedPattern(whole.to_owned()))?;
    let (op_str, version) = part.split_at(op_len);
    if version.is_empty() {
        bail!(Error::MalformedPattern(whole.to_owned()));
    }
    let op = match op_str {
        "==" | "=" => DeweyOp::Eq,
        ">=" => DeweyOp::Ge,
        "<=" => DeweyOp::Le,
        ">" => DeweyOp::Gt,
        "<" => DeweyOp::Lt,
        _ => bail!(Error::MalformedPattern(whole.to_owned())),
    };
    Ok((op, version.to_owned()))
}

/// Splits a `pkgver` (`<pkgname>-<version>_<revision>`) into its name and
/// version-revision parts.
pub fn split_pkgver(pkgver: &str) -> Option<(&str, &str)> {
    for (idx, b) in pkgver.bytes().enumerate().rev() {
        if b == b'-' && looks_like_version_revision(&pkgver[idx + 1..]) {
            return Some((&pkgver[..idx], &pkgver[idx + 1..]));
        }
    }
    None
}

fn looks_like_version_revision(s: &str) -> bool {
    let Some((ver, rev)) = s.rsplit_once('_') else {
        return false;
    };
    if ver.is_empty() || rev.is_empty() || !rev.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    ver.split('.')
    .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_alphanumeric()))
}

/// Matches a full `pkgver` against a dependency pattern:
/// a fast-reject on the first two characters, then dewey/glob/exact
/// evaluation depending on the pattern's shape.
pub fn pkgpattern_match(pkgver: &str, pattern: &str) -> Result<bool, Error> {
    if fast_reject(pkgver, pattern) {
        return Ok(false);
    }

    match pattern.parse::<Pattern>()? {
        Pattern::Plain { name } => Ok(split_pkgver(pkgver).map(|(n, _)| n) == Some(name.as_str())),
        Pattern::Dewey { name, constraints } => {
            let Some((pkg_name, version_revision)) = split_pkgver(pkgver) else {
                return Ok(false);
            };
            if pkg_name != name {
                return Ok(false);
            }
            let (ver, rev) = dewey::split_version_revision(version_revision);
            for (op, cver) in &constraints {
                let (cver_part, crev) = dewey::split_version_revision(cver);
                let has_rev = cver_part.len() != cver.len();
                let cmp = dewey::compare_full(ver, rev, cver_part, has_rev.then_some(crev));
                let ok = match op {
                    DeweyOp::Eq => cmp == std::cmp::Ordering::Equal,
                    DeweyOp::Ge => cmp != std::cmp::Ordering::Less,
                    DeweyOp::Le => cmp != std::cmp::Ordering::Greater,
                    DeweyOp::Gt => cmp == std::cmp::Ordering::Greater,
                    DeweyOp::Lt => cmp == std::cmp::Ordering::Less,
                };
                if !ok {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Pattern::Glob { pattern,.. } => Ok(glob::fnmatch(&pattern, pkgver)),
    }
}

/// Compares two full `pkgver` strings by dewey order (ignoring any name
/// prefix difference): used wherever "is this version newer" matters
/// outside of pattern matching, e.g. repository pool best-matching and
/// the resolver's update check.
pub fn compare_pkgver(a: &str, b: &str) -> std::cmp::Ordering {
    let (a_ver, a_rev) = dewey::split_version_revision(split_pkgver(a).map(|(_, vr)| vr).unwrap_or(a));
    let (b_ver, b_rev) = dewey::split_version_revision(split_pkgver(b).map(|(_, vr)| vr).unwrap_or(b));
    dewey::compare_full(a_ver, a_rev, b_ver, Some(b_rev))
}

/// Matches a pattern against any entry of a `provides` list: true if any entry matches.
pub fn virtualpkg_match<'a>(
    provides: impl IntoIterator<Item = &'a str>,
    pattern: &str,
) -> Result<bool, Error> {
    for vpkg in provides {
        if pkgpattern_match(vpkg, pattern)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Exposes the `fnmatch`-style glob matcher to callers outside dependency
/// pattern matching, e.g. `preserve`/`noextract` config globs.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    glob::fnmatch(pattern, text)
}

fn fast_reject(pkgver: &str, pattern: &str) -> bool {
    let (p0, p1) = (pattern.as_bytes().first(), pattern.as_bytes().get(1));
    let (k0, k1) = (pkgver.as_bytes().first(), pkgver.as_bytes().get(1));
    match (p0, p1, k0, k1) {
        (Some(p0), Some(p1), Some(k0), Some(k1)) => {
            p0.is_ascii_alphanumeric()
            && k0.is_ascii_alphanumeric()
            && p1.is_ascii_alphanumeric()
            && k1.is_ascii_alphanumeric()
            && (p0 != k0 || p1 != k1)
        }
        _ => false,
    }
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod test;
