//! Configuration file parsing: a small hand-rolled `key=value`
//! line parser, deliberately trivial and out of scope for a general-purpose
//! parser, the same spirit as `package::pkginfo`'s hand-parsed `.PKGINFO`
//! key-value format, rather than pulling in a generic config crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{ErrorKind, Reason};
use crate::matcher;
use crate::repository::MatchMode;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error reading '{0}'")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("{0}:{1}: missing '=' in '{2}'")]
    Syntax(PathBuf, usize, String),
    #[error("{0}:{1}: unrecognized key '{2}'")]
    UnknownKey(PathBuf, usize, String),
    #[error("{0}:{1}: malformed virtualpkg pair '{2}', expected '<vpkg>:<provider>'")]
    MalformedVirtualpkg(PathBuf, usize, String),
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Io(..) => Reason::Resource,
            Error::Syntax(..) | Error::UnknownKey(..) | Error::MalformedVirtualpkg(..) => {
                Reason::Configuration
            }
        }
    }
}

/// The parsed union of every `R/etc/xbps.d/*.conf` and
/// `R/usr/share/xbps.d/*.conf` file. Later files (and later
/// lines within a file) win for single-valued keys; list-valued keys
/// (`ignorepkg`, `noextract`, `preserve`, `repository`) accumulate in
/// file/line order.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub architecture: Option<String>,
    pub bestmatching: bool,
    pub cachedir: Option<PathBuf>,
    pub ignorepkg: Vec<String>,
    pub noextract: Vec<String>,
    pub preserve: Vec<String>,
    pub repositories: Vec<String>,
    pub rootdir: Option<PathBuf>,
    pub syslog: bool,
    /// `<vpkg>:<provider>` pairs, overriding repository `provides` entries.
    pub virtualpkg: BTreeMap<String, String>,
}

impl Config {
    /// Loads every `*.conf` file under `R/usr/share/xbps.d/` (packaged
    /// defaults) then `R/etc/xbps.d/` (local overrides), each directory's
    /// files in lexical order.
    pub fn load(rootdir: &Path) -> Result<Self, Error> {
        let mut config = Config::default();
        for dir in [rootdir.join("usr/share/xbps.d"), rootdir.join("etc/xbps.d")] {
            let mut files = glob_dir(&dir, "*.conf");
            files.sort();
            for file in files {
                config.load_file(&file)?;
            }
        }
        Ok(config)
    }

    /// Parses a single config file into `self`, recursing into `include`
    /// globs at most one level deep.
    pub fn load_file(&mut self, path: &Path) -> Result<(), Error> {
        self.load_file_at_depth(path, 0)
    }

    fn load_file_at_depth(&mut self, path: &Path, depth: u32) -> Result<(), Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        let mut includes: Vec<String> = Vec::new();

        for (lineno, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
            .split_once('=')
            .ok_or_else(|| Error::Syntax(path.to_path_buf(), lineno + 1, line.to_owned()))?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "architecture" => self.architecture = Some(value.to_owned()),
                "bestmatching" => self.bestmatching = parse_bool(value),
                "cachedir" => self.cachedir = Some(PathBuf::from(value)),
                "ignorepkg" => self.ignorepkg.push(value.to_owned()),
                "include" => includes.push(value.to_owned()),
                "noextract" => self.noextract.push(value.to_owned()),
                "preserve" => self.preserve.push(value.to_owned()),
                "repository" => self.repositories.push(value.to_owned()),
                "rootdir" => self.rootdir = Some(PathBuf::from(value)),
                "syslog" => self.syslog = parse_bool(value),
                "virtualpkg" => {
                    let (vpkg, provider) = value.split_once(':').ok_or_else(|| {
                            Error::MalformedVirtualpkg(path.to_path_buf(), lineno + 1, value.to_owned())
                    })?;
                    self.virtualpkg.insert(vpkg.to_owned(), provider.to_owned());
                }
                _ => return Err(Error::UnknownKey(path.to_path_buf(), lineno + 1, key.to_owned())),
            }
        }

        if depth == 0 {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            for pattern in includes {
                let (dir, file_pattern) = resolve_glob(base, &pattern);
                let mut matches = glob_dir(&dir, &file_pattern);
                matches.sort();
                for include_path in matches {
                    self.load_file_at_depth(&include_path, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    pub fn match_mode(&self) -> MatchMode {
        if self.bestmatching {
            MatchMode::BestMatching
        } else {
            MatchMode::FirstHit
        }
    }

    /// Resolves the target architecture: `XBPS_TARGET_ARCH` overrides the
    /// configured `architecture`, which overrides `native_arch`.
    pub fn target_architecture(&self, native_arch: &str) -> String {
        std::env::var("XBPS_TARGET_ARCH")
        .ok()
        .or_else(|| self.architecture.clone())
        .unwrap_or_else(|| native_arch.to_owned())
    }

    /// `XBPS_ARCH` overrides the OS-detected native architecture.
    pub fn native_architecture(detected: &str) -> String {
        std::env::var("XBPS_ARCH").unwrap_or_else(|_| detected.to_owned())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "true" | "yes" | "1")
}

/// Splits a glob pattern into its containing directory and the bare
/// filename pattern, resolving a relative pattern against `base`.
fn resolve_glob(base: &Path, pattern: &str) -> (PathBuf, String) {
    let p = Path::new(pattern);
    let dir = match p.parent() {
        Some(parent) if p.is_absolute() => parent.to_path_buf(),
        Some(parent) if !parent.as_os_str().is_empty() => base.join(parent),
        _ => base.to_path_buf(),
    };
    let file_pattern = p
    .file_name()
    .map(|f| f.to_string_lossy().into_owned())
    .unwrap_or_default();
    (dir, file_pattern)
}

fn glob_dir(dir: &Path, file_pattern: &str) -> Vec<PathBuf> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    read_dir
    .filter_map(|entry| entry.ok())
    .filter(|entry| {
            entry
            .file_name()
            .to_str()
            .map(|name| matcher::glob_match(file_pattern, name))
            .unwrap_or(false)
    })
    .map(|entry| entry.path())
    .collect()
}

#[cfg(test)]
#[path = "config.test.rs"]
mod test;
