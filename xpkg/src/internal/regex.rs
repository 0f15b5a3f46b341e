use once_cell::sync::Lazy;
use regex::Regex;

macro_rules! lazy_regex {
    ($re:expr) => {
        Lazy::new(|| Regex::new($re).unwrap())
    };
}

/// A bare package name.
pub(crate) static PKGNAME: Lazy<Regex> = lazy_regex!(r"^[A-Za-z0-9][A-Za-z0-9_.+-]*$");

/// A full `pkgver`: `<pkgname>-<version>_<revision>`.
pub(crate) static PKGVER: Lazy<Regex> =
lazy_regex!(r"^[A-Za-z0-9][A-Za-z0-9_.+-]*-[A-Za-z0-9](?:[._][A-Za-z0-9]+)*_[0-9]+$");

pub(crate) static SHA256_HEX: Lazy<Regex> = lazy_regex!(r"^[a-f0-9]{64}$");

/// A shared-library SONAME, e.g. `libfoo.so.1`.
pub(crate) static SONAME: Lazy<Regex> = lazy_regex!(r"^[^/\t\n\r ]+\.so(\.[0-9]+)*$");

#[cfg(test)]
#[path = "regex.test.rs"]
mod test;
