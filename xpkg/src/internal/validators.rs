use garde::{Error, Result};

pub(crate) fn validate_absolute_path(value: &str, _context: &()) -> Result {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(Error::new("is not an absolute path"))
    }
}

pub(crate) fn validate_sha256_hex(value: &str, _context: &()) -> Result {
    if crate::internal::regex::SHA256_HEX.is_match(value) {
        Ok(())
    } else {
        Err(Error::new("is not a lowercase hex-encoded SHA-256 digest"))
    }
}

pub(crate) fn validate_pkgname(value: &str, _context: &()) -> Result {
    if crate::internal::regex::PKGNAME.is_match(value) {
        Ok(())
    } else {
        Err(Error::new("is not a valid package name"))
    }
}

pub(crate) fn validate_pkgver(value: &str, _context: &()) -> Result {
    if crate::internal::regex::PKGVER.is_match(value) {
        Ok(())
    } else {
        Err(Error::new("is not a valid pkgver"))
    }
}

pub(crate) fn validate_soname(value: &str, _context: &()) -> Result {
    if crate::internal::regex::SONAME.is_match(value) {
        Ok(())
    } else {
        Err(Error::new("is not a valid shared-library soname"))
    }
}
