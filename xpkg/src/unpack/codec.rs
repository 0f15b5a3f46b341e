//! Compressed-archive codec detection: gzip, bzip2, xz, lz4, and zstd.
//! Packages don't carry an explicit codec tag, so the codec is sniffed from
//! the stream's magic bytes, the same approach `libarchive` uses.

use std::io::{self, BufRead, Read};

use thiserror::Error;

use crate::error::{ErrorKind, Reason};

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error while sniffing archive codec")]
    Io(#[from] io::Error),
    #[error("unrecognized or disabled archive codec")]
    Unsupported,
}

impl ErrorKind for Error {
    fn kind(&self) -> Reason {
        match self {
            Error::Io(_) => Reason::Resource,
            Error::Unsupported => Reason::Configuration,
        }
    }
}

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
const LZ4_MAGIC: &[u8] = &[0x04, 0x22, 0x4d, 0x18];

/// Peeks the stream's leading bytes and wraps it in the matching decoder,
/// without consuming anything the decoder itself hasn't read.
pub fn wrap<R: BufRead + 'static>(mut reader: R) -> Result<Box<dyn Read>, Error> {
    let magic = reader.fill_buf()?;

    if magic.starts_with(GZIP_MAGIC) {
        return Ok(Box::new(flate2::bufread::GzDecoder::new(reader)));
    }
    if magic.starts_with(BZIP2_MAGIC) {
        return wrap_bzip2(reader);
    }
    if magic.starts_with(XZ_MAGIC) {
        return wrap_xz(reader);
    }
    if magic.starts_with(ZSTD_MAGIC) {
        return wrap_zstd(reader);
    }
    if magic.starts_with(LZ4_MAGIC) {
        return wrap_lz4(reader);
    }
    Err(Error::Unsupported)
}

#[cfg(feature = "codec-bzip2")]
fn wrap_bzip2<R: BufRead + 'static>(reader: R) -> Result<Box<dyn Read>, Error> {
    Ok(Box::new(bzip2::bufread::BzDecoder::new(reader)))
}

#[cfg(not(feature = "codec-bzip2"))]
fn wrap_bzip2<R: BufRead + 'static>(_reader: R) -> Result<Box<dyn Read>, Error> {
    Err(Error::Unsupported)
}

#[cfg(feature = "codec-xz")]
fn wrap_xz<R: BufRead + 'static>(reader: R) -> Result<Box<dyn Read>, Error> {
    Ok(Box::new(xz2::bufread::XzDecoder::new(reader)))
}

#[cfg(not(feature = "codec-xz"))]
fn wrap_xz<R: BufRead + 'static>(_reader: R) -> Result<Box<dyn Read>, Error> {
    Err(Error::Unsupported)
}

#[cfg(feature = "codec-zstd")]
fn wrap_zstd<R: BufRead + 'static>(reader: R) -> Result<Box<dyn Read>, Error> {
    Ok(Box::new(zstd::stream::Decoder::new(reader)?))
}

#[cfg(not(feature = "codec-zstd"))]
fn wrap_zstd<R: BufRead + 'static>(_reader: R) -> Result<Box<dyn Read>, Error> {
    Err(Error::Unsupported)
}

#[cfg(feature = "codec-lz4")]
fn wrap_lz4<R: BufRead + 'static>(reader: R) -> Result<Box<dyn Read>, Error> {
    Ok(Box::new(lz4_flex::frame::FrameDecoder::new(reader)))
}

#[cfg(not(feature = "codec-lz4"))]
fn wrap_lz4<R: BufRead + 'static>(_reader: R) -> Result<Box<dyn Read>, Error> {
    Err(Error::Unsupported)
}

#[cfg(test)]
#[path = "codec.test.rs"]
mod test;
