//! Reading the four initial members of a package archive: the optional `./INSTALL`/`./REMOVE` shell fragments and
//! the required `./props.plist`/`./files.plist` dictionaries. Everything
//! after `./files.plist` is payload, left to the caller to stream.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::internal::macros::bail;
use crate::pkgdb::{FileEntry, PackageRecord};

use super::Error;

const INSTALL_MEMBER: &str = "./INSTALL";
const REMOVE_MEMBER: &str = "./REMOVE";
const PROPS_MEMBER: &str = "./props.plist";
const FILES_MEMBER: &str = "./files.plist";

/// `files.plist`'s shape: the manifest of paths a package owns,
/// kept separate from `props.plist` because the repository index never
/// carries file lists.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilesManifest {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub conf_files: Vec<FileEntry>,
    #[serde(default)]
    pub links: Vec<FileEntry>,
    #[serde(default)]
    pub dirs: Vec<FileEntry>,
}

/// The parsed header of a package archive: the two optional script
/// fragments plus the required `props`/`files` dictionaries.
pub struct Header {
    pub install_script: Option<Vec<u8>>,
    pub remove_script: Option<Vec<u8>>,
    pub props: PackageRecord,
    pub manifest: FilesManifest,
}

/// Reads header members off `archive` in arrival order, stopping as soon
/// as both `props.plist` and `files.plist` have been seen. Leaves the
/// archive's entry iterator positioned at the first payload member.
pub fn read_header<R: Read>(archive: &mut tar::Archive<R>) -> Result<Header, Error> {
    let mut install_script = None;
    let mut remove_script = None;
    let mut props: Option<PackageRecord> = None;
    let mut manifest: Option<FilesManifest> = None;

    for entry in archive.entries().map_err(Error::Io)? {
        let mut entry = entry.map_err(Error::Io)?;
        let path = entry.path().map_err(Error::Io)?.to_string_lossy().into_owned();

        match path.as_str() {
            INSTALL_MEMBER => {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf).map_err(Error::Io)?;
                install_script = Some(buf);
            }
            REMOVE_MEMBER => {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf).map_err(Error::Io)?;
                remove_script = Some(buf);
            }
            PROPS_MEMBER => {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf).map_err(Error::Io)?;
                props = Some(serde_json::from_slice(&buf).map_err(|e| Error::Malformed("props.plist", e))?);
            }
            FILES_MEMBER => {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf).map_err(Error::Io)?;
                manifest =
                Some(serde_json::from_slice(&buf).map_err(|e| Error::Malformed("files.plist", e))?);
                // Both required members have now been seen; the rest of
                // `archive`'s entries are payload for the caller to stream.
                if props.is_some() {
                    break;
                }
            }
            _ => {
                // Anything else before `files.plist` would mean a malformed
                // archive (the four header members always precede the
                // payload), but payload paths legitimately start with `./`
                // too, so we only enforce order on the two required members.
                if manifest.is_some() {
                    bail!(Error::MissingHeaderMember("props.plist or files.plist"));
                }
            }
        }
    }

    let props = props.ok_or(Error::MissingHeaderMember("props.plist"))?;
    let manifest = manifest.ok_or(Error::MissingHeaderMember("files.plist"))?;

    Ok(Header {
            install_script,
            remove_script,
            props,
            manifest,
    })
}

#[cfg(test)]
#[path = "header.test.rs"]
mod test;
