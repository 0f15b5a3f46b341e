//! Atomic file writes via a sibling temp file plus rename.
//! Every mutation of the pkgdb, minisig files, pubkey files and repo
//! metadata goes through this.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// An owning handle to a `.<name>.XXXXXXX` temp file created next to the
/// intended destination. `commit` renames it into place; dropping without
/// committing unlinks the temp file.
pub struct AtomicFile {
    file: Option<File>,
    temp_path: PathBuf,
    dest_path: PathBuf,
}

impl AtomicFile {
    /// Opens a new temp file as a sibling of `dest`.
    pub fn create(dest: impl AsRef<Path>) -> io::Result<Self> {
        let dest_path = dest.as_ref().to_path_buf();
        let dir = dest_path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = dest_path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"))?
        .to_string_lossy();

        let (file, temp_path) = mkstemp(dir, &file_name)?;

        Ok(AtomicFile {
                file: Some(file),
                temp_path,
                dest_path,
        })
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.as_mut().expect("file already committed").write_all(buf)
    }

    /// Flushes, syncs, and renames the temp file over the destination.
    pub fn commit(mut self) -> io::Result<()> {
        let mut file = self.file.take().expect("file already committed");
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.temp_path, &self.dest_path)
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.file.is_some() {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

fn mkstemp(dir: &Path, file_name: &str) -> io::Result<(File, PathBuf)> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let pid = std::process::id();
    let mut nonce = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.subsec_nanos())
    .unwrap_or(0);

    for _ in 0..32 {
        let candidate = dir.join(format!(".{file_name}.{pid:x}{nonce:x}"));
        match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&candidate)
        {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                nonce = nonce.wrapping_add(1);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(io::ErrorKind::AlreadyExists, "could not create unique temp file"))
}

#[cfg(test)]
#[path = "atomic_file.test.rs"]
mod test;
