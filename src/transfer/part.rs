use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Write buffer size for streamed bodies.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// `<dest>.part`.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut s = OsString::from(dest.as_os_str());
    s.push(".part");
    PathBuf::from(s)
}

/// Removes a leftover `<dest>.part`, if any.
pub(crate) async fn discard_part(dest: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(part_path(dest)).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// An in-flight download written to `<dest>.part`.
///
/// The partial file is removed when the guard is dropped without [`commit`](Self::commit),
/// which covers errors, timeouts and cancelled futures alike. The destination path only
/// comes into existence through the final rename.
pub(crate) struct PartFile {
    part: PathBuf,
    dest: PathBuf,
    out: Option<BufWriter<File>>,
    written: u64,
    committed: bool,
}

impl PartFile {
    /// Creates (or truncates) `<dest>.part`, creating parent directories as needed.
    pub(crate) async fn create(dest: &Path) -> io::Result<Self> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = part_path(dest);
        let file = File::create(&part).await?;
        Ok(Self {
            part,
            dest: dest.to_path_buf(),
            out: Some(BufWriter::with_capacity(CHUNK_SIZE, file)),
            written: 0,
            committed: false,
        })
    }

    pub(crate) async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| io::Error::other("partial file already closed"))?;
        out.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes, syncs and renames the partial file onto the destination.
    pub(crate) async fn commit(mut self) -> io::Result<u64> {
        if let Some(mut out) = self.out.take() {
            out.flush().await?;
            out.get_mut().sync_all().await?;
        }
        tokio::fs::rename(&self.part, &self.dest).await?;
        self.committed = true;
        Ok(self.written)
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            drop(self.out.take());
            let _ = std::fs::remove_file(&self.part);
        }
    }
}
