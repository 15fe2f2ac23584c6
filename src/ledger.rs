//! Completion ledger: a plain-text, line-per-id record of fully fetched resources.
//!
//! The file is read once, on first use, and appended to afterwards. An id is only
//! appended after every byte of its resource has been committed, so presence in the
//! ledger means "done" and the orchestrator may skip the resource on later runs.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::core::BmError;

/// Set of completed resource ids backed by an append-only text file.
///
/// Safe to share between tasks; lookups and appends are serialized internally.
#[derive(Debug)]
pub struct CompletionLedger {
    path: PathBuf,
    ids: Mutex<Option<HashSet<String>>>,
}

impl CompletionLedger {
    /// A ledger stored at `path`. Nothing is read until the first lookup.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ids: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if `id` has been recorded as complete.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Io`] if an existing store cannot be read. A missing store is empty.
    pub async fn contains(&self, id: &str) -> Result<bool, BmError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(false);
        }
        let mut guard = self.ids.lock().await;
        let ids = self.loaded(&mut guard).await?;
        Ok(ids.contains(id))
    }

    /// Records `id` as complete. Returns `false` when it was already present (or blank),
    /// in which case the store is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Data`] for an id spanning several lines and [`BmError::Io`] if
    /// the store cannot be read or appended to.
    pub async fn add(&self, id: &str) -> Result<bool, BmError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(false);
        }
        if id.contains(['\n', '\r']) {
            return Err(BmError::Data(format!("ledger id {id:?} contains a line break")));
        }
        let mut guard = self.ids.lock().await;
        let ids = self.loaded(&mut guard).await?;
        if ids.contains(id) {
            return Ok(false);
        }

        self.append_line(id).await?;
        ids.insert(id.to_string());
        tracing::info!(%id, ledger = %self.path.display(), "recorded completed resource");
        Ok(true)
    }

    async fn loaded<'g>(
        &self,
        slot: &'g mut Option<HashSet<String>>,
    ) -> Result<&'g mut HashSet<String>, BmError> {
        if slot.is_none() {
            let ids = read_ids(&self.path).await?;
            tracing::debug!(entries = ids.len(), ledger = %self.path.display(), "ledger loaded");
            *slot = Some(ids);
        }
        Ok(slot.get_or_insert_with(HashSet::new))
    }

    async fn append_line(&self, id: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        // An earlier writer may have left the last line unterminated.
        let len = file.metadata().await?.len();
        let mut line = String::with_capacity(id.len() + 2);
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(io::SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                line.push('\n');
            }
        }
        line.push_str(id);
        line.push('\n');

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await
    }
}

async fn read_ids(path: &Path) -> io::Result<HashSet<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(e),
    }
}
