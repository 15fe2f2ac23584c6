use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::Library;
use crate::core::BmError;
use crate::resource::{ResourceKind, ResourceMeta};

/// Where a resource's files go, plus what is known about it.
pub(super) struct Prepared {
    pub(super) meta: ResourceMeta,
    /// Destination stem without extension.
    pub(super) stem: PathBuf,
    pub(super) cover: Option<PathBuf>,
}

impl Prepared {
    pub(super) fn dir(&self) -> &Path {
        self.stem.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// `<stem>.<ext>`, leaving any dots already in the stem alone.
pub(super) fn with_ext(stem: &Path, ext: &str) -> PathBuf {
    let mut s = OsString::from(stem.as_os_str());
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

impl Library {
    /// Fetches resource info and writes its side files (`.json`, `.jpeg`, `info.txt`).
    ///
    /// Side files that already exist are kept unless `force_meta` is set.
    pub(super) async fn prepare(
        &self,
        kind: ResourceKind,
        id: &str,
        series_prefix: &str,
    ) -> Result<Prepared, BmError> {
        let url = kind.info_url(self.client.base_api(), id)?;
        let info: serde_json::Value = self.client.fetch_json(&url, self.policy(), &self.cancel).await?;
        let meta = ResourceMeta::from_info(kind, &info)?;
        let stem = self.layout.stem(kind, &meta, series_prefix);
        let dir = stem.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        let cover = match &meta.cover_url {
            Some(cover_url) => {
                let path = with_ext(&stem, "jpeg");
                if self.keep_existing(&path).await? {
                    tracing::debug!(path = %path.display(), "cover already exists; skipping");
                } else {
                    self.client
                        .download(cover_url, &path, self.policy(), &self.cancel)
                        .await?;
                }
                Some(path)
            }
            None => None,
        };

        let json_path = with_ext(&stem, "json");
        if self.keep_existing(&json_path).await? {
            tracing::debug!(path = %json_path.display(), "metadata json already exists; skipping");
        } else {
            let text = serde_json::to_string(&info)?;
            tokio::fs::write(&json_path, text).await?;
            tracing::info!(path = %json_path.display(), "metadata json written");
        }

        let info_path = dir.join("info.txt");
        if self.keep_existing(&info_path).await? {
            tracing::debug!(path = %info_path.display(), "annotation already exists; skipping");
        } else {
            tokio::fs::write(&info_path, meta.annotation_text()).await?;
            tracing::info!(path = %info_path.display(), "annotation written");
        }

        Ok(Prepared { meta, stem, cover })
    }

    async fn keep_existing(&self, path: &Path) -> Result<bool, BmError> {
        if self.force_meta {
            return Ok(false);
        }
        Ok(tokio::fs::try_exists(path).await?)
    }
}
