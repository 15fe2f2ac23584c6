use std::path::{Path, PathBuf};

use super::{ResourceKind, ResourceMeta};

/// Characters that are not allowed in file names on at least one supported platform.
const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Decides where a resource's files go.
///
/// The returned stem has no extension; outputs are written as `<stem>.epub`,
/// `<stem>.json`, `<stem>.jpeg` and so on, plus `info.txt` in the stem's directory.
pub trait Layout: Send + Sync {
    /// `series_prefix` is empty for a stand-alone resource, or `<series name>/<i>. ` for
    /// part `i` of a series.
    fn stem(&self, kind: ResourceKind, meta: &ResourceMeta, series_prefix: &str) -> PathBuf;
}

/// `<root>/<kind or "series">/<series_prefix><name>/<name>`.
#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    root: PathBuf,
}

impl DirectoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Layout for DirectoryLayout {
    fn stem(&self, kind: ResourceKind, meta: &ResourceMeta, series_prefix: &str) -> PathBuf {
        let name = sanitize_name(&meta.title);
        let group = if series_prefix.is_empty() {
            kind.as_str()
        } else {
            ResourceKind::Series.as_str()
        };
        self.root
            .join(group)
            .join(format!("{series_prefix}{name}"))
            .join(&name)
    }
}

/// Strips forbidden characters and keeps at most the first two `". "`-separated pieces,
/// joined with `_`. A title with nothing left becomes `"untitled"`.
#[must_use]
pub fn sanitize_name(title: &str) -> String {
    let clean: String = title.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let name = clean.splitn(3, ". ").take(2).collect::<Vec<_>>().join("_");
    if name.trim().is_empty() {
        "untitled".to_string()
    } else {
        name
    }
}
