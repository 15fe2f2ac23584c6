//! Extension points for work done after the bytes are on disk.
//!
//! Both hooks are optional. A failing hook is reported as a warning and never fails the
//! resource it was called for; cancellation is the exception and propagates as usual.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::core::BmError;
use crate::resource::ResourceKind;

/// Boxed future returned by hook methods.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BmError>> + Send + 'a>>;

/// Produces derived formats from a committed download (EPUB to FB2, CBR to PDF, ...).
pub trait Converter: Send + Sync {
    /// `source` is the committed file; outputs go next to it.
    fn convert<'a>(&'a self, kind: ResourceKind, source: &'a Path) -> HookFuture<'a>;
}

/// Inputs for [`ChapterMerger::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Directory holding the chapter files.
    pub chapter_dir: PathBuf,
    /// Chapter files in playback order.
    pub chapters: Vec<PathBuf>,
    /// File the merged audio should be written to.
    pub output: PathBuf,
    /// Cover image, when one was downloaded.
    pub cover: Option<PathBuf>,
    /// Container metadata, e.g. `("title", ...)`.
    pub metadata: Vec<(String, String)>,
}

/// Joins the chapters of an audiobook into a single file.
pub trait ChapterMerger: Send + Sync {
    fn merge<'a>(&'a self, request: &'a MergeRequest) -> HookFuture<'a>;
}
