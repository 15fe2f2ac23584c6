//! Resource orchestration: ledger check, metadata, content bytes, ledger append.
//!
//! A [`Library`] fetches one resource at a time. Within an audiobook, tracks are fetched
//! strictly in order. A resource's id is written to the [`CompletionLedger`] only after
//! every file it consists of has been committed.

mod flows;
mod hooks;
mod meta;

pub use hooks::{ChapterMerger, Converter, HookFuture, MergeRequest};

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::client::{BmClient, RetryPolicy};
use crate::core::config::{ErrorScope, FetchConfig, Quality, ThrottleRange};
use crate::core::BmError;
use crate::ledger::CompletionLedger;
use crate::resource::{BatchEntry, DirectoryLayout, Layout, ResourceKind};

/// Result of a successful [`Library::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The ledger already listed the resource; nothing was fetched.
    AlreadyDone,
    /// The resource was fetched and recorded.
    Downloaded,
}

/// Tally of a [`Library::run_batch`] call.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub downloaded: usize,
    pub already_done: usize,
    /// Resources that failed and were skipped, with their errors.
    pub failed: Vec<(BatchEntry, BmError)>,
}

type PartFuture<'a> = Pin<Box<dyn Future<Output = Result<Completion, BmError>> + Send + 'a>>;

/// Drives resources from the API onto disk.
pub struct Library {
    client: BmClient,
    ledger: Arc<CompletionLedger>,
    layout: Arc<dyn Layout>,
    converter: Option<Arc<dyn Converter>>,
    merger: Option<Arc<dyn ChapterMerger>>,
    cancel: CancellationToken,
    retry_override: Option<RetryPolicy>,
    quality: Quality,
    throttle: Option<ThrottleRange>,
    merge_chapters: bool,
    cleanup_chapters: bool,
    force_meta: bool,
    error_scope: ErrorScope,
}

impl Library {
    /// Creates a builder around `client`.
    pub fn builder(client: BmClient) -> LibraryBuilder {
        LibraryBuilder::new(client)
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    /// The token that interrupts this library's work.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetches one resource unless the ledger already lists it.
    ///
    /// # Errors
    ///
    /// Any error of the underlying fetches. On error nothing is written to the ledger.
    #[tracing::instrument(skip(self, kind), fields(kind = %kind))]
    pub async fn fetch(&self, kind: ResourceKind, id: &str) -> Result<Completion, BmError> {
        self.fetch_part(kind, id, "").await
    }

    /// Fetches every entry in order, honoring the configured [`ErrorScope`].
    ///
    /// # Errors
    ///
    /// [`BmError::Cancelled`] always stops the run. Other errors stop it only under
    /// [`ErrorScope::Abort`]; under [`ErrorScope::Skip`] they are collected in the report.
    pub async fn run_batch(&self, entries: &[BatchEntry]) -> Result<BatchReport, BmError> {
        let mut report = BatchReport::default();
        let total = entries.len();

        for (i, entry) in entries.iter().enumerate() {
            tracing::info!(
                n = i + 1,
                total,
                kind = %entry.kind,
                id = %entry.id,
                "batch entry"
            );
            match self.fetch(entry.kind, &entry.id).await {
                Ok(Completion::Downloaded) => report.downloaded += 1,
                Ok(Completion::AlreadyDone) => report.already_done += 1,
                Err(e) if e.is_cancelled() || self.error_scope == ErrorScope::Abort => return Err(e),
                Err(e) => {
                    tracing::error!(kind = %entry.kind, id = %entry.id, error = %e, "resource failed; continuing with next");
                    report.failed.push((entry.clone(), e));
                }
            }
        }

        tracing::info!(
            downloaded = report.downloaded,
            already_done = report.already_done,
            failed = report.failed.len(),
            "batch done"
        );
        Ok(report)
    }

    /// Ledger-guarded fetch of one resource. Boxed because series recurse into it.
    fn fetch_part<'a>(&'a self, kind: ResourceKind, id: &'a str, series_prefix: &'a str) -> PartFuture<'a> {
        Box::pin(async move {
            if self.ledger.contains(id).await? {
                tracing::info!(%kind, %id, "already in ledger; skipping");
                return Ok(Completion::AlreadyDone);
            }
            tracing::info!(%kind, %id, "fetching resource");

            match kind {
                ResourceKind::Book => self.fetch_book(id, series_prefix).await?,
                ResourceKind::Audiobook => self.fetch_audiobook(id, series_prefix).await?,
                ResourceKind::Comicbook => self.fetch_comicbook(id, series_prefix).await?,
                ResourceKind::Serial => self.fetch_serial(id, series_prefix).await?,
                ResourceKind::Series => self.fetch_series(id).await?,
            }

            self.ledger.add(id).await?;
            Ok(Completion::Downloaded)
        })
    }

    fn policy(&self) -> Option<&RetryPolicy> {
        self.retry_override.as_ref()
    }

    async fn run_converter(&self, kind: ResourceKind, source: &Path) -> Result<(), BmError> {
        let Some(converter) = &self.converter else {
            return Ok(());
        };
        match converter.convert(kind, source).await {
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::warn!(path = %source.display(), error = %e, "conversion failed");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

/* ----------------------- Builder ----------------------- */

/// Builder for [`Library`].
pub struct LibraryBuilder {
    client: BmClient,
    config: FetchConfig,
    ledger: Option<Arc<CompletionLedger>>,
    layout: Option<Arc<dyn Layout>>,
    converter: Option<Arc<dyn Converter>>,
    merger: Option<Arc<dyn ChapterMerger>>,
    cancel: Option<CancellationToken>,
    retry_override: Option<RetryPolicy>,
}

impl LibraryBuilder {
    pub fn new(client: BmClient) -> Self {
        Self {
            client,
            config: FetchConfig::default(),
            ledger: None,
            layout: None,
            converter: None,
            merger: None,
            cancel: None,
            retry_override: None,
        }
    }

    /// Run options: quality, throttle, ledger and output locations, meta and merge flags.
    #[must_use]
    pub fn config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a ledger instead of opening `config.ledger_path`.
    #[must_use]
    pub fn ledger(mut self, ledger: Arc<CompletionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Replace the default [`DirectoryLayout`] rooted at `config.output_root`.
    #[must_use]
    pub fn layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    #[must_use]
    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Merger used when `merge_chapters` is set.
    #[must_use]
    pub fn chapter_merger(mut self, merger: Arc<dyn ChapterMerger>) -> Self {
        self.merger = Some(merger);
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Overrides the client's retry policies for every request this library makes.
    #[must_use]
    pub fn retry_policy(mut self, policy: Option<RetryPolicy>) -> Self {
        self.retry_override = policy;
        self
    }

    pub fn build(self) -> Library {
        let cfg = self.config;
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(CompletionLedger::new(cfg.ledger_path.clone())));
        let layout = self
            .layout
            .unwrap_or_else(|| Arc::new(DirectoryLayout::new(cfg.output_root.clone())));

        if cfg.merge_chapters && self.merger.is_none() {
            tracing::warn!("chapter merging requested but no merger configured; chapters stay separate");
        }

        Library {
            client: self.client,
            ledger,
            layout,
            converter: self.converter,
            merger: self.merger,
            cancel: self.cancel.unwrap_or_default(),
            retry_override: self.retry_override,
            quality: cfg.quality,
            throttle: cfg.throttle(),
            merge_chapters: cfg.merge_chapters,
            cleanup_chapters: cfg.cleanup_chapters,
            force_meta: cfg.force_meta,
            error_scope: cfg.error_scope,
        }
    }
}
