//! bookmate-rs: resilient fetching of books, audiobooks and comics from the Bookmate API.
//!
//! The pieces, bottom-up:
//! - [`core`]: the [`BmClient`], its [`RetryPolicy`] and the retrying metadata fetcher.
//! - [`transfer`]: streaming downloads that only ever expose complete files.
//! - [`audio`]: per-track quality fallback for audiobooks.
//! - [`ledger`]: the append-only record of finished resources.
//! - [`resource`] and [`library`]: endpoints, metadata, on-disk layout and the flows
//!   that tie everything together.

pub mod audio;
pub mod core;
pub mod ledger;
pub mod library;
pub mod resource;
pub mod transfer;

pub use audio::{Negotiated, Track, TrackProbe, VariantCatalog};
pub use crate::core::{
    BmClient, BmClientBuilder, BmError, ErrorScope, Failure, FetchConfig, FetchOutcome, Quality,
    RetryPolicy, StaticToken, ThrottleRange, TokenFile, TokenProvider,
};
pub use ledger::CompletionLedger;
pub use library::{
    BatchReport, ChapterMerger, Completion, Converter, Library, LibraryBuilder, MergeRequest,
};
pub use resource::{
    BatchEntry, DirectoryLayout, Layout, ParsedBatch, ResourceKind, ResourceMeta, parse_batch,
    parse_link,
};

/// Re-exported so callers can wire interrupt handling without depending on `tokio-util`.
pub use tokio_util::sync::CancellationToken;
