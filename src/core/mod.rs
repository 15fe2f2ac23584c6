//! Core components of the `bookmate-rs` client.
//!
//! This module contains the foundational building blocks of the library, including:
//! - The main [`BmClient`] and its builder.
//! - The primary [`BmError`] type.
//! - Run configuration ([`FetchConfig`]) and the [`RetryPolicy`] derived from it.
//! - The retrying metadata fetcher and the attempt/outcome plumbing shared with downloads.

/// The main client (`BmClient`), builder, auth and retry policy.
pub mod client;
/// Run configuration.
pub mod config;
/// The primary error type (`BmError`) for the crate.
pub mod error;
/// Attempt outcomes, the retry loop and the metadata fetcher.
pub mod net;

// convenient re-exports so most code can just `use crate::core::BmClient`
pub use client::{
    BmClient, BmClientBuilder, RetryPolicy, StaticToken, TokenFile, TokenProvider,
};
pub use config::{ErrorScope, FetchConfig, Quality, ThrottleRange};
pub use error::BmError;
pub use net::{Failure, FetchOutcome, sleep_or_cancel};
