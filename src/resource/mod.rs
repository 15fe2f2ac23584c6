//! Resource kinds, their endpoints and metadata, and where they land on disk.

mod layout;
mod link;
mod model;
pub(crate) mod wire;

pub use layout::{DirectoryLayout, Layout, sanitize_name};
pub use link::{BatchEntry, ParsedBatch, parse_batch, parse_link};
pub use model::ResourceMeta;

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::core::BmError;

/// The kinds of content the API serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Book,
    Audiobook,
    Comicbook,
    /// A book published in episodes; each episode is fetched as a book.
    Serial,
    /// An ordered collection of other resources.
    Series,
}

impl ResourceKind {
    pub const ALL: [Self; 5] = [
        Self::Book,
        Self::Audiobook,
        Self::Comicbook,
        Self::Serial,
        Self::Series,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Audiobook => "audiobook",
            Self::Comicbook => "comicbook",
            Self::Serial => "serial",
            Self::Series => "series",
        }
    }

    /// Key of the info response envelope. Serials are served as books.
    pub const fn envelope_key(self) -> &'static str {
        match self {
            Self::Serial => "book",
            other => other.as_str(),
        }
    }

    fn info_path(self, id: &str) -> String {
        match self {
            Self::Book | Self::Serial => format!("books/{id}"),
            Self::Audiobook => format!("audiobooks/{id}"),
            Self::Comicbook => format!("comicbooks/{id}"),
            Self::Series => format!("series/{id}"),
        }
    }

    fn content_path(self, id: &str) -> String {
        match self {
            Self::Book => format!("books/{id}/content/v4"),
            Self::Audiobook => format!("audiobooks/{id}/playlists.json"),
            Self::Comicbook => format!("comicbooks/{id}/metadata.json"),
            Self::Serial => format!("books/{id}/episodes"),
            Self::Series => format!("series/{id}/parts"),
        }
    }

    /// Metadata endpoint for `id`, relative to `base`.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Data`] for an id that is not a single path segment.
    pub fn info_url(self, base: &Url, id: &str) -> Result<Url, BmError> {
        check_id(id)?;
        Ok(base.join(&self.info_path(id))?)
    }

    /// Content endpoint for `id`, relative to `base`.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Data`] for an id that is not a single path segment.
    pub fn content_url(self, base: &Url, id: &str) -> Result<Url, BmError> {
        check_id(id)?;
        Ok(base.join(&self.content_path(id))?)
    }
}

fn check_id(id: &str) -> Result<(), BmError> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(BmError::Data(format!("invalid resource id: {id:?}")))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = BmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BmError::Data(format!("unknown resource type: {s}")))
    }
}
