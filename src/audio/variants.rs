use std::collections::{BTreeMap, BTreeSet};

use url::Url;

use super::wire::{OfflineVariant, PlaylistEnvelope, TrackNode};
use crate::core::{BmError, Quality};

/// One chapter of an audiobook and the quality variants it offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// 1-based chapter number as reported by the API.
    pub number: u32,
    /// Variant key → source URL.
    pub variants: BTreeMap<String, Url>,
}

impl Track {
    /// This track's try order: `preference` filtered to the variants the track offers.
    #[must_use]
    pub fn try_order<'a>(&self, preference: &'a [String]) -> Vec<&'a str> {
        preference
            .iter()
            .filter(|k| self.variants.contains_key(k.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Zero-padded chapter number, so lexical and numeric order agree.
    #[must_use]
    pub fn label(&self, width: usize) -> String {
        format!("{:0width$}", self.number)
    }
}

/// Variants observed across every track of one audiobook.
///
/// Built from a freshly fetched playlist for each download pass; CDN URLs expire, so a
/// catalog is never cached or persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantCatalog {
    keys: Vec<String>,
    tracks: Vec<Track>,
}

impl VariantCatalog {
    /// Decodes a `playlists.json` document.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Data`] if the document is not a playlist.
    pub fn from_json(body: &str) -> Result<Self, BmError> {
        let env: PlaylistEnvelope = serde_json::from_str(body)
            .map_err(|e| BmError::Data(format!("playlist json parse error: {e}")))?;
        Ok(Self::from_envelope(env))
    }

    pub(crate) fn from_envelope(env: PlaylistEnvelope) -> Self {
        let tracks: Vec<Track> = env.tracks.into_iter().map(decode_track).collect();
        let keys = tracks
            .iter()
            .flat_map(|t| t.variants.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self { keys, tracks }
    }

    /// Distinct variant keys, sorted ascending.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Global preference order: the sorted keys for [`Quality::Max`], reversed for [`Quality::Min`].
    #[must_use]
    pub fn preference(&self, quality: Quality) -> Vec<String> {
        match quality {
            Quality::Max => self.keys.clone(),
            Quality::Min => self.keys.iter().rev().cloned().collect(),
        }
    }

    /// Width used to pad chapter numbers for this catalog.
    #[must_use]
    pub fn label_width(&self) -> usize {
        label_width(self.tracks.len())
    }
}

/// 1 digit below 10 tracks, 2 below 100, 3 otherwise.
#[must_use]
pub fn label_width(track_count: usize) -> usize {
    match track_count {
        0..=9 => 1,
        10..=99 => 2,
        _ => 3,
    }
}

/// File name of a downloaded chapter.
#[must_use]
pub fn chapter_file_name(label: &str) -> String {
    format!("Chapter_{label}.m4a")
}

fn decode_track(node: TrackNode) -> Track {
    let variants = node
        .offline
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            let raw = serde_json::from_value::<OfflineVariant>(value).ok()?.url?;
            match Url::parse(&raw) {
                Ok(url) => Some((key, audio_url(url))),
                Err(e) => {
                    tracing::debug!(track = node.number, %key, error = %e, "skipping malformed variant url");
                    None
                }
            }
        })
        .collect();
    Track {
        number: node.number,
        variants,
    }
}

/// Offline variants are advertised as HLS playlists; the plain `.m4a` sits next to them.
fn audio_url(mut url: Url) -> Url {
    if let Some(stem) = url.path().strip_suffix(".m3u8") {
        let path = format!("{stem}.m4a");
        url.set_path(&path);
    }
    url
}
