//! Multi-track audio: playlist decoding, variant ordering and quality fallback.
//!
//! A playlist advertises, per track, a map of offline variants (`max_bit_rate`,
//! `min_bit_rate`, ...) to CDN URLs. [`VariantCatalog`] derives one global preference
//! order from it; [`negotiate`] then walks each track's subset of that order.

mod negotiate;
mod variants;
pub(crate) mod wire;

pub use negotiate::{ClientProbe, Negotiated, ProbeFuture, TrackProbe, negotiate};
pub use variants::{Track, VariantCatalog, chapter_file_name, label_width};
