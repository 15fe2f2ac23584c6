use std::time::Duration;

use chrono::DateTime;
use url::Url;

use super::ResourceKind;
use super::wire::{MetaNode, NamedNode, NumOrText};
use crate::core::BmError;

/// Topic attached to every audiobook; carries no information.
const GENERIC_AUDIO_TOPIC: &str = "Аудио";

/// Descriptive metadata of one resource, decoded from its info response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMeta {
    /// Title, `"untitled"` when absent or blank.
    pub title: String,
    pub annotation: Option<String>,
    /// Large cover when present, the generic cover URL otherwise.
    pub cover_url: Option<Url>,
    /// Minimum reader age; zero and unparsable values are dropped.
    pub age_restriction: Option<u32>,
    pub rights_holder: Option<String>,
    pub publishers: Vec<String>,
    /// Four-digit publication year.
    pub publication_year: Option<String>,
    pub duration: Option<Duration>,
    pub translators: Vec<String>,
    pub narrators: Vec<String>,
    pub topics: Vec<String>,
}

impl ResourceMeta {
    /// Decodes the metadata of a `kind` resource out of its info envelope.
    ///
    /// A missing or null envelope yields empty metadata titled `"untitled"`.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Data`] when a field has the wrong shape.
    pub fn from_info(kind: ResourceKind, info: &serde_json::Value) -> Result<Self, BmError> {
        let key = kind.envelope_key();
        let node = match info.get(key).filter(|v| !v.is_null()) {
            Some(node) => serde_json::from_value(node.clone())
                .map_err(|e| BmError::Data(format!("{key} metadata: {e}")))?,
            None => {
                tracing::warn!(%kind, "info response has no `{key}` object; using empty metadata");
                MetaNode::default()
            }
        };
        Ok(node.into())
    }

    /// Plain-text annotation written to `info.txt`.
    #[must_use]
    pub fn annotation_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        if let Some(a) = self.annotation.as_deref().filter(|a| !a.is_empty()) {
            lines.push(a.to_string());
            lines.push(String::new());
        }
        if let Some(age) = self.age_restriction {
            lines.push(format!("Age restriction: {age}+"));
        }
        if let Some(owner) = &self.rights_holder {
            lines.push(format!("Rights holder: {owner}"));
        }
        if !self.publishers.is_empty() {
            lines.push(format!("Publisher: {}", self.publishers.join(", ")));
        }
        if let Some(year) = &self.publication_year {
            lines.push(format!("Published: {year}"));
        }
        if let Some(d) = self.duration {
            lines.push(format!("Duration: {}", format_duration(d)));
        }
        if !self.translators.is_empty() {
            lines.push(format!("Translated by: {}", self.translators.join(", ")));
        }
        if !self.narrators.is_empty() {
            lines.push(format!("Narrated by: {}", self.narrators.join(", ")));
        }
        if !self.topics.is_empty() {
            lines.push(String::new());
            lines.push(format!("Tags: {}", self.topics.join(", ")));
        }
        lines.join("\n")
    }
}

impl From<MetaNode> for ResourceMeta {
    fn from(n: MetaNode) -> Self {
        let title = n
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "untitled".to_string());
        let cover_url = n
            .cover
            .and_then(|c| c.large)
            .or(n.cover_url)
            .and_then(|u| Url::parse(&u).ok());

        Self {
            title,
            annotation: n.annotation.filter(|a| !a.is_empty()),
            cover_url,
            age_restriction: n
                .age_restriction
                .and_then(|a| a.as_i64())
                .filter(|a| *a > 0)
                .and_then(|a| u32::try_from(a).ok()),
            rights_holder: n.owner_catalog_title.filter(|o| !o.is_empty()),
            publishers: names(n.publishers),
            publication_year: n.publication_date.as_ref().and_then(publication_year),
            duration: n
                .duration
                .and_then(|d| d.as_i64())
                .filter(|s| *s > 0)
                .and_then(|s| u64::try_from(s).ok())
                .map(Duration::from_secs),
            translators: names(n.translators),
            narrators: names(n.narrators),
            topics: n
                .topics
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| t.title)
                .filter(|t| !t.is_empty() && t != GENERIC_AUDIO_TOPIC)
                .collect(),
        }
    }
}

fn names(list: Option<Vec<NamedNode>>) -> Vec<String> {
    list.unwrap_or_default()
        .into_iter()
        .filter_map(|n| n.name)
        .filter(|n| !n.is_empty())
        .collect()
}

/// Unix seconds, or text starting with a four-digit year.
fn publication_year(raw: &NumOrText) -> Option<String> {
    if let Some(secs) = raw.as_i64() {
        if let Some(dt) = DateTime::from_timestamp(secs, 0) {
            return Some(dt.format("%Y").to_string());
        }
    }
    let text = raw.as_text();
    let year = text.get(..4)?;
    year.chars()
        .all(|c| c.is_ascii_digit())
        .then(|| year.to_string())
}

fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{hours} h {minutes} min {seconds} sec")
    } else {
        format!("{minutes} min {seconds} sec")
    }
}
