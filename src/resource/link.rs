use std::collections::HashSet;

use url::Url;

use super::ResourceKind;

const HOSTS: [&str; 2] = ["books.yandex.ru", "www.books.yandex.ru"];

/// Extracts `(kind, id)` from a `books.yandex.ru/{books|audiobooks}/<id>` link.
///
/// Blank lines, comments (`#`, `;`) and anything else yield `None`.
#[must_use]
pub fn parse_link(line: &str) -> Option<(ResourceKind, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return None;
    }
    let url = Url::parse(line).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    if !HOSTS.contains(&host.as_str()) {
        return None;
    }

    let mut segments = url.path_segments()?;
    let kind = match segments.next()?.to_ascii_lowercase().as_str() {
        "books" => ResourceKind::Book,
        "audiobooks" => ResourceKind::Audiobook,
        _ => return None,
    };
    let id = segments.next()?;
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| (kind, id.to_string()))
}

/// One resource requested by a batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub kind: ResourceKind,
    pub id: String,
    /// The line it was read from.
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    /// Recognized links in file order, first occurrence only.
    pub entries: Vec<BatchEntry>,
    /// Non-comment lines that are not a recognized link.
    pub unrecognized: Vec<String>,
    /// Number of repeated `kind:id` pairs that were dropped.
    pub duplicates: usize,
}

/// Parses a batch file: one link per line.
#[must_use]
pub fn parse_batch(text: &str) -> ParsedBatch {
    let mut out = ParsedBatch::default();
    let mut seen = HashSet::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((kind, id)) = parse_link(line) else {
            tracing::warn!(%line, "unrecognized link in batch; skipping");
            out.unrecognized.push(line.to_string());
            continue;
        };
        if !seen.insert(format!("{kind}:{id}")) {
            tracing::info!(%line, "duplicate in batch; skipping");
            out.duplicates += 1;
            continue;
        }
        out.entries.push(BatchEntry {
            kind,
            id,
            source: line.to_string(),
        });
    }
    out
}
