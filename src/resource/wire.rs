use serde::Deserialize;

/// Numbers that the API sometimes sends as strings.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub(crate) enum NumOrText {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumOrText {
    /// Integer value, truncating floats and parsing numeric text.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub(crate) fn as_text(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct MetaNode {
    pub(crate) title: Option<String>,
    pub(crate) annotation: Option<String>,
    pub(crate) cover: Option<CoverNode>,
    pub(crate) cover_url: Option<String>,
    pub(crate) age_restriction: Option<NumOrText>,
    pub(crate) owner_catalog_title: Option<String>,
    pub(crate) publishers: Option<Vec<NamedNode>>,
    pub(crate) publication_date: Option<NumOrText>,
    pub(crate) duration: Option<NumOrText>,
    pub(crate) translators: Option<Vec<NamedNode>>,
    pub(crate) narrators: Option<Vec<NamedNode>>,
    pub(crate) topics: Option<Vec<TopicNode>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct CoverNode {
    pub(crate) large: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct NamedNode {
    pub(crate) name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct TopicNode {
    pub(crate) title: Option<String>,
}

/* ---------- content endpoints ---------- */

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ComicContent {
    pub(crate) uris: ComicUris,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ComicUris {
    pub(crate) zip: String,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct EpisodesEnvelope {
    #[serde(default)]
    pub(crate) episodes: Vec<EpisodeNode>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct EpisodeNode {
    pub(crate) uuid: String,
    #[serde(default)]
    pub(crate) title: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct PartsEnvelope {
    #[serde(default)]
    pub(crate) parts: Vec<PartNode>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct PartNode {
    pub(crate) resource_type: String,
    pub(crate) resource: PartResource,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct PartResource {
    pub(crate) uuid: String,
}
