use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct PlaylistEnvelope {
    #[serde(default)]
    pub(crate) tracks: Vec<TrackNode>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct TrackNode {
    pub(crate) number: u32,
    #[serde(default)]
    pub(crate) offline: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct OfflineVariant {
    pub(crate) url: Option<String>,
}
