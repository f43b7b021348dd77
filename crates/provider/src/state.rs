//! Resource state
//!
//! The record the lifecycle layer reads and writes on behalf of the external
//! state manager, plus helpers for pulling typed attributes out of it.

use gcompute_common::{AttrValue, Attributes, ResourcePhase, Result};
use serde::{Deserialize, Serialize};

/// Last-known state of one resource instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// External identifier; `None` when the instance does not exist
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub phase: ResourcePhase,

    /// Field values including computed ones
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceState {
    pub fn absent() -> Self {
        Self::default()
    }

    /// State for an existing instance known only by identifier
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            phase: ResourcePhase::Present,
            attributes: Attributes::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// Canonical reference URL, once the provider has reported one
    pub fn self_link(&self) -> Option<&str> {
        self.attributes
            .get("self_link")
            .and_then(AttrValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Forget the instance: identifier removed, phase absent
    pub fn clear(&mut self) {
        self.id = None;
        self.phase = ResourcePhase::Absent;
        self.attributes.clear();
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }
}

/// Decode a state document; empty input is an absent resource
pub fn decode_state(data: &[u8]) -> Result<ResourceState> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResourceState::absent());
    }
    Ok(serde_json::from_slice(data)?)
}

/// Encode a state document
pub fn encode_state(state: &ResourceState) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(state)?)
}

/// Decode a configuration document into attributes
pub fn decode_config(data: &[u8]) -> Result<Attributes> {
    Ok(serde_json::from_slice(data)?)
}

/// Create an attribute map with the given values
pub fn make_attrs(attrs: Vec<(&str, AttrValue)>) -> Attributes {
    attrs.into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
