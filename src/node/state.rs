//! Persisted node state.
//!
//! The blob handed to hosts is JSON:
//!
//! ```json
//! { "kind": "script_node", "version": 1, "script": "...", "draft": "..." }
//! ```

use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};

/// Container name written into every blob
pub const STATE_KIND: &str = "script_node";

/// Current layout version
pub const STATE_VERSION: u32 = 1;

/// Active and draft script text of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub kind: String,
    pub version: u32,
    /// Text of the script currently running
    pub script: String,
    /// Last text submitted by the editor
    #[serde(default)]
    pub draft: String,
}

impl NodeState {
    pub fn new(script: impl Into<String>, draft: impl Into<String>) -> Self {
        Self {
            kind: STATE_KIND.to_string(),
            version: STATE_VERSION,
            script: script.into(),
            draft: draft.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| NodeError::State(e.to_string()))
    }

    /// Decode a blob, rejecting other containers and newer layouts.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let state: NodeState =
            serde_json::from_slice(bytes).map_err(|e| NodeError::State(e.to_string()))?;
        if state.kind != STATE_KIND {
            return Err(NodeError::State(format!(
                "expected '{}' state, found '{}'",
                STATE_KIND, state.kind
            )));
        }
        if state.version > STATE_VERSION {
            return Err(NodeError::State(format!(
                "unsupported state version {}",
                state.version
            )));
        }
        Ok(state)
    }
}
