//! Client-generated identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-generated correlation reference.
///
/// Attached to `message/send` payloads and echoed back by the server in the
/// acknowledgment and the authoritative push, so an optimistic local entry
/// can be matched to its server-confirmed counterpart without heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallRef(Uuid);

impl CallRef {
    /// Generate a fresh reference.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for CallRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
