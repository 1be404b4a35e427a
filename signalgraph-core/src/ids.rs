//! ABOUTME: Execution identifiers shared across sub-orchestration boundaries
//! ABOUTME: Defines the ExecutionId newtype wrapping a Uuid

use std::fmt;
use uuid::Uuid;

/// Identifies a single `orchestrate()` call's execution state.
///
/// Child sub-orchestrations get their own `ExecutionId` but share a
/// `main_execution_id` (see [`crate::context::Operational`]) so that
/// identity and conversation-history lookups can cross sub-orchestration
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExecutionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
