/// Session lifecycle states
///
/// A session moves `Queued -> Running` and then into exactly one terminal state.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the lifecycle state of a crawl session (or the job wrapping it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    // ===== Active States =====
    /// Created but not yet started
    Queued,

    /// Frontier is being drained
    Running,

    // ===== Terminal States =====
    /// Frontier exhausted without cancellation
    Completed,

    /// Aborted by a session-fatal error; partial results are kept
    Failed,

    /// Stopped by the cancellation flag; partial results are kept
    Cancelled,
}

impl SessionStatus {
    /// Returns true for Completed, Failed and Cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Checks whether moving to `next` is a legal transition
    ///
    /// Terminal states are final. Queued may only start running or be
    /// cancelled/failed before it starts.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        match (self, next) {
            (Self::Queued, Self::Running) => true,
            (Self::Queued, Self::Cancelled) | (Self::Queued, Self::Failed) => true,
            (Self::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// `interrupted` is accepted as an alias of `cancelled`.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "interrupted" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 5] {
        [
            Self::Queued,
            Self::Running,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
