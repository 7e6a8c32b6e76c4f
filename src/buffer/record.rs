use crate::storage::{OutcomeRecord, SubdomainRecord};
use serde::{Deserialize, Serialize};

/// A record waiting to be persisted, tagged by kind in the recovery mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BufferedRecord {
    Url {
        session_id: i64,
        record: OutcomeRecord,
    },
    Subdomain {
        session_id: i64,
        record: SubdomainRecord,
    },
}

impl BufferedRecord {
    pub fn session_id(&self) -> i64 {
        match self {
            Self::Url { session_id, .. } | Self::Subdomain { session_id, .. } => *session_id,
        }
    }
}
