//! Buffer & flush pipeline
//!
//! Outcome and subdomain records are appended to an in-memory buffer that is
//! mirrored to a recovery file on every append. The buffer is flushed to the
//! persistence sink when it reaches its threshold, on a timer, and at session
//! end. A mirror left behind by a crash can be replayed with [`replay_mirror`].

mod mirror;
mod pipeline;
mod record;

pub use mirror::{mirror_path, RecoveryMirror};
pub use pipeline::{replay_mirror, BufferPipeline, BufferStats};
pub use record::BufferedRecord;

use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised by the buffer pipeline
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Recovery mirror IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recovery mirror serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persistence sink error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;
