use thiserror::Error;

use crate::clone::model::ExecutionResult;
use crate::engine::EngineError;

/// Terminal failure of a clone run. Each variant maps to exactly one result code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloneError {
    #[error("Source database '{database}' not found: {reason}")]
    SourceNotFound { database: String, reason: String },

    #[error("Target database '{database}' cannot be used: {reason}")]
    TargetExists { database: String, reason: String },

    #[error("Source database '{database}' is not the primary replica: {reason}")]
    SecondaryReplica { database: String, reason: String },

    #[error("Insufficient space on data volume: {}", describe_shortfall(.required_mb, .free_mb))]
    InsufficientDataDisk {
        required_mb: Option<u64>,
        free_mb: Option<u64>,
    },

    #[error("Insufficient space on log volume: {}", describe_shortfall(.required_mb, .free_mb))]
    InsufficientLogDisk {
        required_mb: Option<u64>,
        free_mb: Option<u64>,
    },

    #[error("Backup to '{artifact}' failed: {source}")]
    BackupFailed {
        artifact: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to read file list of '{artifact}': {source}")]
    FileListReadFailed {
        artifact: String,
        #[source]
        source: EngineError,
    },

    #[error("Restore of '{database}' failed: {source}")]
    RestoreFailed {
        database: String,
        #[source]
        source: EngineError,
    },
}

impl CloneError {
    pub fn result(&self) -> ExecutionResult {
        match self {
            CloneError::SourceNotFound { .. } => ExecutionResult::SourceNotFound,
            CloneError::TargetExists { .. } => ExecutionResult::TargetExists,
            CloneError::SecondaryReplica { .. } => ExecutionResult::SecondaryReplica,
            CloneError::InsufficientDataDisk { .. } => ExecutionResult::InsufficientDataDisk,
            CloneError::InsufficientLogDisk { .. } => ExecutionResult::InsufficientLogDisk,
            CloneError::BackupFailed { .. } => ExecutionResult::BackupFailed,
            CloneError::FileListReadFailed { .. } => ExecutionResult::FileListReadFailed,
            CloneError::RestoreFailed { .. } => ExecutionResult::RestoreFailed,
        }
    }

    /// Engine error behind a post-mutation failure, if any.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            CloneError::BackupFailed { source, .. }
            | CloneError::FileListReadFailed { source, .. }
            | CloneError::RestoreFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn describe_shortfall(required_mb: &Option<u64>, free_mb: &Option<u64>) -> String {
    let required = required_mb.map_or_else(|| "unknown".to_string(), |mb| format!("{} MB", mb));
    let free = free_mb.map_or_else(|| "unknown".to_string(), |mb| format!("{} MB", mb));
    format!("required more than {}, free {}", required, free)
}

pub type Result<T> = std::result::Result<T, CloneError>;
