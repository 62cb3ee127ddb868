// dbclone/src/engine/mod.rs
pub(crate) mod sqlcmd; // sqlcmd-backed binding of the admin and volume traits
pub(crate) mod tsql; // T-SQL rendering of every statement the binding sends
mod volume;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::clone::model::{FileDescriptor, ReplicaRole, RestorePlan};

/// Failure reported by the engine or by the client talking to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", .number.map(|n| format!(" (engine error {})", n)).unwrap_or_default())]
pub struct EngineError {
    pub number: Option<i32>,
    pub message: String,
}

impl EngineError {
    pub fn new(number: Option<i32>, message: impl Into<String>) -> Self {
        EngineError {
            number,
            message: message.into(),
        }
    }

    pub fn client(message: impl Into<String>) -> Self {
        EngineError::new(None, message)
    }
}

/// Instance-wide configuration options the capacity check depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFlag {
    ShowAdvancedOptions,
    XpCmdShell,
}

impl ConfigFlag {
    pub fn option_name(self) -> &'static str {
        match self {
            ConfigFlag::ShowAdvancedOptions => "show advanced options",
            ConfigFlag::XpCmdShell => "xp_cmdshell",
        }
    }
}

/// Allocated and used sizes of a database's files, in KB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileSizes {
    pub data_kb: u64,
    pub log_kb: u64,
    pub used_kb: u64,
}

/// Instance default directories, as seen by the engine host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefaultPaths {
    pub data: Option<String>,
    pub log: Option<String>,
    pub backup: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupType {
    Full,
    Differential,
    Log,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Disk,
    Virtual,
    Other,
}

/// One backup set: the media file and the set's 1-based position in it.
///
/// Media written with NOINIT holds several sets; every statement reading a
/// set names its position so it never falls back to the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    pub path: String,
    pub position: u32,
}

impl BackupArtifact {
    pub fn new(path: impl Into<String>, position: u32) -> Self {
        BackupArtifact {
            path: path.into(),
            position,
        }
    }

    /// Media written with INIT: the only set sits at position 1.
    pub fn single_set(path: impl Into<String>) -> Self {
        BackupArtifact::new(path, 1)
    }
}

impl fmt::Display for BackupArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.position == 1 {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{} (backup set {})", self.path, self.position)
        }
    }
}

/// One row of the engine's backup history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCatalogEntry {
    pub database: String,
    pub backup_type: BackupType,
    pub finished_at: NaiveDateTime,
    pub software_name: String,
    pub device_kind: DeviceKind,
    pub physical_path: String,
    pub position: u32,
}

impl BackupCatalogEntry {
    pub fn artifact(&self) -> BackupArtifact {
        BackupArtifact::new(self.physical_path.clone(), self.position)
    }
}

/// Administrative surface of the database engine consumed by the clone pipeline.
///
/// Every call blocks until the engine answers. Paths are engine-side paths and
/// are passed through untouched.
pub trait EngineAdmin {
    /// Wall clock of the engine host; backup history is recorded in it.
    fn server_time(&self) -> Result<NaiveDateTime, EngineError>;
    fn database_exists(&self, name: &str) -> Result<bool, EngineError>;
    fn ha_enabled(&self) -> Result<bool, EngineError>;
    fn replica_role(&self, database: &str) -> Result<ReplicaRole, EngineError>;
    fn file_sizes(&self, database: &str) -> Result<FileSizes, EngineError>;
    fn virtual_log_count(&self, database: &str) -> Result<u64, EngineError>;
    fn default_paths(&self) -> Result<DefaultPaths, EngineError>;
    fn config_flag(&self, flag: ConfigFlag) -> Result<bool, EngineError>;
    fn set_config_flag(&self, flag: ConfigFlag, enabled: bool) -> Result<(), EngineError>;
    /// Full backup history of `database`, newest first.
    fn backup_catalog(&self, database: &str) -> Result<Vec<BackupCatalogEntry>, EngineError>;
    fn verify_backup(&self, artifact: &BackupArtifact) -> Result<(), EngineError>;
    /// Writes a single-set media file at `path`, replacing any existing one.
    fn backup_copy_only(&self, database: &str, path: &str) -> Result<(), EngineError>;
    fn file_manifest(&self, artifact: &BackupArtifact) -> Result<Vec<FileDescriptor>, EngineError>;
    fn restore(&self, plan: &RestorePlan, artifact: &BackupArtifact) -> Result<(), EngineError>;
}

/// Free-space lookup for a directory on the engine host.
pub trait VolumeQuery {
    /// `Ok(None)` when the volume answered but reported nothing usable.
    fn free_bytes(&self, directory: &str) -> Result<Option<u64>, EngineError>;
}
