// dbclone/src/clone/model.rs
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::engine::BackupArtifact;

/// Default maximum age of a reusable backup, in days.
pub const DEFAULT_MAX_BACKUP_AGE_DAYS: u32 = 1;

/// Timestamp layout used for synthesized target names and fresh backup files.
pub const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Input of a single clone run. Never mutated once the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub source_database: String,
    pub target_database: Option<String>,
    /// Directory (as seen by the engine) receiving fresh backups. `None` falls
    /// back to the instance default backup directory.
    pub dump_directory: Option<String>,
    pub backup_tool: Option<String>,
    pub max_backup_age_days: u32,
}

impl CloneRequest {
    pub fn new(source_database: impl Into<String>) -> Self {
        CloneRequest {
            source_database: source_database.into(),
            target_database: None,
            dump_directory: None,
            backup_tool: None,
            max_backup_age_days: DEFAULT_MAX_BACKUP_AGE_DAYS,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_database = Some(target.into());
        self
    }

    pub fn with_dump_directory(mut self, dir: impl Into<String>) -> Self {
        self.dump_directory = Some(dir.into());
        self
    }

    pub fn with_backup_tool(mut self, tool: impl Into<String>) -> Self {
        self.backup_tool = Some(tool.into());
        self
    }

    pub fn with_max_backup_age_days(mut self, days: u32) -> Self {
        self.max_backup_age_days = days;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaRole {
    Primary,
    Secondary,
    NotApplicable,
}

/// Snapshot of the source database taken during preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    pub name: String,
    pub exists: bool,
    pub role: ReplicaRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeRole {
    Data,
    Log,
}

impl fmt::Display for VolumeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeRole::Data => write!(f, "data"),
            VolumeRole::Log => write!(f, "log"),
        }
    }
}

/// Free space reading for one directory hosting the copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskVolume {
    pub role: VolumeRole,
    pub path: Option<String>,
    /// `None` when the query failed or the path is unknown.
    pub free_mb: Option<u64>,
}

/// Measured footprint of the source database, in whole MB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceFootprint {
    pub data_mb: Option<u64>,
    pub log_mb: Option<u64>,
    pub used_mb: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackupMethod {
    ReuseNative,
    FreshCopyOnly,
}

impl fmt::Display for BackupMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupMethod::ReuseNative => write!(f, "ReuseNative"),
            BackupMethod::FreshCopyOnly => write!(f, "FreshCopyOnly"),
        }
    }
}

/// Decision of the backup source selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCandidate {
    pub method: BackupMethod,
    pub artifact: Option<BackupArtifact>,
    pub finished_at: Option<NaiveDateTime>,
    pub verified: bool,
}

impl BackupCandidate {
    pub fn fresh() -> Self {
        BackupCandidate {
            method: BackupMethod::FreshCopyOnly,
            artifact: None,
            finished_at: None,
            verified: false,
        }
    }

    /// Only built once the engine has verified the artifact.
    pub fn verified_reuse(artifact: BackupArtifact, finished_at: NaiveDateTime) -> Self {
        BackupCandidate {
            method: BackupMethod::ReuseNative,
            artifact: Some(artifact),
            finished_at: Some(finished_at),
            verified: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Data,
    Log,
}

/// One physical file recorded in a backup artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub logical_name: String,
    pub kind: FileKind,
    pub file_id: u32,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRelocation {
    pub logical_name: String,
    pub kind: FileKind,
    pub physical_path: String,
}

/// Relocation of every file of a backup artifact onto the target database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestorePlan {
    pub target_database: String,
    pub relocations: Vec<FileRelocation>,
}

impl RestorePlan {
    pub fn files_of(&self, kind: FileKind) -> impl Iterator<Item = &FileRelocation> {
        self.relocations.iter().filter(move |r| r.kind == kind)
    }
}

/// Closed set of terminal codes returned by a clone run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionResult {
    Success,
    SourceNotFound,
    TargetExists,
    SecondaryReplica,
    InsufficientDataDisk,
    InsufficientLogDisk,
    BackupFailed,
    FileListReadFailed,
    RestoreFailed,
}

impl ExecutionResult {
    pub fn code(self) -> u8 {
        match self {
            ExecutionResult::Success => 0,
            ExecutionResult::SourceNotFound => 10,
            ExecutionResult::TargetExists => 15,
            ExecutionResult::SecondaryReplica => 17,
            ExecutionResult::InsufficientDataDisk => 20,
            ExecutionResult::InsufficientLogDisk => 21,
            ExecutionResult::BackupFailed => 30,
            ExecutionResult::FileListReadFailed => 40,
            ExecutionResult::RestoreFailed => 41,
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}
