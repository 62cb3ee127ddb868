// dbclone/src/clone/testing.rs
//! In-memory engine used by the pipeline tests.

use chrono::{NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::clone::model::{FileDescriptor, FileKind, ReplicaRole, RestorePlan};
use crate::engine::{
    BackupArtifact, BackupCatalogEntry, BackupType, ConfigFlag, DefaultPaths, DeviceKind,
    EngineAdmin, EngineError, FileSizes, VolumeQuery,
};

pub const DATA_DIR: &str = r"D:\MSSQL\Data";
pub const LOG_DIR: &str = r"L:\MSSQL\Log";
pub const BACKUP_DIR: &str = r"B:\MSSQL\Backup";

pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
        .and_then(|d| d.and_hms_opt(9, 30, 15))
        .expect("valid fixed timestamp")
}

pub fn descriptor(logical_name: &str, kind: FileKind, file_id: u32) -> FileDescriptor {
    FileDescriptor {
        logical_name: logical_name.to_string(),
        kind,
        file_id,
        size_bytes: 8 * 1024 * 1024,
    }
}

pub fn catalog_entry(
    database: &str,
    finished_at: NaiveDateTime,
    software_name: &str,
    device_kind: DeviceKind,
    physical_path: &str,
) -> BackupCatalogEntry {
    BackupCatalogEntry {
        database: database.to_string(),
        backup_type: BackupType::Full,
        finished_at,
        software_name: software_name.to_string(),
        device_kind,
        physical_path: physical_path.to_string(),
        position: 1,
    }
}

/// Every call that changes engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetFlag(ConfigFlag, bool),
    Backup { database: String, artifact: String },
    Restore { plan: RestorePlan, artifact: BackupArtifact },
}

pub struct FakeEngine {
    server_time: RefCell<Result<NaiveDateTime, EngineError>>,
    databases: RefCell<Vec<String>>,
    lookup_error: RefCell<Option<EngineError>>,
    ha_enabled: Cell<bool>,
    role: Cell<ReplicaRole>,
    role_queries: Cell<usize>,
    sizes: RefCell<Result<FileSizes, EngineError>>,
    vlf_count: RefCell<Result<u64, EngineError>>,
    default_paths: RefCell<Result<DefaultPaths, EngineError>>,
    flags: RefCell<HashMap<&'static str, bool>>,
    flag_set_error: RefCell<Option<(ConfigFlag, bool)>>,
    free_bytes: RefCell<HashMap<String, Result<Option<u64>, EngineError>>>,
    catalog: RefCell<Result<Vec<BackupCatalogEntry>, EngineError>>,
    verify_failures: RefCell<Vec<String>>,
    verified: RefCell<Vec<BackupArtifact>>,
    backup_error: RefCell<Option<EngineError>>,
    manifest: RefCell<Result<Vec<FileDescriptor>, EngineError>>,
    manifest_reads: RefCell<Vec<BackupArtifact>>,
    restore_error: RefCell<Option<EngineError>>,
    mutations: RefCell<Vec<Mutation>>,
    calls: RefCell<Vec<&'static str>>,
}

impl FakeEngine {
    /// Empty instance: no databases, HA off, flags disabled.
    pub fn new() -> Self {
        FakeEngine {
            server_time: RefCell::new(Ok(fixed_now())),
            databases: RefCell::new(Vec::new()),
            lookup_error: RefCell::new(None),
            ha_enabled: Cell::new(false),
            role: Cell::new(ReplicaRole::NotApplicable),
            role_queries: Cell::new(0),
            sizes: RefCell::new(Ok(FileSizes::default())),
            vlf_count: RefCell::new(Ok(12)),
            default_paths: RefCell::new(Ok(DefaultPaths {
                data: Some(DATA_DIR.to_string()),
                log: Some(LOG_DIR.to_string()),
                backup: Some(BACKUP_DIR.to_string()),
            })),
            flags: RefCell::new(HashMap::new()),
            flag_set_error: RefCell::new(None),
            free_bytes: RefCell::new(HashMap::new()),
            catalog: RefCell::new(Ok(Vec::new())),
            verify_failures: RefCell::new(Vec::new()),
            verified: RefCell::new(Vec::new()),
            backup_error: RefCell::new(None),
            manifest: RefCell::new(Ok(Vec::new())),
            manifest_reads: RefCell::new(Vec::new()),
            restore_error: RefCell::new(None),
            mutations: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_database(name: &str) -> Self {
        let engine = FakeEngine::new();
        engine.add_database(name);
        engine
    }

    /// `source` exists, sizes 1 GB data / 256 MB log, 100 GB free on both
    /// volumes, manifest of one data and one log file.
    pub fn ready(source: &str) -> Self {
        let engine = FakeEngine::with_database(source);
        engine.set_sizes(1024 * 1024, 256 * 1024, 512 * 1024);
        engine.set_free_mb(DATA_DIR, Some(100 * 1024));
        engine.set_free_mb(LOG_DIR, Some(100 * 1024));
        engine.set_manifest(vec![
            descriptor(source, FileKind::Data, 1),
            descriptor(&format!("{}_log", source), FileKind::Log, 2),
        ]);
        engine
    }

    pub fn set_server_time(&self, now: Result<NaiveDateTime, EngineError>) {
        *self.server_time.borrow_mut() = now;
    }

    pub fn add_database(&self, name: &str) {
        self.databases.borrow_mut().push(name.to_string());
    }

    pub fn fail_lookups(&self, error: EngineError) {
        *self.lookup_error.borrow_mut() = Some(error);
    }

    pub fn set_ha(&self, enabled: bool, role: ReplicaRole) {
        self.ha_enabled.set(enabled);
        self.role.set(role);
    }

    pub fn set_sizes(&self, data_kb: u64, log_kb: u64, used_kb: u64) {
        *self.sizes.borrow_mut() = Ok(FileSizes {
            data_kb,
            log_kb,
            used_kb,
        });
    }

    pub fn fail_sizes(&self, error: EngineError) {
        *self.sizes.borrow_mut() = Err(error);
    }

    pub fn set_vlf_count(&self, count: Result<u64, EngineError>) {
        *self.vlf_count.borrow_mut() = count;
    }

    pub fn set_default_paths(&self, paths: Result<DefaultPaths, EngineError>) {
        *self.default_paths.borrow_mut() = paths;
    }

    pub fn set_flag(&self, flag: ConfigFlag, enabled: bool) {
        self.flags.borrow_mut().insert(flag.option_name(), enabled);
    }

    pub fn flag(&self, flag: ConfigFlag) -> bool {
        self.flags
            .borrow()
            .get(flag.option_name())
            .copied()
            .unwrap_or(false)
    }

    /// Makes `set_config_flag(flag, enabled)` fail.
    pub fn fail_flag_change(&self, flag: ConfigFlag, enabled: bool) {
        *self.flag_set_error.borrow_mut() = Some((flag, enabled));
    }

    pub fn set_free_mb(&self, directory: &str, free_mb: Option<u64>) {
        self.free_bytes
            .borrow_mut()
            .insert(directory.to_string(), Ok(free_mb.map(|mb| mb * 1024 * 1024)));
    }

    pub fn set_free_bytes(&self, directory: &str, free: Result<Option<u64>, EngineError>) {
        self.free_bytes.borrow_mut().insert(directory.to_string(), free);
    }

    pub fn set_catalog(&self, catalog: Result<Vec<BackupCatalogEntry>, EngineError>) {
        *self.catalog.borrow_mut() = catalog;
    }

    /// Makes verification of every backup set stored in `path` fail.
    pub fn fail_verify(&self, path: &str) {
        self.verify_failures.borrow_mut().push(path.to_string());
    }

    pub fn fail_backup(&self, error: EngineError) {
        *self.backup_error.borrow_mut() = Some(error);
    }

    pub fn set_manifest(&self, files: Vec<FileDescriptor>) {
        *self.manifest.borrow_mut() = Ok(files);
    }

    pub fn fail_manifest(&self, error: EngineError) {
        *self.manifest.borrow_mut() = Err(error);
    }

    pub fn fail_restore(&self, error: EngineError) {
        *self.restore_error.borrow_mut() = Some(error);
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.borrow().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn role_queries(&self) -> usize {
        self.role_queries.get()
    }

    pub fn verified_artifacts(&self) -> Vec<BackupArtifact> {
        self.verified.borrow().clone()
    }

    pub fn manifest_reads(&self) -> Vec<BackupArtifact> {
        self.manifest_reads.borrow().clone()
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases
            .borrow()
            .iter()
            .any(|db| db.eq_ignore_ascii_case(name))
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }
}

impl EngineAdmin for FakeEngine {
    fn server_time(&self) -> Result<NaiveDateTime, EngineError> {
        self.record("server_time");
        self.server_time.borrow().clone()
    }

    fn database_exists(&self, name: &str) -> Result<bool, EngineError> {
        self.record("database_exists");
        if let Some(err) = self.lookup_error.borrow().clone() {
            return Err(err);
        }
        Ok(self.has_database(name))
    }

    fn ha_enabled(&self) -> Result<bool, EngineError> {
        self.record("ha_enabled");
        Ok(self.ha_enabled.get())
    }

    fn replica_role(&self, _database: &str) -> Result<ReplicaRole, EngineError> {
        self.record("replica_role");
        self.role_queries.set(self.role_queries.get() + 1);
        Ok(self.role.get())
    }

    fn file_sizes(&self, _database: &str) -> Result<FileSizes, EngineError> {
        self.record("file_sizes");
        self.sizes.borrow().clone()
    }

    fn virtual_log_count(&self, _database: &str) -> Result<u64, EngineError> {
        self.record("virtual_log_count");
        self.vlf_count.borrow().clone()
    }

    fn default_paths(&self) -> Result<DefaultPaths, EngineError> {
        self.record("default_paths");
        self.default_paths.borrow().clone()
    }

    fn config_flag(&self, flag: ConfigFlag) -> Result<bool, EngineError> {
        self.record("config_flag");
        Ok(self.flag(flag))
    }

    fn set_config_flag(&self, flag: ConfigFlag, enabled: bool) -> Result<(), EngineError> {
        self.record("set_config_flag");
        if *self.flag_set_error.borrow() == Some((flag, enabled)) {
            return Err(EngineError::new(
                Some(15123),
                format!("The configuration option '{}' does not exist, or it may be an advanced option.", flag.option_name()),
            ));
        }
        self.set_flag(flag, enabled);
        self.mutations
            .borrow_mut()
            .push(Mutation::SetFlag(flag, enabled));
        Ok(())
    }

    fn backup_catalog(&self, _database: &str) -> Result<Vec<BackupCatalogEntry>, EngineError> {
        self.record("backup_catalog");
        self.catalog.borrow().clone()
    }

    fn verify_backup(&self, artifact: &BackupArtifact) -> Result<(), EngineError> {
        self.record("verify_backup");
        self.verified.borrow_mut().push(artifact.clone());
        if self.verify_failures.borrow().iter().any(|p| *p == artifact.path) {
            return Err(EngineError::new(
                Some(3241),
                "The media family on device is incorrectly formed.",
            ));
        }
        Ok(())
    }

    fn backup_copy_only(&self, database: &str, path: &str) -> Result<(), EngineError> {
        self.record("backup_copy_only");
        self.mutations.borrow_mut().push(Mutation::Backup {
            database: database.to_string(),
            artifact: path.to_string(),
        });
        match self.backup_error.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn file_manifest(&self, artifact: &BackupArtifact) -> Result<Vec<FileDescriptor>, EngineError> {
        self.record("file_manifest");
        self.manifest_reads.borrow_mut().push(artifact.clone());
        self.manifest.borrow().clone()
    }

    fn restore(&self, plan: &RestorePlan, artifact: &BackupArtifact) -> Result<(), EngineError> {
        self.record("restore");
        self.mutations.borrow_mut().push(Mutation::Restore {
            plan: plan.clone(),
            artifact: artifact.clone(),
        });
        if let Some(err) = self.restore_error.borrow().clone() {
            return Err(err);
        }
        self.add_database(&plan.target_database);
        Ok(())
    }
}

impl VolumeQuery for FakeEngine {
    fn free_bytes(&self, directory: &str) -> Result<Option<u64>, EngineError> {
        self.record("free_bytes");
        if !self.flag(ConfigFlag::XpCmdShell) {
            return Err(EngineError::new(
                Some(15281),
                "SQL Server blocked access to procedure 'sys.xp_cmdshell'.",
            ));
        }
        self.free_bytes
            .borrow()
            .get(directory)
            .cloned()
            .unwrap_or(Ok(None))
    }
}
