// dbclone/src/engine/tsql.rs
//! T-SQL text for every statement the sqlcmd binding sends.
//!
//! Decision logic never builds SQL; it hands structured values (database
//! names, artifact paths, a `RestorePlan`) to these functions.

use crate::clone::model::RestorePlan;
use crate::engine::{BackupArtifact, ConfigFlag};

/// Bracket-quotes an identifier, doubling any closing bracket.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Renders a Unicode string literal, doubling single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

pub fn database_exists_query(name: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM sys.databases WHERE name = {};",
        quote_literal(name)
    )
}

/// Engine-local time, ODBC canonical, the layout msdb finish dates are read in.
pub fn server_time_query() -> String {
    "SELECT CONVERT(varchar(19), GETDATE(), 120);".to_string()
}

pub fn ha_enabled_query() -> String {
    "SELECT ISNULL(CAST(SERVERPROPERTY('IsHadrEnabled') AS int), 0);".to_string()
}

/// 1 primary, 0 secondary, -1 when the database is in no availability group.
pub fn replica_role_query(database: &str) -> String {
    format!(
        "SELECT ISNULL(CAST(sys.fn_hadr_is_primary_replica({}) AS int), -1);",
        quote_literal(database)
    )
}

pub fn file_sizes_query(database: &str) -> String {
    format!(
        "USE {}; \
         SELECT \
         ISNULL(SUM(CASE WHEN type = 0 THEN CAST(size AS bigint) END), 0) * 8, \
         ISNULL(SUM(CASE WHEN type = 1 THEN CAST(size AS bigint) END), 0) * 8, \
         ISNULL(SUM(CAST(FILEPROPERTY(name, 'SpaceUsed') AS bigint)), 0) * 8 \
         FROM sys.database_files;",
        quote_ident(database)
    )
}

pub fn virtual_log_count_query(database: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM sys.dm_db_log_info(DB_ID({}));",
        quote_literal(database)
    )
}

pub fn default_paths_query() -> String {
    "SELECT \
     ISNULL(CAST(SERVERPROPERTY('InstanceDefaultDataPath') AS nvarchar(4000)), ''), \
     ISNULL(CAST(SERVERPROPERTY('InstanceDefaultLogPath') AS nvarchar(4000)), ''), \
     ISNULL(CAST(SERVERPROPERTY('InstanceDefaultBackupPath') AS nvarchar(4000)), '');"
        .to_string()
}

pub fn config_flag_query(flag: ConfigFlag) -> String {
    format!(
        "SELECT CAST(value_in_use AS int) FROM sys.configurations WHERE name = {};",
        quote_literal(flag.option_name())
    )
}

pub fn set_config_flag_statement(flag: ConfigFlag, enabled: bool) -> String {
    format!(
        "EXEC sp_configure {}, {}; RECONFIGURE;",
        quote_literal(flag.option_name()),
        if enabled { 1 } else { 0 }
    )
}

/// Columns: database, type, finish (ODBC canonical), software, device type,
/// device path, position of the set on its media.
pub fn backup_catalog_query(database: &str) -> String {
    format!(
        "SELECT bs.database_name, bs.type, \
         CONVERT(varchar(19), bs.backup_finish_date, 120), \
         ISNULL(ms.software_name, ''), bmf.device_type, ISNULL(bmf.physical_device_name, ''), bs.position \
         FROM msdb.dbo.backupset bs \
         JOIN msdb.dbo.backupmediafamily bmf ON bmf.media_set_id = bs.media_set_id \
         JOIN msdb.dbo.backupmediaset ms ON ms.media_set_id = bs.media_set_id \
         WHERE bs.database_name = {} AND bs.type = 'D' AND bs.backup_finish_date IS NOT NULL \
         ORDER BY bs.backup_finish_date DESC;",
        quote_literal(database)
    )
}

pub fn verify_statement(artifact: &BackupArtifact) -> String {
    format!(
        "RESTORE VERIFYONLY FROM DISK = {} WITH FILE = {};",
        quote_literal(&artifact.path),
        artifact.position
    )
}

pub fn copy_only_backup_statement(database: &str, path: &str) -> String {
    format!(
        "BACKUP DATABASE {} TO DISK = {} WITH COPY_ONLY, COMPRESSION, INIT, STATS = 10;",
        quote_ident(database),
        quote_literal(path)
    )
}

pub fn file_list_query(artifact: &BackupArtifact) -> String {
    format!(
        "RESTORE FILELISTONLY FROM DISK = {} WITH FILE = {};",
        quote_literal(&artifact.path),
        artifact.position
    )
}

pub fn restore_statement(plan: &RestorePlan, artifact: &BackupArtifact) -> String {
    let mut options = vec![format!("FILE = {}", artifact.position)];
    options.extend(plan.relocations.iter().map(|r| {
        format!(
            "MOVE {} TO {}",
            quote_literal(&r.logical_name),
            quote_literal(&r.physical_path)
        )
    }));
    options.push("RECOVERY".to_string());
    options.push("STATS = 10".to_string());

    format!(
        "RESTORE DATABASE {} FROM DISK = {} WITH {};",
        quote_ident(&plan.target_database),
        quote_literal(&artifact.path),
        options.join(", ")
    )
}

pub fn disk_free_command(directory: &str) -> String {
    let directory = directory.trim_end_matches(['\\', '/']).replace('"', "");
    let shell = format!("fsutil volume diskfree \"{}\"", directory);
    format!("EXEC master..xp_cmdshell {};", quote_literal(&shell))
}
