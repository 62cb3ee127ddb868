// dbclone/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::clone::model::{CloneRequest, DEFAULT_MAX_BACKUP_AGE_DAYS};

pub const SERVER_URL_ENV: &str = "DBCLONE_SERVER_URL";
pub const PASSWORD_ENV: &str = "DBCLONE_PASSWORD";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub server_url: Option<String>,
    pub sqlcmd_path: Option<PathBuf>,
    #[serde(default)]
    pub trust_server_certificate: bool,
    pub dump_directory: Option<String>,
    pub backup_tool: Option<String>,
    pub max_backup_age_days: Option<u32>,
    pub log_file: Option<PathBuf>,
}

/// Values read from the environment (and `.env`) that win over config.json.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub server_url: Option<String>,
    pub password: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        EnvOverrides {
            server_url: non_empty(SERVER_URL_ENV),
            password: non_empty(PASSWORD_ENV),
        }
    }
}

/// Request fields a run falls back to when the command line leaves them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefaults {
    pub dump_directory: Option<String>,
    pub backup_tool: Option<String>,
    pub max_backup_age_days: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_url: String,
    pub sqlcmd_path: Option<PathBuf>,
    pub trust_server_certificate: bool,
    pub log_file: Option<PathBuf>,
    pub defaults: RequestDefaults,
}

/// Request fields supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub source_database: String,
    pub target_database: Option<String>,
    pub dump_directory: Option<String>,
    pub backup_tool: Option<String>,
    pub max_backup_age_days: Option<u32>,
}

impl AppConfig {
    /// Loads config.json; a missing file is accepted when the server URL comes
    /// from the environment.
    pub fn load_from_json(config_path: &Path, env: &EnvOverrides) -> Result<Self> {
        let raw_json_config = if !config_path.exists() && env.server_url.is_some() {
            RawJsonConfig::default()
        } else {
            let config_content = fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read config file at {}", config_path.display())
            })?;
            serde_json::from_str(&config_content).with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?
        };
        Self::from_raw(raw_json_config, env)
    }

    pub fn from_raw(raw: RawJsonConfig, env: &EnvOverrides) -> Result<Self> {
        let server_url = env
            .server_url
            .clone()
            .or(raw.server_url)
            .filter(|s| !s.trim().is_empty())
            .with_context(|| {
                format!(
                    "server_url must be set in config.json or through {}",
                    SERVER_URL_ENV
                )
            })?;
        let server_url = match &env.password {
            Some(password) => with_password(&server_url, password)?,
            None => server_url,
        };

        let defaults = RequestDefaults {
            dump_directory: raw.dump_directory.filter(|s| !s.trim().is_empty()),
            backup_tool: raw.backup_tool.filter(|s| !s.trim().is_empty()),
            max_backup_age_days: raw
                .max_backup_age_days
                .unwrap_or(DEFAULT_MAX_BACKUP_AGE_DAYS),
        };

        Ok(AppConfig {
            server_url,
            sqlcmd_path: raw.sqlcmd_path,
            trust_server_certificate: raw.trust_server_certificate,
            log_file: raw.log_file,
            defaults,
        })
    }

    /// Merges command-line values over the configured defaults.
    pub fn build_clone_request(&self, overrides: RequestOverrides) -> Result<CloneRequest> {
        let source = overrides.source_database.trim();
        if source.is_empty() {
            anyhow::bail!("Source database name cannot be empty.");
        }

        let target_database = match overrides.target_database {
            Some(target) if target.trim().is_empty() => {
                anyhow::bail!("Target database name cannot be empty when given.")
            }
            Some(target) => Some(target.trim().to_string()),
            None => None,
        };

        let mut request = CloneRequest::new(source).with_max_backup_age_days(
            overrides
                .max_backup_age_days
                .unwrap_or(self.defaults.max_backup_age_days),
        );
        if let Some(target) = target_database {
            request = request.with_target(target);
        }
        if let Some(dir) = overrides
            .dump_directory
            .or_else(|| self.defaults.dump_directory.clone())
        {
            request = request.with_dump_directory(dir);
        }
        if let Some(tool) = overrides
            .backup_tool
            .or_else(|| self.defaults.backup_tool.clone())
        {
            request = request.with_backup_tool(tool);
        }
        Ok(request)
    }
}

fn with_password(server_url: &str, password: &str) -> Result<String> {
    let mut parsed = Url::parse(server_url)
        .with_context(|| format!("Invalid server URL format: {}", server_url))?;
    parsed
        .set_password(Some(password))
        .map_err(|_| anyhow::anyhow!("Server URL cannot carry a password: {}", server_url))?;
    Ok(parsed.to_string())
}
