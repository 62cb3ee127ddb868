// dbclone/src/engine/volume.rs
use regex::Regex;
use std::sync::OnceLock;

use crate::engine::sqlcmd::SqlcmdEngine;
use crate::engine::{EngineError, VolumeQuery, tsql};

fn free_bytes_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*total\s+(?:#\s+of\s+)?free\s+bytes\s*:\s*([0-9][0-9,.\u{a0} ]*)")
            .expect("free bytes pattern is valid")
    })
}

/// Extracts the free byte count from `fsutil volume diskfree` output lines.
pub(crate) fn parse_free_bytes<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<u64> {
    lines.into_iter().find_map(|line| {
        let caps = free_bytes_regex().captures(line)?;
        let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
        digits.parse::<u64>().ok()
    })
}

/// Free space through `xp_cmdshell`. The caller must hold the instance flags
/// that allow command execution.
impl VolumeQuery for SqlcmdEngine {
    fn free_bytes(&self, directory: &str) -> Result<Option<u64>, EngineError> {
        let rows = self.run(&tsql::disk_free_command(directory))?;
        Ok(parse_free_bytes(
            rows.iter().filter_map(|row| row.first()).map(String::as_str),
        ))
    }
}
