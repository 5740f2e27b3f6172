use crate::errors::{AppError, AppResult};
use crate::models::HostSettings;
use anyhow::Context;
use std::path::Path;

pub const SETTINGS_FILE: &str = "settings.json";

const MIN_COMMAND_TIMEOUT_MS: u64 = 1_000;
const MAX_COMMAND_TIMEOUT_MS: u64 = 120_000;
const MIN_POLL_INTERVAL_SECS: u64 = 5;
const MAX_POLL_INTERVAL_SECS: u64 = 3_600;

/// Loads `settings.json` from `config_dir`, writing the defaults first when
/// the file does not exist yet.
pub fn load_or_init(config_dir: &Path) -> AppResult<HostSettings> {
    let path = config_dir.join(SETTINGS_FILE);
    let settings = if path.exists() {
        read_settings(&path)?
    } else {
        let defaults = HostSettings::default();
        write_settings(config_dir, &path, &defaults)?;
        tracing::info!(path = %path.display(), "wrote default settings");
        defaults
    };
    validate(&settings)?;
    Ok(settings)
}

fn read_settings(path: &Path) -> anyhow::Result<HostSettings> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_settings(config_dir: &Path, path: &Path, settings: &HostSettings) -> anyhow::Result<()> {
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("failed to create {}", config_dir.display()))?;
    let body = serde_json::to_string_pretty(settings).context("failed to serialize settings")?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

pub fn validate(settings: &HostSettings) -> AppResult<()> {
    if !(MIN_COMMAND_TIMEOUT_MS..=MAX_COMMAND_TIMEOUT_MS).contains(&settings.command_timeout_ms) {
        return Err(AppError::Config(format!(
            "commandTimeoutMs must be within {}..={}, got {}",
            MIN_COMMAND_TIMEOUT_MS, MAX_COMMAND_TIMEOUT_MS, settings.command_timeout_ms
        )));
    }
    if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&settings.status_poll_interval_secs) {
        return Err(AppError::Config(format!(
            "statusPollIntervalSecs must be within {}..={}, got {}",
            MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS, settings.status_poll_interval_secs
        )));
    }
    let required = [
        ("touchDeviceKeyword", settings.touch_device_keyword.as_str()),
        ("touchListProgram", settings.touch_list_program.as_str()),
        ("displayQueryProgram", settings.display_query_program.as_str()),
        ("terminalProgram", settings.terminal_program.as_str()),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(AppError::Config(format!("{} must not be empty", field)));
    }
    Ok(())
}
