use crate::models::{HostSettings, StatusSnapshot, KEYBOARD_LEVEL_MAX, SCREENPAD_BRIGHTNESS_MAX};
use crate::operations::CommandSpec;
use crate::runner::CommandRunner;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::time::{timeout, Duration};

/// Reads the three status sources concurrently. A failing source falls back to
/// its default value; it never fails the snapshot as a whole.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    keyboard_path: PathBuf,
    screenpad_path: PathBuf,
    touch_lister: CommandSpec,
    touch_keyword: String,
    runner: CommandRunner,
    read_timeout: Duration,
}

impl StatusPoller {
    pub fn new(settings: &HostSettings, runner: CommandRunner) -> Self {
        Self {
            keyboard_path: settings.keyboard_brightness_path.clone(),
            screenpad_path: settings.screenpad_brightness_path.clone(),
            touch_lister: CommandSpec::new(&settings.touch_list_program, settings.touch_list_args.clone()),
            touch_keyword: settings.touch_device_keyword.clone(),
            read_timeout: runner.timeout(),
            runner,
        }
    }

    pub async fn poll(&self) -> StatusSnapshot {
        let (keyboard, screenpad, touch) = tokio::join!(
            self.read_number(&self.keyboard_path),
            self.read_number(&self.screenpad_path),
            self.query_touch(),
        );

        let snapshot = StatusSnapshot {
            keyboard_level: keyboard.unwrap_or(0).min(u64::from(KEYBOARD_LEVEL_MAX)) as u8,
            screenpad_brightness: screenpad.unwrap_or(0).min(u64::from(SCREENPAD_BRIGHTNESS_MAX)) as u16,
            touch_device_connected: touch.unwrap_or(false),
            captured_at: Some(Utc::now()),
        };
        tracing::debug!(
            keyboard_level = snapshot.keyboard_level,
            screenpad_brightness = snapshot.screenpad_brightness,
            touch_device_connected = snapshot.touch_device_connected,
            "status snapshot assembled"
        );
        snapshot
    }

    async fn read_number(&self, path: &Path) -> Option<u64> {
        let raw = match timeout(self.read_timeout, tokio::fs::read_to_string(path)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(error)) => {
                tracing::debug!(path = %path.display(), error = %error, "status source unreadable, using default");
                return None;
            }
            Err(_) => {
                tracing::debug!(path = %path.display(), "status source timed out, using default");
                return None;
            }
        };
        let parsed = parse_leading_integer(&raw);
        if parsed.is_none() {
            tracing::debug!(path = %path.display(), raw = %raw.trim(), "status source unparseable, using default");
        }
        parsed
    }

    async fn query_touch(&self) -> Option<bool> {
        let result = self.runner.run(&self.touch_lister).await;
        if !result.success {
            tracing::debug!(error = result.error_message(), "touch query failed, using default");
            return None;
        }
        Some(result.stdout.lines().any(|line| line.contains(&self.touch_keyword)))
    }
}

/// Leading-digit parse: "3\n" -> 3, "12abc" -> 12, "abc" -> None. A digit
/// run too long for `u64` saturates so the caller's clamp still applies.
pub fn parse_leading_integer(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let digits = &trimmed[..end];
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse().unwrap_or(u64::MAX))
}
