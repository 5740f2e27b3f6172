use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const KEYBOARD_LEVEL_MAX: u8 = 3;
pub const SCREENPAD_BRIGHTNESS_MAX: u16 = 235;

/// A request from the display layer. The name is matched against the closed
/// operation set by the host; nothing here is trusted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<serde_json::Value>,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            argument: None,
        }
    }

    pub fn with_argument(mut self, argument: impl Into<serde_json::Value>) -> Self {
        self.argument = Some(argument.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationErrorKind {
    UnknownOperation,
    InvalidArgument,
    Timeout,
    SubprocessFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub error_kind: Option<OperationErrorKind>,
}

impl OperationResult {
    pub fn succeeded(stdout: String, stderr: String) -> Self {
        Self {
            success: true,
            stdout,
            stderr,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(error: &AppError, stdout: String, stderr: String) -> Self {
        let kind = match error {
            AppError::UnknownOperation(_) => OperationErrorKind::UnknownOperation,
            AppError::InvalidArgument(_) | AppError::Policy(_) => OperationErrorKind::InvalidArgument,
            AppError::Timeout(_) => OperationErrorKind::Timeout,
            _ => OperationErrorKind::SubprocessFailure,
        };
        Self {
            success: false,
            stdout,
            stderr,
            error: Some(error.to_string()),
            error_kind: Some(kind),
        }
    }

    pub fn rejected(error: &AppError) -> Self {
        Self::failed(error, String::new(), String::new())
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// Point-in-time device status. Never edited in place: a poll builds a new
/// one, and successful set operations derive a new one from the last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub keyboard_level: u8,
    pub screenpad_brightness: u16,
    pub touch_device_connected: bool,
    pub captured_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn with_keyboard_level(&self, level: u8) -> Self {
        Self {
            keyboard_level: level.min(KEYBOARD_LEVEL_MAX),
            ..self.clone()
        }
    }

    pub fn with_screenpad_brightness(&self, brightness: u16) -> Self {
        Self {
            screenpad_brightness: brightness.min(SCREENPAD_BRIGHTNESS_MAX),
            ..self.clone()
        }
    }

    pub fn screenpad_percent(&self) -> u32 {
        brightness_percent(self.screenpad_brightness)
    }

    pub fn touch_label(&self) -> &'static str {
        if self.touch_device_connected {
            "Connected"
        } else {
            "Disconnected"
        }
    }
}

pub fn brightness_percent(value: u16) -> u32 {
    (f64::from(value) / f64::from(SCREENPAD_BRIGHTNESS_MAX) * 100.0).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogSeverity {
    Info,
    Success,
    Error,
}

impl LogSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub severity: LogSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialogLevel {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialogButtons {
    #[default]
    Ok,
    OkCancel,
    YesNo,
}

impl DialogButtons {
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Ok => &["OK"],
            Self::OkCancel => &["OK", "Cancel"],
            Self::YesNo => &["Yes", "No"],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogOptions {
    #[serde(default)]
    pub level: DialogLevel,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub buttons: DialogButtons,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogResult {
    pub response: usize,
    pub confirmed: bool,
}

impl DialogResult {
    pub fn confirmed() -> Self {
        Self {
            response: 0,
            confirmed: true,
        }
    }

    /// The last button is the negative one for every button set; a lone
    /// "OK" dismissed without a choice still counts as not confirmed.
    pub fn dismissed(buttons: DialogButtons) -> Self {
        Self {
            response: buttons.labels().len().saturating_sub(1),
            confirmed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileResult {
    pub success: bool,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl ReadFileResult {
    pub fn read(content: String) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
        }
    }

    pub fn failed(error: &AppError) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayView {
    pub snapshot: StatusSnapshot,
    pub keyboard_status: String,
    pub screenpad_status: String,
    pub brightness_value: String,
    pub touch_status: String,
    pub system_status: String,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostSettings {
    pub scripts_dir: PathBuf,
    pub browser_launcher: PathBuf,
    pub keyboard_brightness_path: PathBuf,
    pub screenpad_brightness_path: PathBuf,
    pub touch_list_program: String,
    pub touch_list_args: Vec<String>,
    pub touch_device_keyword: String,
    pub display_query_program: String,
    pub terminal_program: String,
    pub command_timeout_ms: u64,
    pub status_poll_interval_secs: u64,
    /// Directories `read_file` may reach.
    pub file_roots: Vec<PathBuf>,
    /// Directories `write_file` may reach. The app data dir is added at
    /// startup; driver programs stay unwritable regardless.
    pub writable_roots: Vec<PathBuf>,
}

impl HostSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_secs)
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"));
        let scripts_dir = home.join("asus_drivers");
        Self {
            scripts_dir: scripts_dir.clone(),
            browser_launcher: home.join("launch_browser_touch.sh"),
            keyboard_brightness_path: PathBuf::from("/sys/class/leds/asus::kbd_backlight/brightness"),
            screenpad_brightness_path: PathBuf::from("/sys/class/backlight/asus_screenpad/brightness"),
            touch_list_program: "xinput".to_string(),
            touch_list_args: vec!["list".to_string()],
            touch_device_keyword: "ELAN9009".to_string(),
            display_query_program: "xrandr".to_string(),
            terminal_program: "gnome-terminal".to_string(),
            command_timeout_ms: 10_000,
            status_poll_interval_secs: 30,
            file_roots: vec![scripts_dir],
            writable_roots: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{brightness_percent, DialogButtons, DialogResult, OperationRequest, StatusSnapshot};

    #[test]
    fn brightness_percent_rounds_to_nearest() {
        assert_eq!(brightness_percent(117), 50);
        assert_eq!(brightness_percent(0), 0);
        assert_eq!(brightness_percent(235), 100);
        assert_eq!(brightness_percent(150), 64);
    }

    #[test]
    fn derived_snapshots_leave_the_original_untouched() {
        let original = StatusSnapshot {
            keyboard_level: 1,
            screenpad_brightness: 20,
            touch_device_connected: true,
            captured_at: None,
        };
        let next = original.with_keyboard_level(3).with_screenpad_brightness(400);
        assert_eq!(original.keyboard_level, 1);
        assert_eq!(next.keyboard_level, 3);
        assert_eq!(next.screenpad_brightness, 235);
        assert!(next.touch_device_connected);
    }

    #[test]
    fn request_wire_shape_is_camel_case() {
        let request = OperationRequest::new("keyboard-level").with_argument(2);
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value, serde_json::json!({ "operation": "keyboard-level", "argument": 2 }));

        let parsed: OperationRequest =
            serde_json::from_value(serde_json::json!({ "operation": "rgb-list" })).expect("parse");
        assert_eq!(parsed.argument, None);
    }

    #[test]
    fn dismissed_dialog_points_at_negative_button() {
        assert_eq!(DialogResult::dismissed(DialogButtons::OkCancel).response, 1);
        assert_eq!(DialogResult::dismissed(DialogButtons::Ok).response, 0);
        assert!(!DialogResult::dismissed(DialogButtons::YesNo).confirmed);
    }
}
