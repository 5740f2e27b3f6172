//! Display-side state machine. Turns gestures into bridge calls and keeps the
//! labels, snapshot and activity log that the webview renders.

mod gesture;
mod log_buffer;

pub use gesture::Gesture;
pub use log_buffer::{LogBuffer, LOG_CAPACITY};

use crate::bridge::Bridge;
use crate::models::{
    brightness_percent, DialogButtons, DialogLevel, DialogOptions, DisplayView, LogSeverity, OperationRequest,
    OperationResult, StatusSnapshot,
};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};

const KEYBOARD_LEVEL_NAMES: [&str; 4] = ["OFF", "DIM", "MEDIUM", "BRIGHT"];
const OUTPUT_LOG_MAX_CHARS: usize = 100;

const DIAGNOSTIC_STEPS: [(&str, &str); 3] = [
    ("touch-test", "Touch device diagnostics"),
    ("list-monitors", "Display configuration check"),
    ("rgb-list", "RGB device detection"),
];

#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub diagnostics_step: Duration,
    pub reload_settle: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            diagnostics_step: Duration::from_millis(500),
            reload_settle: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
struct DisplayState {
    snapshot: Arc<StatusSnapshot>,
    touch_note: Option<String>,
    logs: LogBuffer,
}

pub struct DisplayController {
    bridge: Arc<dyn Bridge>,
    state: Mutex<DisplayState>,
    pacing: Pacing,
}

impl DisplayController {
    pub fn new(bridge: Arc<dyn Bridge>) -> Self {
        Self::with_pacing(bridge, Pacing::default())
    }

    pub fn with_pacing(bridge: Arc<dyn Bridge>, pacing: Pacing) -> Self {
        Self {
            bridge,
            state: Mutex::new(DisplayState::default()),
            pacing,
        }
    }

    pub async fn view(&self) -> DisplayView {
        let state = self.state.lock().await;
        let snapshot = state.snapshot.as_ref().clone();
        let touch_label = snapshot.touch_label();
        let updated = snapshot
            .captured_at
            .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());

        DisplayView {
            keyboard_status: format!("Keyboard backlight at level {}/3", snapshot.keyboard_level),
            screenpad_status: format!("ScreenPad brightness at {}%", snapshot.screenpad_percent()),
            brightness_value: format!("{}/235", snapshot.screenpad_brightness),
            touch_status: state
                .touch_note
                .clone()
                .unwrap_or_else(|| format!("Touch device {}", touch_label)),
            system_status: format!("Touch: {} | Updated: {}", touch_label, updated),
            logs: state.logs.entries(),
            snapshot,
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.state.lock().await.snapshot.as_ref().clone()
    }

    pub async fn handle(&self, gesture: Gesture) -> DisplayView {
        tracing::debug!(target: "display", gesture = ?gesture, "gesture received");
        match gesture {
            Gesture::SetKeyboardLevel { level } => self.set_keyboard_level(level).await,
            Gesture::SetRgbMode { mode } => {
                let shown = mode.to_uppercase().escape_debug().to_string();
                let result = self
                    .run_command(
                        OperationRequest::new("rgb-mode").with_argument(mode),
                        format!("Setting RGB mode to {}", shown),
                    )
                    .await;
                if result.success {
                    self.log(LogSeverity::Success, format!("RGB mode set to {}", shown)).await;
                }
            }
            Gesture::SetCustomColor { color } => {
                let result = self
                    .run_command(
                        OperationRequest::new("rgb-color").with_argument(color.clone()),
                        format!("Setting custom RGB color to {}", color.escape_debug()),
                    )
                    .await;
                if result.success {
                    self.log(LogSeverity::Success, format!("Custom RGB color set to {}", color.escape_debug()))
                        .await;
                }
            }
            Gesture::SetBrightness { value } => self.set_brightness(value).await,
            Gesture::ToggleScreenpad => {
                self.simple("screenpad-toggle", "Toggling ScreenPad display", "ScreenPad display toggled")
                    .await;
            }
            Gesture::ShowDisplayInfo => {
                self.simple(
                    "screenpad-info",
                    "Retrieving display information",
                    "Display information retrieved",
                )
                .await;
            }
            Gesture::ResetTouch => {
                if self
                    .simple("touch-reset", "Resetting touch input device", "Touch input device reset")
                    .await
                {
                    self.set_touch_note("Touch device reset - Testing recommended").await;
                }
            }
            Gesture::FixTouch => {
                if self
                    .simple(
                        "touch-fix",
                        "Applying touch configuration update",
                        "Touch configuration refreshed",
                    )
                    .await
                {
                    self.set_touch_note("Touch settings refreshed").await;
                }
            }
            Gesture::ShowTouchInfo => {
                self.simple(
                    "touch-test",
                    "Retrieving touch device information",
                    "Touch device information retrieved",
                )
                .await;
            }
            Gesture::TestTouch => {
                self.simple(
                    "touch-test",
                    "Running touch functionality test",
                    "Touch functionality test completed",
                )
                .await;
            }
            Gesture::LaunchTouchBrowser => {
                self.simple(
                    "touch-browser",
                    "Launching touch-optimized browser",
                    "Touch-optimized browser launched",
                )
                .await;
            }
            Gesture::RefreshStatus => self.refresh_status().await,
            Gesture::RunDiagnostics => self.run_diagnostics().await,
            Gesture::ReloadDrivers => self.reload_drivers().await,
            Gesture::OpenTerminal => {
                let result = self.bridge.open_terminal().await;
                if result.success {
                    self.log(LogSeverity::Success, "Terminal opened in driver directory").await;
                } else {
                    self.log(
                        LogSeverity::Error,
                        format!("Failed to open terminal: {}", result.error_message()),
                    )
                    .await;
                }
            }
            Gesture::ClearLogs => {
                let mut state = self.state.lock().await;
                state.logs.clear();
                push_entry(&mut state, LogSeverity::Info, "Logs cleared".to_string());
            }
            Gesture::ExportLogs { path } => self.export_logs(path).await,
            Gesture::PreviewFile { path } => self.preview_file(path).await,
        }
        self.view().await
    }

    /// Startup sequence: greeting, first status read, then the note that
    /// periodic polling is on.
    pub async fn initialize(&self) {
        self.log(LogSeverity::Success, "Control center initialized").await;
        self.log(
            LogSeverity::Info,
            format!("Running {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        )
        .await;
        self.refresh_status().await;
        self.log(LogSeverity::Info, "Background monitoring started").await;
    }

    /// Replaces the snapshot wholesale with a fresh poll and drops any
    /// transient touch note.
    pub async fn refresh_status(&self) {
        self.log(LogSeverity::Info, "Refreshing system status...").await;
        let snapshot = self.bridge.get_system_status().await;
        let mut state = self.state.lock().await;
        state.snapshot = Arc::new(snapshot);
        state.touch_note = None;
        push_entry(&mut state, LogSeverity::Success, "System status refreshed successfully".to_string());
    }

    /// Refreshes on a fixed period, forever. The first tick fires one period
    /// after the call; `on_refresh` receives the view after each refresh.
    pub async fn run_status_polling<F>(self: Arc<Self>, every: Duration, on_refresh: F)
    where
        F: Fn(DisplayView) + Send + 'static,
    {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refresh_status().await;
            on_refresh(self.view().await);
        }
    }

    async fn set_keyboard_level(&self, level: u8) {
        let name = KEYBOARD_LEVEL_NAMES
            .get(usize::from(level))
            .copied()
            .unwrap_or("UNKNOWN");
        let result = self
            .run_command(
                OperationRequest::new("keyboard-level").with_argument(level),
                format!("Setting keyboard backlight to {}", name),
            )
            .await;
        if result.success {
            let mut state = self.state.lock().await;
            state.snapshot = Arc::new(state.snapshot.with_keyboard_level(level));
            push_entry(&mut state, LogSeverity::Success, format!("Keyboard backlight set to {}", name));
        }
    }

    async fn set_brightness(&self, value: u16) {
        let percent = brightness_percent(value);
        let result = self
            .run_command(
                OperationRequest::new("screenpad-brightness").with_argument(value),
                format!("Setting ScreenPad brightness to {}%", percent),
            )
            .await;
        if result.success {
            let mut state = self.state.lock().await;
            state.snapshot = Arc::new(state.snapshot.with_screenpad_brightness(value));
            push_entry(
                &mut state,
                LogSeverity::Success,
                format!("ScreenPad brightness set to {}%", percent),
            );
        }
    }

    async fn run_diagnostics(&self) {
        self.log(LogSeverity::Info, "Running comprehensive system diagnostics...").await;
        for (index, (operation, description)) in DIAGNOSTIC_STEPS.iter().enumerate() {
            if index > 0 {
                sleep(self.pacing.diagnostics_step).await;
            }
            self.log(LogSeverity::Info, format!("Running: {}", description)).await;
            self.run_command(OperationRequest::new(*operation), format!("Executing: {}", operation))
                .await;
        }
        self.log(LogSeverity::Success, "System diagnostics completed").await;
    }

    async fn reload_drivers(&self) {
        let answer = self
            .bridge
            .show_dialog(DialogOptions {
                level: DialogLevel::Warning,
                title: "Reload Drivers".to_string(),
                message: "Reload the ASUS drivers and touch optimization? Input devices may stop responding for a moment."
                    .to_string(),
                buttons: DialogButtons::YesNo,
            })
            .await;
        if !answer.confirmed {
            self.log(LogSeverity::Info, "Driver reload canceled").await;
            return;
        }

        let result = self
            .run_command(
                OperationRequest::new("driver-reload"),
                "Reloading ASUS drivers and touch optimization".to_string(),
            )
            .await;
        if result.success {
            self.log(LogSeverity::Success, "Drivers reloaded successfully").await;
            sleep(self.pacing.reload_settle).await;
            self.refresh_status().await;
        }
    }

    async fn export_logs(&self, path: String) {
        let rendered = self.state.lock().await.logs.render();
        self.log(LogSeverity::Info, format!("Exporting logs to {}", path.escape_debug())).await;
        let result = self.bridge.write_file(path.clone(), rendered).await;
        if result.success {
            self.log(LogSeverity::Success, format!("Logs exported to {}", path.escape_debug())).await;
        } else {
            self.log(
                LogSeverity::Error,
                format!("Failed to export logs: {}", result.error_message()),
            )
            .await;
        }
    }

    async fn preview_file(&self, path: String) {
        let result = self.bridge.read_file(path.clone()).await;
        match result.content {
            Some(content) if result.success => {
                self.log(LogSeverity::Info, format!("Read {} bytes from {}", content.len(), path.escape_debug()))
                    .await;
                if let Some(line) = content.lines().map(str::trim).find(|line| !line.is_empty()) {
                    let line: String = line.chars().take(OUTPUT_LOG_MAX_CHARS).collect();
                    self.log(LogSeverity::Info, format!("First line: {}", line)).await;
                }
            }
            _ => {
                let reason = result.error.as_deref().unwrap_or("unknown error");
                self.log(LogSeverity::Error, format!("Failed to read {}: {}", path.escape_debug(), reason))
                    .await;
            }
        }
    }

    /// Command gestures whose only follow-up is a fixed success line.
    async fn simple(&self, operation: &str, description: &str, success: &str) -> bool {
        let result = self
            .run_command(OperationRequest::new(operation), description.to_string())
            .await;
        if result.success {
            self.log(LogSeverity::Success, success).await;
        }
        result.success
    }

    async fn run_command(&self, request: OperationRequest, description: String) -> OperationResult {
        self.log(LogSeverity::Info, description).await;
        let result = self.bridge.execute_command(request).await;
        if result.success {
            self.log(LogSeverity::Success, "Command completed successfully").await;
            let output = result.stdout.trim();
            if worth_logging(output) {
                self.log(LogSeverity::Info, format!("Output: {}", output)).await;
            }
        } else {
            self.log(LogSeverity::Error, format!("Command failed: {}", result.error_message()))
                .await;
        }
        result
    }

    async fn set_touch_note(&self, note: &str) {
        self.state.lock().await.touch_note = Some(note.to_string());
    }

    async fn log(&self, severity: LogSeverity, message: impl Into<String>) {
        let mut state = self.state.lock().await;
        push_entry(&mut state, severity, message.into());
    }
}

fn push_entry(state: &mut DisplayState, severity: LogSeverity, message: String) {
    match severity {
        LogSeverity::Error => tracing::warn!(target: "display", severity = severity.as_str(), "{}", message),
        _ => tracing::info!(target: "display", severity = severity.as_str(), "{}", message),
    }
    state.logs.push(severity, message);
}

fn worth_logging(output: &str) -> bool {
    !output.is_empty()
        && output.chars().count() < OUTPUT_LOG_MAX_CHARS
        && !output.to_lowercase().contains("password")
}
