use serde::{Deserialize, Serialize};

/// Everything the user can do in the window. Arguments arrive raw; range and
/// format checks happen host-side when the gesture becomes an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gesture", rename_all = "kebab-case")]
pub enum Gesture {
    SetKeyboardLevel { level: u8 },
    SetRgbMode { mode: String },
    SetCustomColor { color: String },
    SetBrightness { value: u16 },
    ToggleScreenpad,
    ShowDisplayInfo,
    ResetTouch,
    FixTouch,
    ShowTouchInfo,
    TestTouch,
    LaunchTouchBrowser,
    RefreshStatus,
    RunDiagnostics,
    ReloadDrivers,
    OpenTerminal,
    ClearLogs,
    ExportLogs { path: String },
    PreviewFile { path: String },
}
