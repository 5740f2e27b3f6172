use crate::errors::{AppError, AppResult};
use crate::models::{HostSettings, OperationRequest, KEYBOARD_LEVEL_MAX, SCREENPAD_BRIGHTNESS_MAX};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9A-Fa-f]{6})$").expect("valid hex color regex"));

const RGB_CONTROL: &str = "rgb_control.sh";
const SCREENPAD_CONTROL: &str = "screenpad_control.sh";
const FIX_TOUCH: &str = "fix_touch.sh";
const TEST_TOUCH: &str = "test_touch.sh";
const IMMEDIATE_TOUCH_FIX: &str = "immediate_touch_fix.sh";
const DRIVER_SCRIPTS: [&str; 5] = [RGB_CONTROL, SCREENPAD_CONTROL, FIX_TOUCH, TEST_TOUCH, IMMEDIATE_TOUCH_FIX];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgbMode {
    Static,
    Breathe,
    Cycle,
    Rainbow,
    Strobe,
}

impl RgbMode {
    pub const ALL: [RgbMode; 5] = [Self::Static, Self::Breathe, Self::Cycle, Self::Rainbow, Self::Strobe];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Breathe => "breathe",
            Self::Cycle => "cycle",
            Self::Rainbow => "rainbow",
            Self::Strobe => "strobe",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
    }
}

/// The closed set of things the host will run. Arguments are already
/// validated by the time a value of this type exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    KeyboardLevel(u8),
    RgbMode(RgbMode),
    RgbColor(String),
    RgbList,
    ScreenpadBrightness(u16),
    ScreenpadToggle,
    ScreenpadInfo,
    TouchReset,
    TouchFix,
    TouchTest,
    DriverReload,
    TouchBrowser,
    ListMonitors,
}

pub const OPERATION_NAMES: &[&str] = &[
    "keyboard-level",
    "rgb-mode",
    "rgb-color",
    "rgb-list",
    "screenpad-brightness",
    "screenpad-toggle",
    "screenpad-info",
    "touch-reset",
    "touch-fix",
    "touch-test",
    "driver-reload",
    "touch-browser",
    "list-monitors",
];

impl Operation {
    pub fn resolve(request: &OperationRequest) -> AppResult<Self> {
        let name = request.operation.trim();
        let argument = request.argument.as_ref();
        let operation = match name {
            "keyboard-level" => {
                let level = integer_argument(name, argument, u64::from(KEYBOARD_LEVEL_MAX))?;
                Self::KeyboardLevel(level as u8)
            }
            "rgb-mode" => {
                let raw = string_argument(name, argument)?;
                let mode = RgbMode::parse(raw).ok_or_else(|| {
                    AppError::InvalidArgument(format!(
                        "rgb-mode '{}' is not one of {}",
                        raw.escape_debug(),
                        RgbMode::ALL.map(RgbMode::as_str).join(", ")
                    ))
                })?;
                Self::RgbMode(mode)
            }
            "rgb-color" => {
                let raw = string_argument(name, argument)?;
                let captures = HEX_COLOR_RE.captures(raw.trim()).ok_or_else(|| {
                    AppError::InvalidArgument(format!(
                        "rgb-color '{}' is not a RRGGBB hex color",
                        raw.escape_debug()
                    ))
                })?;
                Self::RgbColor(captures[1].to_ascii_lowercase())
            }
            "screenpad-brightness" => {
                let value = integer_argument(name, argument, u64::from(SCREENPAD_BRIGHTNESS_MAX))?;
                Self::ScreenpadBrightness(value as u16)
            }
            "rgb-list" => no_argument(name, argument, Self::RgbList)?,
            "screenpad-toggle" => no_argument(name, argument, Self::ScreenpadToggle)?,
            "screenpad-info" => no_argument(name, argument, Self::ScreenpadInfo)?,
            "touch-reset" => no_argument(name, argument, Self::TouchReset)?,
            "touch-fix" => no_argument(name, argument, Self::TouchFix)?,
            "touch-test" => no_argument(name, argument, Self::TouchTest)?,
            "driver-reload" => no_argument(name, argument, Self::DriverReload)?,
            "touch-browser" => no_argument(name, argument, Self::TouchBrowser)?,
            "list-monitors" => no_argument(name, argument, Self::ListMonitors)?,
            _ => {
                return Err(AppError::UnknownOperation(format!(
                    "'{}' is not a known operation",
                    request.operation.escape_debug()
                )))
            }
        };
        Ok(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::KeyboardLevel(_) => "keyboard-level",
            Self::RgbMode(_) => "rgb-mode",
            Self::RgbColor(_) => "rgb-color",
            Self::RgbList => "rgb-list",
            Self::ScreenpadBrightness(_) => "screenpad-brightness",
            Self::ScreenpadToggle => "screenpad-toggle",
            Self::ScreenpadInfo => "screenpad-info",
            Self::TouchReset => "touch-reset",
            Self::TouchFix => "touch-fix",
            Self::TouchTest => "touch-test",
            Self::DriverReload => "driver-reload",
            Self::TouchBrowser => "touch-browser",
            Self::ListMonitors => "list-monitors",
        }
    }

    fn invocation(&self) -> (Executable, Vec<String>) {
        match self {
            Self::KeyboardLevel(level) => (Executable::Script(RGB_CONTROL), args(["basic", &level.to_string()])),
            Self::RgbMode(mode) => (Executable::Script(RGB_CONTROL), args(["mode", mode.as_str()])),
            Self::RgbColor(hex) => (Executable::Script(RGB_CONTROL), args(["color", hex.as_str()])),
            Self::RgbList => (Executable::Script(RGB_CONTROL), args(["list"])),
            Self::ScreenpadBrightness(value) => (
                Executable::Script(SCREENPAD_CONTROL),
                args(["brightness", "set", &value.to_string()]),
            ),
            Self::ScreenpadToggle => (Executable::Script(SCREENPAD_CONTROL), args(["display", "toggle"])),
            Self::ScreenpadInfo => (Executable::Script(SCREENPAD_CONTROL), args(["display", "status"])),
            Self::TouchReset => (Executable::Script(SCREENPAD_CONTROL), args(["touch", "reset"])),
            Self::TouchFix => (Executable::Script(FIX_TOUCH), Vec::new()),
            Self::TouchTest => (Executable::Script(TEST_TOUCH), Vec::new()),
            Self::DriverReload => (Executable::Script(IMMEDIATE_TOUCH_FIX), Vec::new()),
            Self::TouchBrowser => (Executable::BrowserLauncher, Vec::new()),
            Self::ListMonitors => (Executable::DisplayQuery, args(["--listmonitors"])),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Executable {
    Script(&'static str),
    BrowserLauncher,
    DisplayQuery,
}

/// A fully resolved process invocation: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn label(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CommandTable {
    scripts_dir: PathBuf,
    browser_launcher: PathBuf,
    display_query_program: String,
}

impl CommandTable {
    pub fn new(settings: &HostSettings) -> Self {
        Self {
            scripts_dir: settings.scripts_dir.clone(),
            browser_launcher: settings.browser_launcher.clone(),
            display_query_program: settings.display_query_program.clone(),
        }
    }

    pub fn command_for(&self, operation: &Operation) -> CommandSpec {
        let (executable, args) = operation.invocation();
        let program = match executable {
            Executable::Script(name) => self.scripts_dir.join(name),
            Executable::BrowserLauncher => self.browser_launcher.clone(),
            Executable::DisplayQuery => PathBuf::from(&self.display_query_program),
        };
        CommandSpec::new(program, args).in_dir(&self.scripts_dir)
    }

    /// Every executable the table can launch, as configured. Bare program
    /// names resolved through `PATH` are left out.
    pub fn programs(&self) -> Vec<PathBuf> {
        let mut programs: Vec<PathBuf> = DRIVER_SCRIPTS
            .iter()
            .map(|name| self.scripts_dir.join(name))
            .collect();
        programs.push(self.browser_launcher.clone());
        let display_query = PathBuf::from(&self.display_query_program);
        if display_query.is_absolute() {
            programs.push(display_query);
        }
        programs
    }
}

fn args<const N: usize>(values: [&str; N]) -> Vec<String> {
    values.into_iter().map(ToString::to_string).collect()
}

fn integer_argument(name: &str, argument: Option<&serde_json::Value>, max: u64) -> AppResult<u64> {
    let value = match argument {
        Some(serde_json::Value::Number(number)) => number.as_u64(),
        Some(serde_json::Value::String(text)) => {
            let text = text.trim();
            if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                text.parse::<u64>().ok()
            } else {
                None
            }
        }
        Some(_) => None,
        None => {
            return Err(AppError::InvalidArgument(format!("{} requires an argument", name)));
        }
    };
    match value {
        Some(value) if value <= max => Ok(value),
        _ => Err(AppError::InvalidArgument(format!(
            "{} expects an integer in 0..={}, got {}",
            name,
            max,
            argument.map(ToString::to_string).unwrap_or_default()
        ))),
    }
}

fn string_argument<'a>(name: &str, argument: Option<&'a serde_json::Value>) -> AppResult<&'a str> {
    match argument {
        Some(serde_json::Value::String(text)) if !text.trim().is_empty() => Ok(text.as_str()),
        Some(other) => Err(AppError::InvalidArgument(format!(
            "{} expects a string argument, got {}",
            name, other
        ))),
        None => Err(AppError::InvalidArgument(format!("{} requires an argument", name))),
    }
}

fn no_argument(name: &str, argument: Option<&serde_json::Value>, operation: Operation) -> AppResult<Operation> {
    match argument {
        None | Some(serde_json::Value::Null) => Ok(operation),
        Some(other) => Err(AppError::InvalidArgument(format!(
            "{} takes no argument, got {}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandTable, Operation, RgbMode, OPERATION_NAMES};
    use crate::errors::AppError;
    use crate::models::{HostSettings, OperationRequest};
    use std::path::PathBuf;

    fn table() -> CommandTable {
        let settings = HostSettings {
            scripts_dir: PathBuf::from("/opt/drivers"),
            browser_launcher: PathBuf::from("/home/user/launch_browser_touch.sh"),
            ..HostSettings::default()
        };
        CommandTable::new(&settings)
    }

    #[test]
    fn keyboard_levels_map_to_exact_integer() {
        let table = table();
        for level in 0..=3u8 {
            let request = OperationRequest::new("keyboard-level").with_argument(level);
            let operation = Operation::resolve(&request).expect("valid level");
            let spec = table.command_for(&operation);
            assert_eq!(spec.program, PathBuf::from("/opt/drivers/rgb_control.sh"));
            assert_eq!(spec.args, vec!["basic".to_string(), level.to_string()]);
            assert_eq!(spec.cwd.as_deref(), Some(std::path::Path::new("/opt/drivers")));
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for argument in [serde_json::json!(4), serde_json::json!(-1), serde_json::json!(1.5), serde_json::json!("2; rm -rf /")] {
            let request = OperationRequest {
                operation: "keyboard-level".to_string(),
                argument: Some(argument),
            };
            assert!(matches!(Operation::resolve(&request), Err(AppError::InvalidArgument(_))));
        }

        let request = OperationRequest::new("screenpad-brightness").with_argument(236);
        assert!(matches!(Operation::resolve(&request), Err(AppError::InvalidArgument(_))));
        let request = OperationRequest::new("screenpad-brightness").with_argument("235");
        assert_eq!(Operation::resolve(&request).expect("string digits"), Operation::ScreenpadBrightness(235));
    }

    #[test]
    fn unknown_operation_is_reported_as_such() {
        let request = OperationRequest::new("format-disk");
        assert!(matches!(Operation::resolve(&request), Err(AppError::UnknownOperation(_))));
    }

    #[test]
    fn argument_presence_is_checked() {
        assert!(matches!(
            Operation::resolve(&OperationRequest::new("keyboard-level")),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            Operation::resolve(&OperationRequest::new("touch-fix").with_argument("--force")),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn colors_and_modes_are_normalized() {
        let color = Operation::resolve(&OperationRequest::new("rgb-color").with_argument("#FF6600"))
            .expect("hex color");
        assert_eq!(color, Operation::RgbColor("ff6600".to_string()));
        assert!(Operation::resolve(&OperationRequest::new("rgb-color").with_argument("ff66001")).is_err());
        assert!(Operation::resolve(&OperationRequest::new("rgb-color").with_argument("$(id)")).is_err());

        let mode = Operation::resolve(&OperationRequest::new("rgb-mode").with_argument("rainbow"))
            .expect("mode");
        assert_eq!(mode, Operation::RgbMode(RgbMode::Rainbow));
        assert!(Operation::resolve(&OperationRequest::new("rgb-mode").with_argument("disco")).is_err());
    }

    #[test]
    fn every_listed_name_resolves_to_itself() {
        for name in OPERATION_NAMES {
            let argument = match *name {
                "keyboard-level" | "screenpad-brightness" => Some(serde_json::json!(1)),
                "rgb-mode" => Some(serde_json::json!("static")),
                "rgb-color" => Some(serde_json::json!("00ff00")),
                _ => None,
            };
            let request = OperationRequest {
                operation: name.to_string(),
                argument,
            };
            let operation = Operation::resolve(&request).expect("listed operation resolves");
            assert_eq!(operation.name(), *name);
        }
    }

    #[test]
    fn programs_cover_every_launchable_file() {
        let table = table();
        let programs = table.programs();
        for name in OPERATION_NAMES {
            let request = match *name {
                "keyboard-level" => OperationRequest::new(*name).with_argument(1),
                "rgb-mode" => OperationRequest::new(*name).with_argument("static"),
                "rgb-color" => OperationRequest::new(*name).with_argument("00ff00"),
                "screenpad-brightness" => OperationRequest::new(*name).with_argument(10),
                _ => OperationRequest::new(*name),
            };
            let operation = Operation::resolve(&request).expect("resolves");
            let spec = table.command_for(&operation);
            if spec.program.is_absolute() {
                assert!(programs.contains(&spec.program), "{} missing", spec.program.display());
            }
        }
        assert!(programs.contains(&PathBuf::from("/home/user/launch_browser_touch.sh")));
    }

    #[test]
    fn launcher_and_display_query_use_configured_programs() {
        let table = table();
        let browser = table.command_for(&Operation::TouchBrowser);
        assert_eq!(browser.program, PathBuf::from("/home/user/launch_browser_touch.sh"));
        assert!(browser.args.is_empty());

        let monitors = table.command_for(&Operation::ListMonitors);
        assert_eq!(monitors.program, PathBuf::from("xrandr"));
        assert_eq!(monitors.args, vec!["--listmonitors".to_string()]);
        assert_eq!(monitors.label(), "xrandr");
    }
}
