use crate::errors::AppResult;
use crate::host::{DialogPresenter, Host};
use crate::models::{DialogOptions, DialogResult, HostSettings};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("set perms");
    }
    path
}

#[derive(Debug, Default)]
pub struct ScriptedDialog {
    confirm: bool,
    shown: AtomicUsize,
}

impl ScriptedDialog {
    pub fn answering(confirm: bool) -> Arc<Self> {
        Arc::new(Self {
            confirm,
            shown: AtomicUsize::new(0),
        })
    }

    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }
}

impl DialogPresenter for ScriptedDialog {
    fn present(&self, options: &DialogOptions) -> AppResult<DialogResult> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        Ok(if self.confirm {
            DialogResult::confirmed()
        } else {
            DialogResult::dismissed(options.buttons)
        })
    }
}

/// A fake driver directory: executable stand-ins for every script the host
/// runs plus brightness files in place of the sysfs nodes.
pub struct FixtureBed {
    pub dir: TempDir,
    pub scripts_dir: PathBuf,
    pub keyboard_file: PathBuf,
    pub screenpad_file: PathBuf,
}

impl FixtureBed {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let scripts_dir = dir.path().join("asus_drivers");
        std::fs::create_dir_all(&scripts_dir).expect("scripts dir");
        let keyboard_file = dir.path().join("kbd_brightness");
        let screenpad_file = dir.path().join("screenpad_brightness");
        std::fs::write(&keyboard_file, "2\n").expect("keyboard file");
        std::fs::write(&screenpad_file, "117\n").expect("screenpad file");

        let bed = Self {
            dir,
            scripts_dir,
            keyboard_file,
            screenpad_file,
        };
        bed.script(
            "rgb_control.sh",
            &format!(
                "case \"$1\" in\n  basic) printf '%s\\n' \"$2\" > '{}'; echo \"keyboard level $2\" ;;\n  *) echo \"rgb $*\" ;;\nesac\n",
                bed.keyboard_file.display()
            ),
        );
        bed.script(
            "screenpad_control.sh",
            &format!(
                "if [ \"$1\" = brightness ] && [ \"$2\" = set ]; then printf '%s\\n' \"$3\" > '{}'; fi\necho \"screenpad $*\"\n",
                bed.screenpad_file.display()
            ),
        );
        bed.script("fix_touch.sh", "echo 'touch settings applied'\n");
        bed.script("test_touch.sh", "echo 'touch ok'\n");
        bed.script("immediate_touch_fix.sh", "echo reloaded > reload.marker\n");
        write_script(bed.dir.path(), "launch_browser_touch.sh", "echo launched\n");
        write_script(
            bed.dir.path(),
            "xinput",
            "echo '  Virtual core pointer  id=2'\necho '    ELAN9009:00 04F3:2C1B  id=12 [slave pointer]'\n",
        );
        write_script(bed.dir.path(), "xrandr", "echo 'Monitors: 2'\n");
        bed
    }

    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        write_script(&self.scripts_dir, name, body)
    }

    pub fn settings(&self) -> HostSettings {
        HostSettings {
            scripts_dir: self.scripts_dir.clone(),
            browser_launcher: self.dir.path().join("launch_browser_touch.sh"),
            keyboard_brightness_path: self.keyboard_file.clone(),
            screenpad_brightness_path: self.screenpad_file.clone(),
            touch_list_program: self.dir.path().join("xinput").to_string_lossy().to_string(),
            touch_list_args: vec!["list".to_string()],
            touch_device_keyword: "ELAN9009".to_string(),
            display_query_program: self.dir.path().join("xrandr").to_string_lossy().to_string(),
            terminal_program: "true".to_string(),
            command_timeout_ms: 5_000,
            status_poll_interval_secs: 30,
            file_roots: vec![self.dir.path().to_path_buf()],
            writable_roots: vec![self.dir.path().to_path_buf()],
        }
    }

    pub fn host(&self, dialogs: Arc<ScriptedDialog>) -> Host {
        Host::new(self.settings(), dialogs)
    }
}
