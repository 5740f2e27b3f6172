mod dialog;
mod files;

pub use dialog::{DialogPresenter, NativeDialogPresenter};
pub use files::FileAccess;

use crate::bridge::{sealed, Bridge};
use crate::errors::{AppError, AppResult};
use crate::models::{
    DialogOptions, DialogResult, HostSettings, OperationRequest, OperationResult, ReadFileResult, StatusSnapshot,
};
use crate::operations::{CommandTable, Operation};
use crate::runner::CommandRunner;
use crate::status::StatusPoller;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const MAX_READ_BYTES: u64 = 1024 * 1024;

/// The privileged side. Owns the operation table, the runner and the file
/// roots; the display layer only sees it as `dyn Bridge`.
pub struct Host {
    settings: HostSettings,
    table: CommandTable,
    runner: CommandRunner,
    poller: StatusPoller,
    files: FileAccess,
    dialogs: Arc<dyn DialogPresenter>,
}

impl Host {
    pub fn new(settings: HostSettings, dialogs: Arc<dyn DialogPresenter>) -> Self {
        let runner = CommandRunner::new(settings.command_timeout());
        let poller = StatusPoller::new(&settings, runner.clone());
        let table = CommandTable::new(&settings);
        let mut protected = table.programs();
        protected.push(settings.scripts_dir.clone());
        let touch_lister = PathBuf::from(&settings.touch_list_program);
        if touch_lister.is_absolute() {
            protected.push(touch_lister);
        }
        let files = FileAccess::new(settings.file_roots.clone(), settings.writable_roots.clone())
            .protecting(protected);
        Self {
            table,
            files,
            poller,
            runner,
            dialogs,
            settings,
        }
    }

    /// Processes spawned so far, status reads included.
    pub fn spawn_count(&self) -> u64 {
        self.runner.spawn_count()
    }

    async fn read_checked(&self, path: &str) -> AppResult<String> {
        let resolved = self.files.resolve_readable(path)?;
        let metadata = tokio::fs::metadata(&resolved).await?;
        if !metadata.is_file() {
            return Err(AppError::Policy(format!("'{}' is not a regular file", path)));
        }
        if metadata.len() > MAX_READ_BYTES {
            return Err(AppError::Policy(format!(
                "'{}' is {} bytes; at most {} may be read",
                path,
                metadata.len(),
                MAX_READ_BYTES
            )));
        }
        let bytes = tokio::fs::read(&resolved).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write_checked(&self, path: &str, content: &str) -> AppResult<()> {
        let resolved = self.files.resolve_writable(path)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            options.mode(0o644);
            options.custom_flags(nix::fcntl::OFlag::O_NOFOLLOW.bits());
        }
        let mut file = options.open(&resolved).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn spawn_terminal(&self) -> AppResult<()> {
        let mut child = tokio::process::Command::new(&self.settings.terminal_program)
            .arg(format!("--working-directory={}", self.settings.scripts_dir.display()))
            .current_dir(&self.settings.scripts_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                AppError::Subprocess(format!(
                    "failed to launch terminal '{}': {}",
                    self.settings.terminal_program, err
                ))
            })?;
        tokio::spawn(async move {
            if let Err(error) = child.wait().await {
                tracing::warn!(error = %error, "terminal process could not be reaped");
            }
        });
        Ok(())
    }
}

impl sealed::Sealed for Host {}

#[async_trait]
impl Bridge for Host {
    async fn execute_command(&self, request: OperationRequest) -> OperationResult {
        let request_id = Uuid::new_v4();
        let operation = match Operation::resolve(&request) {
            Ok(operation) => operation,
            Err(error) => {
                tracing::warn!(
                    request_id = %request_id,
                    operation = %request.operation,
                    error = %error,
                    "operation rejected before spawn"
                );
                return OperationResult::rejected(&error);
            }
        };

        let spec = self.table.command_for(&operation);
        tracing::info!(
            request_id = %request_id,
            operation = operation.name(),
            program = %spec.label(),
            args = ?spec.args,
            "running operation"
        );
        let result = self.runner.run(&spec).await;
        if result.success {
            tracing::info!(request_id = %request_id, operation = operation.name(), "operation finished");
        } else {
            tracing::warn!(
                request_id = %request_id,
                operation = operation.name(),
                error = result.error_message(),
                "operation failed"
            );
        }
        result
    }

    async fn get_system_status(&self) -> StatusSnapshot {
        self.poller.poll().await
    }

    async fn show_dialog(&self, options: DialogOptions) -> DialogResult {
        let presenter = Arc::clone(&self.dialogs);
        let buttons = options.buttons;
        let shown = tokio::task::spawn_blocking(move || presenter.present(&options)).await;
        match shown {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => {
                tracing::warn!(error = %error, "dialog could not be shown");
                DialogResult::dismissed(buttons)
            }
            Err(error) => {
                tracing::warn!(error = %error, "dialog task aborted");
                DialogResult::dismissed(buttons)
            }
        }
    }

    async fn open_terminal(&self) -> OperationResult {
        match self.spawn_terminal() {
            Ok(()) => {
                tracing::info!(
                    program = %self.settings.terminal_program,
                    cwd = %self.settings.scripts_dir.display(),
                    "terminal opened"
                );
                OperationResult::succeeded(String::new(), String::new())
            }
            Err(error) => {
                tracing::warn!(error = %error, "terminal launch failed");
                OperationResult::rejected(&error)
            }
        }
    }

    async fn read_file(&self, path: String) -> ReadFileResult {
        match self.read_checked(&path).await {
            Ok(content) => ReadFileResult::read(content),
            Err(error) => {
                tracing::warn!(path = %path, error = %error, "file read refused");
                ReadFileResult::failed(&error)
            }
        }
    }

    async fn write_file(&self, path: String, content: String) -> OperationResult {
        match self.write_checked(&path, &content).await {
            Ok(()) => {
                tracing::info!(path = %path, bytes = content.len(), "file written");
                OperationResult::succeeded(String::new(), String::new())
            }
            Err(error) => {
                tracing::warn!(path = %path, error = %error, "file write refused");
                OperationResult::rejected(&error)
            }
        }
    }
}
