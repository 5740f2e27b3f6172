//! The only surface the display layer can reach the host through.
//!
//! Every method resolves to a structured value; failures are carried inside
//! the result types and never escape as errors or panics.

use crate::models::{DialogOptions, DialogResult, OperationRequest, OperationResult, ReadFileResult, StatusSnapshot};
use async_trait::async_trait;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Sealed: the host is the sole implementor, so the operation set cannot be
/// widened from outside this crate.
#[async_trait]
pub trait Bridge: sealed::Sealed + Send + Sync {
    /// Runs one operation from the closed set. Unknown names and invalid
    /// arguments are rejected before anything is spawned.
    async fn execute_command(&self, request: OperationRequest) -> OperationResult;

    async fn get_system_status(&self) -> StatusSnapshot;

    async fn show_dialog(&self, options: DialogOptions) -> DialogResult;

    /// Opens a terminal in the driver script directory.
    async fn open_terminal(&self) -> OperationResult;

    async fn read_file(&self, path: String) -> ReadFileResult;

    async fn write_file(&self, path: String, content: String) -> OperationResult;
}
