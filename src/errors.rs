use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("UNKNOWN_OPERATION: {0}")]
    UnknownOperation(String),
    #[error("INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),
    #[error("TIMEOUT: {0}")]
    Timeout(String),
    #[error("SUBPROCESS_FAILURE: {0}")]
    Subprocess(String),
    #[error("POLICY_DENIED: {0}")]
    Policy(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Config(format!("{:#}", value))
    }
}

pub type AppResult<T> = Result<T, AppError>;
