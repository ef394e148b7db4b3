use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataJobsError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataJobsError {
    /// Short, stable error code for operator-facing output.
    pub fn code(&self) -> &'static str {
        match self {
            DataJobsError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, DataJobsError>;
