use thiserror::Error;

use edubridge_backend::BackendError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Form input rejected before any remote call.
    #[error("{0}")]
    Invalid(String),

    /// The viewer may not do this (signed out, wrong role, demo content).
    #[error("{0}")]
    Denied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: BackendError,
    },
}

impl AppError {
    pub fn backend(context: &'static str, source: BackendError) -> Self {
        AppError::Backend { context, source }
    }

    /// The backend's own message when there is one.
    pub fn backend_message(&self) -> Option<String> {
        match self {
            AppError::Backend { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}
