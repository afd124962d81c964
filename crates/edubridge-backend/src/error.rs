use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

/// Message returned by the auth service for a bad email/password pair.
pub const INVALID_CREDENTIALS: &str = "Invalid login credentials";
/// Message returned by the auth service when the address was never confirmed.
pub const EMAIL_NOT_CONFIRMED: &str = "Email not confirmed";
/// Message returned by the auth service when signing up an existing address.
pub const USER_ALREADY_REGISTERED: &str = "User already registered";
/// Message returned by the row API when a write breaks an ownership policy.
pub const ROW_LEVEL_SECURITY: &str = "new row violates row-level security policy";

/// Errors keep the backend's own message as their display text so views can
/// match on it.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Auth(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("row not found")]
    NotFound,

    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    #[error("realtime: {0}")]
    Realtime(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store: {0}")]
    Store(#[from] anyhow::Error),
}

impl BackendError {
    pub fn row_level_security() -> Self {
        BackendError::Api {
            status: 403,
            code: Some("42501".into()),
            message: ROW_LEVEL_SECURITY.into(),
        }
    }

    /// True when the display text is exactly `message`.
    pub fn is(&self, message: &str) -> bool {
        self.to_string() == message
    }
}
