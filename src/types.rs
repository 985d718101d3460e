// Error taxonomy shared by the session, the API bindings and the dataset manager

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    /// A remote call was attempted without a valid credential. Never sent.
    #[error("Authentication required")]
    AuthRequired,

    /// The server answered 401; the credential is no longer usable.
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Transport failure: {0}")]
    Transport(String),

    /// Client-side resolution failure; no remote call was issued.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Login answered successfully but carried no token in either known shape.
    #[error("Malformed login response: {0}")]
    MalformedLogin(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors that mean the credential must be dropped.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, AppError::SessionExpired)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
