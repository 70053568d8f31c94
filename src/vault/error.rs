use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Invalid resource identifier: {0}")]
    InvalidResourceIdentifier(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("HTTP status {0}: {1}")]
    HttpStatus(u16, String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Error from reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// Maps a non-success response into the error taxonomy.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => VaultError::NotFound(body),
            StatusCode::FORBIDDEN => VaultError::Forbidden(body),
            other => VaultError::HttpStatus(other.as_u16(), body),
        }
    }

    /// HTTP status carried by the error, if the remote end produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            VaultError::NotFound(_) => Some(StatusCode::NOT_FOUND.as_u16()),
            VaultError::Forbidden(_) => Some(StatusCode::FORBIDDEN.as_u16()),
            VaultError::HttpStatus(code, _) => Some(*code),
            VaultError::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, VaultError::Forbidden(_))
    }
}
