use thiserror::Error;

/// Failures reported by the registration API client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The API answered 404 for the requested participant.
    #[error("Participant not found")]
    NotFound,

    /// The request never produced a response (connect, timeout, TLS...).
    #[error("HTTP Error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("Backend returned code {status}, body was: {body}")]
    Server { status: u16, body: String },

    #[error("Json Error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound)
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
