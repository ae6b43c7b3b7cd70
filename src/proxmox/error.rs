use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxmoxError {
    #[error("Proxmox API error: {0} - {1}")]
    Api(reqwest::StatusCode, String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to connect to Proxmox: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl ProxmoxError {
    /// Upstream HTTP status, when the failure came from a non-2xx response.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ProxmoxError::Api(status, _) => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxmoxError>;
