use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response. `message` is the response body text, or a generic
    /// status line when the body was empty.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Empty response from server")]
    EmptyResponse,
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Insecure API base URL: HTTPS required (except localhost)")]
    InsecureBaseUrl,
    #[error("Not logged in: no user id in session")]
    MissingUserId,
    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    /// Build the error for a non-2xx response from its body text.
    pub(crate) fn from_status(status: u16, body: Option<String>) -> Self {
        let message = body
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| format!("Request failed with status {}", status));
        ApiError::Status { status, message }
    }

    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
