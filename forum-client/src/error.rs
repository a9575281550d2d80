use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForumClientError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Token storage error: {0}")]
    TokenStorage(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ForumClientError {
    /// Maps a non-success response, using the server's `error` message when present.
    pub async fn from_http_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);

        match status {
            StatusCode::BAD_REQUEST => ForumClientError::InvalidRequest(message),
            StatusCode::UNAUTHORIZED => ForumClientError::Unauthorized,
            StatusCode::FORBIDDEN => ForumClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ForumClientError::NotFound(message),
            StatusCode::CONFLICT => ForumClientError::Conflict(message),
            other => ForumClientError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }
}
