use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("{0}")]
    UserAlreadyExists(String),
    #[error("post not found: {0}")]
    PostNotFound(Uuid),
    #[error("parent post not found: {0}")]
    ParentPostNotFound(Uuid),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// Stable machine-readable code, shared by the REST and GraphQL surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) | DomainError::ParentPostNotFound(_) => "VALIDATION",
            DomainError::UserNotFound(_) | DomainError::PostNotFound(_) => "NOT_FOUND",
            DomainError::UserAlreadyExists(_) => "CONFLICT",
            DomainError::Forbidden(_) => "FORBIDDEN",
            DomainError::Unauthorized => "UNAUTHORIZED",
            DomainError::Internal(_) => "INTERNAL",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ResponseError for DomainError {
    fn status_code(&self) -> StatusCode {
        match self {
            DomainError::Validation(_) | DomainError::ParentPostNotFound(_) => {
                StatusCode::BAD_REQUEST
            }
            DomainError::UserNotFound(_) | DomainError::PostNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::UserAlreadyExists(_) => StatusCode::CONFLICT,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // internal details stay in the logs
        let message = match self {
            DomainError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let details = match self {
            DomainError::PostNotFound(resource) | DomainError::ParentPostNotFound(resource) => {
                Some(json!({ "resource": resource }))
            }
            DomainError::UserNotFound(resource) => Some(json!({ "resource": resource })),
            _ => None,
        };
        let body = ErrorBody {
            error: message.as_str(),
            code: self.code(),
            details,
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            DomainError::validation("post text must not be empty").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DomainError::ParentPostNotFound(Uuid::nil()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DomainError::UserAlreadyExists("username taken".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            DomainError::Forbidden("no").status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn validation_message_is_user_visible() {
        let err = DomainError::validation("disallowed HTML tags: script");
        assert_eq!(err.to_string(), "disallowed HTML tags: script");
    }
}
