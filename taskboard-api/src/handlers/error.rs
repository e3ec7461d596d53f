use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use shared_types::ErrorResponse;

use crate::database::StoreError;
use crate::helpers::session::SessionError;
use crate::policy::PolicyError;

/// Error returned by every API handler, rendered as `{"error": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map a store error, naming the missing record on `NotFound`
    pub fn from_store(err: StoreError, not_found: &str) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound(not_found.to_string()),
            other => other.into(),
        }
    }
}

impl actix_web::error::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse::new(message))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Not found".to_string()),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::UnknownUser(id) => {
                ApiError::Validation(format!("Assignee does not exist: {}", id))
            }
            StoreError::InvalidReference => {
                ApiError::Validation("Referenced record does not exist".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::NotFound => ApiError::NotFound(err.to_string()),
            PolicyError::Forbidden(msg) => ApiError::Forbidden(msg),
            PolicyError::InvalidArgument(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidCredentials | SessionError::InvalidOrExpiredToken => {
                ApiError::Unauthorized(err.to_string())
            }
            SessionError::Signing(msg) => ApiError::Internal(msg),
            SessionError::Store(store) => store.into(),
        }
    }
}

/// Malformed JSON and unknown fields become 400 with the usual error body
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = match &err {
        JsonPayloadError::ContentType => "Content type must be application/json".to_string(),
        JsonPayloadError::Deserialize(e) => format!("Invalid request body: {}", e),
        other => format!("Invalid request body: {}", other),
    };
    ApiError::Validation(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::ResponseError;

    #[actix_web::test]
    async fn test_internal_detail_is_hidden() {
        let err = ApiError::Internal("disk I/O error at sector 7".to_string());
        let response = err.error_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            ApiError::from(StoreError::Conflict("Email already exists".to_string())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(PolicyError::Forbidden("no".to_string())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(SessionError::InvalidCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from_store(StoreError::NotFound, "User not found").to_string(),
            "User not found"
        );
    }
}
