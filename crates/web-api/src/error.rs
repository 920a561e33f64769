use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::DomainError;

        match error {
            AppErr::Domain(DomainError::Validation { field, message }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("{}: {}", field, message),
            ),
            AppErr::Domain(DomainError::SelfRequest) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "SELF_REQUEST",
                "cannot send a connection request to yourself",
            ),
            AppErr::Domain(DomainError::AlreadyConnected) => ApiError::new(
                StatusCode::CONFLICT,
                "ALREADY_CONNECTED",
                "users are already connected",
            ),
            AppErr::Domain(DomainError::RequestPending) => ApiError::new(
                StatusCode::CONFLICT,
                "REQUEST_PENDING",
                "a connection request is already pending",
            ),
            AppErr::Domain(DomainError::Unauthorized { action }) => {
                ApiError::new(StatusCode::FORBIDDEN, "UNAUTHORIZED", action)
            }
            AppErr::Domain(DomainError::NotFound { resource }) => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
            ),
            AppErr::Domain(DomainError::InvalidState { detail }) => {
                ApiError::new(StatusCode::CONFLICT, "INVALID_STATE", detail)
            }
            // 存储层细节不外泄
            AppErr::Repository(err) => {
                tracing::error!(error = %err, "repository error");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error",
                )
            }
            AppErr::Infrastructure(message) => {
                tracing::error!(error = %message, "infrastructure error");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
