use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    application::{
        auth::AuthError, comments::CommentServiceError, posts::PostServiceError,
        repos::RepoError, uploads::ImageStoreError,
    },
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// JSON error response: `{"message": ...}` with diagnostics attached for the
/// response logger.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &str {
        &self.public_message
    }

    fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            error,
        )
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "message": self.public_message }));
        let mut response = (self.status, body).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RepoError> for HttpError {
    fn from(error: RepoError) -> Self {
        const SOURCE: &str = "infra::http::repo_error_to_http_error";
        match &error {
            RepoError::NotFound => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Resource not found", &error)
            }
            RepoError::Duplicate { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                "Resource already exists",
                &error,
            ),
            RepoError::InvalidInput { message } => {
                HttpError::from_error(SOURCE, StatusCode::UNPROCESSABLE_ENTITY, message.clone(), &error)
            }
            RepoError::Timeout => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                &error,
            ),
            RepoError::Persistence(_) | RepoError::Integrity { .. } => {
                HttpError::internal(SOURCE, &error)
            }
        }
    }
}

impl From<PostServiceError> for HttpError {
    fn from(error: PostServiceError) -> Self {
        const SOURCE: &str = "infra::http::post_error_to_http_error";
        match error {
            PostServiceError::NotFound => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Post not found or not accessible",
                "post missing or not visible to the caller",
            ),
            PostServiceError::Forbidden => HttpError::new(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Unauthorized",
                "caller is not the author of the post",
            ),
            PostServiceError::Validation(message) => HttpError::new(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                message.clone(),
                message,
            ),
            PostServiceError::Repo(err) => err.into(),
            PostServiceError::Search(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<CommentServiceError> for HttpError {
    fn from(error: CommentServiceError) -> Self {
        const SOURCE: &str = "infra::http::comment_error_to_http_error";
        match error {
            CommentServiceError::PostNotFound => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Post not found or not accessible",
                "comment target missing or not visible",
            ),
            CommentServiceError::NotFound => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Comment not found",
                "comment missing",
            ),
            CommentServiceError::Forbidden => HttpError::new(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Unauthorized",
                "caller is not the author of the comment",
            ),
            CommentServiceError::Validation(message) => HttpError::new(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                message.clone(),
                message,
            ),
            CommentServiceError::Repo(err) => err.into(),
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(error: AuthError) -> Self {
        const SOURCE: &str = "infra::http::auth_error_to_http_error";
        match &error {
            AuthError::Malformed | AuthError::Invalid => {
                HttpError::from_error(SOURCE, StatusCode::UNAUTHORIZED, "Unauthenticated.", &error)
            }
            AuthError::Validation(field) => HttpError::from_error(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("{field} is invalid"),
                &error,
            ),
            AuthError::Repo(_) => HttpError::internal(SOURCE, &error),
        }
    }
}

impl From<ImageStoreError> for HttpError {
    fn from(error: ImageStoreError) -> Self {
        const SOURCE: &str = "infra::http::image_error_to_http_error";
        match &error {
            ImageStoreError::PayloadTooLarge { .. } | ImageStoreError::SizeOverflow => {
                HttpError::from_error(
                    SOURCE,
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Image is too large",
                    &error,
                )
            }
            ImageStoreError::EmptyPayload => HttpError::from_error(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                "Uploaded file is empty",
                &error,
            ),
            ImageStoreError::PayloadStream { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Upload form data was invalid",
                &error,
            ),
            ImageStoreError::InvalidPath | ImageStoreError::Io(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to upload image",
                &error,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
