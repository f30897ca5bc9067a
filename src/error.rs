use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};

use crate::auth::login_url;
use crate::forms::{FormError, FormErrors};
use crate::repo::RepoError;
use crate::storage::ImageStoreError;
use crate::views;

/// Everything a handler can fail with. Permission problems are redirects,
/// missing objects are 404 pages, anything else is a bare 500 page.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")] NotFound,
    #[error("login required")] LoginRequired { next: String },
    #[error("forbidden")] Forbidden { redirect_to: String },
    #[error("conflict")] Conflict,
    #[error("payload too large")] PayloadTooLarge,
    #[error("bad request")] BadRequest,
    #[error("internal error")] Internal,
}

impl ApiError {
    /// Logs `cause` and hides it behind a generic 500.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("internal error: {cause}");
        ApiError::Internal
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict => ApiError::Conflict,
            RepoError::Internal(msg) => ApiError::internal(msg),
        }
    }
}

impl From<ImageStoreError> for ApiError {
    fn from(e: ImageStoreError) -> Self {
        match e {
            ImageStoreError::NotFound => ApiError::NotFound,
            other => ApiError::internal(other),
        }
    }
}

/// Outcome of a feed query or mutation, before it is mapped onto HTTP.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("authentication required")]
    Unauthenticated,
    #[error("permission denied")]
    PermissionDenied,
    #[error("validation failed")]
    Invalid(FormErrors),
    #[error(transparent)]
    Repo(RepoError),
    #[error(transparent)]
    Storage(ImageStoreError),
}

impl ServiceError {
    /// `next` is where login should return to; `read_view` is where a caller
    /// without permission is sent.
    pub fn into_api(self, next: &str, read_view: &str) -> ApiError {
        match self {
            ServiceError::NotFound => ApiError::NotFound,
            ServiceError::Unauthenticated => ApiError::LoginRequired { next: next.to_string() },
            ServiceError::PermissionDenied => ApiError::Forbidden { redirect_to: read_view.to_string() },
            ServiceError::Invalid(errors) => {
                ApiError::internal(format!("unhandled form errors on {:?}", errors.fields().collect::<Vec<_>>()))
            }
            ServiceError::Repo(e) => e.into(),
            ServiceError::Storage(e) => e.into(),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ServiceError::NotFound,
            other => ServiceError::Repo(other),
        }
    }
}

impl From<ImageStoreError> for ServiceError {
    fn from(e: ImageStoreError) -> Self {
        ServiceError::Storage(e)
    }
}

impl From<FormError> for ServiceError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::Invalid(errors) => ServiceError::Invalid(errors),
            FormError::Repo(e) => e.into(),
        }
    }
}

impl From<askama::Error> for ApiError {
    fn from(e: askama::Error) -> Self {
        ApiError::internal(format!("template: {e}"))
    }
}

pub(crate) fn see_other(location: &str) -> HttpResponse {
    HttpResponse::Found().insert_header((header::LOCATION, location)).finish()
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::LoginRequired { .. } | ApiError::Forbidden { .. } => StatusCode::FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::LoginRequired { next } => see_other(&login_url(next)),
            ApiError::Forbidden { redirect_to } => see_other(redirect_to),
            ApiError::NotFound => views::not_found_page(None),
            ApiError::Conflict => views::plain_error_page(StatusCode::CONFLICT, "Conflict"),
            ApiError::PayloadTooLarge => views::plain_error_page(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"),
            ApiError::BadRequest => views::plain_error_page(StatusCode::BAD_REQUEST, "Bad Request"),
            ApiError::Internal => views::server_error_page(),
        }
    }
}
