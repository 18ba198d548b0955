use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use fitmeet_db::Owned;
use fitmeet_types::api::ErrorBody;

/// Every way a request can fail. All variants except `Internal` are expected
/// outcomes with a specific status; `Internal` is logged and returned as an
/// opaque 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not authorized to modify this resource")]
    NotAuthorized,

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Duplicate(&'static str),

    #[error("already joined this event")]
    AlreadyJoined,

    #[error("event is full")]
    CapacityExceeded,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Duplicate(_)
            | Self::AlreadyJoined
            | Self::CapacityExceeded => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAuthorized | Self::Unauthenticated | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Unhandled error: {:#}", e);
        }

        let status = self.status();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Map an owner-gated write outcome onto the error taxonomy.
pub(crate) fn owned<T>(outcome: Owned<T>, what: &'static str) -> Result<T, ApiError> {
    match outcome {
        Owned::Done(value) => Ok(value),
        Owned::Missing => Err(ApiError::NotFound(what)),
        Owned::NotOwner => Err(ApiError::NotAuthorized),
        Owned::Conflict(msg) => Err(ApiError::validation(msg)),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}
