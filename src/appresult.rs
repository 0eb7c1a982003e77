use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),

    #[error("cannot read {0:?} as a date-time, expected YYYY-MM-DDTHH:MM")]
    InvalidWallClock(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn profile_not_found(id: Uuid) -> Self {
        Self::NotFound { kind: "profile", id }
    }

    pub fn event_not_found(id: Uuid) -> Self {
        Self::NotFound { kind: "event", id }
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Validation(_) | InvalidTimezone(_) | InvalidWallClock(_) => StatusCode::BAD_REQUEST,
            NotFound { .. } => StatusCode::NOT_FOUND,
            StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "path rejected");
        Self::validation("malformed id in request path")
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// `axum::Json` whose rejection is an [`AppError`], so bad bodies answer with the JSON error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Path` rejecting with [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // store details stay in the log, the caller gets a generic message
        let error = match &self {
            AppError::StoreUnavailable(err) => {
                tracing::error!(error = %err, "store call failed");
                "storage is unavailable, try again later".to_owned()
            }
            other => other.to_string(),
        };

        (self.status(), Json(ErrorBody { error })).into_response()
    }
}
