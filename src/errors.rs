use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Contest rule violations raised by the engine and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContestError {
    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("No station scheduled for {0}")]
    NoStationScheduled(NaiveDate),

    #[error("A forecast for {date} has already been submitted by this user")]
    DuplicateForecast { user_id: Uuid, date: NaiveDate },

    #[error("Forecast {0} has already been scored")]
    AlreadyScored(Uuid),

    #[error("Submission window is closed")]
    SubmissionClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error(transparent)]
    Contest(#[from] ContestError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
            AppError::Contest(err) => (contest_status(err), err.to_string()),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

/// HTTP status for a contest rule violation.
fn contest_status(err: &ContestError) -> StatusCode {
    match err {
        ContestError::InvalidReading(_) => StatusCode::UNPROCESSABLE_ENTITY,
        // "Forecasting not available for this date" is a user-facing condition.
        ContestError::NoStationScheduled(_) => StatusCode::NOT_FOUND,
        ContestError::DuplicateForecast { .. } | ContestError::AlreadyScored(_) => {
            StatusCode::CONFLICT
        }
        ContestError::SubmissionClosed => StatusCode::BAD_REQUEST,
    }
}

impl From<crate::services::schedule::ScheduleConfigError> for AppError {
    fn from(err: crate::services::schedule::ScheduleConfigError) -> Self {
        AppError::InternalError(format!("Schedule configuration error: {}", err))
    }
}
