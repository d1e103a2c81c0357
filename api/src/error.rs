use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meteotrip_core::draft::DraftError;
use meteotrip_core::error::{self, ApiError, actions};
use meteotrip_core::forecast::{EnrichError, WeatherError};
use meteotrip_core::pipeline::SubmitError;
use meteotrip_core::quota::StoreTarget;
use meteotrip_core::store::{CommitError, StoreError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Departure before arrival (400)
    InvalidRange { message: String, field: Option<String> },
    /// Anonymous slot already occupied (409)
    QuotaExceeded { message: String },
    /// Header written, steps not (500)
    StepWriteFailed { trip_id: String, message: String },
    /// Upstream credential missing or upstream unreachable (500)
    UpstreamUnavailable { message: String },
    /// Resource not found (404)
    NotFound { resource: String },
    /// Missing or invalid credentials (401)
    Unauthorized {
        message: String,
        docs_hint: Option<String>,
        next_action: Option<String>,
    },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

fn api_error(error: &str, message: String, request_id: String) -> ApiError {
    ApiError {
        error: error.to_string(),
        error_code: None,
        message,
        field: None,
        received: None,
        request_id,
        docs_hint: None,
        next_action: None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    field,
                    received,
                    docs_hint,
                    ..api_error(error::codes::VALIDATION_FAILED, message, request_id)
                },
            ),
            AppError::InvalidRange { message, field } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    field,
                    docs_hint: Some(
                        "departure_date must be on or after arrival_date.".to_string(),
                    ),
                    ..api_error(error::codes::INVALID_RANGE, message, request_id)
                },
            ),
            AppError::QuotaExceeded { message } => (
                StatusCode::CONFLICT,
                ApiError {
                    docs_hint: Some(
                        "Delete the trip saved on this device, or register for unlimited trips."
                            .to_string(),
                    ),
                    next_action: Some(actions::REGISTER.to_string()),
                    ..api_error(error::codes::QUOTA_EXCEEDED, message, request_id)
                },
            ),
            AppError::StepWriteFailed { trip_id, message } => {
                tracing::error!(trip_id = %trip_id, "step write failed: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        field: Some("steps".to_string()),
                        received: Some(serde_json::Value::String(trip_id)),
                        docs_hint: Some(
                            "The trip header exists without steps. Retry the step write for this trip id or delete it."
                                .to_string(),
                        ),
                        next_action: Some(actions::RETRY_STEPS.to_string()),
                        ..api_error(error::codes::STEP_WRITE_FAILED, message, request_id)
                    },
                )
            }
            AppError::UpstreamUnavailable { message } => {
                tracing::error!("upstream unavailable: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    api_error(error::codes::UPSTREAM_UNAVAILABLE, message, request_id),
                )
            }
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                api_error(
                    error::codes::NOT_FOUND,
                    format!("{resource} not found"),
                    request_id,
                ),
            ),
            AppError::Unauthorized {
                message,
                docs_hint,
                next_action,
            } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    docs_hint,
                    next_action,
                    ..api_error(error::codes::UNAUTHORIZED, message, request_id)
                },
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    api_error(
                        error::codes::INTERNAL_ERROR,
                        "An internal error occurred".to_string(),
                        request_id,
                    ),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    api_error(
                        error::codes::INTERNAL_ERROR,
                        "An internal error occurred".to_string(),
                        request_id,
                    ),
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        let field = err.field();
        let message = err.to_string();
        match err {
            DraftError::InvalidRange { .. } => AppError::InvalidRange { message, field },
            _ => AppError::Validation {
                message,
                field,
                received: None,
                docs_hint: Some(
                    "A trip needs a name, the traveler's first and last name, and at least one stop with a place and an arrival date."
                        .to_string(),
                ),
            },
        }
    }
}

impl From<EnrichError> for AppError {
    fn from(err: EnrichError) -> Self {
        match err {
            EnrichError::Unavailable(message) => AppError::UpstreamUnavailable { message },
            EnrichError::Rejected(message) => AppError::Validation {
                message,
                field: None,
                received: None,
                docs_hint: None,
            },
        }
    }
}

impl From<WeatherError> for AppError {
    fn from(err: WeatherError) -> Self {
        AppError::UpstreamUnavailable {
            message: err.to_string(),
        }
    }
}

impl From<CommitError> for AppError {
    fn from(err: CommitError) -> Self {
        match err.orphaned_trip_id() {
            Some(trip_id) => AppError::StepWriteFailed {
                trip_id: trip_id.to_string(),
                message: err.to_string(),
            },
            None => AppError::Internal(err.to_string()),
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Draft(e) => e.into(),
            SubmitError::Enrich(e) => e.into(),
            SubmitError::Commit(e) => e.into(),
            SubmitError::QuotaExceeded(e) => AppError::QuotaExceeded {
                message: e.to_string(),
            },
            SubmitError::TargetUnavailable(StoreTarget::Ephemeral) => AppError::Unauthorized {
                message: "Anonymous trips are kept on the traveler's device, not on the server"
                    .to_string(),
                docs_hint: Some(
                    "Send 'Authorization: Bearer mt_sk_...' to save trips to your account, or use POST /v1/trips/enrich and keep the result locally."
                        .to_string(),
                ),
                next_action: Some(actions::REGISTER.to_string()),
            },
            other => AppError::Internal(other.to_string()),
        }
    }
}
