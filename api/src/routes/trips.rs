use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use meteotrip_core::draft::TripDraft;
use meteotrip_core::error::ApiError;
use meteotrip_core::store::TripCursor;
use meteotrip_core::trip::{EnrichedTrip, Trip};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Caller};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Enrichment and creation (write-limited)
pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/enrich", post(enrich_trip))
        .route("/v1/trips", post(create_trip))
}

/// Listing, lookup and deletion of the caller's trips
pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", get(list_trips))
        .route("/v1/trips/{id}", get(get_trip).delete(delete_trip))
}

/// Validate a draft and attach daily forecasts without saving it
///
/// Used by clients that keep the trip on the device. Only the first three
/// days of a stop are looked up; later days read "to be determined" and a
/// failed lookup reads "unavailable".
#[utoipa::path(
    post,
    path = "/v1/trips/enrich",
    request_body = TripDraft,
    responses(
        (status = 200, description = "Draft with forecasts", body = EnrichedTrip),
        (status = 400, description = "Invalid draft", body = ApiError)
    ),
    tag = "trips"
)]
pub async fn enrich_trip(
    State(state): State<AppState>,
    AppJson(draft): AppJson<TripDraft>,
) -> Result<Json<EnrichedTrip>, AppError> {
    let validated = draft.validate()?;
    Ok(Json(state.aggregator.enrich_draft(validated).await))
}

/// Validate, enrich and save a trip to the caller's account
///
/// Anonymous callers are answered with 401 and `next_action: register`:
/// their single trip lives on their device (see `/v1/trips/enrich`).
/// A 500 `step_write_failed` carries the id of the trip whose header was
/// saved without its steps in `received`.
#[utoipa::path(
    post,
    path = "/v1/trips",
    request_body = TripDraft,
    responses(
        (status = 201, description = "Trip saved", body = Trip),
        (status = 400, description = "Invalid draft", body = ApiError),
        (status = 401, description = "No account to save to", body = ApiError),
        (status = 500, description = "Steps could not be written", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "trips"
)]
pub async fn create_trip(
    State(state): State<AppState>,
    Caller(identity): Caller,
    AppJson(draft): AppJson<TripDraft>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.pipeline.submit(draft, &identity).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListTripsParams {
    /// Maximum number of trips to return (default 20, max 100)
    #[serde(default)]
    pub limit: Option<i64>,
    /// Cursor from a previous response's next_cursor
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TripListResponse {
    pub data: Vec<Trip>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// List the caller's trips, newest first
#[utoipa::path(
    get,
    path = "/v1/trips",
    params(ListTripsParams),
    responses(
        (status = 200, description = "Page of trips", body = TripListResponse),
        (status = 400, description = "Invalid cursor", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "trips"
)]
pub async fn list_trips(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ListTripsParams>,
) -> Result<Json<TripListResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as usize;
    let after = params.cursor.as_deref().map(decode_cursor).transpose()?;

    // One extra row tells us whether another page exists
    let mut trips = state.trips.list_trips(user.user_id, limit + 1, after).await?;
    let has_more = trips.len() > limit;
    trips.truncate(limit);

    let next_cursor = if has_more {
        trips.last().and_then(|trip| {
            Uuid::parse_str(&trip.id)
                .ok()
                .map(|id| encode_cursor(&trip.created_at, &id))
        })
    } else {
        None
    };

    Ok(Json(TripListResponse {
        data: trips,
        next_cursor,
        has_more,
    }))
}

/// Get one of the caller's trips with its steps
#[utoipa::path(
    get,
    path = "/v1/trips/{id}",
    params(("id" = String, Path, description = "Trip id")),
    responses(
        (status = 200, description = "Trip", body = Trip),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 404, description = "No such trip for this caller", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "trips"
)]
pub async fn get_trip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Trip>, AppError> {
    let trip_id = parse_trip_id(&id)?;
    state
        .trips
        .get_trip(user.user_id, trip_id)
        .await?
        .map(Json)
        .ok_or_else(|| trip_not_found(&id))
}

/// Delete one of the caller's trips and its steps
#[utoipa::path(
    delete,
    path = "/v1/trips/{id}",
    params(("id" = String, Path, description = "Trip id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 404, description = "No such trip for this caller", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "trips"
)]
pub async fn delete_trip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let trip_id = parse_trip_id(&id)?;
    if state.trips.delete_trip(user.user_id, trip_id).await? {
        tracing::info!(
            trip_id = %trip_id,
            user_id = %user.user_id,
            key_id = %user.key_id,
            "trip deleted"
        );
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(trip_not_found(&id))
    }
}

fn trip_not_found(id: &str) -> AppError {
    AppError::NotFound {
        resource: format!("trip {id}"),
    }
}

// Guest ids and garbage can never name a server-side trip
fn parse_trip_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| trip_not_found(id))
}

/// Cursor is base64("created_at\0id"), opaque to the client
fn encode_cursor(created_at: &DateTime<Utc>, id: &Uuid) -> String {
    use base64::Engine;
    let raw = format!("{}\0{}", created_at.to_rfc3339(), id);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

fn invalid_cursor(message: &str, cursor: &str) -> AppError {
    AppError::Validation {
        message: message.to_string(),
        field: Some("cursor".to_string()),
        received: Some(serde_json::Value::String(cursor.to_string())),
        docs_hint: Some("Use the next_cursor value from a previous response".to_string()),
    }
}

fn decode_cursor(cursor: &str) -> Result<TripCursor, AppError> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| invalid_cursor("Invalid cursor format", cursor))?;
    let raw =
        String::from_utf8(bytes).map_err(|_| invalid_cursor("Invalid cursor encoding", cursor))?;

    let (timestamp, id) = raw
        .split_once('\0')
        .ok_or_else(|| invalid_cursor("Invalid cursor structure", cursor))?;
    let created_at = DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| invalid_cursor("Invalid cursor timestamp", cursor))?;
    let id = Uuid::parse_str(id).map_err(|_| invalid_cursor("Invalid cursor id", cursor))?;

    Ok(TripCursor { created_at, id })
}
