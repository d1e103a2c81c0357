use axum::extract::{Query, State};
use axum::{Json, Router, routing::get};
use meteotrip_core::error::ApiError;
use meteotrip_core::trip::CitySuggestion;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/cities/search", get(search_cities))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct CitySearchParams {
    /// Partial place name; fewer than two characters returns an empty list
    #[serde(default)]
    pub q: String,
}

/// City autocomplete for stop names
#[utoipa::path(
    get,
    path = "/v1/cities/search",
    params(CitySearchParams),
    responses(
        (status = 200, description = "Matching cities", body = Vec<CitySuggestion>),
        (status = 500, description = "Weather service unavailable or not configured", body = ApiError)
    ),
    tag = "cities"
)]
pub async fn search_cities(
    State(state): State<AppState>,
    Query(params): Query<CitySearchParams>,
) -> Result<Json<Vec<CitySuggestion>>, AppError> {
    let cities = state.cities.search_cities(&params.q).await?;
    Ok(Json(cities))
}
