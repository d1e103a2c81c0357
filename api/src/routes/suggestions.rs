use axum::extract::State;
use axum::{Json, Router, routing::post};
use meteotrip_core::error::ApiError;
use meteotrip_core::trip::Suggestion;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/suggestions", post(suggest_trips))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SuggestionsRequest {
    /// Free-form traveler preferences forwarded to the assistant as JSON
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}

/// Ready-made trip ideas
///
/// Asks the generative assistant for up to eight ideas. Any failure past the
/// credential check (upstream error, unreadable answer, nothing usable) is
/// answered with the built-in catalog in random order, so a configured
/// server always returns at least one suggestion.
#[utoipa::path(
    post,
    path = "/api/suggestions",
    request_body = SuggestionsRequest,
    responses(
        (status = 200, description = "Trip ideas", body = SuggestionsResponse),
        (status = 500, description = "Assistant credential not configured", body = ApiError)
    ),
    tag = "assistant"
)]
pub async fn suggest_trips(
    State(state): State<AppState>,
    AppJson(req): AppJson<SuggestionsRequest>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    if !state.suggestions.is_configured() {
        return Err(AppError::UpstreamUnavailable {
            message: "Generative assistant API key is not configured".to_string(),
        });
    }

    let suggestions = state.suggestions.generate(req.preferences.as_ref()).await;
    Ok(Json(SuggestionsResponse { suggestions }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use meteotrip_core::suggestions::SUGGESTION_TARGET;
    use tower::ServiceExt;

    use super::*;
    use crate::state::test_support::{self, CannedModel};

    async fn post_suggestions(state: AppState, body: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(
                Request::post("/api/suggestions")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn failing_assistant_still_returns_the_catalog() {
        let state = test_support::state(Some(Arc::new(CannedModel(None))));
        let (status, body) = post_suggestions(state, "{}").await;

        assert_eq!(status, StatusCode::OK);
        let suggestions = body["suggestions"].as_array().unwrap();
        assert_eq!(suggestions.len(), SUGGESTION_TARGET);
        assert!(suggestions.iter().all(|s| !s["destinations"].as_array().unwrap().is_empty()));
    }

    #[tokio::test]
    async fn assistant_answer_is_returned_in_wire_shape() {
        let answer = r#"{"suggestions":[{"title":"Lacs italiens","destinations":["Côme, Italie","Stresa, Italie"],"duration":"5 jours","description":"Villas et ferries.","bestPeriod":"Mai à septembre"}]}"#;
        let state = test_support::state(Some(Arc::new(CannedModel(Some(answer)))));
        let (status, body) =
            post_suggestions(state, r#"{"preferences":{"style":"lent"}}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"][0]["title"], "Lacs italiens");
        assert_eq!(body["suggestions"][0]["bestPeriod"], "Mai à septembre");
    }

    #[tokio::test]
    async fn missing_credential_is_500() {
        let (status, body) = post_suggestions(test_support::state(None), "{}").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "upstream_unavailable");
    }
}
