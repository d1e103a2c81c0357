use axum::extract::State;
use axum::{Json, Router, routing::post};
use meteotrip_core::error::ApiError;
use meteotrip_core::trip::ChatReply;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The traveler's wish, e.g. "j'ai envie de plage"
    #[serde(default)]
    pub message: String,
}

/// Turn a travel wish into one destination
///
/// The assistant proposes a single city with a reason. When it fails or
/// answers something unusable, a keyword ladder picks the destination
/// (Paris when nothing matches).
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatReply),
        (status = 400, description = "Empty message", body = ApiError),
        (status = 500, description = "Assistant credential not configured", body = ApiError)
    ),
    tag = "assistant"
)]
pub async fn chat(
    State(state): State<AppState>,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::Validation {
            message: "message must not be empty".to_string(),
            field: Some("message".to_string()),
            received: Some(serde_json::Value::String(req.message)),
            docs_hint: Some("Describe what you feel like, e.g. \"j'ai envie de plage\".".to_string()),
        });
    }
    if !state.chat.is_configured() {
        return Err(AppError::UpstreamUnavailable {
            message: "Generative assistant API key is not configured".to_string(),
        });
    }

    Ok(Json(state.chat.resolve(&req.message).await))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::state::test_support::{self, CannedModel};

    async fn post_chat(state: AppState, body: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(
                Request::post("/api/chat")
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
    async fn empty_message_is_rejected_before_credential_check() {
        for body in [r#"{"message":""}"#, r#"{"message":"   "}"#, "{}"] {
            let (status, json) = post_chat(test_support::state(None), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(json["field"], "message");
        }
    }

    #[tokio::test]
    async fn missing_credential_is_500() {
        let (status, json) =
            post_chat(test_support::state(None), r#"{"message":"plage"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "upstream_unavailable");
    }

    #[tokio::test]
    async fn failing_assistant_falls_back_to_keywords() {
        let state = test_support::state(Some(Arc::new(CannedModel(None))));
        let (status, json) = post_chat(state, r#"{"message":"j'ai envie de sushi"}"#).await;

        assert_eq!(status, StatusCode::OK);
        let destinations = json["destinations"].as_array().unwrap();
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[0]["city"], "Tokyo, Japon");
    }

    #[tokio::test]
    async fn assistant_reply_is_cut_to_one_destination() {
        let answer = r#"{"response":"Deux idées","destinations":[{"city":"Lisbonne, Portugal","reason":"Douceur"},{"city":"Porto, Portugal","reason":"Vin"}]}"#;
        let state = test_support::state(Some(Arc::new(CannedModel(Some(answer)))));
        let (status, json) = post_chat(state, r#"{"message":"du soleil en hiver"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["destinations"].as_array().unwrap().len(), 1);
        assert_eq!(json["destinations"][0]["city"], "Lisbonne, Portugal");
    }
}
