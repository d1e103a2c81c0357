//! Forecast enrichment delegated to the API (`POST /v1/trips/enrich`).

use async_trait::async_trait;
use meteotrip_core::forecast::{EnrichError, TripEnricher};
use meteotrip_core::trip::{EnrichedTrip, ValidatedDraft};

use crate::util::client;

pub struct RemoteEnricher {
    api_url: String,
}

impl RemoteEnricher {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl TripEnricher for RemoteEnricher {
    async fn enrich_trip(&self, draft: ValidatedDraft) -> Result<EnrichedTrip, EnrichError> {
        let resp = client()
            .post(format!("{}/v1/trips/enrich", self.api_url))
            .json(&draft)
            .send()
            .await
            .map_err(|e| EnrichError::Unavailable(e.to_string()))?;

        let status = resp.status().as_u16();
        if (200..300).contains(&status) {
            return resp
                .json::<EnrichedTrip>()
                .await
                .map_err(|e| EnrichError::Unavailable(format!("unreadable enrichment response: {e}")));
        }

        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// 4xx means the server refused this draft; anything else is the server's problem.
fn classify_failure(status: u16, body: &serde_json::Value) -> EnrichError {
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"));
    if (400..500).contains(&status) {
        EnrichError::Rejected(message)
    } else {
        EnrichError::Unavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_errors_are_rejections() {
        let err = classify_failure(400, &json!({"error": "invalid_range", "message": "stops[0]: bad"}));
        assert!(matches!(err, EnrichError::Rejected(ref m) if m == "stops[0]: bad"));
    }

    #[test]
    fn server_errors_are_unavailability() {
        let err = classify_failure(502, &serde_json::Value::Null);
        assert!(matches!(err, EnrichError::Unavailable(ref m) if m == "HTTP 502"));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let enricher = RemoteEnricher::new("http://127.0.0.1:1");
        let draft = ValidatedDraft {
            name: "Week-end".to_string(),
            traveler_first_name: "Léa".to_string(),
            traveler_last_name: "Martin".to_string(),
            stops: Vec::new(),
        };
        let err = enricher.enrich_trip(draft).await.unwrap_err();
        assert!(matches!(err, EnrichError::Unavailable(_)));
    }
}
