use serde_json::json;

use crate::util::{api_request, exit_error};

/// Ask for trip ideas. Save the output to a file and pass it to
/// `meteotrip trip create --from-suggestion FILE` to start a draft.
pub async fn run(api_url: &str, preferences: Option<&str>, raw: bool) -> i32 {
    let preferences = match preferences.map(serde_json::from_str::<serde_json::Value>) {
        None => None,
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => exit_error(
            &format!("Invalid JSON in --preferences: {e}"),
            Some(r#"Example: --preferences '{"style":"nature","budget":"moyen"}'"#),
        ),
    };

    api_request(
        api_url,
        reqwest::Method::POST,
        "/api/suggestions",
        None,
        Some(json!({ "preferences": preferences })),
        &[],
        raw,
    )
    .await
}
