//! Parsing of untrusted generative-model output.
//!
//! Models wrap JSON in code fences and chatter around it. Everything goes
//! through [`sanitize_json_text`] first; anything that still does not parse
//! or validate is replaced by a caller-supplied deterministic fallback.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("code fence pattern is valid"));

#[derive(Debug, Error)]
pub enum UpstreamParseError {
    #[error("no JSON object in model output")]
    NoJsonObject,
    #[error("model output is not valid JSON for the expected shape: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Strip code fences and keep the span from the first `{` to the last `}`.
/// Returns an empty string when there is no such span.
pub fn sanitize_json_text(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw, "");
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start <= end => unfenced[start..=end].trim().to_string(),
        _ => String::new(),
    }
}

pub fn try_parse<T: DeserializeOwned>(raw: &str) -> Result<T, UpstreamParseError> {
    let cleaned = sanitize_json_text(raw);
    if cleaned.is_empty() {
        return Err(UpstreamParseError::NoJsonObject);
    }
    Ok(serde_json::from_str(&cleaned)?)
}

/// Sanitize, parse and validate `raw`; on any failure return `fallback()`.
///
/// `validate` may repair the value (e.g. drop bad entries) and returns `None`
/// to reject it.
pub fn parse_or_fallback<T, V, F>(raw: &str, validate: V, fallback: F) -> T
where
    T: DeserializeOwned,
    V: FnOnce(T) -> Option<T>,
    F: FnOnce() -> T,
{
    match try_parse::<T>(raw) {
        Ok(parsed) => match validate(parsed) {
            Some(valid) => valid,
            None => {
                tracing::warn!("model output failed validation, using fallback");
                fallback()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "model output unparseable, using fallback");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: i32,
    }

    #[test]
    fn strips_fences_and_surrounding_chatter() {
        let raw = "Voici le résultat :\n```json\n{\"value\": 4}\n```\nBon voyage !";
        assert_eq!(sanitize_json_text(raw), "{\"value\": 4}");
    }

    #[test]
    fn keeps_nested_braces_intact() {
        let raw = "x {\"a\": {\"b\": 1}} y";
        assert_eq!(sanitize_json_text(raw), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn no_object_yields_empty_text() {
        assert_eq!(sanitize_json_text("désolé, je ne peux pas"), "");
        assert_eq!(sanitize_json_text("} backwards {"), "");
        assert!(matches!(
            try_parse::<Answer>("plain text"),
            Err(UpstreamParseError::NoJsonObject)
        ));
    }

    #[test]
    fn parse_or_fallback_uses_parsed_value_when_valid() {
        let got = parse_or_fallback("```{\"value\": 7}```", Some, || Answer { value: -1 });
        assert_eq!(got, Answer { value: 7 });
    }

    #[test]
    fn parse_or_fallback_falls_back_on_malformed_or_invalid() {
        let malformed = parse_or_fallback("{\"value\": }", Some, || Answer { value: -1 });
        assert_eq!(malformed, Answer { value: -1 });

        let rejected = parse_or_fallback(
            "{\"value\": 0}",
            |a: Answer| (a.value > 0).then_some(a),
            || Answer { value: -1 },
        );
        assert_eq!(rejected, Answer { value: -1 });
    }
}
