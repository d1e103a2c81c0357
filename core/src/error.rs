use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response returned by every Meteotrip endpoint.
/// Carries enough context for a client to tell the traveler what went wrong
/// and what to do next.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "quota_exceeded")
    pub error: String,
    /// Domain-specific machine code (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    /// Recommended client action identifier (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const INVALID_RANGE: &str = "invalid_range";
    pub const QUOTA_EXCEEDED: &str = "quota_exceeded";
    pub const STEP_WRITE_FAILED: &str = "step_write_failed";
    pub const UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const RATE_LIMITED: &str = "rate_limited";
}

/// Next-action identifiers attached to [`ApiError::next_action`].
pub mod actions {
    pub const REGISTER: &str = "register";
    pub const RETRY_STEPS: &str = "retry_steps";
}
