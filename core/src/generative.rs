use async_trait::async_trait;
use thiserror::Error;

/// Sampling parameters sent with one generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationSettings {
    /// Wide sampling for varied trip ideas.
    pub const SUGGESTIONS: Self = Self {
        temperature: 0.9,
        top_k: 40,
        top_p: 0.95,
        max_output_tokens: 2048,
    };

    /// Tighter sampling for the single-destination chat answer.
    pub const CHAT: Self = Self {
        temperature: 0.7,
        top_k: 40,
        top_p: 0.95,
        max_output_tokens: 1024,
    };
}

/// Credential missing, network failure, quota or non-success status.
#[derive(Debug, Error)]
pub enum UpstreamUnavailable {
    #[error("generative model credential is not configured")]
    MissingCredential,
    #[error("generative model request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("generative model returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("generative model returned no text")]
    EmptyResponse,
}

/// A text-in, text-out generative model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String, UpstreamUnavailable>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Replays a fixed answer, or fails with HTTP 429 when built with `failing()`.
    pub struct ScriptedModel {
        answer: Option<String>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn answering(text: impl Into<String>) -> Self {
            Self {
                answer: Some(text.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                answer: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(
            &self,
            prompt: &str,
            _settings: &GenerationSettings,
        ) -> Result<String, UpstreamUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().ok_or(UpstreamUnavailable::Status {
                status: 429,
                message: "quota exhausted".to_string(),
            })
        }
    }
}
