use clap::Subcommand;
use meteotrip_core::gemini::{GeminiClient, GeminiConfig};
use meteotrip_core::generative::{GenerationSettings, GenerativeModel};
use serde_json::json;

use crate::util::exit_error;

#[derive(Subcommand)]
pub enum ModelCommands {
    /// Send one short prompt to verify the Gemini credential (reads GEMINI_API_KEY)
    Check,
}

pub async fn run(command: ModelCommands) -> i32 {
    match command {
        ModelCommands::Check => check().await,
    }
}

async fn check() -> i32 {
    let Some(config) = GeminiConfig::from_env() else {
        exit_error(
            "GEMINI_API_KEY is not set",
            Some("Export GEMINI_API_KEY (and optionally GEMINI_MODEL) or add it to .env"),
        );
    };
    let client = match GeminiClient::new(config) {
        Ok(c) => c,
        Err(e) => exit_error(&format!("Failed to build Gemini client: {e}"), None),
    };

    match client.generate("say hello", &GenerationSettings::CHAT).await {
        Ok(reply) => {
            let output = json!({
                "model": client.model(),
                "ok": true,
                "reply": reply.trim()
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            0
        }
        Err(e) => {
            let output = json!({
                "error": "upstream_unavailable",
                "model": client.model(),
                "message": e.to_string()
            });
            eprintln!("{}", serde_json::to_string_pretty(&output).unwrap());
            2
        }
    }
}
