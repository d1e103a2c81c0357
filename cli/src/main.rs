use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod remote;
mod slot;
mod util;

use commands::admin::AdminCommands;
use commands::model::ModelCommands;
use commands::trip::TripCommands;

#[derive(Parser)]
#[command(
    name = "meteotrip",
    version,
    about = "Meteotrip CLI: plan road trips with daily weather, ideas and a travel assistant"
)]
struct Cli {
    /// API base URL
    #[arg(long, global = true, env = "METEOTRIP_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// API key (mt_sk_...). Without one, trips are kept on this device.
    #[arg(long, global = true, env = "METEOTRIP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print compact JSON instead of pretty
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Get ready-made trip ideas
    Suggest {
        /// Preferences as a JSON object
        #[arg(long)]
        preferences: Option<String>,
    },
    /// Ask the travel assistant; starts an interactive session without MESSAGE
    Chat {
        /// Travel wish, e.g. "j'ai envie de plage"
        message: Option<String>,
    },
    /// Search city names for stops
    Cities {
        /// At least two characters
        query: String,
    },
    /// Create, list and delete trips
    Trip {
        #[command(subcommand)]
        command: TripCommands,
    },
    /// Account bootstrap (direct database access)
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Generative model diagnostics
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("METEOTRIP_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let api_url = cli.api_url.trim_end_matches('/').to_string();
    let api_key = cli
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let exit_code = match cli.command {
        Commands::Health => commands::health::run(&api_url).await,
        Commands::Suggest { preferences } => {
            commands::suggest::run(&api_url, preferences.as_deref(), cli.raw).await
        }
        Commands::Chat { message } => {
            commands::chat::run(&api_url, message.as_deref(), cli.raw).await
        }
        Commands::Cities { query } => commands::cities::run(&api_url, &query).await,
        Commands::Trip { command } => commands::trip::run(&api_url, api_key, command).await,
        Commands::Admin { command } => commands::admin::run(command).await,
        Commands::Model { command } => commands::model::run(command).await,
    };

    std::process::exit(exit_code);
}
