use clap::Subcommand;
use serde_json::json;
use sqlx::PgPool;

use crate::util::exit_error;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Create a new user (requires DATABASE_URL)
    CreateUser {
        /// User email
        #[arg(long)]
        email: String,
        /// Display name
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Create an API key for a user (requires DATABASE_URL)
    CreateKey {
        /// User UUID
        #[arg(long)]
        user_id: String,
        /// Human-readable label (e.g. "laptop")
        #[arg(long)]
        label: String,
        /// Expiration in days (default: never)
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
}

pub async fn run(command: AdminCommands) -> i32 {
    match command {
        AdminCommands::CreateUser {
            email,
            display_name,
        } => create_user(&email, display_name.as_deref()).await,
        AdminCommands::CreateKey {
            user_id,
            label,
            expires_in_days,
        } => create_key(&user_id, &label, expires_in_days).await,
    }
}

/// Admin commands bootstrap accounts directly in the database.
async fn connect() -> PgPool {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => exit_error(
            "DATABASE_URL must be set for admin commands",
            Some("Admin create commands connect directly to the database for bootstrapping"),
        ),
    };

    match sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
    {
        Ok(p) => p,
        Err(e) => exit_error(&format!("Failed to connect to database: {e}"), None),
    }
}

async fn create_user(email: &str, display_name: Option<&str>) -> i32 {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        exit_error(&format!("'{email}' is not an email address"), None);
    }

    let pool = connect().await;
    let user_id = uuid::Uuid::now_v7();

    if let Err(e) = sqlx::query("INSERT INTO users (id, email, display_name) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(&email)
        .bind(display_name)
        .execute(&pool)
        .await
    {
        exit_error(&format!("Failed to create user: {e}"), None);
    }

    let output = json!({
        "user_id": user_id,
        "email": email,
        "display_name": display_name,
        "next": format!("meteotrip admin create-key --user-id {user_id} --label <label>")
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
    0
}

async fn create_key(user_id_str: &str, label: &str, expires_in_days: Option<i64>) -> i32 {
    let user_id = match uuid::Uuid::parse_str(user_id_str) {
        Ok(u) => u,
        Err(e) => exit_error(&format!("Invalid user UUID: {e}"), None),
    };
    if matches!(expires_in_days, Some(days) if days <= 0) {
        exit_error("--expires-in-days must be positive", None);
    }

    let pool = connect().await;

    let (full_key, key_hash) = meteotrip_core::auth::generate_api_key();
    let prefix = meteotrip_core::auth::key_prefix(&full_key);
    let key_id = uuid::Uuid::now_v7();
    let expires_at = expires_in_days.map(|d| chrono::Utc::now() + chrono::Duration::days(d));

    if let Err(e) = sqlx::query(
        "INSERT INTO api_keys (id, user_id, key_hash, key_prefix, label, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(key_id)
    .bind(user_id)
    .bind(&key_hash)
    .bind(&prefix)
    .bind(label)
    .bind(expires_at)
    .execute(&pool)
    .await
    {
        exit_error(&format!("Failed to create API key: {e}"), None);
    }

    let output = json!({
        "key_id": key_id,
        "api_key": full_key,
        "key_prefix": prefix,
        "label": label,
        "expires_at": expires_at,
        "warning": "Store this key securely. It will NOT be shown again."
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
    0
}
