use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use meteotrip_core::gemini::{GeminiClient, GeminiConfig};
use meteotrip_core::generative::GenerativeModel;
use meteotrip_core::weather_api::{WeatherApiClient, WeatherApiConfig};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Meteotrip API",
        description = "Weather-aware trip planning: drafts, daily forecasts, saved trips and assistant suggestions"
    ),
    paths(
        routes::health::health_check,
        routes::suggestions::suggest_trips,
        routes::chat::chat,
        routes::cities::search_cities,
        routes::trips::enrich_trip,
        routes::trips::create_trip,
        routes::trips::list_trips,
        routes::trips::get_trip,
        routes::trips::delete_trip,
    ),
    components(schemas(
        HealthResponse,
        meteotrip_core::error::ApiError,
        meteotrip_core::draft::TripDraft,
        meteotrip_core::trip::Stop,
        meteotrip_core::trip::PlannedStop,
        meteotrip_core::trip::DailyForecast,
        meteotrip_core::trip::EnrichedStep,
        meteotrip_core::trip::EnrichedTrip,
        meteotrip_core::trip::PersistedStep,
        meteotrip_core::trip::Trip,
        meteotrip_core::trip::Suggestion,
        meteotrip_core::trip::ChatDestination,
        meteotrip_core::trip::ChatReply,
        meteotrip_core::trip::CitySuggestion,
        routes::suggestions::SuggestionsRequest,
        routes::suggestions::SuggestionsResponse,
        routes::chat::ChatRequest,
        routes::trips::TripListResponse,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub weather_configured: bool,
    pub assistant_configured: bool,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "meteotrip_api=debug,meteotrip_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = state::ServerConfig::from_env().expect("invalid server configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Upstreams: a missing weather key degrades forecasts to "unavailable",
    // a missing assistant key makes the assistant routes answer 500.
    let weather = Arc::new(
        WeatherApiClient::new(WeatherApiConfig::from_env())
            .expect("Failed to build weather client"),
    );
    if !weather.has_credential() {
        tracing::warn!("WEATHER_API_KEY not set, forecasts will read \"unavailable\"");
    }

    let model: Option<Arc<dyn GenerativeModel>> = match GeminiConfig::from_env() {
        Some(gemini) => {
            let client = GeminiClient::new(gemini).expect("Failed to build Gemini client");
            tracing::info!(model = client.model(), "generative assistant configured");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, assistant routes will answer 500");
            None
        }
    };

    let trips = Arc::new(store::PgTripStore::new(pool.clone()));
    let app_state = state::AppState::new(pool, trips, weather.clone(), weather, model);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::suggestions::router().layer(middleware::rate_limit::assistant_layer()))
        .merge(routes::chat::router().layer(middleware::rate_limit::assistant_layer()))
        .merge(routes::cities::router().layer(middleware::rate_limit::read_layer()))
        .merge(routes::trips::write_router().layer(middleware::rate_limit::trip_write_layer()))
        .merge(routes::trips::read_router().layer(middleware::rate_limit::read_layer()))
        .layer(auth::InjectAuthLayer::new(app_state.db.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .layer(axum::middleware::from_fn(middleware::security_headers::apply))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Meteotrip API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
