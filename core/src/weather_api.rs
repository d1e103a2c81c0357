//! WeatherAPI.com client: per-day forecast lookups and city autocomplete.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::forecast::{WeatherError, WeatherLookup};
use crate::trip::CitySuggestion;

pub const DEFAULT_WEATHER_API_URL: &str = "https://api.weatherapi.com/v1";
pub const DEFAULT_WEATHER_LANG: &str = "fr";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_CITY_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone)]
pub struct WeatherApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub lang: String,
}

impl WeatherApiConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: non_empty_env("WEATHER_API_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_API_URL.to_string()),
            api_key: non_empty_env("WEATHER_API_KEY"),
            lang: non_empty_env("WEATHER_LANG").unwrap_or_else(|| DEFAULT_WEATHER_LANG.to_string()),
        }
    }
}

pub(crate) fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub struct WeatherApiClient {
    config: WeatherApiConfig,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    forecast: Option<ForecastBlock>,
}

#[derive(Debug, Deserialize)]
struct ForecastBlock {
    #[serde(default)]
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    #[serde(default)]
    day: Option<DaySummary>,
}

#[derive(Debug, Deserialize)]
struct DaySummary {
    #[serde(default)]
    condition: Option<ConditionText>,
}

#[derive(Debug, Deserialize)]
struct ConditionText {
    #[serde(default)]
    text: Option<String>,
}

impl ForecastResponse {
    fn first_condition(self) -> Option<String> {
        self.forecast?
            .forecastday
            .into_iter()
            .next()?
            .day?
            .condition?
            .text
    }
}

impl WeatherApiClient {
    pub fn new(config: WeatherApiConfig) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, WeatherError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(WeatherError::MissingCredential)?;
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))
            .map_err(|e| WeatherError::InvalidRequest(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", api_key);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// City autocomplete. Queries under two characters never hit the network.
    pub async fn search_cities(&self, query: &str) -> Result<Vec<CitySuggestion>, WeatherError> {
        let query = query.trim();
        if query.chars().count() < MIN_CITY_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let url = self.endpoint("search.json", &[("q", query)])?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(WeatherError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json::<Vec<CitySuggestion>>().await?)
    }
}

#[async_trait]
impl WeatherLookup for WeatherApiClient {
    async fn condition_for(
        &self,
        place_name: &str,
        date: NaiveDate,
    ) -> Result<Option<String>, WeatherError> {
        let day = date.format("%Y-%m-%d").to_string();
        let url = self.endpoint(
            "forecast.json",
            &[
                ("q", place_name),
                ("dt", day.as_str()),
                ("lang", self.config.lang.as_str()),
            ],
        )?;

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(WeatherError::Status {
                status: response.status().as_u16(),
            });
        }

        // A body that does not match the expected shape counts as "no data".
        let body: serde_json::Value = response.json().await?;
        Ok(serde_json::from_value::<ForecastResponse>(body)
            .ok()
            .and_then(ForecastResponse::first_condition))
    }
}
