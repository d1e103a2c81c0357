use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const UNAVAILABLE_LABEL: &str = "unavailable";
pub const TO_BE_DETERMINED_LABEL: &str = "to be determined";

/// One place/date-range entry of a draft. Dates stay optional while the
/// traveler is still editing; validation turns it into a [`PlannedStop`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Stop {
    #[serde(default)]
    pub location_name: String,
    #[serde(default)]
    pub arrival_date: Option<NaiveDate>,
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_single_day: bool,
}

impl Stop {
    pub fn at(location_name: impl Into<String>) -> Self {
        Self {
            location_name: location_name.into(),
            ..Self::default()
        }
    }
}

/// A validated stop with its departure resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlannedStop {
    pub location_name: String,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub is_single_day: bool,
}

/// Weather outlook for one day.
///
/// Serialized as a bare string: the forecast phrase itself, or one of the
/// two placeholder labels. An upstream phrase spelled exactly like a label
/// reads back as that placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    Forecast(String),
    /// Lookup failed or upstream had no data for the day.
    Unavailable,
    /// Beyond the per-stop lookup quota; no lookup was attempted.
    ToBeDetermined,
}

impl Condition {
    pub fn as_str(&self) -> &str {
        match self {
            Condition::Forecast(text) => text,
            Condition::Unavailable => UNAVAILABLE_LABEL,
            Condition::ToBeDetermined => TO_BE_DETERMINED_LABEL,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        !matches!(self, Condition::Forecast(_))
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        match value.as_str() {
            UNAVAILABLE_LABEL => Condition::Unavailable,
            TO_BE_DETERMINED_LABEL => Condition::ToBeDetermined,
            _ => Condition::Forecast(value),
        }
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        match value {
            Condition::Forecast(text) => text,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyForecast {
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EnrichedStep {
    #[serde(flatten)]
    pub stop: PlannedStop,
    pub daily_forecasts: Vec<DailyForecast>,
    /// First day's condition, kept for compact listings.
    #[schema(value_type = String)]
    pub primary_condition: Condition,
}

impl EnrichedStep {
    pub fn new(stop: PlannedStop, daily_forecasts: Vec<DailyForecast>) -> Self {
        let primary_condition = daily_forecasts
            .first()
            .map(|day| day.condition.clone())
            .unwrap_or(Condition::Unavailable);
        Self {
            stop,
            daily_forecasts,
            primary_condition,
        }
    }
}

/// Draft that passed validation: every stop has a resolved date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidatedDraft {
    pub name: String,
    pub traveler_first_name: String,
    pub traveler_last_name: String,
    pub stops: Vec<PlannedStop>,
}

/// Draft whose every stop carries its daily forecasts, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EnrichedTrip {
    pub name: String,
    pub traveler_first_name: String,
    pub traveler_last_name: String,
    pub steps: Vec<EnrichedStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PersistedStep {
    pub step_order: i32,
    #[serde(flatten)]
    pub step: EnrichedStep,
}

/// A committed trip. `owner_id` is `None` for the anonymous device-local trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Trip {
    /// UUIDv7 for durable trips, `guest-<unix millis>` for the local slot
    pub id: String,
    pub name: String,
    pub traveler_first_name: String,
    pub traveler_last_name: String,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<PersistedStep>,
}

pub const GUEST_TRIP_ID_PREFIX: &str = "guest-";

impl Trip {
    pub fn is_anonymous(&self) -> bool {
        self.owner_id.is_none()
    }

    pub fn location_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|s| s.step.stop.location_name.as_str())
            .collect()
    }
}

pub fn is_guest_trip_id(id: &str) -> bool {
    id.starts_with(GUEST_TRIP_ID_PREFIX)
}

/// Tag steps with their 0-based position.
pub fn number_steps(steps: Vec<EnrichedStep>) -> Vec<PersistedStep> {
    steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| PersistedStep {
            step_order: index as i32,
            step,
        })
        .collect()
}

/// A ready-made trip idea. Wire names follow the assistant's JSON contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Suggestion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(rename = "duration", default)]
    pub duration_label: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "bestPeriod", default)]
    pub best_period_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatDestination {
    pub city: String,
    pub reason: String,
}

/// Assistant answer to a travel wish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    pub response: String,
    pub destinations: Vec<ChatDestination>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
    pub destinations: Vec<ChatDestination>,
}

/// City autocomplete entry from the weather service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CitySuggestion {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
}

impl CitySuggestion {
    /// Label used as a stop's `location_name`.
    pub fn label(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }
}
