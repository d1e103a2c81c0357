//! Editable trip draft and its submission-time validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dates::{self, InvalidRange};
use crate::quota::Identity;
use crate::trip::{PlannedStop, Stop, Suggestion, ValidatedDraft};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("sign in to add more than one stop")]
    AnonymousStopLimit,
    #[error("a trip needs at least one stop")]
    LastStop,
    #[error("no stop at index {index}")]
    NoSuchStop { index: usize },
    #[error("{field} is required")]
    MissingField { field: String },
    #[error("stops[{index}]: {source}")]
    InvalidRange {
        index: usize,
        #[source]
        source: InvalidRange,
    },
}

impl DraftError {
    /// Request-body path of the offending field, when there is one.
    pub fn field(&self) -> Option<String> {
        match self {
            DraftError::MissingField { field } => Some(field.clone()),
            DraftError::InvalidRange { index, .. } => Some(format!("stops[{index}].departure_date")),
            DraftError::NoSuchStop { index } => Some(format!("stops[{index}]")),
            DraftError::AnonymousStopLimit | DraftError::LastStop => Some("stops".to_string()),
        }
    }
}

/// Partial update of one stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopUpdate {
    LocationName(String),
    ArrivalDate(Option<NaiveDate>),
    DepartureDate(Option<NaiveDate>),
    SingleDay(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TripDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub traveler_first_name: String,
    #[serde(default)]
    pub traveler_last_name: String,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

impl Default for TripDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl TripDraft {
    /// New draft holding one empty stop.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            traveler_first_name: String::new(),
            traveler_last_name: String::new(),
            stops: vec![Stop::default()],
        }
    }

    pub fn add_stop(&mut self, session: &Identity) -> Result<usize, DraftError> {
        if session.is_anonymous() && !self.stops.is_empty() {
            return Err(DraftError::AnonymousStopLimit);
        }
        self.stops.push(Stop::default());
        Ok(self.stops.len() - 1)
    }

    pub fn remove_stop(&mut self, index: usize) -> Result<Stop, DraftError> {
        if index >= self.stops.len() {
            return Err(DraftError::NoSuchStop { index });
        }
        if self.stops.len() == 1 {
            return Err(DraftError::LastStop);
        }
        Ok(self.stops.remove(index))
    }

    pub fn update_stop(&mut self, index: usize, update: StopUpdate) -> Result<(), DraftError> {
        let stop = self
            .stops
            .get_mut(index)
            .ok_or(DraftError::NoSuchStop { index })?;

        match update {
            StopUpdate::LocationName(name) => stop.location_name = name,
            StopUpdate::ArrivalDate(date) => {
                stop.arrival_date = date;
                if stop.is_single_day {
                    stop.departure_date = date;
                }
            }
            StopUpdate::DepartureDate(date) => stop.departure_date = date,
            StopUpdate::SingleDay(single) => {
                stop.is_single_day = single;
                if single {
                    stop.departure_date = stop.arrival_date;
                }
            }
        }
        Ok(())
    }

    /// Seed the draft from an assistant suggestion. Dates are left for the
    /// traveler to fill in.
    pub fn from_suggestion(&mut self, suggestion: &Suggestion) {
        self.name = suggestion.title.clone();
        self.stops = suggestion
            .destinations
            .iter()
            .map(|destination| Stop::at(destination.clone()))
            .collect();
        if self.stops.is_empty() {
            self.stops.push(Stop::default());
        }
    }

    pub fn validate(&self) -> Result<ValidatedDraft, DraftError> {
        let name = required(&self.name, "name")?;
        let first_name = required(&self.traveler_first_name, "traveler_first_name")?;
        let last_name = required(&self.traveler_last_name, "traveler_last_name")?;

        if self.stops.is_empty() {
            return Err(DraftError::MissingField {
                field: "stops".to_string(),
            });
        }

        let stops = self
            .stops
            .iter()
            .enumerate()
            .map(|(index, stop)| plan_stop(index, stop))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedDraft {
            name,
            traveler_first_name: first_name,
            traveler_last_name: last_name,
            stops,
        })
    }
}

fn required(value: &str, field: &str) -> Result<String, DraftError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DraftError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn plan_stop(index: usize, stop: &Stop) -> Result<PlannedStop, DraftError> {
    let location_name = required(&stop.location_name, &format!("stops[{index}].location_name"))?;
    let arrival = stop.arrival_date.ok_or_else(|| DraftError::MissingField {
        field: format!("stops[{index}].arrival_date"),
    })?;
    let departure = if stop.is_single_day {
        arrival
    } else {
        stop.departure_date.unwrap_or(arrival)
    };
    dates::span_days(arrival, departure)
        .map_err(|source| DraftError::InvalidRange { index, source })?;

    Ok(PlannedStop {
        location_name,
        arrival_date: arrival,
        departure_date: departure,
        is_single_day: stop.is_single_day || departure == arrival,
    })
}
