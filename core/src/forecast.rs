//! Per-day forecast enrichment under a lookup quota.
//!
//! Only the first [`FORECAST_LOOKUP_QUOTA`] days of a stop hit the weather
//! service. Later days get [`Condition::ToBeDetermined`] without a network
//! call, and a failed lookup only degrades its own day to
//! [`Condition::Unavailable`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use thiserror::Error;

use crate::dates;
use crate::trip::{Condition, DailyForecast, EnrichedStep, EnrichedTrip, PlannedStop, ValidatedDraft};

/// Maximum number of days per stop for which a real lookup is attempted.
pub const FORECAST_LOOKUP_QUOTA: usize = 3;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather API key is not configured")]
    MissingCredential,
    #[error("weather request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("weather service returned HTTP {status}")]
    Status { status: u16 },
    #[error("invalid weather request: {0}")]
    InvalidRequest(String),
}

/// One day's forecast for one place.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// `Ok(None)` when the service answered without a condition for the day.
    async fn condition_for(
        &self,
        place_name: &str,
        date: NaiveDate,
    ) -> Result<Option<String>, WeatherError>;
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment service unavailable: {0}")]
    Unavailable(String),
    #[error("enrichment service rejected the draft: {0}")]
    Rejected(String),
}

/// Turns a validated draft into an enriched one.
#[async_trait]
pub trait TripEnricher: Send + Sync {
    async fn enrich_trip(&self, draft: ValidatedDraft) -> Result<EnrichedTrip, EnrichError>;
}

#[derive(Clone)]
pub struct ForecastAggregator {
    lookup: Arc<dyn WeatherLookup>,
    quota: usize,
}

impl ForecastAggregator {
    pub fn new(lookup: Arc<dyn WeatherLookup>) -> Self {
        Self {
            lookup,
            quota: FORECAST_LOOKUP_QUOTA,
        }
    }

    /// Forecast for each day, in day order.
    pub async fn enrich(&self, location_name: &str, days: &[NaiveDate]) -> Vec<DailyForecast> {
        let lookups = days
            .iter()
            .enumerate()
            .map(|(index, &date)| self.forecast_day(location_name, index, date));
        join_all(lookups).await
    }

    async fn forecast_day(&self, location_name: &str, index: usize, date: NaiveDate) -> DailyForecast {
        if index >= self.quota {
            return DailyForecast {
                date,
                condition: Condition::ToBeDetermined,
            };
        }

        let condition = match self.lookup.condition_for(location_name, date).await {
            Ok(Some(text)) if !text.trim().is_empty() => Condition::Forecast(text.trim().to_string()),
            Ok(_) => {
                tracing::warn!(location = location_name, %date, "no forecast data for day");
                Condition::Unavailable
            }
            Err(e) => {
                tracing::warn!(location = location_name, %date, error = %e, "forecast lookup failed");
                Condition::Unavailable
            }
        };

        DailyForecast { date, condition }
    }

    pub async fn enrich_stop(&self, stop: PlannedStop) -> EnrichedStep {
        // PlannedStop ranges are checked at validation; fall back to the
        // arrival day rather than panicking if one slips through.
        let days = dates::day_sequence(stop.arrival_date, Some(stop.departure_date))
            .unwrap_or_else(|_| vec![stop.arrival_date]);
        let forecasts = self.enrich(&stop.location_name, &days).await;
        EnrichedStep::new(stop, forecasts)
    }

    /// Enrich every stop concurrently. Steps keep the draft's stop order.
    pub async fn enrich_draft(&self, draft: ValidatedDraft) -> EnrichedTrip {
        let ValidatedDraft {
            name,
            traveler_first_name,
            traveler_last_name,
            stops,
        } = draft;

        let stop_count = stops.len();
        let steps = join_all(stops.into_iter().map(|stop| self.enrich_stop(stop))).await;

        tracing::debug!(stops = stop_count, trip = %name, "trip enriched");

        EnrichedTrip {
            name,
            traveler_first_name,
            traveler_last_name,
            steps,
        }
    }
}

#[async_trait]
impl TripEnricher for ForecastAggregator {
    async fn enrich_trip(&self, draft: ValidatedDraft) -> Result<EnrichedTrip, EnrichError> {
        Ok(self.enrich_draft(draft).await)
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeWeather;
    use super::*;
    use proptest::prelude::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn days(n: u32) -> Vec<NaiveDate> {
        (1..=n).map(date).collect()
    }

    #[tokio::test]
    async fn short_stays_are_fully_looked_up_in_order() {
        let weather = Arc::new(FakeWeather::default());
        let aggregator = ForecastAggregator::new(weather.clone());

        let forecasts = aggregator.enrich("Nice, France", &days(3)).await;

        assert_eq!(weather.call_count(), 3);
        let dates: Vec<_> = forecasts.iter().map(|f| f.date).collect();
        assert_eq!(dates, days(3));
        for forecast in &forecasts {
            assert_eq!(
                forecast.condition,
                Condition::Forecast(format!("Nice, France {}", forecast.date))
            );
        }
    }

    #[tokio::test]
    async fn days_beyond_quota_skip_the_network() {
        let weather = Arc::new(FakeWeather::default());
        let aggregator = ForecastAggregator::new(weather.clone());

        let forecasts = aggregator.enrich("Oslo, Norvège", &days(6)).await;

        assert_eq!(weather.call_count(), FORECAST_LOOKUP_QUOTA);
        assert!(forecasts[..3].iter().all(|f| !f.condition.is_placeholder()));
        assert!(forecasts[3..]
            .iter()
            .all(|f| f.condition == Condition::ToBeDetermined));
        let mut seen = weather.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, days(3));
    }

    #[tokio::test]
    async fn one_failed_day_does_not_abort_the_others() {
        let weather = Arc::new(FakeWeather {
            failing: [date(2)].into_iter().collect(),
            empty: [date(3)].into_iter().collect(),
            ..FakeWeather::default()
        });
        let aggregator = ForecastAggregator::new(weather);

        let forecasts = aggregator.enrich("Lima, Pérou", &days(4)).await;

        assert!(matches!(forecasts[0].condition, Condition::Forecast(_)));
        assert_eq!(forecasts[1].condition, Condition::Unavailable);
        assert_eq!(forecasts[2].condition, Condition::Unavailable);
        assert_eq!(forecasts[3].condition, Condition::ToBeDetermined);
    }

    #[tokio::test]
    async fn draft_enrichment_keeps_stop_order() {
        let aggregator = ForecastAggregator::new(Arc::new(FakeWeather::default()));
        let stop = |name: &str, from: u32, to: u32| PlannedStop {
            location_name: name.to_string(),
            arrival_date: date(from),
            departure_date: date(to),
            is_single_day: from == to,
        };
        let draft = ValidatedDraft {
            name: "Road trip".to_string(),
            traveler_first_name: "Ana".to_string(),
            traveler_last_name: "Silva".to_string(),
            stops: vec![
                stop("Porto, Portugal", 1, 5),
                stop("Lisbonne, Portugal", 6, 6),
                stop("Faro, Portugal", 7, 8),
            ],
        };

        let trip = aggregator.enrich_trip(draft).await.unwrap();

        let names: Vec<_> = trip.steps.iter().map(|s| s.stop.location_name.as_str()).collect();
        assert_eq!(names, ["Porto, Portugal", "Lisbonne, Portugal", "Faro, Portugal"]);
        assert_eq!(trip.steps[0].daily_forecasts.len(), 5);
        assert_eq!(
            trip.steps[0].primary_condition,
            Condition::Forecast(format!("Porto, Portugal {}", date(1)))
        );
        assert_eq!(trip.steps[1].daily_forecasts.len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn placeholders_start_exactly_after_quota(len in 1u32..=20, failing_day in 1u32..=20) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let weather = Arc::new(FakeWeather {
                failing: [date(failing_day)].into_iter().collect(),
                ..FakeWeather::default()
            });
            let aggregator = ForecastAggregator::new(weather.clone());
            let forecasts = runtime.block_on(aggregator.enrich("Quito, Équateur", &days(len)));

            prop_assert_eq!(forecasts.len(), len as usize);
            prop_assert_eq!(weather.call_count(), (len as usize).min(FORECAST_LOOKUP_QUOTA));
            for (index, forecast) in forecasts.iter().enumerate() {
                if index < FORECAST_LOOKUP_QUOTA {
                    prop_assert_ne!(&forecast.condition, &Condition::ToBeDetermined);
                } else {
                    prop_assert_eq!(&forecast.condition, &Condition::ToBeDetermined);
                }
            }
        }
    }
}
