//! Draft submission: validate, enrich, authorize, commit.

use std::sync::Arc;

use thiserror::Error;

use crate::draft::{DraftError, TripDraft};
use crate::forecast::{EnrichError, TripEnricher};
use crate::quota::{self, Identity, QuotaExceeded, StoreTarget};
use crate::store::{self, CommitError, CommitTarget, StoreError, TripSlot, TripStore};
use crate::trip::Trip;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Enrich(#[from] EnrichError),
    #[error("could not read the local trip slot: {0}")]
    Slot(#[source] StoreError),
    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),
    #[error("no {0:?} trip store is configured here")]
    TargetUnavailable(StoreTarget),
    #[error(transparent)]
    Commit(#[from] CommitError),
}

#[derive(Clone)]
pub struct TripPipeline {
    enricher: Arc<dyn TripEnricher>,
    durable: Option<Arc<dyn TripStore>>,
    slot: Option<Arc<dyn TripSlot>>,
}

impl TripPipeline {
    pub fn new(enricher: Arc<dyn TripEnricher>) -> Self {
        Self {
            enricher,
            durable: None,
            slot: None,
        }
    }

    pub fn with_durable(mut self, store: Arc<dyn TripStore>) -> Self {
        self.durable = Some(store);
        self
    }

    pub fn with_slot(mut self, slot: Arc<dyn TripSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub async fn submit(&self, draft: TripDraft, identity: &Identity) -> Result<Trip, SubmitError> {
        let validated = draft.validate()?;
        // No forecast lookup runs when there is nowhere to write the trip.
        self.require_backend(identity)?;
        let enriched = self.enricher.enrich_trip(validated).await?;

        let slot_occupied = match (identity, &self.slot) {
            (Identity::Anonymous, Some(slot)) => match slot.load().await {
                Ok(existing) => existing.is_some(),
                // An unreadable slot still holds something; clearing it is the way out.
                Err(StoreError::Corrupt(e)) => {
                    tracing::warn!(error = %e, "local trip slot is unreadable, treating it as occupied");
                    true
                }
                Err(e) => return Err(SubmitError::Slot(e)),
            },
            _ => false,
        };

        let target = match quota::authorize(identity, slot_occupied).require() {
            Ok(target) => target,
            Err(denied) => {
                tracing::info!("anonymous trip refused, local slot occupied");
                return Err(denied.into());
            }
        };

        let commit_target = match target {
            StoreTarget::Durable => {
                let store = self
                    .durable
                    .as_deref()
                    .ok_or(SubmitError::TargetUnavailable(target))?;
                let owner_id = identity
                    .user_id()
                    .ok_or(SubmitError::TargetUnavailable(target))?;
                CommitTarget::Durable { store, owner_id }
            }
            StoreTarget::Ephemeral => {
                let slot = self
                    .slot
                    .as_deref()
                    .ok_or(SubmitError::TargetUnavailable(target))?;
                CommitTarget::Ephemeral(slot)
            }
        };

        Ok(store::commit(enriched, commit_target).await?)
    }

    /// The backend this caller would commit to must be configured.
    fn require_backend(&self, identity: &Identity) -> Result<(), SubmitError> {
        let (target, present) = match identity {
            Identity::Registered { .. } => (StoreTarget::Durable, self.durable.is_some()),
            Identity::Anonymous => (StoreTarget::Ephemeral, self.slot.is_some()),
        };
        if present {
            Ok(())
        } else {
            Err(SubmitError::TargetUnavailable(target))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::draft::StopUpdate;
    use crate::forecast::ForecastAggregator;
    use crate::forecast::fake::FakeWeather;
    use crate::store::memory::{MemorySlot, MemoryTripStore};
    use crate::trip::{Condition, Suggestion};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
    }

    fn aggregator() -> Arc<ForecastAggregator> {
        Arc::new(ForecastAggregator::new(Arc::new(FakeWeather::default())))
    }

    fn single_stop_draft(place: &str) -> TripDraft {
        let mut draft = TripDraft::new();
        draft.name = "Week-end".to_string();
        draft.traveler_first_name = "Léa".to_string();
        draft.traveler_last_name = "Martin".to_string();
        draft.update_stop(0, StopUpdate::LocationName(place.to_string())).unwrap();
        draft.update_stop(0, StopUpdate::ArrivalDate(Some(date(4)))).unwrap();
        draft.update_stop(0, StopUpdate::DepartureDate(Some(date(5)))).unwrap();
        draft
    }

    #[tokio::test]
    async fn suggestion_round_trip_preserves_destination_order() {
        let store = Arc::new(MemoryTripStore::new());
        let pipeline = TripPipeline::new(aggregator()).with_durable(store.clone());
        let suggestion = Suggestion {
            title: "Tour du Japon".to_string(),
            destinations: vec![
                "Tokyo, Japon".to_string(),
                "Kyoto, Japon".to_string(),
                "Osaka, Japon".to_string(),
            ],
            duration_label: "10 jours".to_string(),
            description: String::new(),
            best_period_label: "Mars-Mai".to_string(),
        };

        let mut draft = TripDraft::new();
        draft.from_suggestion(&suggestion);
        draft.traveler_first_name = "Yuki".to_string();
        draft.traveler_last_name = "Sato".to_string();
        for index in 0..draft.stops.len() {
            let day = date(index as u32 * 3 + 1);
            draft.update_stop(index, StopUpdate::ArrivalDate(Some(day))).unwrap();
        }

        let identity = Identity::Registered {
            user_id: Uuid::now_v7(),
        };
        let trip = pipeline.submit(draft, &identity).await.unwrap();

        assert_eq!(trip.name, "Tour du Japon");
        assert_eq!(trip.location_names(), suggestion.destinations);
        let stored = store.steps_for(trip.id.parse().unwrap());
        let stored_names: Vec<_> = stored.iter().map(|s| s.step.stop.location_name.clone()).collect();
        assert_eq!(stored_names, suggestion.destinations);
    }

    #[tokio::test]
    async fn anonymous_second_trip_is_refused_until_slot_cleared() {
        let slot = Arc::new(MemorySlot::new());
        let pipeline = TripPipeline::new(aggregator()).with_slot(slot.clone());

        let first = pipeline
            .submit(single_stop_draft("Biarritz, France"), &Identity::Anonymous)
            .await
            .unwrap();
        assert!(first.is_anonymous());

        let err = pipeline
            .submit(single_stop_draft("Bayonne, France"), &Identity::Anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::QuotaExceeded(_)));
        assert_eq!(slot.load().await.unwrap().unwrap().id, first.id);

        slot.clear().await.unwrap();
        let again = pipeline
            .submit(single_stop_draft("Bayonne, France"), &Identity::Anonymous)
            .await
            .unwrap();
        assert_eq!(again.location_names(), ["Bayonne, France"]);
    }

    #[tokio::test]
    async fn submitted_steps_carry_forecasts() {
        let slot = Arc::new(MemorySlot::new());
        let pipeline = TripPipeline::new(aggregator()).with_slot(slot);

        let trip = pipeline
            .submit(single_stop_draft("Arles, France"), &Identity::Anonymous)
            .await
            .unwrap();

        let step = &trip.steps[0];
        assert_eq!(step.step_order, 0);
        assert_eq!(step.step.daily_forecasts.len(), 2);
        assert_eq!(
            step.step.primary_condition,
            Condition::Forecast(format!("Arles, France {}", date(4)))
        );
    }

    #[tokio::test]
    async fn invalid_drafts_fail_before_any_lookup() {
        let weather = Arc::new(FakeWeather::default());
        let pipeline = TripPipeline::new(Arc::new(ForecastAggregator::new(weather.clone())))
            .with_slot(Arc::new(MemorySlot::new()));
        let mut draft = single_stop_draft("Arles, France");
        draft.update_stop(0, StopUpdate::DepartureDate(Some(date(1)))).unwrap();

        let err = pipeline.submit(draft, &Identity::Anonymous).await.unwrap_err();

        assert!(matches!(err, SubmitError::Draft(DraftError::InvalidRange { index: 0, .. })));
        assert_eq!(weather.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_backend_is_reported() {
        let pipeline = TripPipeline::new(aggregator());
        let identity = Identity::Registered {
            user_id: Uuid::now_v7(),
        };

        let err = pipeline
            .submit(single_stop_draft("Arles, France"), &identity)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::TargetUnavailable(StoreTarget::Durable)));
    }

    #[tokio::test]
    async fn step_failure_surfaces_trip_id() {
        let store = Arc::new(MemoryTripStore::new());
        store.fail_step_writes(true);
        let pipeline = TripPipeline::new(aggregator()).with_durable(store.clone());
        let identity = Identity::Registered {
            user_id: Uuid::now_v7(),
        };

        let err = pipeline
            .submit(single_stop_draft("Arles, France"), &identity)
            .await
            .unwrap_err();

        let SubmitError::Commit(commit) = err else {
            panic!("expected commit error");
        };
        assert!(commit.orphaned_trip_id().is_some());
        assert_eq!(store.header_count(), 1);
    }

    #[tokio::test]
    async fn missing_backend_is_refused_before_any_lookup() {
        let weather = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryTripStore::new());
        let pipeline = TripPipeline::new(Arc::new(ForecastAggregator::new(weather.clone())))
            .with_durable(store.clone());
        let mut draft = single_stop_draft("Arles, France");
        draft.update_stop(0, StopUpdate::DepartureDate(Some(date(8)))).unwrap();

        let err = pipeline.submit(draft, &Identity::Anonymous).await.unwrap_err();

        assert!(matches!(err, SubmitError::TargetUnavailable(StoreTarget::Ephemeral)));
        assert_eq!(weather.call_count(), 0);
        assert_eq!(store.header_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_slot_counts_as_occupied() {
        let slot = Arc::new(MemorySlot::new());
        slot.corrupt();
        let pipeline = TripPipeline::new(aggregator()).with_slot(slot.clone());

        let err = pipeline
            .submit(single_stop_draft("Arles, France"), &Identity::Anonymous)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::QuotaExceeded(_)));
    }
}
