//! Trip persistence: the durable per-owner store and the anonymous
//! device-local slot.
//!
//! [`commit`] writes a durable trip in two phases, header then steps. A
//! failed step write leaves the header in place and reports its id through
//! [`CommitError::StepWrite`] so a retry can target the steps alone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::trip::{EnrichedTrip, GUEST_TRIP_ID_PREFIX, PersistedStep, Trip, number_steps};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("slot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored trip is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// Header columns of a durable trip, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTripHeader {
    pub owner_id: Uuid,
    pub name: String,
    pub traveler_first_name: String,
    pub traveler_last_name: String,
}

/// What the store assigned when the header was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripHeader {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Keyset position for newest-first listing: rows strictly older than this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

#[async_trait]
pub trait TripStore: Send + Sync {
    async fn insert_header(&self, header: &NewTripHeader) -> Result<TripHeader, StoreError>;

    /// All-or-nothing: either every step is stored or none is.
    async fn insert_steps(&self, trip_id: Uuid, steps: &[PersistedStep]) -> Result<(), StoreError>;

    /// Newest first; steps ordered by `step_order`.
    async fn list_trips(
        &self,
        owner_id: Uuid,
        limit: usize,
        after: Option<TripCursor>,
    ) -> Result<Vec<Trip>, StoreError>;

    async fn get_trip(&self, owner_id: Uuid, trip_id: Uuid) -> Result<Option<Trip>, StoreError>;

    /// `false` when the owner has no such trip.
    async fn delete_trip(&self, owner_id: Uuid, trip_id: Uuid) -> Result<bool, StoreError>;
}

/// The single anonymous trip kept on the device.
#[async_trait]
pub trait TripSlot: Send + Sync {
    async fn load(&self) -> Result<Option<Trip>, StoreError>;

    /// Replace whatever the slot holds in one step.
    async fn replace(&self, trip: &Trip) -> Result<(), StoreError>;

    /// `false` when the slot was already empty.
    async fn clear(&self) -> Result<bool, StoreError>;
}

pub enum CommitTarget<'a> {
    Durable {
        store: &'a dyn TripStore,
        owner_id: Uuid,
    },
    Ephemeral(&'a dyn TripSlot),
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to write trip header: {0}")]
    HeaderWrite(#[source] StoreError),
    #[error("trip {trip_id} was created but its steps could not be written: {source}")]
    StepWrite {
        trip_id: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to write the local trip slot: {0}")]
    SlotWrite(#[source] StoreError),
}

impl CommitError {
    /// Id of a trip header that exists despite the failure.
    pub fn orphaned_trip_id(&self) -> Option<&str> {
        match self {
            CommitError::StepWrite { trip_id, .. } => Some(trip_id),
            _ => None,
        }
    }
}

pub fn guest_trip_id(at: DateTime<Utc>) -> String {
    format!("{GUEST_TRIP_ID_PREFIX}{}", at.timestamp_millis())
}

pub async fn commit(trip: EnrichedTrip, target: CommitTarget<'_>) -> Result<Trip, CommitError> {
    let EnrichedTrip {
        name,
        traveler_first_name,
        traveler_last_name,
        steps,
    } = trip;
    let steps = number_steps(steps);

    match target {
        CommitTarget::Durable { store, owner_id } => {
            let header = NewTripHeader {
                owner_id,
                name,
                traveler_first_name,
                traveler_last_name,
            };
            let assigned = store
                .insert_header(&header)
                .await
                .map_err(CommitError::HeaderWrite)?;

            if let Err(source) = store.insert_steps(assigned.id, &steps).await {
                tracing::error!(
                    trip_id = %assigned.id,
                    steps = steps.len(),
                    error = %source,
                    "trip header written but steps failed"
                );
                return Err(CommitError::StepWrite {
                    trip_id: assigned.id.to_string(),
                    source,
                });
            }

            tracing::info!(trip_id = %assigned.id, steps = steps.len(), "trip committed");
            Ok(Trip {
                id: assigned.id.to_string(),
                name: header.name,
                traveler_first_name: header.traveler_first_name,
                traveler_last_name: header.traveler_last_name,
                owner_id: Some(owner_id),
                created_at: assigned.created_at,
                steps,
            })
        }
        CommitTarget::Ephemeral(slot) => {
            let created_at = Utc::now();
            let trip = Trip {
                id: guest_trip_id(created_at),
                name,
                traveler_first_name,
                traveler_last_name,
                owner_id: None,
                created_at,
                steps,
            };
            slot.replace(&trip).await.map_err(CommitError::SlotWrite)?;
            tracing::info!(trip_id = %trip.id, steps = trip.steps.len(), "guest trip saved locally");
            Ok(trip)
        }
    }
}

/// In-process implementations with failure injection.
pub mod memory {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Debug, Error)]
    #[error("injected {0} failure")]
    pub struct InjectedFailure(&'static str);

    #[derive(Debug, Clone)]
    struct StoredTrip {
        id: Uuid,
        owner_id: Uuid,
        name: String,
        traveler_first_name: String,
        traveler_last_name: String,
        created_at: DateTime<Utc>,
        steps: Vec<PersistedStep>,
    }

    impl StoredTrip {
        fn to_trip(&self) -> Trip {
            let mut steps = self.steps.clone();
            steps.sort_by_key(|s| s.step_order);
            Trip {
                id: self.id.to_string(),
                name: self.name.clone(),
                traveler_first_name: self.traveler_first_name.clone(),
                traveler_last_name: self.traveler_last_name.clone(),
                owner_id: Some(self.owner_id),
                created_at: self.created_at,
                steps,
            }
        }

        fn cursor(&self) -> TripCursor {
            TripCursor {
                created_at: self.created_at,
                id: self.id,
            }
        }
    }

    #[derive(Default)]
    pub struct MemoryTripStore {
        trips: Mutex<Vec<StoredTrip>>,
        fail_header: AtomicBool,
        fail_steps: AtomicBool,
    }

    impl MemoryTripStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_header_writes(&self, fail: bool) {
            self.fail_header.store(fail, Ordering::SeqCst);
        }

        pub fn fail_step_writes(&self, fail: bool) {
            self.fail_steps.store(fail, Ordering::SeqCst);
        }

        pub fn header_count(&self) -> usize {
            self.lock().len()
        }

        /// Steps stored for a trip, regardless of owner.
        pub fn steps_for(&self, trip_id: Uuid) -> Vec<PersistedStep> {
            self.lock()
                .iter()
                .find(|t| t.id == trip_id)
                .map(|t| t.steps.clone())
                .unwrap_or_default()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredTrip>> {
            self.trips.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    #[async_trait]
    impl TripStore for MemoryTripStore {
        async fn insert_header(&self, header: &NewTripHeader) -> Result<TripHeader, StoreError> {
            if self.fail_header.load(Ordering::SeqCst) {
                return Err(StoreError::backend(InjectedFailure("header")));
            }
            let mut trips = self.lock();
            // Strictly increasing timestamps keep listing order deterministic.
            let now = Utc::now();
            let created_at = match trips.iter().map(|t| t.created_at).max() {
                Some(latest) if latest >= now => latest + chrono::Duration::milliseconds(1),
                _ => now,
            };
            let assigned = TripHeader {
                id: Uuid::now_v7(),
                created_at,
            };
            trips.push(StoredTrip {
                id: assigned.id,
                owner_id: header.owner_id,
                name: header.name.clone(),
                traveler_first_name: header.traveler_first_name.clone(),
                traveler_last_name: header.traveler_last_name.clone(),
                created_at: assigned.created_at,
                steps: Vec::new(),
            });
            Ok(assigned)
        }

        async fn insert_steps(&self, trip_id: Uuid, steps: &[PersistedStep]) -> Result<(), StoreError> {
            if self.fail_steps.load(Ordering::SeqCst) {
                return Err(StoreError::backend(InjectedFailure("step")));
            }
            let mut trips = self.lock();
            let trip = trips
                .iter_mut()
                .find(|t| t.id == trip_id)
                .ok_or_else(|| StoreError::backend(InjectedFailure("missing header")))?;
            trip.steps.extend_from_slice(steps);
            Ok(())
        }

        async fn list_trips(
            &self,
            owner_id: Uuid,
            limit: usize,
            after: Option<TripCursor>,
        ) -> Result<Vec<Trip>, StoreError> {
            let mut owned: Vec<StoredTrip> = self
                .lock()
                .iter()
                .filter(|t| t.owner_id == owner_id)
                .cloned()
                .collect();
            owned.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            Ok(owned
                .iter()
                .filter(|t| match after {
                    Some(cursor) => (t.created_at, t.id) < (cursor.created_at, cursor.id),
                    None => true,
                })
                .take(limit)
                .map(StoredTrip::to_trip)
                .collect())
        }

        async fn get_trip(&self, owner_id: Uuid, trip_id: Uuid) -> Result<Option<Trip>, StoreError> {
            Ok(self
                .lock()
                .iter()
                .find(|t| t.owner_id == owner_id && t.id == trip_id)
                .map(StoredTrip::to_trip))
        }

        async fn delete_trip(&self, owner_id: Uuid, trip_id: Uuid) -> Result<bool, StoreError> {
            let mut trips = self.lock();
            let before = trips.len();
            trips.retain(|t| !(t.owner_id == owner_id && t.id == trip_id));
            Ok(trips.len() != before)
        }
    }

    impl MemoryTripStore {
        /// Cursor positioned at the given trip, for paging tests.
        pub fn cursor_of(&self, trip_id: Uuid) -> Option<TripCursor> {
            self.lock().iter().find(|t| t.id == trip_id).map(StoredTrip::cursor)
        }
    }

    #[derive(Default)]
    pub struct MemorySlot {
        trip: Mutex<Option<Trip>>,
        fail_writes: AtomicBool,
        corrupt: AtomicBool,
    }

    impl MemorySlot {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Make the stored trip unreadable until the slot is cleared.
        pub fn corrupt(&self) {
            self.corrupt.store(true, Ordering::SeqCst);
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Option<Trip>> {
            self.trip.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    #[async_trait]
    impl TripSlot for MemorySlot {
        async fn load(&self) -> Result<Option<Trip>, StoreError> {
            if self.corrupt.load(Ordering::SeqCst) {
                return Err(StoreError::Corrupt(serde::de::Error::custom("truncated trip")));
            }
            Ok(self.lock().clone())
        }

        async fn replace(&self, trip: &Trip) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::backend(InjectedFailure("slot")));
            }
            *self.lock() = Some(trip.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<bool, StoreError> {
            let was_corrupt = self.corrupt.swap(false, Ordering::SeqCst);
            Ok(self.lock().take().is_some() || was_corrupt)
        }
    }
}
