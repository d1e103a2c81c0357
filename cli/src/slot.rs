//! File-backed anonymous trip slot: one serialized trip per device.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use meteotrip_core::store::{StoreError, TripSlot};
use meteotrip_core::trip::Trip;

use crate::util::{self, OpenOptionsExt};

const SLOT_FILE: &str = "guest_trip.json";

pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/meteotrip/guest_trip.json`
    pub fn default_location() -> Self {
        Self::new(util::config_dir().join(SLOT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TripSlot for FileSlot {
    async fn load(&self) -> Result<Option<Trip>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, trip: &Trip) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(trip)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &data))
            .await
            .map_err(io::Error::other)??;
        tracing::debug!(path = %self.path.display(), trip_id = %trip.id, "slot replaced");
        Ok(())
    }

    async fn clear(&self) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write next to the target, then rename over it. Readers see the old trip
/// or the new one, never a partial file.
fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use meteotrip_core::store::guest_trip_id;
    use meteotrip_core::trip::{EnrichedStep, PlannedStop, number_steps};

    use super::*;

    fn guest_trip(name: &str) -> Trip {
        let day = NaiveDate::from_ymd_opt(2026, 10, 3).unwrap();
        let now = Utc::now();
        Trip {
            id: guest_trip_id(now),
            name: name.to_string(),
            traveler_first_name: "Léa".to_string(),
            traveler_last_name: "Martin".to_string(),
            owner_id: None,
            created_at: now,
            steps: number_steps(vec![EnrichedStep::new(
                PlannedStop {
                    location_name: "Annecy, France".to_string(),
                    arrival_date: day,
                    departure_date: day,
                    is_single_day: true,
                },
                Vec::new(),
            )]),
        }
    }

    #[tokio::test]
    async fn empty_slot_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("nested").join(SLOT_FILE));
        assert!(slot.load().await.unwrap().is_none());
        assert!(!slot.clear().await.unwrap());
    }

    #[tokio::test]
    async fn replace_overwrites_and_clear_empties() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("nested").join(SLOT_FILE));

        slot.replace(&guest_trip("Lac")).await.unwrap();
        let second = guest_trip("Montagne");
        slot.replace(&second).await.unwrap();

        assert_eq!(slot.load().await.unwrap(), Some(second));
        assert!(!slot.path().with_extension("json.tmp").exists());

        assert!(slot.clear().await.unwrap());
        assert!(slot.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SLOT_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let err = FileSlot::new(path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slot_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join(SLOT_FILE));
        slot.replace(&guest_trip("Lac")).await.unwrap();

        let mode = std::fs::metadata(slot.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
