//! Postgres-backed [`TripStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use meteotrip_core::store::{NewTripHeader, StoreError, TripCursor, TripHeader, TripStore};
use meteotrip_core::trip::{Condition, DailyForecast, EnrichedStep, PersistedStep, PlannedStop, Trip};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn steps_for(&self, trip_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<PersistedStep>>, StoreError> {
        let rows = sqlx::query_as::<_, StepRow>(
            r#"
            SELECT trip_id, step_order, location_name, arrival_date, departure_date,
                   is_single_day, daily_forecasts, primary_condition
            FROM trip_steps
            WHERE trip_id = ANY($1)
            ORDER BY trip_id, step_order
            "#,
        )
        .bind(trip_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let mut by_trip: HashMap<Uuid, Vec<PersistedStep>> = HashMap::new();
        for row in rows {
            by_trip.entry(row.trip_id).or_default().push(row.into_step());
        }
        Ok(by_trip)
    }
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn insert_header(&self, header: &NewTripHeader) -> Result<TripHeader, StoreError> {
        let id = Uuid::now_v7();
        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO trips (id, owner_id, name, traveler_first_name, traveler_last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(header.owner_id)
        .bind(&header.name)
        .bind(&header.traveler_first_name)
        .bind(&header.traveler_last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(TripHeader { id, created_at })
    }

    async fn insert_steps(&self, trip_id: Uuid, steps: &[PersistedStep]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        for persisted in steps {
            let step = &persisted.step;
            let forecasts = serde_json::to_value(&step.daily_forecasts)?;
            sqlx::query(
                r#"
                INSERT INTO trip_steps
                    (id, trip_id, step_order, location_name, arrival_date, departure_date,
                     is_single_day, daily_forecasts, primary_condition)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(trip_id)
            .bind(persisted.step_order)
            .bind(&step.stop.location_name)
            .bind(step.stop.arrival_date)
            .bind(step.stop.departure_date)
            .bind(step.stop.is_single_day)
            .bind(forecasts)
            .bind(step.primary_condition.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        }

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(())
    }

    async fn list_trips(
        &self,
        owner_id: Uuid,
        limit: usize,
        after: Option<TripCursor>,
    ) -> Result<Vec<Trip>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        // (created_at DESC, id DESC) keeps cursor pagination stable
        let rows = if let Some(cursor) = after {
            sqlx::query_as::<_, TripRow>(
                r#"
                SELECT id, owner_id, name, traveler_first_name, traveler_last_name, created_at
                FROM trips
                WHERE owner_id = $1
                  AND (created_at, id) < ($2, $3)
                ORDER BY created_at DESC, id DESC
                LIMIT $4
                "#,
            )
            .bind(owner_id)
            .bind(cursor.created_at)
            .bind(cursor.id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, TripRow>(
                r#"
                SELECT id, owner_id, name, traveler_first_name, traveler_last_name, created_at
                FROM trips
                WHERE owner_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "#,
            )
            .bind(owner_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(StoreError::backend)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut steps = self.steps_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let trip_steps = steps.remove(&row.id).unwrap_or_default();
                row.into_trip(trip_steps)
            })
            .collect())
    }

    async fn get_trip(&self, owner_id: Uuid, trip_id: Uuid) -> Result<Option<Trip>, StoreError> {
        let row = sqlx::query_as::<_, TripRow>(
            r#"
            SELECT id, owner_id, name, traveler_first_name, traveler_last_name, created_at
            FROM trips
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(trip_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let steps = self.steps_for(&[row.id]).await?.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_trip(steps)))
    }

    async fn delete_trip(&self, owner_id: Uuid, trip_id: Uuid) -> Result<bool, StoreError> {
        // trip_steps rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM trips WHERE id = $1 AND owner_id = $2")
            .bind(trip_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    traveler_first_name: String,
    traveler_last_name: String,
    created_at: DateTime<Utc>,
}

impl TripRow {
    fn into_trip(self, steps: Vec<PersistedStep>) -> Trip {
        Trip {
            id: self.id.to_string(),
            name: self.name,
            traveler_first_name: self.traveler_first_name,
            traveler_last_name: self.traveler_last_name,
            owner_id: Some(self.owner_id),
            created_at: self.created_at,
            steps,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    trip_id: Uuid,
    step_order: i32,
    location_name: String,
    arrival_date: NaiveDate,
    departure_date: NaiveDate,
    is_single_day: bool,
    daily_forecasts: serde_json::Value,
    primary_condition: String,
}

impl StepRow {
    fn into_step(self) -> PersistedStep {
        let daily_forecasts: Vec<DailyForecast> = serde_json::from_value(self.daily_forecasts)
            .unwrap_or_else(|e| {
                tracing::warn!(trip_id = %self.trip_id, step_order = self.step_order, error = %e, "unreadable daily_forecasts");
                Vec::new()
            });

        PersistedStep {
            step_order: self.step_order,
            step: EnrichedStep {
                stop: PlannedStop {
                    location_name: self.location_name,
                    arrival_date: self.arrival_date,
                    departure_date: self.departure_date,
                    is_single_day: self.is_single_day,
                },
                daily_forecasts,
                primary_condition: Condition::from(self.primary_condition),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_row_restores_forecasts_and_condition() {
        let row = StepRow {
            trip_id: Uuid::now_v7(),
            step_order: 2,
            location_name: "Gênes, Italie".to_string(),
            arrival_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            departure_date: NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
            is_single_day: false,
            daily_forecasts: serde_json::json!([
                {"date": "2026-10-01", "condition": "Averses"},
                {"date": "2026-10-02", "condition": "unavailable"}
            ]),
            primary_condition: "Averses".to_string(),
        };

        let step = row.into_step();
        assert_eq!(step.step_order, 2);
        assert_eq!(step.step.daily_forecasts[1].condition, Condition::Unavailable);
        assert_eq!(
            step.step.primary_condition,
            Condition::Forecast("Averses".to_string())
        );
    }

    #[test]
    fn corrupt_forecasts_degrade_to_empty() {
        let row = StepRow {
            trip_id: Uuid::now_v7(),
            step_order: 0,
            location_name: "Turin, Italie".to_string(),
            arrival_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            departure_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            is_single_day: true,
            daily_forecasts: serde_json::json!({"not": "a list"}),
            primary_condition: "to be determined".to_string(),
        };

        let step = row.into_step();
        assert!(step.step.daily_forecasts.is_empty());
        assert_eq!(step.step.primary_condition, Condition::ToBeDetermined);
    }
}
