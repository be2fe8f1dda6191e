use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

const TRIP_COLUMNS: &str = r#"id, user_id, title, destination, start_date, end_date, budget,
       description, itinerary, expenses, photos, is_public, preferences,
       generated_by_ai, created_at, updated_at"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub destination: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub budget: Decimal,
    pub description: String,
    pub itinerary: Value,
    pub expenses: Value,
    pub photos: Value,
    pub is_public: bool,
    pub preferences: Value,
    pub generated_by_ai: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated column values for an INSERT; produced by the create DTO.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub title: String,
    pub destination: String,
    pub start_date: OffsetDateTime,
    pub end_date: OffsetDateTime,
    pub budget: Decimal,
    pub description: String,
    pub itinerary: Value,
    pub is_public: bool,
    pub preferences: Value,
    pub generated_by_ai: bool,
}

impl Trip {
    /// Trip length in days, counting both the first and the last day.
    pub fn duration_days(&self) -> i64 {
        let secs = (self.end_date - self.start_date).whole_seconds().max(0);
        (secs + 86_399) / 86_400 + 1
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Trip>> {
        let rows = sqlx::query_as::<_, Trip>(&format!(
            r#"
            SELECT {TRIP_COLUMNS}
            FROM trips
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Ownership-scoped lookup; absent and not-owned are indistinguishable.
    pub async fn find_by_owner(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            SELECT {TRIP_COLUMNS}
            FROM trips
            WHERE id = $1 AND user_id = $2
            "#,
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(trip)
    }

    pub async fn create(db: &PgPool, user_id: Uuid, new: &NewTrip) -> anyhow::Result<Trip> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            INSERT INTO trips (user_id, title, destination, start_date, end_date, budget,
                               description, itinerary, is_public, preferences, generated_by_ai)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {TRIP_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(&new.title)
        .bind(&new.destination)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.budget)
        .bind(&new.description)
        .bind(&new.itinerary)
        .bind(new.is_public)
        .bind(&new.preferences)
        .bind(new.generated_by_ai)
        .fetch_one(db)
        .await?;
        Ok(trip)
    }

    /// Persist every mutable column of an already-validated trip.
    pub async fn update(db: &PgPool, trip: &Trip) -> anyhow::Result<Trip> {
        let updated = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET title = $3, destination = $4, start_date = $5, end_date = $6,
                budget = $7, description = $8, itinerary = $9, expenses = $10,
                photos = $11, is_public = $12, preferences = $13,
                generated_by_ai = $14, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {TRIP_COLUMNS}
            "#,
        ))
        .bind(trip.id)
        .bind(trip.user_id)
        .bind(&trip.title)
        .bind(&trip.destination)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(trip.budget)
        .bind(&trip.description)
        .bind(&trip.itinerary)
        .bind(&trip.expenses)
        .bind(&trip.photos)
        .bind(trip.is_public)
        .bind(&trip.preferences)
        .bind(trip.generated_by_ai)
        .fetch_one(db)
        .await?;
        Ok(updated)
    }

    pub async fn delete(db: &PgPool, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Append one expense entry atomically. The concatenation runs inside
    /// Postgres under the row lock, so concurrent appends all survive.
    pub async fn append_expense(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
        entry: &Value,
    ) -> anyhow::Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET expenses = expenses || jsonb_build_array($3::jsonb), updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {TRIP_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(user_id)
        .bind(entry)
        .fetch_optional(db)
        .await?;
        Ok(trip)
    }

    /// Append one photo entry atomically; same semantics as expenses.
    pub async fn append_photo(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
        entry: &Value,
    ) -> anyhow::Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET photos = photos || jsonb_build_array($3::jsonb), updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {TRIP_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(user_id)
        .bind(entry)
        .fetch_optional(db)
        .await?;
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample_trip(start: OffsetDateTime, end: OffsetDateTime) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Kyoto in autumn".into(),
            destination: "Kyoto".into(),
            start_date: start,
            end_date: end,
            budget: Decimal::new(150_000, 2),
            description: String::new(),
            itinerary: serde_json::json!([]),
            expenses: serde_json::json!([]),
            photos: serde_json::json!([]),
            is_public: false,
            preferences: serde_json::json!({}),
            generated_by_ai: false,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn duration_counts_first_and_last_day() {
        let trip = sample_trip(
            datetime!(2024-10-01 0:00 UTC),
            datetime!(2024-10-05 0:00 UTC),
        );
        assert_eq!(trip.duration_days(), 5);
    }

    #[test]
    fn duration_rounds_partial_days_up() {
        let trip = sample_trip(
            datetime!(2024-10-01 8:00 UTC),
            datetime!(2024-10-02 20:00 UTC),
        );
        // One and a half days rounds up to two, plus the inclusive first day
        assert_eq!(trip.duration_days(), 3);
    }

    #[test]
    fn trip_serializes_dates_as_rfc3339() {
        let trip = sample_trip(
            datetime!(2024-10-01 0:00 UTC),
            datetime!(2024-10-05 0:00 UTC),
        );
        let json = serde_json::to_value(&trip).unwrap();
        assert_eq!(json["start_date"], "2024-10-01T00:00:00Z");
        assert_eq!(json["end_date"], "2024-10-05T00:00:00Z");
    }
}
