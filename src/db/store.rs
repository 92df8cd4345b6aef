//! Postgres implementation of the batch job store traits.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Forecast, StationReading};
use crate::errors::AppError;
use crate::helpers::f64_to_decimal;
use crate::services::store::{
    NewReading, NewScore, ReadingStore, ReplacedReading, ScoreLedger, UserTotal,
};

const INSERT_READING: &str = "INSERT INTO station_readings (
        id, station_id, reading_date,
        max_temp_raw, max_temp_rounded, min_temp_raw, min_temp_rounded,
        wind_gust_max, precip_total, precip_bucket, created_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
    RETURNING id, station_id, reading_date,
        max_temp_raw, max_temp_rounded, min_temp_raw, min_temp_rounded,
        wind_gust_max, precip_total, precip_bucket, created_at";

fn bind_reading<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, StationReading, sqlx::postgres::PgArguments>,
    reading: &'q NewReading,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, StationReading, sqlx::postgres::PgArguments> {
    let v = &reading.values;
    query
        .bind(Uuid::new_v4())
        .bind(&reading.station_id)
        .bind(reading.reading_date)
        .bind(f64_to_decimal(v.max_temp_raw))
        .bind(v.max_temp_rounded)
        .bind(f64_to_decimal(v.min_temp_raw))
        .bind(v.min_temp_rounded)
        .bind(f64_to_decimal(v.wind_gust_max))
        .bind(f64_to_decimal(v.precip_total))
        .bind(v.precip_bucket)
}

impl ReadingStore for PgPool {
    async fn station_exists(&self, station_id: &str) -> Result<bool, AppError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM stations WHERE id = $1)")
                .bind(station_id)
                .fetch_one(self)
                .await?;
        Ok(exists)
    }

    async fn reading_exists(&self, station_id: &str, date: NaiveDate) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM station_readings WHERE station_id = $1 AND reading_date = $2
            )",
        )
        .bind(station_id)
        .bind(date)
        .fetch_one(self)
        .await?;
        Ok(exists)
    }

    async fn insert_reading(&self, reading: &NewReading) -> Result<StationReading, AppError> {
        let row = bind_reading(sqlx::query_as::<_, StationReading>(INSERT_READING), reading)
            .fetch_one(self)
            .await?;
        Ok(row)
    }

    async fn replace_reading(&self, reading: &NewReading) -> Result<ReplacedReading, AppError> {
        let mut tx = self.begin().await?;

        // Row lock on the old reading. A concurrent score insert needs a key
        // share lock on it for the foreign key, so it waits for this
        // transaction or has already committed before the delete below.
        sqlx::query(
            "SELECT id FROM station_readings
             WHERE station_id = $1 AND reading_date = $2
             FOR UPDATE",
        )
        .bind(&reading.station_id)
        .bind(reading.reading_date)
        .fetch_all(&mut *tx)
        .await?;

        // Points come back from exactly the rows deleted.
        let deleted: Vec<(Uuid, i32)> = sqlx::query_as(
            "DELETE FROM scores
             WHERE reading_id IN (
                 SELECT id FROM station_readings WHERE station_id = $1 AND reading_date = $2
             )
             RETURNING user_id, total_score",
        )
        .bind(&reading.station_id)
        .bind(reading.reading_date)
        .fetch_all(&mut *tx)
        .await?;

        let removed = RemovedPoints::from_deleted(&deleted);
        for (user_id, points) in &removed.per_user {
            sqlx::query("UPDATE users SET total_points = total_points - $1 WHERE id = $2")
                .bind(*points)
                .bind(*user_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM station_readings WHERE station_id = $1 AND reading_date = $2")
            .bind(&reading.station_id)
            .bind(reading.reading_date)
            .execute(&mut *tx)
            .await?;

        let row = bind_reading(sqlx::query_as::<_, StationReading>(INSERT_READING), reading)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ReplacedReading {
            reading: row,
            scores_removed: removed.scores,
            points_removed: removed.points,
        })
    }
}

/// Points to take back after deleting score rows, grouped per user.
#[derive(Debug, Default, PartialEq, Eq)]
struct RemovedPoints {
    per_user: BTreeMap<Uuid, i64>,
    scores: u64,
    points: i64,
}

impl RemovedPoints {
    fn from_deleted(rows: &[(Uuid, i32)]) -> Self {
        let mut removed = Self::default();
        for (user_id, total_score) in rows {
            *removed.per_user.entry(*user_id).or_default() += i64::from(*total_score);
            removed.scores += 1;
            removed.points += i64::from(*total_score);
        }
        removed
    }
}

impl ScoreLedger for PgPool {
    async fn readings_on(&self, date: NaiveDate) -> Result<Vec<StationReading>, AppError> {
        let rows = sqlx::query_as::<_, StationReading>(
            "SELECT id, station_id, reading_date,
                    max_temp_raw, max_temp_rounded, min_temp_raw, min_temp_rounded,
                    wind_gust_max, precip_total, precip_bucket, created_at
             FROM station_readings
             WHERE reading_date = $1
             ORDER BY station_id",
        )
        .bind(date)
        .fetch_all(self)
        .await?;
        Ok(rows)
    }

    async fn pending_score_dates(&self) -> Result<Vec<NaiveDate>, AppError> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT DISTINCT r.reading_date
             FROM station_readings r
             JOIN forecasts f
               ON f.station_id = r.station_id AND f.forecast_date = r.reading_date
             LEFT JOIN scores sc ON sc.forecast_id = f.id
             WHERE sc.id IS NULL
             ORDER BY r.reading_date",
        )
        .fetch_all(self)
        .await?;
        Ok(dates)
    }

    async fn forecasts_for(&self, station_id: &str, date: NaiveDate) -> Result<Vec<Forecast>, AppError> {
        let rows = sqlx::query_as::<_, Forecast>(
            "SELECT id, user_id, station_id, forecast_date,
                    max_temp, min_temp, wind_gust, precip_bucket, submitted_at
             FROM forecasts
             WHERE station_id = $1 AND forecast_date = $2
             ORDER BY submitted_at",
        )
        .bind(station_id)
        .bind(date)
        .fetch_all(self)
        .await?;
        Ok(rows)
    }

    async fn score_exists(&self, forecast_id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM scores WHERE forecast_id = $1)",
        )
        .bind(forecast_id)
        .fetch_one(self)
        .await?;
        Ok(exists)
    }

    async fn record_score(&self, score: &NewScore) -> Result<bool, AppError> {
        let r = &score.result;
        let mut tx = self.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO scores (
                id, user_id, forecast_id, reading_id, score_date,
                max_temp_score, min_temp_score, wind_gust_score, precip_score,
                perfect_bonus, total_score, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (forecast_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(score.user_id)
        .bind(score.forecast_id)
        .bind(score.reading_id)
        .bind(score.score_date)
        .bind(r.max_temp_score)
        .bind(r.min_temp_score)
        .bind(r.wind_gust_score)
        .bind(r.precip_score)
        .bind(r.perfect_bonus)
        .bind(r.total_score)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE users SET total_points = total_points + $1 WHERE id = $2")
            .bind(i64::from(r.total_score))
            .bind(score.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn user_totals(&self) -> Result<Vec<UserTotal>, AppError> {
        let rows: Vec<(Uuid, String, i64, i64)> = sqlx::query_as(
            "SELECT u.id, u.username, u.total_points,
                    COALESCE(SUM(sc.total_score), 0)::BIGINT
             FROM users u
             LEFT JOIN scores sc ON sc.user_id = u.id
             GROUP BY u.id, u.username, u.total_points
             ORDER BY u.username",
        )
        .fetch_all(self)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, username, stored_total, scored_total)| UserTotal {
                user_id,
                username,
                stored_total,
                scored_total,
            })
            .collect())
    }

    async fn recompute_total(&self, user_id: Uuid) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            "UPDATE users
             SET total_points = (
                 SELECT COALESCE(SUM(total_score), 0)::BIGINT FROM scores WHERE user_id = $1
             )
             WHERE id = $1
             RETURNING total_points",
        )
        .bind(user_id)
        .fetch_optional(self)
        .await?;
        total.ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_points_grouped_per_user() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let removed = RemovedPoints::from_deleted(&[(alice, 16), (bob, 25), (alice, 9)]);

        assert_eq!(removed.scores, 3);
        assert_eq!(removed.points, 50);
        assert_eq!(removed.per_user.get(&alice), Some(&25));
        assert_eq!(removed.per_user.get(&bob), Some(&25));
    }

    #[test]
    fn test_nothing_deleted() {
        assert_eq!(RemovedPoints::from_deleted(&[]), RemovedPoints::default());
    }
}
