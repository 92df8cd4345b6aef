//! Persistence seams for the batch jobs (reading import, scoring,
//! reconciliation).
//!
//! The Postgres implementation lives in `db::store`; tests use the
//! in-memory [`memory::MemoryStore`].

use chrono::NaiveDate;
use std::future::Future;
use uuid::Uuid;

use crate::db::models::{Forecast, StationReading};
use crate::errors::AppError;
use crate::services::normalizer::NormalizedReading;
use crate::services::scoring::ScoreResult;

/// A normalized reading ready to be written for one station-day.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub station_id: String,
    pub reading_date: NaiveDate,
    pub values: NormalizedReading,
}

/// A score ready to be recorded for one forecast.
#[derive(Debug, Clone)]
pub struct NewScore {
    pub user_id: Uuid,
    pub forecast_id: Uuid,
    pub reading_id: Uuid,
    pub score_date: NaiveDate,
    pub result: ScoreResult,
}

/// Result of replacing an existing reading.
#[derive(Debug, Clone)]
pub struct ReplacedReading {
    pub reading: StationReading,
    /// Scores deleted because they referenced the old reading.
    pub scores_removed: u64,
    /// Points subtracted from user totals for those scores.
    pub points_removed: i64,
}

/// A user's stored running total next to the sum of their scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTotal {
    pub user_id: Uuid,
    pub username: String,
    pub stored_total: i64,
    pub scored_total: i64,
}

/// Station readings.
pub trait ReadingStore: Send + Sync {
    fn station_exists(&self, station_id: &str)
        -> impl Future<Output = Result<bool, AppError>> + Send;

    fn reading_exists(
        &self,
        station_id: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Insert a reading. Fails if one already exists for the station-day.
    fn insert_reading(
        &self,
        reading: &NewReading,
    ) -> impl Future<Output = Result<StationReading, AppError>> + Send;

    /// Replace the reading for a station-day, removing dependent scores and
    /// their points from user totals. All or nothing.
    fn replace_reading(
        &self,
        reading: &NewReading,
    ) -> impl Future<Output = Result<ReplacedReading, AppError>> + Send;
}

/// Forecasts, scores and running totals.
pub trait ScoreLedger: Send + Sync {
    fn readings_on(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<StationReading>, AppError>> + Send;

    /// Reading dates that still have at least one unscored forecast, oldest first.
    fn pending_score_dates(&self) -> impl Future<Output = Result<Vec<NaiveDate>, AppError>> + Send;

    fn forecasts_for(
        &self,
        station_id: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Forecast>, AppError>> + Send;

    fn score_exists(&self, forecast_id: Uuid)
        -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Insert a score and add its total to the user's running total in one
    /// transaction. Returns `false` (and changes nothing) if the forecast
    /// already has a score.
    fn record_score(&self, score: &NewScore)
        -> impl Future<Output = Result<bool, AppError>> + Send;

    fn user_totals(&self) -> impl Future<Output = Result<Vec<UserTotal>, AppError>> + Send;

    /// Rewrite the user's running total from their score rows in one
    /// statement and return it, so scores recorded meanwhile are counted.
    fn recompute_total(&self, user_id: Uuid)
        -> impl Future<Output = Result<i64, AppError>> + Send;
}
