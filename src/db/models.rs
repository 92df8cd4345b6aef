use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::helpers::dec_to_f64;
use crate::services::scoring::{Observation, Prediction};

/// A contest weather station.
#[derive(Debug, Clone, FromRow)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub location_desc: Option<String>,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub wunderground_url: Option<String>,
}

/// The station assigned to one contest week.
#[derive(Debug, Clone, FromRow)]
pub struct WeeklySchedule {
    pub station_id: String,
    /// Monday of the contest week.
    pub week_start: NaiveDate,
}

/// Weekly schedule joined with its station, for listings.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduleWithStation {
    pub week_start: NaiveDate,
    pub announced_at: Option<DateTime<Utc>>,
    pub station_id: String,
    pub station_name: String,
}

/// A contest participant. `total_points` is the incrementally maintained
/// running total; the scores table is the source of truth.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub total_points: i64,
    pub created_at: DateTime<Utc>,
}

/// One user's prediction for one station-day.
#[derive(Debug, Clone, FromRow)]
pub struct Forecast {
    pub id: Uuid,
    pub user_id: Uuid,
    pub station_id: String,
    pub forecast_date: NaiveDate,
    pub max_temp: i32,
    pub min_temp: i32,
    pub wind_gust: i32,
    pub precip_bucket: i32,
    pub submitted_at: DateTime<Utc>,
}

impl Forecast {
    pub fn prediction(&self) -> Prediction {
        Prediction {
            max_temp: self.max_temp,
            min_temp: self.min_temp,
            wind_gust: self.wind_gust,
            precip_bucket: self.precip_bucket,
        }
    }
}

/// Normalized actual conditions for one station-day.
#[derive(Debug, Clone, FromRow)]
pub struct StationReading {
    pub id: Uuid,
    pub station_id: String,
    pub reading_date: NaiveDate,
    pub max_temp_raw: Decimal,
    pub max_temp_rounded: i32,
    pub min_temp_raw: Decimal,
    pub min_temp_rounded: i32,
    pub wind_gust_max: Decimal,
    pub precip_total: Decimal,
    pub precip_bucket: i32,
    pub created_at: DateTime<Utc>,
}

impl StationReading {
    pub fn observation(&self) -> Observation {
        Observation {
            max_temp_rounded: self.max_temp_rounded,
            min_temp_rounded: self.min_temp_rounded,
            wind_gust_max: dec_to_f64(self.wind_gust_max),
            precip_bucket: self.precip_bucket,
        }
    }
}

/// A forecast with its score columns, if scored (history view).
#[derive(Debug, Clone, FromRow)]
pub struct ForecastWithScore {
    pub id: Uuid,
    pub forecast_date: NaiveDate,
    pub station_id: String,
    pub station_name: String,
    pub max_temp: i32,
    pub min_temp: i32,
    pub wind_gust: i32,
    pub precip_bucket: i32,
    pub submitted_at: DateTime<Utc>,
    pub max_temp_score: Option<i32>,
    pub min_temp_score: Option<i32>,
    pub wind_gust_score: Option<i32>,
    pub precip_score: Option<i32>,
    pub perfect_bonus: Option<i32>,
    pub total_score: Option<i32>,
}

/// A score joined with its forecast, reading and station (score history).
#[derive(Debug, Clone, FromRow)]
pub struct ScoreDetail {
    pub id: Uuid,
    pub score_date: NaiveDate,
    pub station_id: String,
    pub station_name: String,
    pub max_temp: i32,
    pub min_temp: i32,
    pub wind_gust: i32,
    pub forecast_precip_bucket: i32,
    pub max_temp_rounded: i32,
    pub min_temp_rounded: i32,
    pub wind_gust_max: Decimal,
    pub precip_total: Decimal,
    pub reading_precip_bucket: i32,
    pub max_temp_score: i32,
    pub min_temp_score: i32,
    pub wind_gust_score: i32,
    pub precip_score: i32,
    pub perfect_bonus: i32,
    pub total_score: i32,
}

impl ScoreDetail {
    pub fn prediction(&self) -> Prediction {
        Prediction {
            max_temp: self.max_temp,
            min_temp: self.min_temp,
            wind_gust: self.wind_gust,
            precip_bucket: self.forecast_precip_bucket,
        }
    }

    pub fn observation(&self) -> Observation {
        Observation {
            max_temp_rounded: self.max_temp_rounded,
            min_temp_rounded: self.min_temp_rounded,
            wind_gust_max: dec_to_f64(self.wind_gust_max),
            precip_bucket: self.reading_precip_bucket,
        }
    }
}

/// Aggregate over one user's scores.
#[derive(Debug, Clone, FromRow)]
pub struct ScoreSummary {
    pub total_scores: i64,
    pub total_points: i64,
    pub average_score: Option<Decimal>,
    pub perfect_forecasts: i64,
}

/// A user's score on one date, for the per-date results table.
#[derive(Debug, Clone, FromRow)]
pub struct DateScore {
    pub username: String,
    pub max_temp: i32,
    pub min_temp: i32,
    pub wind_gust: i32,
    pub precip_bucket: i32,
    pub max_temp_score: i32,
    pub min_temp_score: i32,
    pub wind_gust_score: i32,
    pub precip_score: i32,
    pub perfect_bonus: i32,
    pub total_score: i32,
}

/// One leaderboard row.
#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    pub username: String,
    pub total_points: i64,
}

/// Competition-wide statistics.
#[derive(Debug, Clone, FromRow)]
pub struct CompetitionStats {
    pub total_users: i64,
    pub total_forecasts: i64,
    pub total_points: i64,
    pub average_score: Option<Decimal>,
    pub perfect_forecasts: i64,
}
