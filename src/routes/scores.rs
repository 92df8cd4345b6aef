use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::db::{models, queries};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::dec_to_f64;
use crate::services::store::ScoreLedger;

#[derive(Debug, Serialize, ToSchema)]
pub struct DateScoreEntry {
    /// 1-based; ties share a rank
    pub rank: u32,
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

/// Actual conditions the scores were computed against.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadingSummary {
    pub station_id: String,
    /// °F as reported by the station
    pub max_temp_raw: f64,
    pub max_temp_rounded: i32,
    pub min_temp_raw: f64,
    pub min_temp_rounded: i32,
    /// mph, unrounded
    pub wind_gust_max: f64,
    /// inches
    pub precip_total: f64,
    pub precip_bucket: i32,
    /// When the reading was imported, RFC 3339
    pub imported_at: String,
}

impl From<models::StationReading> for ReadingSummary {
    fn from(r: models::StationReading) -> Self {
        Self {
            station_id: r.station_id,
            max_temp_raw: dec_to_f64(r.max_temp_raw),
            max_temp_rounded: r.max_temp_rounded,
            min_temp_raw: dec_to_f64(r.min_temp_raw),
            min_temp_rounded: r.min_temp_rounded,
            wind_gust_max: dec_to_f64(r.wind_gust_max),
            precip_total: dec_to_f64(r.precip_total),
            precip_bucket: r.precip_bucket,
            imported_at: r.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DateScoresResponse {
    /// YYYY-MM-DD
    pub date: String,
    pub readings: Vec<ReadingSummary>,
    pub scores: Vec<DateScoreEntry>,
}

/// Competition ranking: equal totals share a rank, the next rank skips.
fn ranked(rows: Vec<models::DateScore>) -> Vec<DateScoreEntry> {
    let mut out: Vec<DateScoreEntry> = Vec::with_capacity(rows.len());
    for (i, r) in rows.into_iter().enumerate() {
        let rank = match out.last() {
            Some(prev) if prev.total_score == r.total_score => prev.rank,
            _ => i as u32 + 1,
        };
        out.push(DateScoreEntry {
            rank,
            username: r.username,
            max_temp: r.max_temp,
            min_temp: r.min_temp,
            wind_gust: r.wind_gust,
            precip_bucket: r.precip_bucket,
            max_temp_score: r.max_temp_score,
            min_temp_score: r.min_temp_score,
            wind_gust_score: r.wind_gust_score,
            precip_score: r.precip_score,
            perfect_bonus: r.perfect_bonus,
            total_score: r.total_score,
        });
    }
    out
}

/// All scores for one date, best first.
#[utoipa::path(
    get,
    path = "/api/v1/scores/date/{date}",
    tag = "Scores",
    params(
        ("date" = String, Path, description = "Date (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Scores for the date", body = DateScoresResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse),
    )
)]
pub async fn scores_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DateScoresResponse>, AppError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| AppError::BadRequest(format!("Invalid date: {}", e)))?;

    let readings = state.pool.readings_on(date).await?;
    let rows = queries::scores_for_date(&state.pool, date).await?;

    Ok(Json(DateScoresResponse {
        date: date.to_string(),
        readings: readings.into_iter().map(ReadingSummary::from).collect(),
        scores: ranked(rows),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn row(name: &str, total: i32) -> models::DateScore {
        models::DateScore {
            username: name.to_string(),
            max_temp: 85,
            min_temp: 73,
            wind_gust: 12,
            precip_bucket: 1,
            max_temp_score: 0,
            min_temp_score: 0,
            wind_gust_score: 0,
            precip_score: 0,
            perfect_bonus: 0,
            total_score: total,
        }
    }

    #[test]
    fn test_ties_share_rank() {
        let r = ranked(vec![row("a", 25), row("b", 16), row("c", 16), row("d", 9)]);
        let ranks: Vec<u32> = r.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 2, 4]);
    }

    #[test]
    fn test_reading_summary_keeps_raw_temperatures() {
        let reading = models::StationReading {
            id: uuid::Uuid::nil(),
            station_id: "ICAYEY43".to_string(),
            reading_date: NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(),
            max_temp_raw: Decimal::from_str("85.4").unwrap(),
            max_temp_rounded: 85,
            min_temp_raw: Decimal::from_str("72.6").unwrap(),
            min_temp_rounded: 73,
            wind_gust_max: Decimal::from_str("12").unwrap(),
            precip_total: Decimal::from_str("0.05").unwrap(),
            precip_bucket: 1,
            created_at: Utc.with_ymd_and_hms(2025, 8, 16, 6, 0, 0).unwrap(),
        };
        let summary = ReadingSummary::from(reading);
        assert_eq!(summary.max_temp_raw, 85.4);
        assert_eq!(summary.min_temp_raw, 72.6);
        assert_eq!(summary.min_temp_rounded, 73);
        assert_eq!(summary.imported_at, "2025-08-16T06:00:00+00:00");
    }

    #[test]
    fn test_empty() {
        assert!(ranked(vec![]).is_empty());
    }
}
