//! Leaderboard endpoints.
//!
//! All-time standings come from the running totals on each user. Weekly
//! and monthly standings are summed from score rows dated within the
//! current contest week or month.

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{AppState, Pagination};
use crate::db::{models, queries};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{opt_dec_to_f64, round_2dp};
use crate::services::calendar::{current_instant, month_start, week_start};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Leaderboard period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    AllTime,
    Weekly,
    Monthly,
}

impl Period {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all-time" => Some(Period::AllTime),
            "weekly" => Some(Period::Weekly),
            "monthly" => Some(Period::Monthly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::AllTime => "all-time",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }

    /// First score date counted for this period, or `None` for all-time.
    pub fn since(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::AllTime => None,
            Period::Weekly => Some(week_start(today)),
            Period::Monthly => Some(month_start(today)),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// "all-time" (default), "weekly" or "monthly"
    #[serde(rename = "type")]
    pub period: Option<String>,
    /// Page size (default 50, max 100)
    pub limit: Option<i64>,
    /// Rows to skip (default 0)
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: i64,
    pub user_id: Uuid,
    pub username: String,
    pub total_points: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// "all-time", "weekly" or "monthly"
    #[serde(rename = "type")]
    pub period: String,
    /// First score date counted (YYYY-MM-DD); absent for all-time
    pub since: Option<String>,
    pub rankings: Vec<LeaderboardEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopScorer {
    pub username: String,
    pub total_points: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_users: i64,
    pub total_forecasts: i64,
    pub total_points: i64,
    /// Mean score per scored forecast, two decimals
    pub average_score: f64,
    pub perfect_forecasts: i64,
    pub top_scorer: Option<TopScorer>,
}

fn stats_response(stats: models::CompetitionStats, top: Option<models::LeaderboardRow>) -> StatsResponse {
    StatsResponse {
        total_users: stats.total_users,
        total_forecasts: stats.total_forecasts,
        total_points: stats.total_points,
        average_score: round_2dp(opt_dec_to_f64(stats.average_score).unwrap_or(0.0)),
        perfect_forecasts: stats.perfect_forecasts,
        top_scorer: top.map(|t| TopScorer {
            username: t.username,
            total_points: t.total_points,
        }),
    }
}

/// Ranked standings for a period.
#[utoipa::path(
    get,
    path = "/api/v1/leaderboard",
    tag = "Leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Standings", body = LeaderboardResponse),
        (status = 400, description = "Unknown leaderboard type", body = ErrorResponse),
    )
)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let period_str = params.period.as_deref().unwrap_or("all-time");
    let period = Period::parse(period_str).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid type '{}'. Use: all-time, weekly, or monthly",
            period_str
        ))
    })?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let today = current_instant(state.clock.as_ref()).date_naive();
    let since = period.since(today);

    let rows = match since {
        None => queries::leaderboard_all_time(&state.pool, limit, offset).await?,
        Some(from) => queries::leaderboard_since(&state.pool, from, limit, offset).await?,
    };
    let total = queries::count_ranked_users(&state.pool, since).await?;
    let pagination = Pagination::new(total, limit, offset, rows.len());

    let rankings = rows
        .into_iter()
        .enumerate()
        .map(|(i, r)| LeaderboardEntry {
            rank: offset + i as i64 + 1,
            user_id: r.user_id,
            username: r.username,
            total_points: r.total_points,
        })
        .collect();

    Ok(Json(LeaderboardResponse {
        period: period.as_str().to_string(),
        since: since.map(|d| d.to_string()),
        rankings,
        pagination,
    }))
}

/// Competition-wide statistics.
#[utoipa::path(
    get,
    path = "/api/v1/leaderboard/stats",
    tag = "Leaderboard",
    responses(
        (status = 200, description = "Competition statistics", body = StatsResponse),
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let stats = queries::competition_stats(&state.pool).await?;
    let top = queries::top_scorer(&state.pool).await?;
    Ok(Json(stats_response(stats, top)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_parse() {
        assert_eq!(Period::parse("all-time"), Some(Period::AllTime));
        assert_eq!(Period::parse("weekly"), Some(Period::Weekly));
        assert_eq!(Period::parse("monthly"), Some(Period::Monthly));
        assert_eq!(Period::parse("daily"), None);
    }

    #[test]
    fn test_period_since() {
        // 2025-08-14 is a Thursday
        let today = date(2025, 8, 14);
        assert_eq!(Period::AllTime.since(today), None);
        assert_eq!(Period::Weekly.since(today), Some(date(2025, 8, 11)));
        assert_eq!(Period::Monthly.since(today), Some(date(2025, 8, 1)));
    }

    #[test]
    fn test_stats_without_scores() {
        let stats = models::CompetitionStats {
            total_users: 2,
            total_forecasts: 0,
            total_points: 0,
            average_score: None,
            perfect_forecasts: 0,
        };
        let r = stats_response(stats, None);
        assert_eq!(r.average_score, 0.0);
        assert!(r.top_scorer.is_none());
    }

    #[test]
    fn test_stats_average_and_top_scorer() {
        let stats = models::CompetitionStats {
            total_users: 2,
            total_forecasts: 3,
            total_points: 41,
            average_score: Some(Decimal::from_str("20.5").unwrap()),
            perfect_forecasts: 1,
        };
        let top = models::LeaderboardRow {
            user_id: Uuid::nil(),
            username: "bob".to_string(),
            total_points: 25,
        };
        let r = stats_response(stats, Some(top));
        assert_eq!(r.average_score, 20.5);
        assert_eq!(r.top_scorer.unwrap().username, "bob");
    }
}
