//! User endpoints.
//!
//! - POST /api/v1/users
//! - GET /api/v1/users/:id/forecasts
//! - GET /api/v1/users/:id/forecasts/today
//! - GET /api/v1/users/:id/scores

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::forecasts::{ForecastResponse, WindowResponse};
use super::{AppState, PageQuery, Pagination};
use crate::db::{models, queries};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{dec_to_f64, opt_dec_to_f64, round_2dp};
use crate::services::calendar::{current_instant, submission_window, SubmissionWindow};
use crate::services::normalizer::bucket_description;
use crate::services::scoring::{breakdown, ScoreBreakdown};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 30;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// 3–30 characters: letters, digits, underscore
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub total_points: i64,
    /// RFC 3339
    pub created_at: String,
}

impl From<models::User> for UserResponse {
    fn from(u: models::User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            total_points: u.total_points,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// Per-axis and total points for a scored forecast.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScorePoints {
    pub max_temp_score: i32,
    pub min_temp_score: i32,
    pub wind_gust_score: i32,
    pub precip_score: i32,
    pub perfect_bonus: i32,
    pub total_score: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastHistoryEntry {
    pub id: Uuid,
    /// YYYY-MM-DD
    pub forecast_date: String,
    pub station_id: String,
    pub station_name: String,
    pub max_temp: i32,
    pub min_temp: i32,
    pub wind_gust: i32,
    pub precip_bucket: i32,
    pub precip_label: String,
    /// RFC 3339
    pub submitted_at: String,
    /// Absent until the forecast has been scored
    pub score: Option<ScorePoints>,
}

impl From<models::ForecastWithScore> for ForecastHistoryEntry {
    fn from(f: models::ForecastWithScore) -> Self {
        let score = match (
            f.max_temp_score,
            f.min_temp_score,
            f.wind_gust_score,
            f.precip_score,
            f.perfect_bonus,
            f.total_score,
        ) {
            (Some(a), Some(b), Some(c), Some(d), Some(e), Some(t)) => Some(ScorePoints {
                max_temp_score: a,
                min_temp_score: b,
                wind_gust_score: c,
                precip_score: d,
                perfect_bonus: e,
                total_score: t,
            }),
            _ => None,
        };
        Self {
            id: f.id,
            forecast_date: f.forecast_date.to_string(),
            station_id: f.station_id,
            station_name: f.station_name,
            max_temp: f.max_temp,
            min_temp: f.min_temp,
            wind_gust: f.wind_gust,
            precip_bucket: f.precip_bucket,
            precip_label: bucket_description(f.precip_bucket).label.to_string(),
            submitted_at: f.submitted_at.to_rfc3339(),
            score,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastHistoryResponse {
    pub forecasts: Vec<ForecastHistoryEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TodayForecastResponse {
    pub window: WindowResponse,
    /// The user's forecast for the open date, if already submitted
    pub forecast: Option<ForecastResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreHistoryEntry {
    pub id: Uuid,
    /// YYYY-MM-DD
    pub score_date: String,
    pub station_id: String,
    pub station_name: String,
    /// Actual peak gust in mph, unrounded
    pub actual_wind_gust: f64,
    /// Actual precipitation in inches
    pub actual_precip: f64,
    pub breakdown: ScoreBreakdown,
    pub perfect_bonus: i32,
    pub total_score: i32,
}

/// Forecast, actual and diff per axis, with the points as stored on the score.
fn stored_breakdown(s: &models::ScoreDetail) -> ScoreBreakdown {
    let mut b = breakdown(&s.prediction(), &s.observation());
    b.max_temp.score = s.max_temp_score;
    b.min_temp.score = s.min_temp_score;
    b.wind_gust.score = s.wind_gust_score;
    b.precip.score = s.precip_score;
    b
}

impl From<models::ScoreDetail> for ScoreHistoryEntry {
    fn from(s: models::ScoreDetail) -> Self {
        Self {
            id: s.id,
            score_date: s.score_date.to_string(),
            breakdown: stored_breakdown(&s),
            actual_wind_gust: dec_to_f64(s.wind_gust_max),
            actual_precip: dec_to_f64(s.precip_total),
            station_id: s.station_id,
            station_name: s.station_name,
            perfect_bonus: s.perfect_bonus,
            total_score: s.total_score,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreSummaryResponse {
    pub total_scores: i64,
    pub total_points: i64,
    /// Mean total per scored forecast, two decimals
    pub average_score: f64,
    pub perfect_forecasts: i64,
}

impl From<models::ScoreSummary> for ScoreSummaryResponse {
    fn from(s: models::ScoreSummary) -> Self {
        Self {
            total_scores: s.total_scores,
            total_points: s.total_points,
            average_score: round_2dp(opt_dec_to_f64(s.average_score).unwrap_or(0.0)),
            perfect_forecasts: s.perfect_forecasts,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreHistoryResponse {
    pub scores: Vec<ScoreHistoryEntry>,
    pub summary: ScoreSummaryResponse,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate and normalize a requested username.
pub fn validate_username(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(AppError::BadRequest(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::BadRequest(
            "Username may only contain letters, numbers and underscores".to_string(),
        ));
    }
    Ok(name.to_string())
}

async fn load_user(state: &AppState, id: Uuid) -> Result<models::User, AppError> {
    queries::get_user(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Register a contest participant.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid username", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let username = validate_username(&req.username)?;
    let user = match queries::create_user(&state.pool, &username).await {
        Ok(u) => u,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )))
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!("Registered user '{}' ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// A user's forecasts, newest first, with scores where available.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/forecasts",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User UUID"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Forecast history", body = ForecastHistoryResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn forecast_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ForecastHistoryResponse>, AppError> {
    load_user(&state, id).await?;
    let (limit, offset) = page.resolve();

    let rows = queries::list_user_forecasts(&state.pool, id, limit, offset).await?;
    let total = queries::count_user_forecasts(&state.pool, id).await?;
    let pagination = Pagination::new(total, limit, offset, rows.len());

    Ok(Json(ForecastHistoryResponse {
        forecasts: rows.into_iter().map(ForecastHistoryEntry::from).collect(),
        pagination,
    }))
}

/// The user's forecast for the date currently open, plus the window state.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/forecasts/today",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "Today's forecast, if any", body = TodayForecastResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn today_forecast(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TodayForecastResponse>, AppError> {
    load_user(&state, id).await?;
    let window = submission_window(current_instant(state.clock.as_ref()));

    let forecast = match &window {
        SubmissionWindow::Open { forecast_date, .. } => {
            queries::get_forecast_for_date(&state.pool, id, *forecast_date)
                .await?
                .map(ForecastResponse::from)
        }
        SubmissionWindow::Closed { .. } => None,
    };

    Ok(Json(TodayForecastResponse {
        window: window.into(),
        forecast,
    }))
}

/// A user's scores with per-axis breakdown and an overall summary.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/scores",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User UUID"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Score history", body = ScoreHistoryResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn score_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ScoreHistoryResponse>, AppError> {
    load_user(&state, id).await?;
    let (limit, offset) = page.resolve();

    let rows = queries::list_user_scores(&state.pool, id, limit, offset).await?;
    let summary = queries::user_score_summary(&state.pool, id).await?;
    let pagination = Pagination::new(summary.total_scores, limit, offset, rows.len());

    Ok(Json(ScoreHistoryResponse {
        scores: rows.into_iter().map(ScoreHistoryEntry::from).collect(),
        summary: summary.into(),
        pagination,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  rain_man ").unwrap(), "rain_man");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(31)).is_err());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username("émile").is_err());
    }

    #[test]
    fn test_unscored_forecast_has_no_score() {
        let row = models::ForecastWithScore {
            id: Uuid::nil(),
            forecast_date: NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(),
            station_id: "ICAYEY43".to_string(),
            station_name: "Cayey Station".to_string(),
            max_temp: 87,
            min_temp: 73,
            wind_gust: 15,
            precip_bucket: 2,
            submitted_at: Utc::now(),
            max_temp_score: None,
            min_temp_score: None,
            wind_gust_score: None,
            precip_score: None,
            perfect_bonus: None,
            total_score: None,
        };
        let entry = ForecastHistoryEntry::from(row);
        assert!(entry.score.is_none());
        assert_eq!(entry.precip_label, "0.11\" - 0.25\"");
    }

    fn score_detail(axis_scores: [i32; 4], total_score: i32) -> models::ScoreDetail {
        models::ScoreDetail {
            id: Uuid::nil(),
            score_date: NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(),
            station_id: "ICAYEY43".to_string(),
            station_name: "Cayey Station".to_string(),
            max_temp: 86,
            min_temp: 73,
            wind_gust: 15,
            forecast_precip_bucket: 2,
            max_temp_rounded: 85,
            min_temp_rounded: 73,
            wind_gust_max: Decimal::from_str("12").unwrap(),
            precip_total: Decimal::from_str("0.05").unwrap(),
            reading_precip_bucket: 1,
            max_temp_score: axis_scores[0],
            min_temp_score: axis_scores[1],
            wind_gust_score: axis_scores[2],
            precip_score: axis_scores[3],
            perfect_bonus: 0,
            total_score,
        }
    }

    #[test]
    fn test_score_history_entry_breakdown() {
        let entry = ScoreHistoryEntry::from(score_detail([4, 5, 3, 4], 16));
        assert_eq!(entry.breakdown.max_temp.diff, 1);
        assert_eq!(entry.breakdown.wind_gust.actual, 12);
        assert_eq!(entry.breakdown.wind_gust.diff, 3);
        assert_eq!(entry.actual_precip, 0.05);
        assert_eq!(entry.total_score, 16);
    }

    #[test]
    fn test_score_history_shows_stored_axis_scores() {
        // Stored points differ from what the current reading would give
        let entry = ScoreHistoryEntry::from(score_detail([3, 5, 4, 4], 16));
        let b = entry.breakdown;
        assert_eq!(b.max_temp.score, 3);
        assert_eq!(b.wind_gust.score, 4);
        assert_eq!(
            b.max_temp.score + b.min_temp.score + b.wind_gust.score + b.precip.score
                + entry.perfect_bonus,
            entry.total_score
        );
        assert_eq!(b.max_temp.diff, 1);
    }

    #[test]
    fn test_summary_average_rounded() {
        let s = models::ScoreSummary {
            total_scores: 3,
            total_points: 50,
            average_score: Some(Decimal::from_str("16.666666").unwrap()),
            perfect_forecasts: 1,
        };
        let r = ScoreSummaryResponse::from(s);
        assert_eq!(r.average_score, 16.67);
    }
}
