use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    CompetitionStats, DateScore, Forecast, ForecastWithScore, LeaderboardRow,
    ScheduleWithStation, ScoreDetail, ScoreSummary, Station, User, WeeklySchedule,
};
use crate::services::scoring::Prediction;

// ---------------------------------------------------------------------------
// Stations and schedule
// ---------------------------------------------------------------------------

/// List all stations.
pub async fn list_stations(pool: &PgPool) -> Result<Vec<Station>, sqlx::Error> {
    sqlx::query_as::<_, Station>(
        "SELECT id, name, location_desc, latitude, longitude, wunderground_url
         FROM stations ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

/// Get a single station by ID.
pub async fn get_station(pool: &PgPool, id: &str) -> Result<Option<Station>, sqlx::Error> {
    sqlx::query_as::<_, Station>(
        "SELECT id, name, location_desc, latitude, longitude, wunderground_url
         FROM stations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Weekly schedule rows for the given week starts.
pub async fn get_weekly_schedules(
    pool: &PgPool,
    week_starts: &[NaiveDate],
) -> Result<Vec<WeeklySchedule>, sqlx::Error> {
    sqlx::query_as::<_, WeeklySchedule>(
        "SELECT station_id, week_start
         FROM weekly_schedules
         WHERE week_start = ANY($1)",
    )
    .bind(week_starts)
    .fetch_all(pool)
    .await
}

/// Scheduled weeks starting on or after `from`, earliest first.
pub async fn get_upcoming_schedules(
    pool: &PgPool,
    from: NaiveDate,
    limit: i64,
) -> Result<Vec<ScheduleWithStation>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleWithStation>(
        "SELECT ws.week_start, ws.announced_at, s.id AS station_id, s.name AS station_name
         FROM weekly_schedules ws
         JOIN stations s ON s.id = ws.station_id
         WHERE ws.week_start >= $1
         ORDER BY ws.week_start
         LIMIT $2",
    )
    .bind(from)
    .bind(limit)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, total_points, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Insert a new user. Fails with a unique violation if the username is taken.
pub async fn create_user(pool: &PgPool, username: &str) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username, total_points, created_at)
         VALUES ($1, $2, 0, NOW())
         RETURNING id, username, total_points, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .fetch_one(pool)
    .await
}

// ---------------------------------------------------------------------------
// Forecasts
// ---------------------------------------------------------------------------

/// Insert a forecast (append-only, one per user per date).
pub async fn insert_forecast(
    pool: &PgPool,
    user_id: Uuid,
    station_id: &str,
    forecast_date: NaiveDate,
    prediction: &Prediction,
) -> Result<Forecast, sqlx::Error> {
    sqlx::query_as::<_, Forecast>(
        "INSERT INTO forecasts (
            id, user_id, station_id, forecast_date,
            max_temp, min_temp, wind_gust, precip_bucket, submitted_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        RETURNING id, user_id, station_id, forecast_date,
                  max_temp, min_temp, wind_gust, precip_bucket, submitted_at",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(station_id)
    .bind(forecast_date)
    .bind(prediction.max_temp)
    .bind(prediction.min_temp)
    .bind(prediction.wind_gust)
    .bind(prediction.precip_bucket)
    .fetch_one(pool)
    .await
}

/// A user's forecast for one date, if submitted.
pub async fn get_forecast_for_date(
    pool: &PgPool,
    user_id: Uuid,
    forecast_date: NaiveDate,
) -> Result<Option<Forecast>, sqlx::Error> {
    sqlx::query_as::<_, Forecast>(
        "SELECT id, user_id, station_id, forecast_date,
                max_temp, min_temp, wind_gust, precip_bucket, submitted_at
         FROM forecasts
         WHERE user_id = $1 AND forecast_date = $2",
    )
    .bind(user_id)
    .bind(forecast_date)
    .fetch_optional(pool)
    .await
}

/// A user's forecasts, newest first, with score columns where scored.
pub async fn list_user_forecasts(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ForecastWithScore>, sqlx::Error> {
    sqlx::query_as::<_, ForecastWithScore>(
        "SELECT f.id, f.forecast_date, f.station_id, st.name AS station_name,
                f.max_temp, f.min_temp, f.wind_gust, f.precip_bucket, f.submitted_at,
                sc.max_temp_score, sc.min_temp_score, sc.wind_gust_score,
                sc.precip_score, sc.perfect_bonus, sc.total_score
         FROM forecasts f
         JOIN stations st ON st.id = f.station_id
         LEFT JOIN scores sc ON sc.forecast_id = f.id
         WHERE f.user_id = $1
         ORDER BY f.forecast_date DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_user_forecasts(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM forecasts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// A user's scores, newest first, with the forecast and reading they compare.
pub async fn list_user_scores(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ScoreDetail>, sqlx::Error> {
    sqlx::query_as::<_, ScoreDetail>(
        "SELECT sc.id, sc.score_date, f.station_id, st.name AS station_name,
                f.max_temp, f.min_temp, f.wind_gust, f.precip_bucket AS forecast_precip_bucket,
                r.max_temp_rounded, r.min_temp_rounded, r.wind_gust_max, r.precip_total,
                r.precip_bucket AS reading_precip_bucket,
                sc.max_temp_score, sc.min_temp_score, sc.wind_gust_score,
                sc.precip_score, sc.perfect_bonus, sc.total_score
         FROM scores sc
         JOIN forecasts f ON f.id = sc.forecast_id
         JOIN station_readings r ON r.id = sc.reading_id
         JOIN stations st ON st.id = f.station_id
         WHERE sc.user_id = $1
         ORDER BY sc.score_date DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Count, sum, average and perfect count over one user's scores.
pub async fn user_score_summary(pool: &PgPool, user_id: Uuid) -> Result<ScoreSummary, sqlx::Error> {
    sqlx::query_as::<_, ScoreSummary>(
        "SELECT COUNT(*) AS total_scores,
                COALESCE(SUM(total_score), 0)::BIGINT AS total_points,
                AVG(total_score) AS average_score,
                COUNT(*) FILTER (WHERE perfect_bonus > 0) AS perfect_forecasts
         FROM scores
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Every score on one date, best first.
pub async fn scores_for_date(pool: &PgPool, date: NaiveDate) -> Result<Vec<DateScore>, sqlx::Error> {
    sqlx::query_as::<_, DateScore>(
        "SELECT u.username, f.max_temp, f.min_temp, f.wind_gust, f.precip_bucket,
                sc.max_temp_score, sc.min_temp_score, sc.wind_gust_score,
                sc.precip_score, sc.perfect_bonus, sc.total_score
         FROM scores sc
         JOIN users u ON u.id = sc.user_id
         JOIN forecasts f ON f.id = sc.forecast_id
         WHERE sc.score_date = $1
         ORDER BY sc.total_score DESC, u.username",
    )
    .bind(date)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// All-time ranking from the running totals.
pub async fn leaderboard_all_time(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardRow>(
        "SELECT id AS user_id, username, total_points
         FROM users
         ORDER BY total_points DESC, username
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Ranking over scores dated on or after `since`.
pub async fn leaderboard_since(
    pool: &PgPool,
    since: NaiveDate,
    limit: i64,
    offset: i64,
) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardRow>(
        "SELECT u.id AS user_id, u.username, SUM(sc.total_score)::BIGINT AS total_points
         FROM scores sc
         JOIN users u ON u.id = sc.user_id
         WHERE sc.score_date >= $1
         GROUP BY u.id, u.username
         ORDER BY total_points DESC, u.username
         LIMIT $2 OFFSET $3",
    )
    .bind(since)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Number of users ranked: everyone for all-time, scorers since `since` otherwise.
pub async fn count_ranked_users(
    pool: &PgPool,
    since: Option<NaiveDate>,
) -> Result<i64, sqlx::Error> {
    match since {
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
        }
        Some(since) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(DISTINCT user_id) FROM scores WHERE score_date >= $1",
            )
            .bind(since)
            .fetch_one(pool)
            .await
        }
    }
}

pub async fn competition_stats(pool: &PgPool) -> Result<CompetitionStats, sqlx::Error> {
    sqlx::query_as::<_, CompetitionStats>(
        "SELECT (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM forecasts) AS total_forecasts,
                COALESCE(SUM(total_score), 0)::BIGINT AS total_points,
                AVG(total_score) AS average_score,
                COUNT(*) FILTER (WHERE perfect_bonus > 0) AS perfect_forecasts
         FROM scores",
    )
    .fetch_one(pool)
    .await
}

/// Highest running total, if anyone has registered.
pub async fn top_scorer(pool: &PgPool) -> Result<Option<LeaderboardRow>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardRow>(
        "SELECT id AS user_id, username, total_points
         FROM users
         ORDER BY total_points DESC, username
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}
