//! Administrative endpoints, called by the scheduler or an operator.
//!
//! Every route requires the `X-Cron-Secret` header to match the configured
//! secret. With no secret configured the routes reject all requests.
//!
//! - POST /api/v1/admin/calculate-scores?date=YYYY-MM-DD
//! - POST /api/v1/admin/import-readings
//! - POST /api/v1/admin/readings/:station_id/:date/reimport
//! - POST /api/v1/admin/reconcile-totals?repair=true

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::services::normalizer::RawReading;
use crate::services::readings::{import_dir, reimport_reading, ImportTally};
use crate::services::reconcile::{reconcile_totals, ReconcileReport};
use crate::services::score_runner::{score_all_pending, score_date, ScoringTally};

pub const CRON_SECRET_HEADER: &str = "X-Cron-Secret";

/// Reject the request unless it carries the configured secret.
pub fn check_cron_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        tracing::warn!("Admin request rejected: CRON_SECRET is not configured");
        return Err(AppError::Unauthorized);
    };
    match headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(given) if given == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| AppError::BadRequest(format!("Invalid date '{}': {}", s, e)))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct CalculateScoresQuery {
    /// Only score this date (YYYY-MM-DD); every pending date when omitted
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReconcileQuery {
    /// Rewrite drifted totals (default false: report only)
    #[serde(default)]
    pub repair: bool,
}

/// Corrected raw record, in the station export format.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ReimportRequest {
    pub max_temp: f64,
    pub min_temp: f64,
    pub max_gust: f64,
    pub sum_prec: f64,
}

impl From<ReimportRequest> for RawReading {
    fn from(r: ReimportRequest) -> Self {
        RawReading {
            max_temp: r.max_temp,
            min_temp: r.min_temp,
            max_gust: r.max_gust,
            sum_prec: r.sum_prec,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReimportResponse {
    pub station_id: String,
    /// YYYY-MM-DD
    pub reading_date: String,
    pub max_temp_rounded: i32,
    pub min_temp_rounded: i32,
    pub precip_bucket: i32,
    /// Scores deleted because they used the old reading
    pub scores_removed: u64,
    /// Points taken back from user totals
    pub points_removed: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Score forecasts against stored readings.
#[utoipa::path(
    post,
    path = "/api/v1/admin/calculate-scores",
    tag = "Admin",
    params(
        CalculateScoresQuery,
        ("X-Cron-Secret" = String, Header, description = "Shared admin secret"),
    ),
    responses(
        (status = 200, description = "Scoring outcome counts", body = ScoringTally),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 401, description = "Missing or wrong secret", body = ErrorResponse),
    )
)]
pub async fn calculate_scores(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CalculateScoresQuery>,
) -> Result<Json<ScoringTally>, AppError> {
    check_cron_secret(&headers, state.cron_secret.as_deref())?;

    let tally = match params.date.as_deref() {
        Some(d) => score_date(&state.pool, parse_date(d)?).await?,
        None => score_all_pending(&state.pool).await?,
    };
    Ok(Json(tally))
}

/// Import every reading file in the data directory.
#[utoipa::path(
    post,
    path = "/api/v1/admin/import-readings",
    tag = "Admin",
    params(
        ("X-Cron-Secret" = String, Header, description = "Shared admin secret"),
    ),
    responses(
        (status = 200, description = "Import outcome counts", body = ImportTally),
        (status = 401, description = "Missing or wrong secret", body = ErrorResponse),
        (status = 500, description = "Data directory unreadable", body = ErrorResponse),
    )
)]
pub async fn import_readings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ImportTally>, AppError> {
    check_cron_secret(&headers, state.cron_secret.as_deref())?;
    let tally = import_dir(&state.pool, &state.data_dir, state.bucket_rule).await?;
    Ok(Json(tally))
}

/// Replace one station-day reading with a corrected record.
///
/// Scores computed from the old reading are removed and their points taken
/// back; run `calculate-scores` afterwards to rescore.
#[utoipa::path(
    post,
    path = "/api/v1/admin/readings/{station_id}/{date}/reimport",
    tag = "Admin",
    request_body = ReimportRequest,
    params(
        ("station_id" = String, Path, description = "Station identifier"),
        ("date" = String, Path, description = "Reading date (YYYY-MM-DD)"),
        ("X-Cron-Secret" = String, Header, description = "Shared admin secret"),
    ),
    responses(
        (status = 200, description = "Reading replaced", body = ReimportResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 401, description = "Missing or wrong secret", body = ErrorResponse),
        (status = 404, description = "Station not found", body = ErrorResponse),
        (status = 422, description = "Invalid reading values", body = ErrorResponse),
    )
)]
pub async fn reimport(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((station_id, date)): Path<(String, String)>,
    Json(req): Json<ReimportRequest>,
) -> Result<Json<ReimportResponse>, AppError> {
    check_cron_secret(&headers, state.cron_secret.as_deref())?;
    let date = parse_date(&date)?;
    let raw = RawReading::from(req);

    let replaced = reimport_reading(&state.pool, &station_id, date, &raw, state.bucket_rule).await?;

    Ok(Json(ReimportResponse {
        station_id: replaced.reading.station_id,
        reading_date: replaced.reading.reading_date.to_string(),
        max_temp_rounded: replaced.reading.max_temp_rounded,
        min_temp_rounded: replaced.reading.min_temp_rounded,
        precip_bucket: replaced.reading.precip_bucket,
        scores_removed: replaced.scores_removed,
        points_removed: replaced.points_removed,
    }))
}

/// Compare stored running totals with the sum of score rows.
#[utoipa::path(
    post,
    path = "/api/v1/admin/reconcile-totals",
    tag = "Admin",
    params(
        ReconcileQuery,
        ("X-Cron-Secret" = String, Header, description = "Shared admin secret"),
    ),
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileReport),
        (status = 401, description = "Missing or wrong secret", body = ErrorResponse),
    )
)]
pub async fn reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReconcileQuery>,
) -> Result<Json<ReconcileReport>, AppError> {
    check_cron_secret(&headers, state.cron_secret.as_deref())?;
    Ok(Json(reconcile_totals(&state.pool, params.repair).await?))
}
