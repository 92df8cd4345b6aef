//! Forecast HTTP endpoints.
//!
//! - GET /api/v1/forecasts/status
//! - POST /api/v1/forecasts

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::AppState;
use crate::db::models;
use crate::errors::{AppError, ErrorResponse};
use crate::services::calendar::{current_instant, submission_window, SubmissionWindow};
use crate::services::normalizer::{BucketDescription, BUCKET_DESCRIPTIONS};
use crate::services::scoring::Prediction;
use crate::services::submission::submit_forecast;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitForecastRequest {
    /// Submitting user
    pub user_id: Uuid,
    /// Date the client believes it is forecasting (YYYY-MM-DD). Optional;
    /// rejected if the window has moved on.
    pub forecast_date: Option<String>,
    /// Predicted high, whole °F (50–120)
    pub max_temp: i32,
    /// Predicted low, whole °F (40–100, below the high)
    pub min_temp: i32,
    /// Predicted peak gust, whole mph (0–200)
    pub wind_gust: i32,
    /// Predicted precipitation bucket (1–7)
    pub precip_bucket: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub station_id: String,
    /// Target date (YYYY-MM-DD)
    pub forecast_date: String,
    pub max_temp: i32,
    pub min_temp: i32,
    pub wind_gust: i32,
    pub precip_bucket: i32,
    /// Submission instant, RFC 3339
    pub submitted_at: String,
}

impl From<models::Forecast> for ForecastResponse {
    fn from(f: models::Forecast) -> Self {
        Self {
            id: f.id,
            user_id: f.user_id,
            station_id: f.station_id,
            forecast_date: f.forecast_date.to_string(),
            max_temp: f.max_temp,
            min_temp: f.min_temp,
            wind_gust: f.wind_gust,
            precip_bucket: f.precip_bucket,
            submitted_at: f.submitted_at.to_rfc3339(),
        }
    }
}

/// Submission window as seen right now.
///
/// When open, `forecast_date`, `closes_at` and `remaining_minutes` are set.
/// When closed, `next_forecast_date`, `opens_at` and `minutes_until_open`
/// are set instead.
#[derive(Debug, Serialize, ToSchema)]
pub struct WindowResponse {
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_forecast_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opens_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_until_open: Option<i64>,
}

impl From<SubmissionWindow> for WindowResponse {
    fn from(w: SubmissionWindow) -> Self {
        match w {
            SubmissionWindow::Open {
                forecast_date,
                closes_at,
                remaining_minutes,
            } => Self {
                is_open: true,
                forecast_date: Some(forecast_date.to_string()),
                closes_at: Some(closes_at.to_rfc3339()),
                remaining_minutes: Some(remaining_minutes),
                next_forecast_date: None,
                opens_at: None,
                minutes_until_open: None,
            },
            SubmissionWindow::Closed {
                next_forecast_date,
                opens_at,
                minutes_until_open,
            } => Self {
                is_open: false,
                forecast_date: None,
                closes_at: None,
                remaining_minutes: None,
                next_forecast_date: Some(next_forecast_date.to_string()),
                opens_at: Some(opens_at.to_rfc3339()),
                minutes_until_open: Some(minutes_until_open),
            },
        }
    }
}

/// One row of the precipitation bucket table shown on the forecast form.
#[derive(Debug, Serialize, ToSchema)]
pub struct BucketResponse {
    pub value: i32,
    /// Lower bound in inches
    pub min: f64,
    /// Upper bound in inches; absent for the open-ended top bucket
    pub max: Option<f64>,
    /// Display label
    pub label: String,
}

impl From<&BucketDescription> for BucketResponse {
    fn from(b: &BucketDescription) -> Self {
        Self {
            value: b.value,
            min: b.min,
            max: b.max,
            label: b.label.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastStatusResponse {
    pub window: WindowResponse,
    pub precip_buckets: Vec<BucketResponse>,
    /// Boundary convention used to bucket readings
    pub bucket_rule: String,
    /// Current contest time (AST), RFC 3339
    pub current_time: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Submission window status and the precipitation bucket table.
#[utoipa::path(
    get,
    path = "/api/v1/forecasts/status",
    tag = "Forecasts",
    responses(
        (status = 200, description = "Current submission window", body = ForecastStatusResponse),
    )
)]
pub async fn forecast_status(State(state): State<AppState>) -> Json<ForecastStatusResponse> {
    let now = current_instant(state.clock.as_ref());
    Json(ForecastStatusResponse {
        window: submission_window(now).into(),
        precip_buckets: BUCKET_DESCRIPTIONS.iter().map(BucketResponse::from).collect(),
        bucket_rule: state.bucket_rule.as_str().to_string(),
        current_time: now.to_rfc3339(),
    })
}

/// Submit a forecast for the date currently open.
#[utoipa::path(
    post,
    path = "/api/v1/forecasts",
    tag = "Forecasts",
    request_body = SubmitForecastRequest,
    responses(
        (status = 201, description = "Forecast recorded", body = ForecastResponse),
        (status = 400, description = "Invalid values or submission window closed", body = ErrorResponse),
        (status = 404, description = "Unknown user or no station scheduled", body = ErrorResponse),
        (status = 409, description = "Already submitted for this date", body = ErrorResponse),
    )
)]
pub async fn create_forecast(
    State(state): State<AppState>,
    Json(req): Json<SubmitForecastRequest>,
) -> Result<(StatusCode, Json<ForecastResponse>), AppError> {
    let requested_date = req
        .forecast_date
        .as_deref()
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| AppError::BadRequest(format!("Invalid forecast_date: {}", e)))?;

    let prediction = Prediction {
        max_temp: req.max_temp,
        min_temp: req.min_temp,
        wind_gust: req.wind_gust,
        precip_bucket: req.precip_bucket,
    };

    let forecast = submit_forecast(
        &state.pool,
        state.clock.as_ref(),
        &state.overrides,
        req.user_id,
        requested_date,
        prediction,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(forecast.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::calendar::civil_instant;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_open_window_response() {
        let w: WindowResponse = submission_window(civil_instant(date(2025, 8, 14), 9)).into();
        assert!(w.is_open);
        assert_eq!(w.forecast_date.as_deref(), Some("2025-08-15"));
        assert_eq!(w.remaining_minutes, Some(8 * 60));
        assert!(w.opens_at.is_none());
    }

    #[test]
    fn test_closed_window_response_serializes_only_closed_fields() {
        let w: WindowResponse = submission_window(civil_instant(date(2025, 8, 14), 18)).into();
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["is_open"], false);
        assert_eq!(json["next_forecast_date"], "2025-08-16");
        assert_eq!(json["minutes_until_open"], 6 * 60);
        assert!(json.get("closes_at").is_none());
    }

    #[test]
    fn test_bucket_table_response() {
        let rows: Vec<BucketResponse> = BUCKET_DESCRIPTIONS.iter().map(BucketResponse::from).collect();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].label, "0.00\" - 0.10\"");
        assert!(rows[6].max.is_none());
    }
}
