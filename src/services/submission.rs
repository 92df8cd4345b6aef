//! Forecast submission: range checks, window check, station resolution,
//! then a single insert guarded by the (user, date) unique constraint.

use chrono::{DateTime, FixedOffset, NaiveDate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::Forecast;
use crate::db::queries;
use crate::errors::{AppError, ContestError};
use crate::services::calendar::{active_forecast_date, current_instant, Clock};
use crate::services::normalizer::{MAX_BUCKET, MIN_BUCKET};
use crate::services::schedule::{resolve_with_db, ScheduleOverrides};
use crate::services::scoring::Prediction;

pub const MAX_TEMP_RANGE: (i32, i32) = (50, 120);
pub const MIN_TEMP_RANGE: (i32, i32) = (40, 100);
pub const WIND_GUST_RANGE: (i32, i32) = (0, 200);

fn in_range(v: i32, (lo, hi): (i32, i32)) -> bool {
    (lo..=hi).contains(&v)
}

/// Check a prediction against the accepted input ranges.
pub fn validate_prediction(p: &Prediction) -> Result<(), AppError> {
    if !in_range(p.max_temp, MAX_TEMP_RANGE) {
        return Err(AppError::BadRequest(format!(
            "Max temperature must be between {}°F and {}°F",
            MAX_TEMP_RANGE.0, MAX_TEMP_RANGE.1
        )));
    }
    if !in_range(p.min_temp, MIN_TEMP_RANGE) {
        return Err(AppError::BadRequest(format!(
            "Min temperature must be between {}°F and {}°F",
            MIN_TEMP_RANGE.0, MIN_TEMP_RANGE.1
        )));
    }
    if !in_range(p.wind_gust, WIND_GUST_RANGE) {
        return Err(AppError::BadRequest(format!(
            "Wind gust must be between {} and {} mph",
            WIND_GUST_RANGE.0, WIND_GUST_RANGE.1
        )));
    }
    if !in_range(p.precip_bucket, (MIN_BUCKET, MAX_BUCKET)) {
        return Err(AppError::BadRequest(format!(
            "Precipitation range must be between {} and {}",
            MIN_BUCKET, MAX_BUCKET
        )));
    }
    if p.min_temp >= p.max_temp {
        return Err(AppError::BadRequest(
            "Minimum temperature must be less than maximum temperature".to_string(),
        ));
    }
    Ok(())
}

/// The date a submission at `now` is for.
///
/// `requested` is the client's idea of the target date, if it sent one; a
/// mismatch means the client's window has already rolled over.
pub fn target_date(
    now: DateTime<FixedOffset>,
    requested: Option<NaiveDate>,
) -> Result<NaiveDate, ContestError> {
    let active = active_forecast_date(now).ok_or(ContestError::SubmissionClosed)?;
    match requested {
        Some(date) if date != active => Err(ContestError::SubmissionClosed),
        _ => Ok(active),
    }
}

/// Submit a forecast for the currently open date.
pub async fn submit_forecast(
    pool: &PgPool,
    clock: &dyn Clock,
    overrides: &ScheduleOverrides,
    user_id: Uuid,
    requested_date: Option<NaiveDate>,
    prediction: Prediction,
) -> Result<Forecast, AppError> {
    validate_prediction(&prediction)?;

    if queries::get_user(pool, user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let now = current_instant(clock);
    let forecast_date = target_date(now, requested_date)?;

    let station = resolve_with_db(pool, overrides, forecast_date).await?;

    match queries::insert_forecast(pool, user_id, &station.station_id, forecast_date, &prediction).await {
        Ok(forecast) => {
            tracing::info!(
                "User {} submitted forecast for {} at {}",
                user_id,
                forecast_date,
                station.station_id
            );
            Ok(forecast)
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(ContestError::DuplicateForecast {
                user_id,
                date: forecast_date,
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::calendar::civil_instant;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn prediction(max: i32, min: i32, gust: i32, bucket: i32) -> Prediction {
        Prediction {
            max_temp: max,
            min_temp: min,
            wind_gust: gust,
            precip_bucket: bucket,
        }
    }

    #[test]
    fn test_valid_prediction() {
        assert!(validate_prediction(&prediction(87, 73, 15, 2)).is_ok());
        assert!(validate_prediction(&prediction(120, 40, 0, 7)).is_ok());
        assert!(validate_prediction(&prediction(50, 40, 200, 1)).is_ok());
    }

    #[test]
    fn test_out_of_range_fields() {
        for p in [
            prediction(121, 73, 15, 2),
            prediction(49, 45, 15, 2),
            prediction(87, 39, 15, 2),
            prediction(110, 101, 15, 2),
            prediction(87, 73, -1, 2),
            prediction(87, 73, 201, 2),
            prediction(87, 73, 15, 0),
            prediction(87, 73, 15, 8),
        ] {
            assert!(
                matches!(validate_prediction(&p), Err(AppError::BadRequest(_))),
                "{:?}",
                p
            );
        }
    }

    #[test]
    fn test_min_must_be_below_max() {
        let err = validate_prediction(&prediction(80, 80, 10, 1)).unwrap_err();
        assert!(err.to_string().contains("less than maximum"));
    }

    #[test]
    fn test_target_date_open_window() {
        let now = civil_instant(date(2025, 8, 14), 10);
        assert_eq!(target_date(now, None), Ok(date(2025, 8, 15)));
        assert_eq!(
            target_date(now, Some(date(2025, 8, 15))),
            Ok(date(2025, 8, 15))
        );
    }

    #[test]
    fn test_target_date_closed_window() {
        let now = civil_instant(date(2025, 8, 14), 17);
        assert_eq!(target_date(now, None), Err(ContestError::SubmissionClosed));
    }

    #[test]
    fn test_target_date_stale_request() {
        let now = civil_instant(date(2025, 8, 15), 9);
        assert_eq!(
            target_date(now, Some(date(2025, 8, 15))),
            Err(ContestError::SubmissionClosed)
        );
    }
}
