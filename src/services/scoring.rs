//! Forecast scoring.
//!
//! Pure and referentially transparent: the same prediction and observation
//! always produce the same [`ScoreResult`]. That property is what makes
//! deleting and re-scoring a forecast safe.

use serde::Serialize;
use utoipa::ToSchema;

/// Points for an exact hit on any axis.
pub const MAX_AXIS_SCORE: i32 = 5;

/// Bonus awarded when all four axes are exact.
pub const PERFECT_BONUS: i32 = 5;

/// Standard ladder: points for an absolute difference of 0, 1, 2, 3, 4.
/// Anything further off scores nothing.
const STANDARD_LADDER: [i32; 5] = [5, 4, 3, 2, 1];

/// Gust ladder: (largest difference in the band, points). Wider bands than
/// the standard ladder.
const GUST_LADDER: [(u32, i32); 5] = [(0, 5), (2, 4), (5, 3), (9, 2), (14, 1)];

/// A user's prediction for one station-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub max_temp: i32,
    pub min_temp: i32,
    pub wind_gust: i32,
    pub precip_bucket: i32,
}

/// The normalized actual conditions for one station-day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub max_temp_rounded: i32,
    pub min_temp_rounded: i32,
    /// Peak gust at full precision; rounded at comparison time.
    pub wind_gust_max: f64,
    pub precip_bucket: i32,
}

impl Observation {
    /// Gust rounded half away from zero, as compared against forecasts.
    pub fn wind_gust_rounded(&self) -> i32 {
        self.wind_gust_max.round() as i32
    }
}

/// Outcome of scoring one forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScoreResult {
    pub max_temp_score: i32,
    pub min_temp_score: i32,
    pub wind_gust_score: i32,
    pub precip_score: i32,
    /// 5 when every axis is exact, otherwise 0
    pub perfect_bonus: i32,
    /// Sum of the four axes and the bonus (0–25)
    pub total_score: i32,
}

impl ScoreResult {
    pub fn is_perfect(&self) -> bool {
        self.perfect_bonus == PERFECT_BONUS
    }
}

/// Standard ladder on an absolute difference.
pub fn ladder_score(diff: u32) -> i32 {
    STANDARD_LADDER.get(diff as usize).copied().unwrap_or(0)
}

pub fn max_temp_score(forecast: i32, actual_rounded: i32) -> i32 {
    ladder_score(forecast.abs_diff(actual_rounded))
}

pub fn min_temp_score(forecast: i32, actual_rounded: i32) -> i32 {
    ladder_score(forecast.abs_diff(actual_rounded))
}

/// Precip is scored on bucket distance, not inches.
pub fn precip_score(forecast_bucket: i32, actual_bucket: i32) -> i32 {
    ladder_score(forecast_bucket.abs_diff(actual_bucket))
}

/// Gust ladder on the difference to the rounded actual gust.
pub fn wind_gust_score(forecast: i32, actual_gust: f64) -> i32 {
    let diff = forecast.abs_diff(actual_gust.round() as i32);
    GUST_LADDER
        .iter()
        .find(|(band_max, _)| diff <= *band_max)
        .map_or(0, |(_, points)| *points)
}

/// Score a prediction against the observation for the same station and date.
///
/// The caller guarantees the station/date match; it is not re-checked here.
pub fn score(prediction: &Prediction, observation: &Observation) -> ScoreResult {
    let max_temp_score = max_temp_score(prediction.max_temp, observation.max_temp_rounded);
    let min_temp_score = min_temp_score(prediction.min_temp, observation.min_temp_rounded);
    let wind_gust_score = wind_gust_score(prediction.wind_gust, observation.wind_gust_max);
    let precip_score = precip_score(prediction.precip_bucket, observation.precip_bucket);

    let all_exact = [max_temp_score, min_temp_score, wind_gust_score, precip_score]
        .iter()
        .all(|&s| s == MAX_AXIS_SCORE);
    let perfect_bonus = if all_exact { PERFECT_BONUS } else { 0 };

    ScoreResult {
        max_temp_score,
        min_temp_score,
        wind_gust_score,
        precip_score,
        perfect_bonus,
        total_score: max_temp_score + min_temp_score + wind_gust_score + precip_score + perfect_bonus,
    }
}

/// One scored axis: what was forecast, what happened, how far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AxisBreakdown {
    pub forecast: i32,
    pub actual: i32,
    pub diff: u32,
    pub score: i32,
}

/// Per-axis detail for display alongside a stored score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScoreBreakdown {
    pub max_temp: AxisBreakdown,
    pub min_temp: AxisBreakdown,
    /// `actual` is the rounded gust
    pub wind_gust: AxisBreakdown,
    /// `forecast`/`actual` are bucket numbers
    pub precip: AxisBreakdown,
}

/// Recompute the per-axis detail. Consistent with [`score`] by construction.
pub fn breakdown(prediction: &Prediction, observation: &Observation) -> ScoreBreakdown {
    let axis = |forecast: i32, actual: i32, score: i32| AxisBreakdown {
        forecast,
        actual,
        diff: forecast.abs_diff(actual),
        score,
    };
    let result = score(prediction, observation);
    ScoreBreakdown {
        max_temp: axis(
            prediction.max_temp,
            observation.max_temp_rounded,
            result.max_temp_score,
        ),
        min_temp: axis(
            prediction.min_temp,
            observation.min_temp_rounded,
            result.min_temp_score,
        ),
        wind_gust: axis(
            prediction.wind_gust,
            observation.wind_gust_rounded(),
            result.wind_gust_score,
        ),
        precip: axis(
            prediction.precip_bucket,
            observation.precip_bucket,
            result.precip_score,
        ),
    }
}
