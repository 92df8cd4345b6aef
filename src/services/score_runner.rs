//! Batch scoring: match each station reading with the forecasts made for
//! that station-day and record a score for every forecast not yet scored.
//!
//! Safe to re-run at any time. A forecast is scored at most once (checked
//! up front and enforced again by the ledger's unique insert), and one bad
//! record never stops the rest of the run.

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{Forecast, StationReading};
use crate::errors::{AppError, ContestError};
use crate::services::scoring::{self, Observation, ScoreResult};
use crate::services::store::{NewScore, ScoreLedger};

/// Outcome counts for a scoring run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScoringTally {
    /// Forecasts scored in this run
    pub calculated: u32,
    /// Forecasts that already had a score
    pub skipped: u32,
    /// Forecasts (or readings) that could not be processed
    pub errors: u32,
}

impl ScoringTally {
    fn merge(&mut self, other: ScoringTally) {
        self.calculated += other.calculated;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// Score every forecast for every reading on `date`.
pub async fn score_date<S: ScoreLedger>(store: &S, date: NaiveDate) -> Result<ScoringTally, AppError> {
    let readings = store.readings_on(date).await?;
    if readings.is_empty() {
        tracing::info!("No readings for {}, nothing to score", date);
        return Ok(ScoringTally::default());
    }

    let mut tally = ScoringTally::default();
    for reading in &readings {
        score_reading(store, reading, &mut tally).await;
    }

    tracing::info!(
        "Scoring for {}: {} calculated, {} skipped, {} errors",
        date,
        tally.calculated,
        tally.skipped,
        tally.errors
    );
    Ok(tally)
}

/// Score every date that still has unscored forecasts.
pub async fn score_all_pending<S: ScoreLedger>(store: &S) -> Result<ScoringTally, AppError> {
    let dates = store.pending_score_dates().await?;
    tracing::info!("{} date(s) with pending scores", dates.len());

    let mut tally = ScoringTally::default();
    for date in dates {
        match score_date(store, date).await {
            Ok(t) => tally.merge(t),
            Err(e) => {
                tracing::error!("Scoring run for {} failed: {}", date, e);
                tally.errors += 1;
            }
        }
    }
    Ok(tally)
}

async fn score_reading<S: ScoreLedger>(store: &S, reading: &StationReading, tally: &mut ScoringTally) {
    let forecasts = match store
        .forecasts_for(&reading.station_id, reading.reading_date)
        .await
    {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(
                "Failed to load forecasts for {} on {}: {}",
                reading.station_id,
                reading.reading_date,
                e
            );
            tally.errors += 1;
            return;
        }
    };

    let observation = reading.observation();
    for forecast in &forecasts {
        match score_forecast(store, forecast, reading, &observation).await {
            Ok(result) => {
                tracing::debug!(
                    "Scored forecast {} for user {}: {} points",
                    forecast.id,
                    forecast.user_id,
                    result.total_score
                );
                tally.calculated += 1;
            }
            Err(AppError::Contest(ContestError::AlreadyScored(_))) => tally.skipped += 1,
            Err(e) => {
                tracing::warn!("Failed to score forecast {}: {}", forecast.id, e);
                tally.errors += 1;
            }
        }
    }
}

async fn score_forecast<S: ScoreLedger>(
    store: &S,
    forecast: &Forecast,
    reading: &StationReading,
    observation: &Observation,
) -> Result<ScoreResult, AppError> {
    if store.score_exists(forecast.id).await? {
        return Err(ContestError::AlreadyScored(forecast.id).into());
    }

    let result = scoring::score(&forecast.prediction(), observation);
    let recorded = store
        .record_score(&NewScore {
            user_id: forecast.user_id,
            forecast_id: forecast.id,
            reading_id: reading.id,
            score_date: reading.reading_date,
            result,
        })
        .await?;

    // Lost a race with a concurrent run between the check and the insert.
    if !recorded {
        return Err(ContestError::AlreadyScored(forecast.id).into());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::normalizer::{normalize, BucketRule, RawReading};
    use crate::services::reconcile::reconcile_totals;
    use crate::services::store::memory::MemoryStore;
    use crate::services::store::{NewReading, ReadingStore};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Reading of 85.4 / 72.6 / gust 12 / 0.05" precip (rounds to 85 / 73 / bucket 1).
    async fn seed_reading(store: &MemoryStore, station: &str, on: NaiveDate) {
        let raw = RawReading {
            max_temp: 85.4,
            min_temp: 72.6,
            max_gust: 12.0,
            sum_prec: 0.05,
        };
        store
            .insert_reading(&NewReading {
                station_id: station.to_string(),
                reading_date: on,
                values: normalize(&raw, BucketRule::UpperInclusive).unwrap(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scores_matching_forecasts() {
        let store = MemoryStore::with_stations(&["ICAYEY43"]);
        let d = date(2025, 8, 15);
        seed_reading(&store, "ICAYEY43", d).await;
        let alice = store.add_user("alice");
        let bob = store.add_user("bob");
        store.add_forecast(alice, "ICAYEY43", d, [86, 73, 15, 2]);
        store.add_forecast(bob, "ICAYEY43", d, [85, 73, 12, 1]);

        let tally = score_date(&store, d).await.unwrap();

        assert_eq!(
            tally,
            ScoringTally {
                calculated: 2,
                skipped: 0,
                errors: 0
            }
        );
        assert_eq!(store.total_of(alice), 16);
        assert_eq!(store.total_of(bob), 25);
    }

    #[tokio::test]
    async fn test_forecasts_for_other_station_or_date_are_ignored() {
        let store = MemoryStore::with_stations(&["ICAYEY43", "IAGUAD73"]);
        let d = date(2025, 8, 15);
        seed_reading(&store, "ICAYEY43", d).await;
        let alice = store.add_user("alice");
        store.add_forecast(alice, "IAGUAD73", d, [85, 73, 12, 1]);
        store.add_forecast(alice, "ICAYEY43", date(2025, 8, 16), [85, 73, 12, 1]);

        let tally = score_date(&store, d).await.unwrap();
        assert_eq!(tally.calculated, 0);
        assert_eq!(store.score_count(), 0);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let store = MemoryStore::with_stations(&["ICAYEY43"]);
        let d = date(2025, 8, 15);
        seed_reading(&store, "ICAYEY43", d).await;
        let alice = store.add_user("alice");
        store.add_forecast(alice, "ICAYEY43", d, [86, 73, 15, 2]);

        score_date(&store, d).await.unwrap();
        let second = score_date(&store, d).await.unwrap();

        assert_eq!(second.calculated, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(store.score_count(), 1);
        assert_eq!(store.total_of(alice), 16);

        let report = reconcile_totals(&store, false).await.unwrap();
        assert!(report.drifted.is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_run() {
        let store = MemoryStore::with_stations(&["ICAYEY43"]);
        let d = date(2025, 8, 15);
        seed_reading(&store, "ICAYEY43", d).await;
        let alice = store.add_user("alice");
        let bob = store.add_user("bob");
        let broken = store.add_forecast(alice, "ICAYEY43", d, [87, 73, 15, 2]);
        store.add_forecast(bob, "ICAYEY43", d, [85, 73, 12, 1]);
        store.lock().failing_forecasts.insert(broken);

        let tally = score_date(&store, d).await.unwrap();

        assert_eq!(tally.calculated, 1);
        assert_eq!(tally.errors, 1);
        assert_eq!(store.total_of(alice), 0);
        assert_eq!(store.total_of(bob), 25);
    }

    #[tokio::test]
    async fn test_no_readings_scores_nothing() {
        let store = MemoryStore::with_stations(&["ICAYEY43"]);
        let alice = store.add_user("alice");
        store.add_forecast(alice, "ICAYEY43", date(2025, 8, 15), [85, 73, 12, 1]);

        let tally = score_date(&store, date(2025, 8, 15)).await.unwrap();
        assert_eq!(tally, ScoringTally::default());
    }

    #[tokio::test]
    async fn test_score_all_pending_walks_every_date() {
        let store = MemoryStore::with_stations(&["ICAYEY43"]);
        let alice = store.add_user("alice");
        for day in [14, 15] {
            let d = date(2025, 8, day);
            seed_reading(&store, "ICAYEY43", d).await;
            store.add_forecast(alice, "ICAYEY43", d, [85, 73, 12, 1]);
        }

        let tally = score_all_pending(&store).await.unwrap();
        assert_eq!(tally.calculated, 2);
        assert_eq!(store.total_of(alice), 50);

        assert!(store.pending_score_dates().await.unwrap().is_empty());
        let again = score_all_pending(&store).await.unwrap();
        assert_eq!(again, ScoringTally::default());
    }

    #[test]
    fn test_tally_merge() {
        let mut a = ScoringTally {
            calculated: 1,
            skipped: 2,
            errors: 0,
        };
        a.merge(ScoringTally {
            calculated: 3,
            skipped: 0,
            errors: 1,
        });
        assert_eq!(
            a,
            ScoringTally {
                calculated: 4,
                skipped: 2,
                errors: 1
            }
        );
    }
}
