//! Station reading import.
//!
//! Daily station exports are dropped into the data directory as
//! `STATIONID_YYYY-MM-DD.json`, each holding one raw record
//! (`MaxTemp`, `MinTemp`, `MaxGust`, `SumPrec`). Import normalizes them and
//! stores one reading per station-day. Existing readings are never
//! overwritten by a plain import; [`reimport_reading`] is the explicit
//! administrative override.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::normalizer::{normalize, BucketRule, RawReading};
use crate::services::store::{NewReading, ReadingStore, ReplacedReading};

/// Extract `(station_id, date)` from a reading file name.
///
/// The station id must be non-empty and made only of ASCII uppercase
/// letters and digits; the date must be a real calendar date written as
/// `YYYY-MM-DD`.
pub fn parse_reading_filename(name: &str) -> Option<(String, NaiveDate)> {
    let stem = name.strip_suffix(".json")?;
    let (station, date) = stem.split_once('_')?;

    let station_ok = !station.is_empty()
        && station
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    let date_shape_ok = date.len() == 10
        && date.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !station_ok || !date_shape_ok {
        return None;
    }

    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((station.to_string(), date))
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported,
    /// A reading for that station-day already exists.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportFailure {
    pub file: String,
    pub reason: String,
}

/// Outcome counts for a directory import.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportTally {
    pub imported: u32,
    pub skipped: u32,
    pub failed: u32,
    pub failures: Vec<ImportFailure>,
}

/// Import a single reading file.
pub async fn import_file<S: ReadingStore>(store: &S, path: &Path, rule: BucketRule) -> ImportOutcome {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Some((station_id, reading_date)) = parse_reading_filename(&file_name) else {
        return ImportOutcome::Failed("invalid filename".to_string());
    };

    match store.station_exists(&station_id).await {
        Ok(true) => {}
        Ok(false) => return ImportOutcome::Failed(format!("station {} not found", station_id)),
        Err(e) => return ImportOutcome::Failed(e.to_string()),
    }

    match store.reading_exists(&station_id, reading_date).await {
        Ok(false) => {}
        Ok(true) => return ImportOutcome::Skipped,
        Err(e) => return ImportOutcome::Failed(e.to_string()),
    }

    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => return ImportOutcome::Failed(format!("file read error: {}", e)),
    };

    let values = match RawReading::from_json(&content).and_then(|raw| normalize(&raw, rule)) {
        Ok(v) => v,
        Err(e) => return ImportOutcome::Failed(e.to_string()),
    };

    let reading = NewReading {
        station_id,
        reading_date,
        values,
    };
    match store.insert_reading(&reading).await {
        Ok(_) => ImportOutcome::Imported,
        Err(e) => ImportOutcome::Failed(e.to_string()),
    }
}

/// Import every `.json` file in `dir`, in file name order.
pub async fn import_dir<S: ReadingStore>(
    store: &S,
    dir: &Path,
    rule: BucketRule,
) -> Result<ImportTally, AppError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        AppError::InternalError(format!(
            "Failed to read data directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to list {}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        tracing::warn!("No reading files found in {}", dir.display());
    }

    let mut tally = ImportTally::default();
    for path in &paths {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match import_file(store, path, rule).await {
            ImportOutcome::Imported => {
                tracing::info!("Imported reading {}", file);
                tally.imported += 1;
            }
            ImportOutcome::Skipped => {
                tracing::debug!("Skipping {}: reading already exists", file);
                tally.skipped += 1;
            }
            ImportOutcome::Failed(reason) => {
                tracing::warn!("Failed to import {}: {}", file, reason);
                tally.failed += 1;
                tally.failures.push(ImportFailure { file, reason });
            }
        }
    }

    tracing::info!(
        "Reading import from {}: {} imported, {} skipped, {} failed",
        dir.display(),
        tally.imported,
        tally.skipped,
        tally.failed
    );
    Ok(tally)
}

/// Replace the reading for one station-day with a corrected raw record.
///
/// Scores computed from the old reading are deleted and their points taken
/// back from user totals, so the next scoring run recomputes them against
/// the new values.
pub async fn reimport_reading<S: ReadingStore>(
    store: &S,
    station_id: &str,
    reading_date: NaiveDate,
    raw: &RawReading,
    rule: BucketRule,
) -> Result<ReplacedReading, AppError> {
    if !store.station_exists(station_id).await? {
        return Err(AppError::NotFound(format!("Station {} not found", station_id)));
    }

    let values = normalize(raw, rule)?;
    let replaced = store
        .replace_reading(&NewReading {
            station_id: station_id.to_string(),
            reading_date,
            values,
        })
        .await?;

    tracing::info!(
        "Reimported reading for {} on {}: removed {} score(s), {} point(s)",
        station_id,
        reading_date,
        replaced.scores_removed,
        replaced.points_removed
    );
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::score_runner::score_date;
    use crate::services::store::memory::MemoryStore;
    use std::path::PathBuf;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Fresh scratch directory under the system temp dir.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("readings-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const GOOD: &str = r#"{"MaxTemp": 85.4, "MinTemp": 72.6, "MaxGust": 12.0, "SumPrec": 0.05}"#;

    #[test]
    fn test_parse_filename() {
        assert_eq!(
            parse_reading_filename("ICAYEY43_2025-08-15.json"),
            Some(("ICAYEY43".to_string(), date(2025, 8, 15)))
        );
    }

    #[test]
    fn test_parse_filename_rejects_bad_names() {
        for name in [
            "icayey43_2025-08-15.json",
            "ICAYEY43-2025-08-15.json",
            "ICAYEY43_2025-8-15.json",
            "ICAYEY43_2025-02-30.json",
            "ICAYEY43_2025-08-15.txt",
            "_2025-08-15.json",
            "ICAY_EY43_2025-08-15.json",
        ] {
            assert_eq!(parse_reading_filename(name), None, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_import_dir_tallies_outcomes() {
        let dir = scratch_dir("tally");
        std::fs::write(dir.join("ICAYEY43_2025-08-15.json"), GOOD).unwrap();
        std::fs::write(dir.join("ICAYEY43_2025-08-16.json"), r#"{"MaxTemp": 85.4}"#).unwrap();
        std::fs::write(dir.join("IUNKNOWN1_2025-08-15.json"), GOOD).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = MemoryStore::with_stations(&["ICAYEY43"]);
        let tally = import_dir(&store, &dir, BucketRule::UpperInclusive)
            .await
            .unwrap();

        assert_eq!(tally.imported, 1);
        assert_eq!(tally.skipped, 0);
        assert_eq!(tally.failed, 2);
        assert_eq!(tally.failures.len(), 2);

        let reading = store.lock().readings[0].clone();
        assert_eq!(reading.max_temp_rounded, 85);
        assert_eq!(reading.min_temp_rounded, 73);
        assert_eq!(reading.precip_bucket, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_import_skips_existing_reading() {
        let dir = scratch_dir("skip");
        std::fs::write(dir.join("ICAYEY43_2025-08-15.json"), GOOD).unwrap();
        let store = MemoryStore::with_stations(&["ICAYEY43"]);

        import_dir(&store, &dir, BucketRule::UpperInclusive)
            .await
            .unwrap();
        let second = import_dir(&store, &dir, BucketRule::UpperInclusive)
            .await
            .unwrap();

        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(store.lock().readings.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_import_dir_missing_directory() {
        let store = MemoryStore::default();
        let result = import_dir(
            &store,
            Path::new("/nonexistent/readings/dir"),
            BucketRule::UpperInclusive,
        )
        .await;
        assert!(matches!(result, Err(AppError::InternalError(_))));
    }

    #[tokio::test]
    async fn test_bucket_rule_is_applied_on_import() {
        let dir = scratch_dir("rule");
        std::fs::write(dir.join("ICAYEY43_2025-08-15.json"), GOOD).unwrap();
        let store = MemoryStore::with_stations(&["ICAYEY43"]);

        import_dir(&store, &dir, BucketRule::LowerInclusive)
            .await
            .unwrap();
        assert_eq!(store.lock().readings[0].precip_bucket, 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_reimport_removes_scores_and_points() {
        let store = MemoryStore::with_stations(&["ICAYEY43"]);
        let d = date(2025, 8, 15);
        let original = RawReading::from_json(GOOD).unwrap();
        reimport_reading(&store, "ICAYEY43", d, &original, BucketRule::UpperInclusive)
            .await
            .unwrap();

        let alice = store.add_user("alice");
        store.add_forecast(alice, "ICAYEY43", d, [85, 73, 12, 1]);
        score_date(&store, d).await.unwrap();
        assert_eq!(store.total_of(alice), 25);

        let corrected = RawReading {
            max_temp: 88.0,
            ..original
        };
        let replaced = reimport_reading(&store, "ICAYEY43", d, &corrected, BucketRule::UpperInclusive)
            .await
            .unwrap();

        assert_eq!(replaced.scores_removed, 1);
        assert_eq!(replaced.points_removed, 25);
        assert_eq!(replaced.reading.max_temp_rounded, 88);
        assert_eq!(store.total_of(alice), 0);
        assert_eq!(store.lock().readings.len(), 1);

        // Rescoring against the corrected reading: max temp off by 3
        let tally = score_date(&store, d).await.unwrap();
        assert_eq!(tally.calculated, 1);
        assert!(store.total_of(alice) < 25);
    }

    #[tokio::test]
    async fn test_reimport_unknown_station() {
        let store = MemoryStore::default();
        let raw = RawReading::from_json(GOOD).unwrap();
        let err = reimport_reading(
            &store,
            "IUNKNOWN1",
            date(2025, 8, 15),
            &raw,
            BucketRule::UpperInclusive,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
