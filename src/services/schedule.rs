//! Station rotation: which station is active for a given civil date.
//!
//! Lookups go through an ordered list of [`ScheduleSource`]s in two tiers.
//! The exact-date tier is tried against every source first, then the
//! week-start tier. The first hit wins. In the service, the overrides file
//! comes before the database, so a date-keyed override beats the weekly
//! rotation and a config week beats a database week.

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::db::models::WeeklySchedule;
use crate::db::queries;
use crate::errors::{AppError, ContestError};
use crate::services::calendar::week_start;

/// Something that can answer "which station" for a date or a week.
pub trait ScheduleSource: Send + Sync {
    /// Station pinned to exactly this civil date.
    fn station_on(&self, date: NaiveDate) -> Option<&str>;
    /// Station scheduled for the week starting on this Monday.
    fn station_for_week(&self, week_start: NaiveDate) -> Option<&str>;
}

/// Which tier resolved a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMatch {
    ExactDate,
    WeekStart,
}

/// A resolved station for a target date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStation {
    pub station_id: String,
    pub matched: ScheduleMatch,
}

/// Ordered, two-tier station lookup.
pub struct StationResolver<'a> {
    sources: Vec<&'a dyn ScheduleSource>,
}

impl<'a> StationResolver<'a> {
    pub fn new(sources: Vec<&'a dyn ScheduleSource>) -> Self {
        Self { sources }
    }

    pub fn resolve(&self, date: NaiveDate) -> Result<ResolvedStation, ContestError> {
        let hit = |station: &str, matched| ResolvedStation {
            station_id: station.to_string(),
            matched,
        };

        if let Some(station) = self.sources.iter().find_map(|s| s.station_on(date)) {
            return Ok(hit(station, ScheduleMatch::ExactDate));
        }

        let monday = week_start(date);
        if let Some(station) = self
            .sources
            .iter()
            .find_map(|s| s.station_for_week(monday))
        {
            return Ok(hit(station, ScheduleMatch::WeekStart));
        }

        Err(ContestError::NoStationScheduled(date))
    }
}

// ---------------------------------------------------------------------------
// Overrides file
// ---------------------------------------------------------------------------

/// Errors loading the schedule overrides file.
#[derive(Debug, Error)]
pub enum ScheduleConfigError {
    #[error("IO error reading schedule overrides: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid schedule overrides TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Week entry {0} does not start on a Monday")]
    NotMonday(NaiveDate),
    #[error("Duplicate entry for {0}")]
    Duplicate(NaiveDate),
}

#[derive(Debug, Deserialize)]
struct OverridesFile {
    #[serde(default, rename = "date")]
    dates: Vec<DateEntry>,
    #[serde(default, rename = "week")]
    weeks: Vec<WeekEntry>,
}

#[derive(Debug, Deserialize)]
struct DateEntry {
    date: NaiveDate,
    station: String,
}

#[derive(Debug, Deserialize)]
struct WeekEntry {
    week_start: NaiveDate,
    station: String,
}

/// Station assignments from the operator's overrides file.
///
/// ```toml
/// [[date]]
/// date = "2025-08-14"
/// station = "ICAYEY43"
///
/// [[week]]
/// week_start = "2025-08-18"
/// station = "IAGUAD73"
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScheduleOverrides {
    by_date: HashMap<NaiveDate, String>,
    by_week: HashMap<NaiveDate, String>,
}

impl ScheduleOverrides {
    pub fn from_toml(content: &str) -> Result<Self, ScheduleConfigError> {
        let file: OverridesFile = toml::from_str(content)?;
        let mut overrides = Self::default();

        for entry in file.dates {
            if overrides
                .by_date
                .insert(entry.date, entry.station)
                .is_some()
            {
                return Err(ScheduleConfigError::Duplicate(entry.date));
            }
        }
        for entry in file.weeks {
            if week_start(entry.week_start) != entry.week_start {
                return Err(ScheduleConfigError::NotMonday(entry.week_start));
            }
            if overrides
                .by_week
                .insert(entry.week_start, entry.station)
                .is_some()
            {
                return Err(ScheduleConfigError::Duplicate(entry.week_start));
            }
        }
        Ok(overrides)
    }

    pub fn load(path: &Path) -> Result<Self, ScheduleConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn len(&self) -> usize {
        self.by_date.len() + self.by_week.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScheduleSource for ScheduleOverrides {
    fn station_on(&self, date: NaiveDate) -> Option<&str> {
        self.by_date.get(&date).map(String::as_str)
    }

    fn station_for_week(&self, week_start: NaiveDate) -> Option<&str> {
        self.by_week.get(&week_start).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Database weekly rotation
// ---------------------------------------------------------------------------

/// Snapshot of `weekly_schedules` rows. Only answers week lookups.
#[derive(Debug, Clone, Default)]
pub struct WeeklyTable {
    by_week: HashMap<NaiveDate, String>,
}

impl WeeklyTable {
    pub fn from_rows(rows: &[WeeklySchedule]) -> Self {
        Self {
            by_week: rows
                .iter()
                .map(|r| (r.week_start, r.station_id.clone()))
                .collect(),
        }
    }
}

impl ScheduleSource for WeeklyTable {
    fn station_on(&self, _date: NaiveDate) -> Option<&str> {
        None
    }

    fn station_for_week(&self, week_start: NaiveDate) -> Option<&str> {
        self.by_week.get(&week_start).map(String::as_str)
    }
}

/// Resolve `date` against the overrides file first, then the database
/// rotation for that week.
pub async fn resolve_with_db(
    pool: &PgPool,
    overrides: &ScheduleOverrides,
    date: NaiveDate,
) -> Result<ResolvedStation, AppError> {
    let rows = queries::get_weekly_schedules(pool, &[week_start(date)]).await?;
    let table = WeeklyTable::from_rows(&rows);
    let sources: Vec<&dyn ScheduleSource> = vec![overrides, &table];
    Ok(StationResolver::new(sources).resolve(date)?)
}
