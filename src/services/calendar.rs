//! Contest calendar: submission windows, week rotation and announcement time.
//!
//! Everything here runs in one fixed civil zone, Atlantic Standard Time
//! (UTC−4). Puerto Rico does not observe daylight saving time, so a
//! `FixedOffset` is exact and no DST transitions need handling.
//!
//! "Now" is always passed in (or read through an injected [`Clock`]) so the
//! window boundaries can be tested with fixed instants.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc, Weekday,
};

/// AST offset west of UTC, in seconds.
const AST_UTC_OFFSET_WEST_SECS: i32 = 4 * 3600;

/// Civil hour at which the submission window for tomorrow closes (exclusive).
pub const SUBMISSION_CLOSE_HOUR: u32 = 17;

/// Civil hour on Friday from which next week's station may be announced.
pub const ANNOUNCEMENT_HOUR: u32 = 18;

/// The contest's civil zone.
pub fn contest_offset() -> FixedOffset {
    FixedOffset::west_opt(AST_UTC_OFFSET_WEST_SECS).expect("UTC-4 is a valid fixed offset")
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The present moment expressed in the contest zone.
pub fn current_instant(clock: &dyn Clock) -> DateTime<FixedOffset> {
    to_contest_time(clock.now_utc())
}

/// Convert any UTC instant into contest civil time.
pub fn to_contest_time(dt: DateTime<Utc>) -> DateTime<FixedOffset> {
    dt.with_timezone(&contest_offset())
}

/// The instant at `hour:00:00` civil time on `date`.
pub fn civil_instant(date: NaiveDate, hour: u32) -> DateTime<FixedOffset> {
    let offset = contest_offset();
    let local = date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour));
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

/// The civil date currently accepting forecasts, if any.
///
/// Before 17:00 the active date is tomorrow. From 17:00 until midnight no
/// date is active. The window for date D is therefore `[00:00, 17:00)` on
/// D − 1.
pub fn active_forecast_date(now: DateTime<FixedOffset>) -> Option<NaiveDate> {
    if now.hour() < SUBMISSION_CLOSE_HOUR {
        now.date_naive().succ_opt()
    } else {
        None
    }
}

/// Whether a forecast for `target` may be submitted at `now`.
pub fn is_submission_open_for(now: DateTime<FixedOffset>, target: NaiveDate) -> bool {
    active_forecast_date(now) == Some(target)
}

/// State of the submission window at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionWindow {
    Open {
        forecast_date: NaiveDate,
        closes_at: DateTime<FixedOffset>,
        remaining_minutes: i64,
    },
    Closed {
        next_forecast_date: NaiveDate,
        opens_at: DateTime<FixedOffset>,
        minutes_until_open: i64,
    },
}

impl SubmissionWindow {
    pub fn is_open(&self) -> bool {
        matches!(self, SubmissionWindow::Open { .. })
    }
}

/// Describe the submission window as seen at `now`.
pub fn submission_window(now: DateTime<FixedOffset>) -> SubmissionWindow {
    let today = now.date_naive();
    match active_forecast_date(now) {
        Some(forecast_date) => {
            let closes_at = civil_instant(today, SUBMISSION_CLOSE_HOUR);
            SubmissionWindow::Open {
                forecast_date,
                closes_at,
                remaining_minutes: floor_minutes(closes_at - now),
            }
        }
        None => {
            let opens_at = civil_instant(today + Duration::days(1), 0);
            SubmissionWindow::Closed {
                next_forecast_date: today + Duration::days(2),
                opens_at,
                minutes_until_open: floor_minutes(opens_at - now),
            }
        }
    }
}

/// Whole minutes in a non-negative span, rounded down.
fn floor_minutes(span: Duration) -> i64 {
    span.num_seconds().max(0).div_euclid(60)
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Monday of the week containing `date`, at civil midnight.
pub fn week_start_instant(date: NaiveDate) -> DateTime<FixedOffset> {
    civil_instant(week_start(date), 0)
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Friday from 18:00 civil time onwards.
pub fn is_announcement_time(now: DateTime<FixedOffset>) -> bool {
    now.weekday() == Weekday::Fri && now.hour() >= ANNOUNCEMENT_HOUR
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a contest-zone instant from a civil date and time.
    fn ast(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        civil_instant(date, h) + Duration::minutes(i64::from(min)) + Duration::seconds(i64::from(s))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_civil_instant_is_utc_minus_four() {
        let t = civil_instant(date(2025, 8, 14), 17);
        assert_eq!(
            t.with_timezone(&Utc),
            "2025-08-14T21:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(t.hour(), 17);
        assert_eq!(t.offset().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_current_instant_reads_injected_clock() {
        let clock = FixedClock("2025-08-14T03:30:00Z".parse().unwrap());
        let now = current_instant(&clock);
        // 03:30 UTC is 23:30 the previous civil day
        assert_eq!(now.date_naive(), date(2025, 8, 13));
        assert_eq!(now.hour(), 23);
    }

    #[test]
    fn test_active_date_at_midnight() {
        let now = ast(2025, 8, 14, 0, 0, 0);
        assert_eq!(active_forecast_date(now), Some(date(2025, 8, 15)));
    }

    #[test]
    fn test_active_date_last_second_before_close() {
        let now = ast(2025, 8, 14, 16, 59, 59);
        assert_eq!(active_forecast_date(now), Some(date(2025, 8, 15)));
    }

    #[test]
    fn test_active_date_closed_at_exactly_five_pm() {
        let now = ast(2025, 8, 14, 17, 0, 0);
        assert_eq!(active_forecast_date(now), None);
    }

    #[test]
    fn test_active_date_closed_before_midnight() {
        let now = ast(2025, 8, 14, 23, 59, 59);
        assert_eq!(active_forecast_date(now), None);
    }

    #[test]
    fn test_active_date_crosses_month_end() {
        let now = ast(2025, 8, 31, 9, 0, 0);
        assert_eq!(active_forecast_date(now), Some(date(2025, 9, 1)));
    }

    #[test]
    fn test_is_submission_open_for_only_matches_tomorrow() {
        let now = ast(2025, 8, 14, 10, 0, 0);
        assert!(is_submission_open_for(now, date(2025, 8, 15)));
        assert!(!is_submission_open_for(now, date(2025, 8, 14)));
        assert!(!is_submission_open_for(now, date(2025, 8, 16)));
        assert!(!is_submission_open_for(
            ast(2025, 8, 14, 17, 0, 0),
            date(2025, 8, 15)
        ));
    }

    #[test]
    fn test_window_open_reports_close_and_remaining() {
        let now = ast(2025, 8, 14, 16, 29, 30);
        match submission_window(now) {
            SubmissionWindow::Open {
                forecast_date,
                closes_at,
                remaining_minutes,
            } => {
                assert_eq!(forecast_date, date(2025, 8, 15));
                assert_eq!(closes_at, ast(2025, 8, 14, 17, 0, 0));
                // 30m30s remaining, floored
                assert_eq!(remaining_minutes, 30);
            }
            other => panic!("Expected open window, got {:?}", other),
        }
    }

    #[test]
    fn test_window_open_at_midnight_has_full_seventeen_hours() {
        let now = ast(2025, 8, 14, 0, 0, 0);
        match submission_window(now) {
            SubmissionWindow::Open {
                remaining_minutes, ..
            } => assert_eq!(remaining_minutes, 17 * 60),
            other => panic!("Expected open window, got {:?}", other),
        }
    }

    #[test]
    fn test_window_closed_reports_next_opening() {
        let now = ast(2025, 8, 14, 17, 0, 0);
        match submission_window(now) {
            SubmissionWindow::Closed {
                next_forecast_date,
                opens_at,
                minutes_until_open,
            } => {
                assert_eq!(next_forecast_date, date(2025, 8, 16));
                assert_eq!(opens_at, ast(2025, 8, 15, 0, 0, 0));
                assert_eq!(minutes_until_open, 7 * 60);
            }
            other => panic!("Expected closed window, got {:?}", other),
        }
    }

    #[test]
    fn test_window_closed_last_second_floors_to_zero() {
        let now = ast(2025, 8, 14, 23, 59, 59);
        let window = submission_window(now);
        assert!(!window.is_open());
        if let SubmissionWindow::Closed {
            minutes_until_open, ..
        } = window
        {
            assert_eq!(minutes_until_open, 0);
        }
    }

    #[test]
    fn test_week_start_is_stable_within_week() {
        // 2025-08-11 is a Monday
        let monday = date(2025, 8, 11);
        for offset in 0..7 {
            let day = monday + Duration::days(offset);
            assert_eq!(week_start(day), monday, "day {}", day);
            assert_eq!(week_start_instant(day), ast(2025, 8, 11, 0, 0, 0));
        }
        assert_eq!(week_start(date(2025, 8, 18)), date(2025, 8, 18));
    }

    #[test]
    fn test_week_start_crosses_year_boundary() {
        // 2026-01-01 is a Thursday
        assert_eq!(week_start(date(2026, 1, 1)), date(2025, 12, 29));
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(date(2025, 8, 14)), date(2025, 8, 1));
        assert_eq!(month_start(date(2025, 8, 1)), date(2025, 8, 1));
    }

    #[test]
    fn test_announcement_time() {
        // 2025-08-15 is a Friday
        assert!(!is_announcement_time(ast(2025, 8, 15, 17, 59, 59)));
        assert!(is_announcement_time(ast(2025, 8, 15, 18, 0, 0)));
        assert!(is_announcement_time(ast(2025, 8, 15, 23, 59, 59)));
        // Thursday and Saturday evenings are not announcement time
        assert!(!is_announcement_time(ast(2025, 8, 14, 20, 0, 0)));
        assert!(!is_announcement_time(ast(2025, 8, 16, 20, 0, 0)));
    }
}
