pub mod admin;
pub mod forecasts;
pub mod health;
pub mod leaderboard;
pub mod scores;
pub mod stations;
pub mod users;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::services::calendar::Clock;
use crate::services::normalizer::BucketRule;
use crate::services::schedule::ScheduleOverrides;

/// Default and maximum page size for list endpoints.
const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub clock: Arc<dyn Clock>,
    pub overrides: Arc<ScheduleOverrides>,
    pub bucket_rule: BucketRule,
    /// Shared secret for admin routes; admin routes are closed when unset.
    pub cron_secret: Option<String>,
    /// Directory scanned by the reading import.
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page size (default 50, max 100)
    pub limit: Option<i64>,
    /// Rows to skip (default 0)
    pub offset: Option<i64>,
}

impl PageQuery {
    /// `(limit, offset)` clamped to sane values.
    pub fn resolve(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64, returned: usize) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset + (returned as i64) < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let q = PageQuery {
            limit: None,
            offset: None,
        };
        assert_eq!(q.resolve(), (50, 0));
    }

    #[test]
    fn test_page_clamped() {
        let q = PageQuery {
            limit: Some(1000),
            offset: Some(-5),
        };
        assert_eq!(q.resolve(), (100, 0));
        let q = PageQuery {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(q.resolve(), (1, 20));
    }

    #[test]
    fn test_has_more() {
        assert!(Pagination::new(120, 50, 0, 50).has_more);
        assert!(!Pagination::new(120, 50, 100, 20).has_more);
        assert!(!Pagination::new(0, 50, 0, 0).has_more);
    }
}
