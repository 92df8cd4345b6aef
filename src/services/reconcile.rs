//! Running-total reconciliation.
//!
//! `users.total_points` is maintained incrementally as scores are recorded.
//! The scores themselves are the source of truth: this pass recomputes each
//! user's total from them and reports any divergence. Stored totals are only
//! rewritten when a repair is explicitly requested.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::store::ScoreLedger;

/// A user whose stored total disagrees with their scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TotalDrift {
    pub user_id: Uuid,
    pub username: String,
    /// Running total as stored on the user
    pub stored_total: i64,
    /// Sum of the user's score rows
    pub scored_total: i64,
}

impl TotalDrift {
    pub fn difference(&self) -> i64 {
        self.stored_total - self.scored_total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub users_checked: u32,
    pub drifted: Vec<TotalDrift>,
    /// Whether drifted totals were rewritten in this pass
    pub repaired: bool,
}

pub async fn reconcile_totals<S: ScoreLedger>(
    store: &S,
    repair: bool,
) -> Result<ReconcileReport, AppError> {
    let totals = store.user_totals().await?;
    let users_checked = totals.len() as u32;

    let drifted: Vec<TotalDrift> = totals
        .into_iter()
        .filter(|t| t.stored_total != t.scored_total)
        .map(|t| TotalDrift {
            user_id: t.user_id,
            username: t.username,
            stored_total: t.stored_total,
            scored_total: t.scored_total,
        })
        .collect();

    for d in &drifted {
        tracing::error!(
            "Total drift for user '{}' ({}): stored {} but scores sum to {} ({:+})",
            d.username,
            d.user_id,
            d.stored_total,
            d.scored_total,
            d.difference()
        );
    }

    if repair {
        for d in &drifted {
            let total = store.recompute_total(d.user_id).await?;
            tracing::info!(
                "Repaired total for user '{}': {} → {}",
                d.username,
                d.stored_total,
                total
            );
        }
    }

    tracing::info!(
        "Reconciled {} user total(s), {} drifted{}",
        users_checked,
        drifted.len(),
        if repair && !drifted.is_empty() {
            ", repaired"
        } else {
            ""
        }
    );

    Ok(ReconcileReport {
        users_checked,
        repaired: repair && !drifted.is_empty(),
        drifted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scoring::ScoreResult;
    use crate::services::store::memory::MemoryStore;
    use crate::services::store::NewScore;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_consistent_totals_report_no_drift() {
        let store = MemoryStore::default();
        store.add_user("alice");
        store.add_user("bob");

        let report = reconcile_totals(&store, false).await.unwrap();
        assert_eq!(report.users_checked, 2);
        assert!(report.drifted.is_empty());
        assert!(!report.repaired);
    }

    #[tokio::test]
    async fn test_drift_is_reported_but_not_repaired_by_default() {
        let store = MemoryStore::default();
        let alice = store.add_user("alice");
        store.force_total(alice, 40);

        let report = reconcile_totals(&store, false).await.unwrap();
        assert_eq!(report.drifted.len(), 1);
        assert_eq!(report.drifted[0].difference(), 40);
        assert_eq!(store.total_of(alice), 40);
    }

    #[tokio::test]
    async fn test_repair_rewrites_and_is_idempotent() {
        let store = MemoryStore::default();
        let alice = store.add_user("alice");
        store.force_total(alice, 40);

        let first = reconcile_totals(&store, true).await.unwrap();
        assert!(first.repaired);
        assert_eq!(store.total_of(alice), 0);

        let second = reconcile_totals(&store, true).await.unwrap();
        assert!(second.drifted.is_empty());
        assert!(!second.repaired);
    }

    #[tokio::test]
    async fn test_repair_counts_scores_recorded_after_the_check() {
        let store = MemoryStore::default();
        let alice = store.add_user("alice");
        store.force_total(alice, 40);

        let snapshot = store.user_totals().await.unwrap();
        assert_eq!(snapshot[0].scored_total, 0);

        let recorded = store
            .record_score(&NewScore {
                user_id: alice,
                forecast_id: Uuid::new_v4(),
                reading_id: Uuid::new_v4(),
                score_date: NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(),
                result: ScoreResult {
                    max_temp_score: 5,
                    min_temp_score: 5,
                    wind_gust_score: 5,
                    precip_score: 5,
                    perfect_bonus: 5,
                    total_score: 25,
                },
            })
            .await
            .unwrap();
        assert!(recorded);

        assert_eq!(store.recompute_total(alice).await.unwrap(), 25);
        let report = reconcile_totals(&store, false).await.unwrap();
        assert!(report.drifted.is_empty());
    }

    #[test]
    fn test_empty_store() {
        let store = MemoryStore::default();
        let report = tokio_test::block_on(reconcile_totals(&store, true)).unwrap();
        assert_eq!(report.users_checked, 0);
        assert!(!report.repaired);
    }
}
