//! Prize settlement.
//!
//! Settlement runs once per contest, after its match completes. The whole
//! contest is settled under its write lock inside a [`UnitOfWork`]: the
//! contest is finalized together with its settlement record only if every
//! prize credit succeeded. A contest left unfinalized by a failed credit
//! can be retried; credits already applied are recognised by their wallet
//! reference and not paid again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::wallet::{CreditOutcome, WalletLedger, settlement_reference};
use crate::domain::{
    ContestBoard, ContestEntry, ContestId, ContestStatus, Match, MatchId, MatchStatus, Payout,
    PayoutStatus, Registry, SettlementRecord, UnitOfWork,
};
use crate::error::GatewayError;

/// Counts for one settlement run, reflecting only what actually happened
/// during that run.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SettlementSummary {
    /// Contests finalized by this run.
    pub contests_processed: usize,
    /// Contests that were already finalized; nothing paid.
    pub contests_already_settled: usize,
    /// Contests not eligible (cancelled or never started).
    pub contests_skipped: usize,
    /// Contests left unfinalized because a credit failed.
    pub contests_incomplete: usize,
    /// Contests abandoned on a data error.
    pub contests_failed: usize,
    /// Winners credited by this run.
    pub winners_paid: usize,
    /// Amount credited by this run.
    pub total_paid: f64,
    /// Credits that failed in this run.
    pub failed_credits: usize,
    /// Records of the contests finalized by this run.
    pub records: Vec<SettlementRecord>,
    /// Attempted records of contests left unfinalized.
    pub pending: Vec<SettlementRecord>,
}

enum ContestSettlement {
    Settled {
        record: SettlementRecord,
        credited: usize,
        paid: f64,
    },
    AlreadySettled,
    Skipped(ContestStatus),
    Incomplete {
        record: SettlementRecord,
        credited: usize,
        paid: f64,
        failed: usize,
    },
}

/// Distributes contest prize pools to ranked winners.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    matches: Arc<Registry<MatchId, Match>>,
    contests: Arc<ContestBoard>,
    wallet: Arc<dyn WalletLedger>,
}

impl SettlementEngine {
    /// Creates an engine paying through `wallet`.
    #[must_use]
    pub fn new(
        matches: Arc<Registry<MatchId, Match>>,
        contests: Arc<ContestBoard>,
        wallet: Arc<dyn WalletLedger>,
    ) -> Self {
        Self {
            matches,
            contests,
            wallet,
        }
    }

    /// Settles every contest of a completed match.
    ///
    /// Already finalized contests are reported and left untouched.
    /// Failures on one contest or one credit do not stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match and
    /// [`GatewayError::SettlementAborted`] if the match is not completed,
    /// including when that is only detected midway through the run.
    pub async fn settle_match(&self, match_id: MatchId) -> Result<SettlementSummary, GatewayError> {
        self.ensure_completed(match_id).await?;

        let mut summary = SettlementSummary::default();
        for contest_id in self.contests.contests_for_match(match_id).await {
            match self.settle_contest(match_id, contest_id).await {
                Ok(ContestSettlement::Settled {
                    record,
                    credited,
                    paid,
                }) => {
                    tracing::info!(
                        %contest_id,
                        winners = credited,
                        paid,
                        house_retained = record.house_retained,
                        "contest settled"
                    );
                    summary.contests_processed += 1;
                    summary.winners_paid += credited;
                    summary.total_paid += paid;
                    summary.records.push(record);
                }
                Ok(ContestSettlement::AlreadySettled) => {
                    tracing::debug!(%contest_id, "contest already settled");
                    summary.contests_already_settled += 1;
                }
                Ok(ContestSettlement::Skipped(status)) => {
                    tracing::debug!(%contest_id, %status, "contest not eligible for settlement");
                    summary.contests_skipped += 1;
                }
                Ok(ContestSettlement::Incomplete {
                    record,
                    credited,
                    paid,
                    failed,
                }) => {
                    tracing::warn!(%contest_id, failed, "settlement incomplete, contest left open for retry");
                    summary.contests_incomplete += 1;
                    summary.winners_paid += credited;
                    summary.total_paid += paid;
                    summary.failed_credits += failed;
                    summary.pending.push(record);
                }
                Err(e @ GatewayError::SettlementAborted { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(%contest_id, error = %e, "contest settlement skipped");
                    summary.contests_failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn ensure_completed(&self, match_id: MatchId) -> Result<(), GatewayError> {
        let handle = self.matches.get(match_id).await?;
        let status = handle.read().await.status;
        if status == MatchStatus::Completed {
            Ok(())
        } else {
            Err(GatewayError::SettlementAborted { match_id, status })
        }
    }

    async fn settle_contest(
        &self,
        match_id: MatchId,
        contest_id: ContestId,
    ) -> Result<ContestSettlement, GatewayError> {
        let handle = self.contests.get(contest_id).await?;
        let mut unit = UnitOfWork::begin(handle, "contest_settlement").await;
        if unit.is_finalized {
            return Ok(ContestSettlement::AlreadySettled);
        }
        // The match is re-read under the contest lock so a run never pays
        // against a match that left `completed` after the run started.
        self.ensure_completed(match_id).await?;
        if unit.status != ContestStatus::Completed {
            return Ok(ContestSettlement::Skipped(unit.status));
        }

        let prize_pool = unit.prize_pool;
        let mut payouts = Vec::new();
        let mut credited = 0;
        let mut paid = 0.0;
        let mut failed = 0;
        if prize_pool > 0.0 {
            let by_rank: HashMap<u32, &ContestEntry> = unit
                .entries
                .iter()
                .filter_map(|e| e.rank.map(|rank| (rank, e)))
                .collect();
            for tier in unit.effective_distribution() {
                let Some(entry) = by_rank.get(&tier.rank) else {
                    continue;
                };
                let amount = prize_pool * tier.percentage / 100.0;
                let reference = settlement_reference(contest_id, entry.id);
                let outcome = match self.wallet.credit(entry.owner_id, amount, &reference).await {
                    Ok(CreditOutcome::Applied) => {
                        credited += 1;
                        paid += amount;
                        PayoutStatus::Credited
                    }
                    Ok(CreditOutcome::Duplicate) => PayoutStatus::AlreadyCredited,
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(
                            %contest_id,
                            rank = tier.rank,
                            owner_id = %entry.owner_id,
                            error = %e,
                            "prize credit failed"
                        );
                        PayoutStatus::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                payouts.push(Payout {
                    entry_id: entry.id,
                    roster_id: entry.roster_id,
                    owner_id: entry.owner_id,
                    rank: tier.rank,
                    percentage: tier.percentage,
                    amount,
                    outcome,
                });
            }
        }

        let allocated: f64 = payouts.iter().map(|p| p.amount).sum();
        let total_paid: f64 = payouts
            .iter()
            .filter(|p| !matches!(p.outcome, PayoutStatus::Failed { .. }))
            .map(|p| p.amount)
            .sum();
        let record = SettlementRecord {
            contest_id,
            match_id,
            prize_pool,
            payouts,
            total_paid,
            house_retained: (prize_pool - allocated).max(0.0),
            settled_at: Utc::now(),
        };

        if failed > 0 {
            return Ok(ContestSettlement::Incomplete {
                record,
                credited,
                paid,
                failed,
            });
        }

        unit.is_finalized = true;
        unit.settlement = Some(record.clone());
        unit.commit();
        Ok(ContestSettlement::Settled {
            record,
            credited,
            paid,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Contest, NewContest, PrizeTier, RosterId, UserId};
    use crate::error::WalletError;
    use crate::service::wallet::InMemoryWallet;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    /// Wallet that refuses credits to a configurable set of users.
    #[derive(Debug, Default)]
    struct FlakyWallet {
        inner: InMemoryWallet,
        refused: Mutex<HashSet<UserId>>,
    }

    #[async_trait]
    impl WalletLedger for FlakyWallet {
        async fn credit(
            &self,
            user_id: UserId,
            amount: f64,
            reference: &str,
        ) -> Result<CreditOutcome, WalletError> {
            if self.refused.lock().await.contains(&user_id) {
                return Err(WalletError::Unavailable("wallet offline".to_string()));
            }
            self.inner.credit(user_id, amount, reference).await
        }
    }

    struct Fixture {
        matches: Arc<Registry<MatchId, Match>>,
        contests: Arc<ContestBoard>,
        wallet: Arc<FlakyWallet>,
        engine: SettlementEngine,
        match_id: MatchId,
    }

    async fn fixture() -> Fixture {
        let matches = Arc::new(Registry::new(GatewayError::MatchNotFound));
        let contests = Arc::new(ContestBoard::new());
        let wallet = Arc::new(FlakyWallet::default());
        let Ok(mut m) = Match::new(1, None) else {
            panic!("valid match");
        };
        for to in [MatchStatus::Live, MatchStatus::Completed] {
            let Ok(_) = m.transition(to) else {
                panic!("valid transition");
            };
        }
        let match_id = m.id;
        let Ok(_) = matches.insert(match_id, m).await else {
            panic!("insert failed");
        };
        let wallet_dyn: Arc<dyn WalletLedger> = Arc::clone(&wallet) as Arc<dyn WalletLedger>;
        let engine = SettlementEngine::new(Arc::clone(&matches), Arc::clone(&contests), wallet_dyn);
        Fixture {
            matches,
            contests,
            wallet,
            engine,
            match_id,
        }
    }

    /// Adds a completed contest whose entries are ranked in the given
    /// owner order. Returns the contest ID.
    async fn ranked_contest(
        f: &Fixture,
        prize_pool: f64,
        prize_distribution: Vec<PrizeTier>,
        owners: &[UserId],
    ) -> ContestId {
        let Ok(mut contest) = Contest::new(NewContest {
            match_id: f.match_id,
            prize_pool,
            prize_distribution,
        }) else {
            panic!("valid contest");
        };
        for (&owner, rank) in owners.iter().zip(1_u32..) {
            let Ok(entry) = contest.enter(RosterId::new(), owner) else {
                panic!("enter failed");
            };
            if let Some(stored) = contest.entries.iter_mut().find(|e| e.id == entry.id) {
                stored.rank = Some(rank);
            }
        }
        contest.advance(ContestStatus::Live);
        contest.advance(ContestStatus::Completed);
        let id = contest.id;
        let Ok(_) = f.contests.insert(contest).await else {
            panic!("insert failed");
        };
        id
    }

    #[tokio::test]
    async fn default_split_pays_top_two_and_retains_remainder() {
        let f = fixture().await;
        let owners = [UserId::new(), UserId::new(), UserId::new()];
        let contest_id = ranked_contest(&f, 1000.0, vec![], &owners).await;

        let Ok(summary) = f.engine.settle_match(f.match_id).await else {
            panic!("settlement should succeed");
        };
        assert_eq!(summary.contests_processed, 1);
        assert_eq!(summary.winners_paid, 2);
        assert!((summary.total_paid - 800.0).abs() < 1e-9);
        let [first, second, third] = owners;
        assert!((f.wallet.inner.balance(first).await - 500.0).abs() < 1e-9);
        assert!((f.wallet.inner.balance(second).await - 300.0).abs() < 1e-9);
        assert!(f.wallet.inner.balance(third).await.abs() < 1e-9);

        let Ok(contest) = f.contests.snapshot(contest_id).await else {
            panic!("contest exists");
        };
        assert!(contest.is_finalized);
        let Some(record) = contest.settlement else {
            panic!("record stored");
        };
        assert!((record.house_retained - 200.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn second_run_pays_nothing() {
        let f = fixture().await;
        let owners = [UserId::new(), UserId::new()];
        ranked_contest(&f, 100.0, vec![], &owners).await;

        let Ok(first) = f.engine.settle_match(f.match_id).await else {
            panic!("first run");
        };
        let Ok(second) = f.engine.settle_match(f.match_id).await else {
            panic!("second run");
        };
        assert_eq!(first.winners_paid, 2);
        assert_eq!(second.winners_paid, 0);
        assert_eq!(second.contests_processed, 0);
        assert_eq!(second.contests_already_settled, 1);
        assert!(second.total_paid.abs() < f64::EPSILON);
        assert_eq!(f.wallet.inner.credits_applied().await, 2);
    }

    #[tokio::test]
    async fn concurrent_runs_pay_once() {
        let f = fixture().await;
        let owners = [UserId::new(), UserId::new()];
        ranked_contest(&f, 100.0, vec![], &owners).await;

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let engine = f.engine.clone();
            let match_id = f.match_id;
            tasks.push(tokio::spawn(async move { engine.settle_match(match_id).await }));
        }
        let mut paid = 0;
        for task in tasks {
            let Ok(Ok(summary)) = task.await else {
                panic!("settlement task failed");
            };
            paid += summary.winners_paid;
        }
        assert_eq!(paid, 2);
        let [first, _] = owners;
        assert!((f.wallet.inner.balance(first).await - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_entries_and_zero_pool_are_no_ops() {
        let f = fixture().await;
        let empty = ranked_contest(&f, 500.0, vec![], &[]).await;
        let free = ranked_contest(&f, 0.0, vec![], &[UserId::new()]).await;

        let Ok(summary) = f.engine.settle_match(f.match_id).await else {
            panic!("settlement should succeed");
        };
        assert_eq!(summary.contests_processed, 2);
        assert_eq!(summary.winners_paid, 0);
        for id in [empty, free] {
            let Ok(contest) = f.contests.snapshot(id).await else {
                panic!("contest exists");
            };
            assert!(contest.is_finalized);
        }
    }

    #[tokio::test]
    async fn failed_credit_does_not_block_other_winners() {
        let f = fixture().await;
        let owners = [UserId::new(), UserId::new()];
        let [first, second] = owners;
        let contest_id = ranked_contest(&f, 100.0, vec![], &owners).await;
        f.wallet.refused.lock().await.insert(first);

        let Ok(summary) = f.engine.settle_match(f.match_id).await else {
            panic!("settlement should succeed");
        };
        assert_eq!(summary.winners_paid, 1);
        assert_eq!(summary.failed_credits, 1);
        assert_eq!(summary.contests_incomplete, 1);
        assert!((summary.total_paid - 30.0).abs() < 1e-9);
        let Ok(contest) = f.contests.snapshot(contest_id).await else {
            panic!("contest exists");
        };
        assert!(!contest.is_finalized);

        f.wallet.refused.lock().await.clear();
        let Ok(retry) = f.engine.settle_match(f.match_id).await else {
            panic!("retry should succeed");
        };
        assert_eq!(retry.winners_paid, 1);
        assert_eq!(retry.contests_processed, 1);
        assert!((f.wallet.inner.balance(first).await - 50.0).abs() < 1e-9);
        assert!((f.wallet.inner.balance(second).await - 30.0).abs() < 1e-9);
        let Some(record) = retry.records.first() else {
            panic!("record returned");
        };
        assert!(
            record
                .payouts
                .iter()
                .any(|p| p.outcome == PayoutStatus::AlreadyCredited)
        );
    }

    #[tokio::test]
    async fn entry_moving_into_a_paid_rank_is_still_paid_on_retry() {
        let f = fixture().await;
        let owners = [UserId::new(), UserId::new(), UserId::new()];
        let [first, second, third] = owners;
        let contest_id = ranked_contest(&f, 100.0, vec![], &owners).await;
        f.wallet.refused.lock().await.insert(first);

        let Ok(partial) = f.engine.settle_match(f.match_id).await else {
            panic!("settlement should succeed");
        };
        assert_eq!(partial.contests_incomplete, 1);
        assert!((f.wallet.inner.balance(second).await - 30.0).abs() < 1e-9);

        // A late correction swaps second and third before the retry.
        let Ok(handle) = f.contests.get(contest_id).await else {
            panic!("contest exists");
        };
        for entry in &mut handle.write().await.entries {
            if entry.owner_id == second {
                entry.rank = Some(3);
            } else if entry.owner_id == third {
                entry.rank = Some(2);
            }
        }
        f.wallet.refused.lock().await.clear();

        let Ok(retry) = f.engine.settle_match(f.match_id).await else {
            panic!("retry should succeed");
        };
        assert_eq!(retry.winners_paid, 2);
        assert!((f.wallet.inner.balance(first).await - 50.0).abs() < 1e-9);
        assert!((f.wallet.inner.balance(third).await - 30.0).abs() < 1e-9);
        assert!((f.wallet.inner.balance(second).await - 30.0).abs() < 1e-9);
        assert_eq!(f.wallet.inner.credits_applied().await, 3);
    }

    #[tokio::test]
    async fn match_not_completed_aborts() {
        let f = fixture().await;
        let Ok(m) = Match::new(1, None) else {
            panic!("valid match");
        };
        let open_id = m.id;
        let Ok(_) = f.matches.insert(open_id, m).await else {
            panic!("insert failed");
        };
        assert!(matches!(
            f.engine.settle_match(open_id).await,
            Err(GatewayError::SettlementAborted { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_contest_is_skipped() {
        let f = fixture().await;
        let Ok(mut contest) = Contest::new(NewContest {
            match_id: f.match_id,
            prize_pool: 100.0,
            prize_distribution: vec![],
        }) else {
            panic!("valid contest");
        };
        contest.advance(ContestStatus::Cancelled);
        let Ok(_) = f.contests.insert(contest).await else {
            panic!("insert failed");
        };
        let Ok(summary) = f.engine.settle_match(f.match_id).await else {
            panic!("settlement should succeed");
        };
        assert_eq!(summary.contests_skipped, 1);
        assert_eq!(summary.contests_processed, 0);
    }
}
