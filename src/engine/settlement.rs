//! Game settlement.
//!
//! Resolves every pending bet with a leg on a game against the set of
//! winning options: each slip becomes WIN or LOSS, a bet wins only if all
//! of its slips win, and winners are credited their potential return.
//!
//! A bet's status, slip results and payout are written by the store as
//! one unit that only applies while the bet is still PENDING. A rerun
//! skips settled bets and retries any the previous run could not write,
//! so no bet is paid twice or left WIN without its payout.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::bounded;
use super::ledger::WalletLedger;
use super::locks::KeyedLocks;
use crate::storage::{BetSlipStore, BetStore, GameStore};
use crate::types::{Bet, Money, Payout, SlipResult, SportsbookError, SportsbookResult};

/// Outcome counts for one settlement run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReport {
    pub game_id: Uuid,
    pub bets_settled: usize,
    pub bets_won: usize,
    pub bets_lost: usize,
    pub bets_skipped: usize,
    pub total_paid: Money,
}

impl SettlementReport {
    fn new(game_id: Uuid) -> Self {
        Self {
            game_id,
            bets_settled: 0,
            bets_won: 0,
            bets_lost: 0,
            bets_skipped: 0,
            total_paid: Money::ZERO,
        }
    }
}

pub struct SettlementEngine {
    games: Arc<dyn GameStore>,
    bets: Arc<dyn BetStore>,
    slips: Arc<dyn BetSlipStore>,
    ledger: Arc<WalletLedger>,
    locks: KeyedLocks<Uuid>,
    store_timeout: Duration,
}

impl SettlementEngine {
    pub fn new(
        games: Arc<dyn GameStore>,
        bets: Arc<dyn BetStore>,
        slips: Arc<dyn BetSlipStore>,
        ledger: Arc<WalletLedger>,
        store_timeout: Duration,
    ) -> Self {
        Self { games, bets, slips, ledger, locks: KeyedLocks::new(), store_timeout }
    }

    pub async fn settle_game(
        &self,
        game_id: Uuid,
        winning_option_ids: &[Uuid],
    ) -> SportsbookResult<SettlementReport> {
        let _guard = self.locks.lock(game_id).await;

        bounded(self.store_timeout, "game lookup", self.games.find_by_id(game_id))
            .await?
            .ok_or_else(|| SportsbookError::not_found("Game", game_id))?;

        let winners: HashSet<Uuid> = winning_option_ids.iter().copied().collect();
        let bets = bounded(self.store_timeout, "bet lookup", self.bets.find_by_game_id(game_id)).await?;

        info!(game_id = %game_id, bets = bets.len(), winning_options = winners.len(), "Settling game");

        let mut report = SettlementReport::new(game_id);
        for bet in bets {
            if !bet.is_pending() {
                report.bets_skipped += 1;
                continue;
            }
            let bet_id = bet.id;
            match self.settle_bet(bet, &winners).await {
                Ok(Outcome::Won(paid)) => {
                    report.bets_won += 1;
                    report.total_paid = report.total_paid.checked_add(paid)?;
                }
                Ok(Outcome::Lost) => report.bets_lost += 1,
                Ok(Outcome::AlreadySettled) => {
                    report.bets_skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(game_id = %game_id, bet_id = %bet_id, error = %e, "Settlement aborted");
                    return Err(e);
                }
            }
            report.bets_settled += 1;
        }

        info!(
            game_id = %game_id,
            settled = report.bets_settled,
            won = report.bets_won,
            lost = report.bets_lost,
            skipped = report.bets_skipped,
            total_paid = %report.total_paid,
            "Game settled"
        );
        Ok(report)
    }

    /// Resolve one pending bet.
    async fn settle_bet(&self, mut bet: Bet, winners: &HashSet<Uuid>) -> SportsbookResult<Outcome> {
        let mut slips = bounded(self.store_timeout, "slip lookup", self.slips.find_by_bet_id(bet.id)).await?;

        let mut all_won = !slips.is_empty();
        for slip in &mut slips {
            slip.result = if winners.contains(&slip.option_id) {
                SlipResult::Win
            } else {
                SlipResult::Loss
            };
            all_won &= slip.result == SlipResult::Win;
        }
        bet.slips = slips;

        let payout = if all_won {
            bet.win()?;
            let wallet = self.ledger.get_wallet(bet.user_id).await?;
            (bet.potential_return.amount() > Decimal::ZERO)
                .then(|| Payout { wallet_id: wallet.id, amount: bet.potential_return })
        } else {
            bet.lose()?;
            None
        };

        let written = bounded(self.store_timeout, "bet settle", self.bets.settle(&bet, payout)).await?;
        if !written {
            debug!(bet_id = %bet.id, "Bet settled elsewhere");
            return Ok(Outcome::AlreadySettled);
        }

        if !all_won {
            return Ok(Outcome::Lost);
        }
        info!(bet_id = %bet.id, user_id = %bet.user_id, payout = %bet.potential_return, "Bet won");
        Ok(Outcome::Won(bet.potential_return))
    }
}

enum Outcome {
    Won(Money),
    Lost,
    AlreadySettled,
}
