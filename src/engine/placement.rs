//! Bet placement.
//!
//! Flow for one request:
//! 1. Resolve every selection to an active betting option
//! 2. Multiply the option odds into the combined odds
//! 3. Debit the stake from the wallet (before anything is written)
//! 4. Persist the bet and one slip per selection, odds frozen per slip
//!
//! If step 4 fails the stake is credited back as a REFUND and the storage
//! error is returned, so a failed placement never leaves money debited.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::bounded;
use super::ledger::WalletLedger;
use crate::storage::{BetStore, BettingOptionStore};
use crate::types::{
    Bet, BetSlip, BetStatus, BetType, BettingOption, Money, Odds, SportsbookError,
    SportsbookResult, TransactionType,
};

/// A bet request from an authenticated user.
#[derive(Debug, Clone)]
pub struct PlaceBet {
    pub user_id: Uuid,
    /// Betting option ids. Repeats are kept and each one counts.
    pub selections: Vec<Uuid>,
    pub amount: Decimal,
    pub bet_type: BetType,
}

pub struct BetEngine {
    options: Arc<dyn BettingOptionStore>,
    bets: Arc<dyn BetStore>,
    ledger: Arc<WalletLedger>,
    store_timeout: Duration,
}

impl BetEngine {
    pub fn new(
        options: Arc<dyn BettingOptionStore>,
        bets: Arc<dyn BetStore>,
        ledger: Arc<WalletLedger>,
        store_timeout: Duration,
    ) -> Self {
        Self { options, bets, ledger, store_timeout }
    }

    pub async fn place_bet(&self, request: PlaceBet) -> SportsbookResult<Bet> {
        let PlaceBet { user_id, selections, amount, bet_type } = request;

        if selections.is_empty() {
            return Err(SportsbookError::Validation("At least one selection is required".into()));
        }
        if amount <= Decimal::ZERO {
            return Err(SportsbookError::Validation("Bet amount must be greater than zero".into()));
        }
        let stake = Money::new(amount)?;

        let resolved = self.resolve_selections(&selections).await?;
        let total_odds = resolved
            .iter()
            .try_fold(Odds::ONE, |acc, option| acc.combine(option.odds))?;
        let potential_return = total_odds.payout_for(stake)?;

        self.ledger.withdraw(user_id, amount, TransactionType::Bet).await?;

        let bet_id = Uuid::new_v4();
        let bet = Bet {
            id: bet_id,
            user_id,
            bet_type,
            total_amount: stake,
            potential_return,
            total_odds,
            status: BetStatus::Pending,
            slips: resolved.iter().map(|option| BetSlip::new(bet_id, option)).collect(),
            created_at: Utc::now(),
            settled_at: None,
        };

        if let Err(e) = bounded(self.store_timeout, "bet create", self.bets.create(&bet)).await {
            error!(user_id = %user_id, bet_id = %bet_id, error = %e, "Failed to persist bet, refunding stake");
            if let Err(refund_err) = self.ledger.deposit(user_id, amount, TransactionType::Refund).await {
                error!(
                    user_id = %user_id,
                    amount = %amount,
                    error = %refund_err,
                    "Stake refund failed, wallet needs manual correction"
                );
            }
            return Err(e);
        }

        info!(
            bet_id = %bet.id,
            user_id = %user_id,
            bet_type = bet_type.as_str(),
            legs = bet.slips.len(),
            stake = %stake,
            total_odds = %total_odds,
            potential_return = %potential_return,
            "Bet placed"
        );
        Ok(bet)
    }

    /// Look up every selection in order, stopping at the first one that
    /// is missing or inactive.
    async fn resolve_selections(&self, selections: &[Uuid]) -> SportsbookResult<Vec<BettingOption>> {
        let mut resolved = Vec::with_capacity(selections.len());
        for &option_id in selections {
            let option = bounded(self.store_timeout, "option lookup", self.options.find_by_id(option_id))
                .await?
                .ok_or_else(|| {
                    warn!(option_id = %option_id, "Bet rejected: unknown option");
                    SportsbookError::Validation(format!("Betting option {option_id} not found"))
                })?;
            if !option.is_active {
                warn!(option_id = %option_id, "Bet rejected: option inactive");
                return Err(SportsbookError::Validation(format!(
                    "Betting option {option_id} is not active"
                )));
            }
            resolved.push(option);
        }
        Ok(resolved)
    }

    pub async fn bets_for_user(&self, user_id: Uuid) -> SportsbookResult<Vec<Bet>> {
        bounded(self.store_timeout, "bet lookup", self.bets.find_by_user_id(user_id)).await
    }

    /// A bet owned by someone else is reported as not found.
    pub async fn get_bet(&self, user_id: Uuid, bet_id: Uuid) -> SportsbookResult<Bet> {
        bounded(self.store_timeout, "bet lookup", self.bets.find_by_id(bet_id))
            .await?
            .filter(|bet| bet.user_id == user_id)
            .ok_or_else(|| SportsbookError::not_found("Bet", bet_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MockBetStore, Stores};
    use crate::types::OptionType;
    use rust_decimal_macros::dec;

    struct Harness {
        stores: Stores,
        ledger: Arc<WalletLedger>,
        engine: BetEngine,
    }

    fn harness_with_bets(stores: Stores, bets: Arc<dyn BetStore>) -> Harness {
        let ledger = Arc::new(WalletLedger::new(
            stores.wallets.clone(),
            stores.transactions.clone(),
            Duration::from_secs(1),
        ));
        let engine = BetEngine::new(stores.options.clone(), bets, ledger.clone(), Duration::from_secs(1));
        Harness { stores, ledger, engine }
    }

    fn harness() -> Harness {
        let stores = Stores::in_memory();
        let bets = stores.bets.clone();
        harness_with_bets(stores, bets)
    }

    async fn funded_user(h: &Harness, amount: Decimal) -> Uuid {
        let user_id = Uuid::new_v4();
        h.ledger.create_initial_wallet(user_id).await.unwrap();
        h.ledger.deposit(user_id, amount, TransactionType::Deposit).await.unwrap();
        user_id
    }

    async fn option(h: &Harness, odds: Decimal) -> BettingOption {
        let option = BettingOption::new(
            Uuid::new_v4(),
            OptionType::WinDrawLoss,
            format!("@{odds}"),
            Odds::new(odds).unwrap(),
        );
        h.stores.options.save(&option).await.unwrap();
        option
    }

    async fn balance(h: &Harness, user_id: Uuid) -> Decimal {
        h.ledger.get_wallet(user_id).await.unwrap().balance.amount()
    }

    #[tokio::test]
    async fn test_single_bet() {
        let h = harness();
        let user_id = funded_user(&h, dec!(1000)).await;
        let o = option(&h, dec!(1.8)).await;

        let bet = h
            .engine
            .place_bet(PlaceBet { user_id, selections: vec![o.id], amount: dec!(200), bet_type: BetType::Single })
            .await
            .unwrap();

        assert_eq!(bet.total_odds.value(), dec!(1.8));
        assert_eq!(bet.potential_return.amount(), dec!(360.00));
        assert_eq!(bet.status, BetStatus::Pending);
        assert_eq!(bet.slips.len(), 1);
        assert_eq!(balance(&h, user_id).await, dec!(800.00));
    }

    #[tokio::test]
    async fn test_combo_multiplies_odds() {
        let h = harness();
        let user_id = funded_user(&h, dec!(1000)).await;
        let a = option(&h, dec!(1.5)).await;
        let b = option(&h, dec!(2.0)).await;

        let bet = h
            .engine
            .place_bet(PlaceBet { user_id, selections: vec![a.id, b.id], amount: dec!(100), bet_type: BetType::Combo })
            .await
            .unwrap();

        assert_eq!(bet.total_odds.value(), dec!(3.0));
        assert_eq!(bet.potential_return.amount(), dec!(300.00));
        assert_eq!(bet.slips[0].game_id, a.game_id);
        assert_eq!(bet.slips[1].odds.value(), dec!(2.0));
    }

    #[tokio::test]
    async fn test_duplicate_selection_counts_twice() {
        let h = harness();
        let user_id = funded_user(&h, dec!(100)).await;
        let a = option(&h, dec!(2)).await;

        let bet = h
            .engine
            .place_bet(PlaceBet { user_id, selections: vec![a.id, a.id], amount: dec!(10), bet_type: BetType::Combo })
            .await
            .unwrap();
        assert_eq!(bet.slips.len(), 2);
        assert_eq!(bet.total_odds.value(), dec!(4));
    }

    #[tokio::test]
    async fn test_empty_selection_rejected() {
        let h = harness();
        let user_id = funded_user(&h, dec!(100)).await;
        let err = h
            .engine
            .place_bet(PlaceBet { user_id, selections: vec![], amount: dec!(10), bet_type: BetType::Single })
            .await
            .unwrap_err();
        assert!(matches!(err, SportsbookError::Validation(_)));
        assert_eq!(balance(&h, user_id).await, dec!(100));
    }

    #[tokio::test]
    async fn test_inactive_or_unknown_option_debits_nothing() {
        let h = harness();
        let user_id = funded_user(&h, dec!(100)).await;
        let mut closed = option(&h, dec!(1.9)).await;
        closed.deactivate();
        h.stores.options.save(&closed).await.unwrap();

        for selections in [vec![closed.id], vec![Uuid::new_v4()]] {
            let err = h
                .engine
                .place_bet(PlaceBet { user_id, selections, amount: dec!(10), bet_type: BetType::Single })
                .await
                .unwrap_err();
            assert!(matches!(err, SportsbookError::Validation(_)));
        }
        assert_eq!(balance(&h, user_id).await, dec!(100));
        assert!(h.engine.bets_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_funds_writes_no_bet() {
        let h = harness();
        let user_id = funded_user(&h, dec!(50)).await;
        let o = option(&h, dec!(2)).await;

        let err = h
            .engine
            .place_bet(PlaceBet { user_id, selections: vec![o.id], amount: dec!(50.01), bet_type: BetType::Single })
            .await
            .unwrap_err();
        assert!(matches!(err, SportsbookError::InsufficientFunds { .. }));
        assert!(h.stores.bets.find_by_user_id(user_id).await.unwrap().is_empty());
        assert_eq!(balance(&h, user_id).await, dec!(50));
    }

    #[tokio::test]
    async fn test_slip_odds_frozen_after_odds_change() {
        let h = harness();
        let user_id = funded_user(&h, dec!(100)).await;
        let mut o = option(&h, dec!(1.8)).await;
        let bet = h
            .engine
            .place_bet(PlaceBet { user_id, selections: vec![o.id], amount: dec!(10), bet_type: BetType::Single })
            .await
            .unwrap();

        o.update_odds(dec!(2.5)).unwrap();
        h.stores.options.save(&o).await.unwrap();

        let stored = h.engine.get_bet(user_id, bet.id).await.unwrap();
        assert_eq!(stored.slips[0].odds.value(), dec!(1.8));
        assert_eq!(stored.potential_return.amount(), dec!(18));
    }

    #[tokio::test]
    async fn test_persist_failure_refunds_stake() {
        let stores = Stores::in_memory();
        let mut bets = MockBetStore::new();
        bets.expect_create()
            .times(1)
            .returning(|_| Err(SportsbookError::Storage("disk full".into())));
        let h = harness_with_bets(stores, Arc::new(bets));
        let user_id = funded_user(&h, dec!(100)).await;
        let o = option(&h, dec!(2)).await;

        let err = h
            .engine
            .place_bet(PlaceBet { user_id, selections: vec![o.id], amount: dec!(40), bet_type: BetType::Single })
            .await
            .unwrap_err();
        assert!(matches!(err, SportsbookError::Storage(_)));
        assert_eq!(balance(&h, user_id).await, dec!(100));

        let journal = h.ledger.transactions(user_id, crate::types::Page::default()).await.unwrap();
        assert_eq!(journal.items[0].transaction_type, TransactionType::Refund);
        assert_eq!(journal.items[1].transaction_type, TransactionType::Bet);
    }

    #[tokio::test]
    async fn test_get_bet_hides_other_users_bets() {
        let h = harness();
        let owner = funded_user(&h, dec!(100)).await;
        let o = option(&h, dec!(2)).await;
        let bet = h
            .engine
            .place_bet(PlaceBet { user_id: owner, selections: vec![o.id], amount: dec!(10), bet_type: BetType::Single })
            .await
            .unwrap();

        assert!(h.engine.get_bet(owner, bet.id).await.is_ok());
        let err = h.engine.get_bet(Uuid::new_v4(), bet.id).await.unwrap_err();
        assert!(matches!(err, SportsbookError::NotFound { .. }));
    }
}
