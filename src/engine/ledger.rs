//! Wallet ledger.
//!
//! Owns every balance change. The store writes each movement and its
//! journal entry together, conditional on the balance it was computed
//! from, so no two writers can overdraw a wallet. The per-user lock keeps
//! callers in this process from contending on that condition.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::bounded;
use super::locks::KeyedLocks;
use crate::storage::{TransactionStore, WalletStore};
use crate::types::{
    Page, Paginated, SportsbookError, SportsbookResult, TransactionType, Wallet, WalletMovement,
    WalletTransaction,
};

pub struct WalletLedger {
    wallets: Arc<dyn WalletStore>,
    journal: Arc<dyn TransactionStore>,
    locks: KeyedLocks<Uuid>,
    store_timeout: Duration,
}

impl WalletLedger {
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        journal: Arc<dyn TransactionStore>,
        store_timeout: Duration,
    ) -> Self {
        Self { wallets, journal, locks: KeyedLocks::new(), store_timeout }
    }

    /// Provision an empty wallet. `Duplicate` if the user already has one.
    pub async fn create_initial_wallet(&self, user_id: Uuid) -> SportsbookResult<Wallet> {
        let _guard = self.locks.lock(user_id).await;

        let existing = bounded(self.store_timeout, "wallet lookup", self.wallets.get_by_user_id(user_id)).await?;
        if existing.is_some() {
            return Err(SportsbookError::Duplicate { entity: "Wallet", key: user_id.to_string() });
        }

        let wallet = Wallet::new(user_id);
        bounded(self.store_timeout, "wallet create", self.wallets.create(&wallet)).await?;
        info!(user_id = %user_id, wallet_id = %wallet.id, "Wallet created");
        Ok(wallet)
    }

    pub async fn get_wallet(&self, user_id: Uuid) -> SportsbookResult<Wallet> {
        bounded(self.store_timeout, "wallet lookup", self.wallets.get_by_user_id(user_id))
            .await?
            .ok_or_else(|| SportsbookError::not_found("Wallet", user_id))
    }

    pub async fn deposit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionType,
    ) -> SportsbookResult<Wallet> {
        self.apply(user_id, WalletMovement::credit(amount, kind)).await
    }

    /// Fails with `InsufficientFunds`, leaving the balance as it was,
    /// when the wallet holds less than `amount`.
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionType,
    ) -> SportsbookResult<Wallet> {
        self.apply(user_id, WalletMovement::debit(amount, kind)).await
    }

    /// Journal entries for the user's wallet, newest first.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> SportsbookResult<Paginated<WalletTransaction>> {
        let wallet = self.get_wallet(user_id).await?;
        let items = bounded(
            self.store_timeout,
            "journal lookup",
            self.journal.find_by_wallet_id(wallet.id, page),
        )
        .await?;
        let total =
            bounded(self.store_timeout, "journal count", self.journal.count_by_wallet_id(wallet.id))
                .await?;
        Ok(Paginated::new(items, total, page))
    }

    async fn apply(&self, user_id: Uuid, movement: WalletMovement) -> SportsbookResult<Wallet> {
        let _guard = self.locks.lock(user_id).await;

        let wallet = self.get_wallet(user_id).await?;
        let applied = bounded(
            self.store_timeout,
            "wallet movement",
            self.wallets.apply_movement(wallet.id, movement),
        )
        .await;
        let (wallet, _entry) = match applied {
            Ok(done) => done,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    kind = %movement.kind,
                    amount = %movement.amount,
                    error = %e,
                    "Wallet movement rejected"
                );
                return Err(e);
            }
        };

        info!(
            user_id = %user_id,
            kind = %movement.kind,
            amount = %movement.amount,
            balance = %wallet.balance,
            "Wallet updated"
        );
        Ok(wallet)
    }
}
