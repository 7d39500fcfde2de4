//! Core engine: wallets, catalog, bet placement and settlement.
//!
//! Each service owns the `Arc<dyn ...Store>` handles it needs. [`Services`]
//! wires them all against one [`Stores`] bundle.

pub mod catalog;
pub mod ledger;
pub mod locks;
pub mod placement;
pub mod registry;
pub mod settlement;
pub mod users;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::BettingConfig;
use crate::storage::Stores;
use crate::types::{SportsbookError, SportsbookResult};

use self::catalog::BettingCatalog;
use self::ledger::WalletLedger;
use self::placement::BetEngine;
use self::registry::{GameRegistry, LeagueRegistry};
use self::settlement::SettlementEngine;
use self::users::UserDirectory;

/// Run one store call under a deadline. Expiry becomes
/// `SportsbookError::Timeout`; the call's own result passes through.
pub async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> SportsbookResult<T>
where
    F: Future<Output = SportsbookResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, limit_ms = limit.as_millis() as u64, "Store call timed out");
            Err(SportsbookError::Timeout(format!(
                "{operation} exceeded {}ms",
                limit.as_millis()
            )))
        }
    }
}

/// All application services, ready to hand to the HTTP layer.
#[derive(Clone)]
pub struct Services {
    pub ledger: Arc<WalletLedger>,
    pub catalog: Arc<BettingCatalog>,
    pub bets: Arc<BetEngine>,
    pub settlement: Arc<SettlementEngine>,
    pub games: Arc<GameRegistry>,
    pub leagues: Arc<LeagueRegistry>,
    pub users: Arc<UserDirectory>,
}

impl Services {
    pub fn new(stores: Stores, config: &BettingConfig) -> Self {
        let timeout = config.store_timeout();
        let ledger = Arc::new(WalletLedger::new(
            stores.wallets.clone(),
            stores.transactions.clone(),
            timeout,
        ));

        Self {
            catalog: Arc::new(BettingCatalog::new(stores.options.clone(), stores.games.clone())),
            bets: Arc::new(BetEngine::new(
                stores.options.clone(),
                stores.bets.clone(),
                ledger.clone(),
                timeout,
            )),
            settlement: Arc::new(SettlementEngine::new(
                stores.games.clone(),
                stores.bets.clone(),
                stores.slips.clone(),
                ledger.clone(),
                timeout,
            )),
            games: Arc::new(GameRegistry::new(stores.games.clone(), stores.leagues.clone())),
            leagues: Arc::new(LeagueRegistry::new(stores.leagues.clone())),
            users: Arc::new(UserDirectory::new(stores.users)),
            ledger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded(Duration::from_millis(50), "noop", async { Ok::<_, SportsbookError>(7) }).await;
        assert_eq!(assert_ok!(value), 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, SportsbookError>(())
        };
        let err = bounded(Duration::from_millis(10), "slow call", slow).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("slow call"));
    }
}
