//! Persistence layer.
//!
//! Defines one repository trait per aggregate and provides two backends:
//! - `InMemoryStore`: tokio `RwLock` tables, for tests and throwaway runs
//! - `SqliteStore`: sqlx SQLite pool with the schema created on startup
//!
//! Engines only ever see the traits, bundled together in [`Stores`].

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::types::{
    Bet, BetSlip, BettingOption, Game, GameFilter, League, LeagueFilter, Page, Payout,
    SportsbookResult, User, Wallet, WalletMovement, WalletTransaction,
};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// `database.url` value that selects the in-process backend.
pub const MEMORY_URL: &str = "memory";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BettingOptionStore: Send + Sync {
    /// Insert or replace.
    async fn save(&self, option: &BettingOption) -> SportsbookResult<()>;

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<BettingOption>>;

    async fn find_by_game_id(&self, game_id: Uuid) -> SportsbookResult<Vec<BettingOption>>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> SportsbookResult<bool>;
}

/// Bets are always loaded together with their slips.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BetStore: Send + Sync {
    /// Persist a new bet and all of its slips as one unit.
    /// Either every row is written or none is.
    async fn create(&self, bet: &Bet) -> SportsbookResult<()>;

    /// Update the bet row (status, settlement time). Slips are saved
    /// through [`BetSlipStore`].
    async fn save(&self, bet: &Bet) -> SportsbookResult<()>;

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<Bet>>;

    /// Newest first.
    async fn find_by_user_id(&self, user_id: Uuid) -> SportsbookResult<Vec<Bet>>;

    /// Every bet with at least one slip on `game_id`, oldest first.
    async fn find_by_game_id(&self, game_id: Uuid) -> SportsbookResult<Vec<Bet>>;

    /// Record the outcome of a pending bet as one unit: its status and
    /// settlement time, the results of `bet.slips`, and for a winner the
    /// payout credit with its journal entry. Returns `false`, writing
    /// nothing, when the stored bet is missing or no longer pending.
    async fn settle(&self, bet: &Bet, payout: Option<Payout>) -> SportsbookResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BetSlipStore: Send + Sync {
    async fn save(&self, slip: &BetSlip) -> SportsbookResult<()>;

    /// In placement order.
    async fn find_by_bet_id(&self, bet_id: Uuid) -> SportsbookResult<Vec<BetSlip>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> SportsbookResult<Option<Wallet>>;

    async fn get_by_user_id(&self, user_id: Uuid) -> SportsbookResult<Option<Wallet>>;

    /// Update balance and timestamp of an existing wallet.
    async fn save(&self, wallet: &Wallet) -> SportsbookResult<()>;

    /// Apply `movement` against the stored balance and append its journal
    /// entry as one unit. A debit larger than the stored balance fails with
    /// `InsufficientFunds` and writes nothing, however many callers race.
    async fn apply_movement(
        &self,
        wallet_id: Uuid,
        movement: WalletMovement,
    ) -> SportsbookResult<(Wallet, WalletTransaction)>;

    /// Insert a new wallet. `Duplicate` if the user already has one.
    async fn create(&self, wallet: &Wallet) -> SportsbookResult<()>;

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool>;
}

/// Append-only wallet journal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, entry: &WalletTransaction) -> SportsbookResult<()>;

    /// Newest first.
    async fn find_by_wallet_id(
        &self,
        wallet_id: Uuid,
        page: Page,
    ) -> SportsbookResult<Vec<WalletTransaction>>;

    async fn count_by_wallet_id(&self, wallet_id: Uuid) -> SportsbookResult<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn save(&self, game: &Game) -> SportsbookResult<()>;

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<Game>>;

    /// Ordered by start time.
    async fn find_all(&self, filter: &GameFilter, page: Page) -> SportsbookResult<Vec<Game>>;

    async fn count_all(&self, filter: &GameFilter) -> SportsbookResult<u64>;

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeagueStore: Send + Sync {
    async fn save(&self, league: &League) -> SportsbookResult<()>;

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<League>>;

    /// Ordered by name.
    async fn find_all(&self, filter: &LeagueFilter, page: Page) -> SportsbookResult<Vec<League>>;

    async fn count_all(&self, filter: &LeagueFilter) -> SportsbookResult<u64>;

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert or replace. `Duplicate` if another user holds the username
    /// or the email.
    async fn save(&self, user: &User) -> SportsbookResult<()>;

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> SportsbookResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> SportsbookResult<Option<User>>;
}

// ---------------------------------------------------------------------------
// Store bundle
// ---------------------------------------------------------------------------

/// Every repository the engines need, as shared trait objects.
#[derive(Clone)]
pub struct Stores {
    pub options: Arc<dyn BettingOptionStore>,
    pub bets: Arc<dyn BetStore>,
    pub slips: Arc<dyn BetSlipStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub games: Arc<dyn GameStore>,
    pub leagues: Arc<dyn LeagueStore>,
    pub users: Arc<dyn UserStore>,
}

impl Stores {
    /// Use one backend for every repository.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: BettingOptionStore
            + BetStore
            + BetSlipStore
            + WalletStore
            + TransactionStore
            + GameStore
            + LeagueStore
            + UserStore
            + 'static,
    {
        Self {
            options: backend.clone(),
            bets: backend.clone(),
            slips: backend.clone(),
            wallets: backend.clone(),
            transactions: backend.clone(),
            games: backend.clone(),
            leagues: backend.clone(),
            users: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }

    /// Open the backend named by `url`: [`MEMORY_URL`] or a sqlx SQLite URL.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        if url == MEMORY_URL {
            info!("Using in-memory store");
            return Ok(Self::in_memory());
        }
        let store = SqliteStore::connect(url, max_connections).await?;
        Ok(Self::from_backend(Arc::new(store)))
    }
}
