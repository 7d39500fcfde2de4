//! In-memory backend.
//!
//! Each table is a `tokio::sync::RwLock`-guarded map. Slips are kept in
//! their own table keyed by bet id and joined back onto bets on read, so
//! slip results saved after placement are visible through `BetStore`.
//!
//! Operations spanning several tables take their write locks in one fixed
//! order: bets, slips, wallets, transactions.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BetSlipStore, BetStore, BettingOptionStore, GameStore, LeagueStore, TransactionStore,
    UserStore, WalletStore,
};
use crate::types::{
    Bet, BetSlip, BettingOption, Game, GameFilter, League, LeagueFilter, Page, Payout,
    SportsbookError, SportsbookResult, User, Wallet, WalletMovement, WalletTransaction,
};

#[derive(Default)]
pub struct InMemoryStore {
    options: RwLock<HashMap<Uuid, BettingOption>>,
    bets: RwLock<HashMap<Uuid, Bet>>,
    slips: RwLock<HashMap<Uuid, Vec<BetSlip>>>,
    wallets: RwLock<HashMap<Uuid, Wallet>>,
    transactions: RwLock<Vec<WalletTransaction>>,
    games: RwLock<HashMap<Uuid, Game>>,
    leagues: RwLock<HashMap<Uuid, League>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn hydrate(bet: &Bet, slips: &HashMap<Uuid, Vec<BetSlip>>) -> Bet {
        let mut bet = bet.clone();
        bet.slips = slips.get(&bet.id).cloned().unwrap_or_default();
        bet
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

// ---- Betting options ----

#[async_trait]
impl BettingOptionStore for InMemoryStore {
    async fn save(&self, option: &BettingOption) -> SportsbookResult<()> {
        self.options.write().await.insert(option.id, option.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<BettingOption>> {
        Ok(self.options.read().await.get(&id).cloned())
    }

    async fn find_by_game_id(&self, game_id: Uuid) -> SportsbookResult<Vec<BettingOption>> {
        let options = self.options.read().await;
        let mut found: Vec<BettingOption> =
            options.values().filter(|o| o.game_id == game_id).cloned().collect();
        found.sort_by(|a, b| a.option_name.cmp(&b.option_name));
        Ok(found)
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        Ok(self.options.write().await.remove(&id).is_some())
    }
}

// ---- Bets ----

#[async_trait]
impl BetStore for InMemoryStore {
    async fn create(&self, bet: &Bet) -> SportsbookResult<()> {
        let mut bets = self.bets.write().await;
        let mut slips = self.slips.write().await;
        if bets.contains_key(&bet.id) {
            return Err(SportsbookError::Duplicate { entity: "Bet", key: bet.id.to_string() });
        }
        let mut header = bet.clone();
        let legs = std::mem::take(&mut header.slips);
        slips.insert(bet.id, legs);
        bets.insert(bet.id, header);
        Ok(())
    }

    async fn save(&self, bet: &Bet) -> SportsbookResult<()> {
        let mut bets = self.bets.write().await;
        let stored = bets.get_mut(&bet.id).ok_or_else(|| SportsbookError::not_found("Bet", bet.id))?;
        stored.status = bet.status;
        stored.settled_at = bet.settled_at;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<Bet>> {
        let bets = self.bets.read().await;
        let slips = self.slips.read().await;
        Ok(bets.get(&id).map(|b| Self::hydrate(b, &slips)))
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> SportsbookResult<Vec<Bet>> {
        let bets = self.bets.read().await;
        let slips = self.slips.read().await;
        let mut found: Vec<Bet> = bets
            .values()
            .filter(|b| b.user_id == user_id)
            .map(|b| Self::hydrate(b, &slips))
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_by_game_id(&self, game_id: Uuid) -> SportsbookResult<Vec<Bet>> {
        let bets = self.bets.read().await;
        let slips = self.slips.read().await;
        let mut found: Vec<Bet> = bets
            .values()
            .filter(|b| {
                slips
                    .get(&b.id)
                    .is_some_and(|legs| legs.iter().any(|s| s.game_id == game_id))
            })
            .map(|b| Self::hydrate(b, &slips))
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn settle(&self, bet: &Bet, payout: Option<Payout>) -> SportsbookResult<bool> {
        let mut bets = self.bets.write().await;
        let mut slips = self.slips.write().await;
        let mut wallets = self.wallets.write().await;
        let mut journal = self.transactions.write().await;

        let Some(stored) = bets.get_mut(&bet.id).filter(|b| b.is_pending()) else {
            return Ok(false);
        };

        // Stage the credit before the first write.
        let credit = match payout {
            Some(payout) => {
                let mut wallet = wallets
                    .get(&payout.wallet_id)
                    .cloned()
                    .ok_or_else(|| SportsbookError::not_found("Wallet", payout.wallet_id))?;
                let entry = payout.movement().apply(&mut wallet)?;
                Some((wallet, entry))
            }
            None => None,
        };

        stored.status = bet.status;
        stored.settled_at = bet.settled_at;
        slips.insert(bet.id, bet.slips.clone());
        if let Some((wallet, entry)) = credit {
            wallets.insert(wallet.id, wallet);
            journal.push(entry);
        }
        Ok(true)
    }
}

#[async_trait]
impl BetSlipStore for InMemoryStore {
    async fn save(&self, slip: &BetSlip) -> SportsbookResult<()> {
        let mut slips = self.slips.write().await;
        let legs = slips.entry(slip.bet_id).or_default();
        match legs.iter_mut().find(|s| s.id == slip.id) {
            Some(existing) => *existing = slip.clone(),
            None => legs.push(slip.clone()),
        }
        Ok(())
    }

    async fn find_by_bet_id(&self, bet_id: Uuid) -> SportsbookResult<Vec<BetSlip>> {
        Ok(self.slips.read().await.get(&bet_id).cloned().unwrap_or_default())
    }
}

// ---- Wallets ----

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> SportsbookResult<Option<Wallet>> {
        Ok(self.wallets.read().await.get(&id).cloned())
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> SportsbookResult<Option<Wallet>> {
        Ok(self.wallets.read().await.values().find(|w| w.user_id == user_id).cloned())
    }

    async fn save(&self, wallet: &Wallet) -> SportsbookResult<()> {
        let mut wallets = self.wallets.write().await;
        let stored = wallets
            .get_mut(&wallet.id)
            .ok_or_else(|| SportsbookError::not_found("Wallet", wallet.id))?;
        stored.balance = wallet.balance;
        stored.updated_at = wallet.updated_at;
        Ok(())
    }

    async fn apply_movement(
        &self,
        wallet_id: Uuid,
        movement: WalletMovement,
    ) -> SportsbookResult<(Wallet, WalletTransaction)> {
        let mut wallets = self.wallets.write().await;
        let mut journal = self.transactions.write().await;
        let stored = wallets
            .get_mut(&wallet_id)
            .ok_or_else(|| SportsbookError::not_found("Wallet", wallet_id))?;

        let mut updated = stored.clone();
        let entry = movement.apply(&mut updated)?;
        *stored = updated.clone();
        journal.push(entry.clone());
        Ok((updated, entry))
    }

    async fn create(&self, wallet: &Wallet) -> SportsbookResult<()> {
        let mut wallets = self.wallets.write().await;
        if wallets.values().any(|w| w.user_id == wallet.user_id) {
            return Err(SportsbookError::Duplicate {
                entity: "Wallet",
                key: wallet.user_id.to_string(),
            });
        }
        wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        Ok(self.wallets.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn append(&self, entry: &WalletTransaction) -> SportsbookResult<()> {
        self.transactions.write().await.push(entry.clone());
        Ok(())
    }

    async fn find_by_wallet_id(
        &self,
        wallet_id: Uuid,
        page: Page,
    ) -> SportsbookResult<Vec<WalletTransaction>> {
        let journal = self.transactions.read().await;
        let newest_first: Vec<WalletTransaction> =
            journal.iter().rev().filter(|t| t.wallet_id == wallet_id).cloned().collect();
        Ok(paginate(newest_first, page))
    }

    async fn count_by_wallet_id(&self, wallet_id: Uuid) -> SportsbookResult<u64> {
        let journal = self.transactions.read().await;
        Ok(journal.iter().filter(|t| t.wallet_id == wallet_id).count() as u64)
    }
}

// ---- Games & leagues ----

#[async_trait]
impl GameStore for InMemoryStore {
    async fn save(&self, game: &Game) -> SportsbookResult<()> {
        self.games.write().await.insert(game.id, game.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<Game>> {
        Ok(self.games.read().await.get(&id).cloned())
    }

    async fn find_all(&self, filter: &GameFilter, page: Page) -> SportsbookResult<Vec<Game>> {
        let games = self.games.read().await;
        let mut found: Vec<Game> = games.values().filter(|g| filter.matches(g)).cloned().collect();
        found.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(paginate(found, page))
    }

    async fn count_all(&self, filter: &GameFilter) -> SportsbookResult<u64> {
        let games = self.games.read().await;
        Ok(games.values().filter(|g| filter.matches(g)).count() as u64)
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        Ok(self.games.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl LeagueStore for InMemoryStore {
    async fn save(&self, league: &League) -> SportsbookResult<()> {
        self.leagues.write().await.insert(league.id, league.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<League>> {
        Ok(self.leagues.read().await.get(&id).cloned())
    }

    async fn find_all(&self, filter: &LeagueFilter, page: Page) -> SportsbookResult<Vec<League>> {
        let leagues = self.leagues.read().await;
        let mut found: Vec<League> =
            leagues.values().filter(|l| filter.matches(l)).cloned().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(found, page))
    }

    async fn count_all(&self, filter: &LeagueFilter) -> SportsbookResult<u64> {
        let leagues = self.leagues.read().await;
        Ok(leagues.values().filter(|l| filter.matches(l)).count() as u64)
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        Ok(self.leagues.write().await.remove(&id).is_some())
    }
}

// ---- Users ----

#[async_trait]
impl UserStore for InMemoryStore {
    async fn save(&self, user: &User) -> SportsbookResult<()> {
        let mut users = self.users.write().await;
        for other in users.values().filter(|u| u.id != user.id) {
            if other.username == user.username {
                return Err(SportsbookError::Duplicate {
                    entity: "User",
                    key: user.username.to_string(),
                });
            }
            if other.email == user.email {
                return Err(SportsbookError::Duplicate {
                    entity: "User",
                    key: user.email.to_string(),
                });
            }
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> SportsbookResult<Option<User>> {
        Ok(self.users.read().await.values().find(|u| u.username.as_str() == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> SportsbookResult<Option<User>> {
        Ok(self.users.read().await.values().find(|u| u.email.as_str() == email).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
