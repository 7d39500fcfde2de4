//! Shared setup: services over a fresh store, plus seeded reference data.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use sportsbook::config::BettingConfig;
use sportsbook::engine::catalog::NewBettingOption;
use sportsbook::engine::placement::PlaceBet;
use sportsbook::engine::registry::{NewGame, NewLeague};
use sportsbook::engine::Services;
use sportsbook::storage::Stores;
use sportsbook::types::{Bet, BetType, BettingOption, Game, OptionType, SportType, TransactionType};

pub struct World {
    pub stores: Stores,
    pub services: Services,
}

impl World {
    pub fn in_memory() -> Self {
        Self::over(Stores::in_memory())
    }

    pub fn over(stores: Stores) -> Self {
        let services = Services::new(stores.clone(), &BettingConfig::default());
        Self { stores, services }
    }

    pub async fn game(&self) -> Game {
        let league = self
            .services
            .leagues
            .create(NewLeague {
                name: "Champions".into(),
                sport_type: SportType::Soccer,
                country: "EU".into(),
                is_active: true,
            })
            .await
            .unwrap();
        let start = Utc::now() + Duration::hours(4);
        self.services
            .games
            .create(NewGame {
                league_id: league.id,
                home_team: "North".into(),
                away_team: "South".into(),
                start_time: start,
                betting_deadline: start - Duration::minutes(15),
                sport_type: SportType::Soccer,
                external_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn option(&self, game: &Game, name: &str, odds: Decimal) -> BettingOption {
        self.services
            .catalog
            .create(NewBettingOption {
                game_id: game.id,
                option_type: OptionType::WinDrawLoss,
                option_name: name.into(),
                odds,
                handicap_value: None,
                over_under_line: None,
            })
            .await
            .unwrap()
    }

    pub async fn user_with(&self, amount: Decimal) -> Uuid {
        let user_id = Uuid::new_v4();
        self.services.ledger.create_initial_wallet(user_id).await.unwrap();
        self.services
            .ledger
            .deposit(user_id, amount, TransactionType::Deposit)
            .await
            .unwrap();
        user_id
    }

    pub async fn bet(&self, user_id: Uuid, selections: &[&BettingOption], amount: Decimal) -> Bet {
        let bet_type = if selections.len() > 1 { BetType::Combo } else { BetType::Single };
        self.services
            .bets
            .place_bet(PlaceBet {
                user_id,
                selections: selections.iter().map(|o| o.id).collect(),
                amount,
                bet_type,
            })
            .await
            .unwrap()
    }

    pub async fn balance(&self, user_id: Uuid) -> Decimal {
        self.services.ledger.get_wallet(user_id).await.unwrap().balance.amount()
    }
}
