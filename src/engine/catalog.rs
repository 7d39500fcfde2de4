//! Betting catalog: the options offered on each game.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::{BettingOptionStore, GameStore};
use crate::types::{BettingOption, Odds, OptionType, SportsbookError, SportsbookResult};

#[derive(Debug, Clone)]
pub struct NewBettingOption {
    pub game_id: Uuid,
    pub option_type: OptionType,
    pub option_name: String,
    pub odds: Decimal,
    pub handicap_value: Option<Decimal>,
    pub over_under_line: Option<Decimal>,
}

/// Partial update. `is_active: Some(true)` is ignored: deactivation is final.
#[derive(Debug, Clone, Default)]
pub struct BettingOptionUpdate {
    pub odds: Option<Decimal>,
    pub is_active: Option<bool>,
}

pub struct BettingCatalog {
    options: Arc<dyn BettingOptionStore>,
    games: Arc<dyn GameStore>,
}

impl BettingCatalog {
    pub fn new(options: Arc<dyn BettingOptionStore>, games: Arc<dyn GameStore>) -> Self {
        Self { options, games }
    }

    pub async fn create(&self, new: NewBettingOption) -> SportsbookResult<BettingOption> {
        if new.option_name.trim().is_empty() {
            return Err(SportsbookError::Validation("Option name cannot be empty".into()));
        }
        let odds = Odds::new(new.odds)?;
        if self.games.find_by_id(new.game_id).await?.is_none() {
            return Err(SportsbookError::not_found("Game", new.game_id));
        }

        let mut option = BettingOption::new(new.game_id, new.option_type, new.option_name, odds);
        option.handicap_value = new.handicap_value;
        option.over_under_line = new.over_under_line;
        self.options.save(&option).await?;

        info!(
            option_id = %option.id,
            game_id = %option.game_id,
            option_type = option.option_type.as_str(),
            odds = %option.odds,
            "Betting option created"
        );
        Ok(option)
    }

    pub async fn get(&self, option_id: Uuid) -> SportsbookResult<BettingOption> {
        self.options
            .find_by_id(option_id)
            .await?
            .ok_or_else(|| SportsbookError::not_found("Betting option", option_id))
    }

    pub async fn for_game(&self, game_id: Uuid) -> SportsbookResult<Vec<BettingOption>> {
        self.options.find_by_game_id(game_id).await
    }

    pub async fn update(
        &self,
        option_id: Uuid,
        update: BettingOptionUpdate,
    ) -> SportsbookResult<BettingOption> {
        let mut option = self.get(option_id).await?;

        if let Some(odds) = update.odds {
            option.update_odds(odds)?;
        }
        match update.is_active {
            Some(false) => option.deactivate(),
            Some(true) if !option.is_active => {
                debug!(option_id = %option_id, "Ignoring re-activation of betting option");
            }
            _ => {}
        }

        self.options.save(&option).await?;
        info!(option_id = %option_id, odds = %option.odds, is_active = option.is_active, "Betting option updated");
        Ok(option)
    }

    pub async fn update_odds(&self, option_id: Uuid, odds: Decimal) -> SportsbookResult<BettingOption> {
        self.update(option_id, BettingOptionUpdate { odds: Some(odds), is_active: None }).await
    }

    pub async fn deactivate(&self, option_id: Uuid) -> SportsbookResult<BettingOption> {
        self.update(option_id, BettingOptionUpdate { odds: None, is_active: Some(false) }).await
    }

    pub async fn delete(&self, option_id: Uuid) -> SportsbookResult<()> {
        if !self.options.delete(option_id).await? {
            return Err(SportsbookError::not_found("Betting option", option_id));
        }
        info!(option_id = %option_id, "Betting option deleted");
        Ok(())
    }
}
