//! Game and league reference data.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::storage::{GameStore, LeagueStore};
use crate::types::{
    Game, GameFilter, GameStatus, League, LeagueFilter, Page, Paginated, SportType,
    SportsbookError, SportsbookResult,
};

fn require_text(value: &str, field: &str) -> SportsbookResult<()> {
    if value.trim().is_empty() {
        return Err(SportsbookError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewGame {
    pub league_id: Uuid,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub betting_deadline: DateTime<Utc>,
    pub sport_type: SportType,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GameUpdate {
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub betting_deadline: Option<DateTime<Utc>>,
    pub status: Option<GameStatus>,
    /// Only `true` has an effect: it moves the game live.
    pub is_live: Option<bool>,
}

pub struct GameRegistry {
    games: Arc<dyn GameStore>,
    leagues: Arc<dyn LeagueStore>,
}

impl GameRegistry {
    pub fn new(games: Arc<dyn GameStore>, leagues: Arc<dyn LeagueStore>) -> Self {
        Self { games, leagues }
    }

    pub async fn create(&self, new: NewGame) -> SportsbookResult<Game> {
        require_text(&new.home_team, "home_team")?;
        require_text(&new.away_team, "away_team")?;
        if self.leagues.find_by_id(new.league_id).await?.is_none() {
            return Err(SportsbookError::not_found("League", new.league_id));
        }

        let mut game = Game::new(
            new.league_id,
            new.home_team,
            new.away_team,
            new.start_time,
            new.betting_deadline,
            new.sport_type,
        );
        game.external_id = new.external_id;
        self.games.save(&game).await?;

        info!(game_id = %game.id, league_id = %game.league_id, game = %game, "Game created");
        Ok(game)
    }

    pub async fn get(&self, game_id: Uuid) -> SportsbookResult<Game> {
        self.games
            .find_by_id(game_id)
            .await?
            .ok_or_else(|| SportsbookError::not_found("Game", game_id))
    }

    pub async fn list(&self, filter: GameFilter, page: Page) -> SportsbookResult<Paginated<Game>> {
        let items = self.games.find_all(&filter, page).await?;
        let total = self.games.count_all(&filter).await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn update(&self, game_id: Uuid, update: GameUpdate) -> SportsbookResult<Game> {
        let mut game = self.get(game_id).await?;

        if let Some(home) = update.home_team {
            require_text(&home, "home_team")?;
            game.home_team = home;
        }
        if let Some(away) = update.away_team {
            require_text(&away, "away_team")?;
            game.away_team = away;
        }
        if let Some(start) = update.start_time {
            game.start_time = start;
        }
        if let Some(deadline) = update.betting_deadline {
            game.betting_deadline = deadline;
        }
        if let Some(status) = update.status {
            game.change_status(status);
        }
        if update.is_live == Some(true) {
            game.to_live();
        }
        game.updated_at = Utc::now();

        self.games.save(&game).await?;
        info!(game_id = %game_id, status = %game.status, is_live = game.is_live, "Game updated");
        Ok(game)
    }

    pub async fn set_final_score(&self, game_id: Uuid, home: u32, away: u32) -> SportsbookResult<Game> {
        let mut game = self.get(game_id).await?;
        game.set_final_score(home, away)?;
        self.games.save(&game).await?;
        info!(game_id = %game_id, home, away, "Final score recorded");
        Ok(game)
    }

    pub async fn delete(&self, game_id: Uuid) -> SportsbookResult<()> {
        if !self.games.delete(game_id).await? {
            return Err(SportsbookError::not_found("Game", game_id));
        }
        info!(game_id = %game_id, "Game deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Leagues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewLeague {
    pub name: String,
    pub sport_type: SportType,
    pub country: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LeagueUpdate {
    pub name: Option<String>,
    pub country: Option<String>,
    pub is_active: Option<bool>,
}

pub struct LeagueRegistry {
    leagues: Arc<dyn LeagueStore>,
}

impl LeagueRegistry {
    pub fn new(leagues: Arc<dyn LeagueStore>) -> Self {
        Self { leagues }
    }

    pub async fn create(&self, new: NewLeague) -> SportsbookResult<League> {
        require_text(&new.name, "name")?;
        require_text(&new.country, "country")?;
        let league = League::new(new.name, new.sport_type, new.country, new.is_active);
        self.leagues.save(&league).await?;
        info!(league_id = %league.id, name = %league.name, "League created");
        Ok(league)
    }

    pub async fn get(&self, league_id: Uuid) -> SportsbookResult<League> {
        self.leagues
            .find_by_id(league_id)
            .await?
            .ok_or_else(|| SportsbookError::not_found("League", league_id))
    }

    pub async fn list(&self, filter: LeagueFilter, page: Page) -> SportsbookResult<Paginated<League>> {
        let items = self.leagues.find_all(&filter, page).await?;
        let total = self.leagues.count_all(&filter).await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn update(&self, league_id: Uuid, update: LeagueUpdate) -> SportsbookResult<League> {
        let mut league = self.get(league_id).await?;
        if let Some(name) = update.name {
            require_text(&name, "name")?;
            league.name = name;
        }
        if let Some(country) = update.country {
            require_text(&country, "country")?;
            league.country = country;
        }
        match update.is_active {
            Some(true) => league.activate(),
            Some(false) => league.deactivate(),
            None => {}
        }
        self.leagues.save(&league).await?;
        info!(league_id = %league_id, is_active = league.is_active, "League updated");
        Ok(league)
    }

    pub async fn delete(&self, league_id: Uuid) -> SportsbookResult<()> {
        if !self.leagues.delete(league_id).await? {
            return Err(SportsbookError::not_found("League", league_id));
        }
        info!(league_id = %league_id, "League deleted");
        Ok(())
    }
}
