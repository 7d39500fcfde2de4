//! REST route handlers.
//!
//! All endpoints speak JSON. State is shared via `Arc<ApiState>`; the
//! caller's identity comes from the [`CurrentUser`] extractor.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::identity::{CurrentUser, IdentityProvider};
use crate::engine::catalog::{BettingOptionUpdate, NewBettingOption};
use crate::engine::placement::PlaceBet;
use crate::engine::registry::{GameUpdate, LeagueUpdate, NewGame, NewLeague};
use crate::engine::Services;
use crate::types::{
    Bet, BetType, BettingOption, Email, Game, GameFilter, GameStatus, League, LeagueFilter,
    OptionType, Page, Paginated, ProfileUpdate, SportType, SportsbookError, SportsbookResult,
    TransactionType, User, Wallet, WalletTransaction,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ApiState {
    pub services: Services,
    pub identity: Arc<dyn IdentityProvider>,
}

pub type AppState = Arc<ApiState>;

type ApiResult<T> = SportsbookResult<Json<T>>;

/// `Json` whose rejections use the API error body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = SportsbookError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| SportsbookError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Path` whose rejections use the API error body.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = SportsbookError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| SportsbookError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query` whose rejections use the API error body.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = SportsbookError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| SportsbookError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn page(&self) -> SportsbookResult<Page> {
        let default = Page::default();
        Page::new(self.page.unwrap_or(default.page), self.limit.unwrap_or(default.limit))
    }
}

#[derive(Debug, Deserialize)]
pub struct Selection {
    pub option_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub selections: Vec<Selection>,
    pub amount: Decimal,
    pub bet_type: BetType,
}

#[derive(Debug, Deserialize)]
pub struct SettleGameRequest {
    pub winning_option_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub bank_account: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOptionRequest {
    pub game_id: Uuid,
    pub option_type: OptionType,
    pub option_name: String,
    pub odds: Decimal,
    pub handicap_value: Option<Decimal>,
    pub over_under_line: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOptionRequest {
    pub odds: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub league_id: Uuid,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub betting_deadline: DateTime<Utc>,
    pub sport_type: SportType,
    pub external_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGameRequest {
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub betting_deadline: Option<DateTime<Utc>>,
    pub status: Option<GameStatus>,
    pub is_live: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct GameListQuery {
    pub league_id: Option<Uuid>,
    pub status: Option<GameStatus>,
    pub is_live: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct FinalScoreRequest {
    pub home_score: u32,
    pub away_score: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeagueRequest {
    pub name: String,
    pub sport_type: SportType,
    pub country: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateLeagueRequest {
    pub name: Option<String>,
    pub country: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LeagueListQuery {
    pub sport_type: Option<SportType>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub email: Option<Email>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(body: UpdateProfileRequest) -> Self {
        Self {
            nickname: body.nickname,
            email: body.email,
            bank_name: body.bank_name,
            account_number: body.account_number,
            account_holder: body.account_holder,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateLimitsRequest {
    pub daily_limit: Option<Decimal>,
    pub is_restricted: Option<bool>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

// ---- Bets ----

/// POST /bets
pub async fn place_bet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<PlaceBetRequest>,
) -> SportsbookResult<(StatusCode, Json<Bet>)> {
    let request = PlaceBet {
        user_id,
        selections: body.selections.into_iter().map(|s| s.option_id).collect(),
        amount: body.amount,
        bet_type: body.bet_type,
    };
    let bet = state.services.bets.place_bet(request).await?;
    Ok((StatusCode::CREATED, Json(bet)))
}

/// GET /bets/my-bets
pub async fn my_bets(State(state): State<AppState>, CurrentUser(user_id): CurrentUser) -> ApiResult<Vec<Bet>> {
    Ok(Json(state.services.bets.bets_for_user(user_id).await?))
}

/// GET /bets/:bet_id
pub async fn get_bet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(bet_id): ApiPath<Uuid>,
) -> ApiResult<Bet> {
    Ok(Json(state.services.bets.get_bet(user_id, bet_id).await?))
}

// ---- Wallet ----

/// POST /wallet
pub async fn create_wallet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> SportsbookResult<(StatusCode, Json<Wallet>)> {
    let wallet = state.services.ledger.create_initial_wallet(user_id).await?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

/// GET /wallet/balance
pub async fn balance(State(state): State<AppState>, CurrentUser(user_id): CurrentUser) -> ApiResult<Wallet> {
    Ok(Json(state.services.ledger.get_wallet(user_id).await?))
}

/// POST /wallet/deposit
pub async fn deposit(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<DepositRequest>,
) -> ApiResult<Wallet> {
    tracing::debug!(user_id = %user_id, method = ?body.payment_method, "Deposit requested");
    let wallet = state
        .services
        .ledger
        .deposit(user_id, body.amount, TransactionType::Deposit)
        .await?;
    Ok(Json(wallet))
}

/// POST /wallet/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<WithdrawRequest>,
) -> ApiResult<Wallet> {
    if body.bank_account.trim().chars().count() < 5 {
        return Err(SportsbookError::Validation(
            "bank_account must be at least 5 characters".into(),
        ));
    }
    let wallet = state
        .services
        .ledger
        .withdraw(user_id, body.amount, TransactionType::Withdrawal)
        .await?;
    Ok(Json(wallet))
}

/// GET /wallet/transactions
pub async fn transactions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Paginated<WalletTransaction>> {
    let page = query.page()?;
    Ok(Json(state.services.ledger.transactions(user_id, page).await?))
}

// ---- Betting options ----

/// POST /betting-options
pub async fn create_option(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateOptionRequest>,
) -> SportsbookResult<(StatusCode, Json<BettingOption>)> {
    let option = state
        .services
        .catalog
        .create(NewBettingOption {
            game_id: body.game_id,
            option_type: body.option_type,
            option_name: body.option_name,
            odds: body.odds,
            handicap_value: body.handicap_value,
            over_under_line: body.over_under_line,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(option)))
}

/// GET /betting-options/game/:game_id
pub async fn options_for_game(
    State(state): State<AppState>,
    ApiPath(game_id): ApiPath<Uuid>,
) -> ApiResult<Vec<BettingOption>> {
    Ok(Json(state.services.catalog.for_game(game_id).await?))
}

/// GET /betting-options/:option_id
pub async fn get_option(State(state): State<AppState>, ApiPath(option_id): ApiPath<Uuid>) -> ApiResult<BettingOption> {
    Ok(Json(state.services.catalog.get(option_id).await?))
}

/// PATCH /betting-options/:option_id
pub async fn update_option(
    State(state): State<AppState>,
    ApiPath(option_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateOptionRequest>,
) -> ApiResult<BettingOption> {
    let update = BettingOptionUpdate { odds: body.odds, is_active: body.is_active };
    Ok(Json(state.services.catalog.update(option_id, update).await?))
}

/// DELETE /betting-options/:option_id
pub async fn delete_option(
    State(state): State<AppState>,
    ApiPath(option_id): ApiPath<Uuid>,
) -> SportsbookResult<StatusCode> {
    state.services.catalog.delete(option_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Games ----

/// POST /games
pub async fn create_game(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateGameRequest>,
) -> SportsbookResult<(StatusCode, Json<Game>)> {
    let game = state
        .services
        .games
        .create(NewGame {
            league_id: body.league_id,
            home_team: body.home_team,
            away_team: body.away_team,
            start_time: body.start_time,
            betting_deadline: body.betting_deadline,
            sport_type: body.sport_type,
            external_id: body.external_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// GET /games
pub async fn list_games(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<GameListQuery>,
) -> ApiResult<Paginated<Game>> {
    let page = PageQuery { page: query.page, limit: query.limit }.page()?;
    let filter = GameFilter { league_id: query.league_id, status: query.status, is_live: query.is_live };
    Ok(Json(state.services.games.list(filter, page).await?))
}

/// GET /games/:game_id
pub async fn get_game(State(state): State<AppState>, ApiPath(game_id): ApiPath<Uuid>) -> ApiResult<Game> {
    Ok(Json(state.services.games.get(game_id).await?))
}

/// PATCH /games/:game_id
pub async fn update_game(
    State(state): State<AppState>,
    ApiPath(game_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateGameRequest>,
) -> ApiResult<Game> {
    let update = GameUpdate {
        home_team: body.home_team,
        away_team: body.away_team,
        start_time: body.start_time,
        betting_deadline: body.betting_deadline,
        status: body.status,
        is_live: body.is_live,
    };
    Ok(Json(state.services.games.update(game_id, update).await?))
}

/// DELETE /games/:game_id
pub async fn delete_game(State(state): State<AppState>, ApiPath(game_id): ApiPath<Uuid>) -> SportsbookResult<StatusCode> {
    state.services.games.delete(game_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /games/:game_id/score
pub async fn set_final_score(
    State(state): State<AppState>,
    ApiPath(game_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<FinalScoreRequest>,
) -> ApiResult<Game> {
    let game = state
        .services
        .games
        .set_final_score(game_id, body.home_score, body.away_score)
        .await?;
    Ok(Json(game))
}

/// POST /games/:game_id/settle
pub async fn settle_game(
    State(state): State<AppState>,
    ApiPath(game_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SettleGameRequest>,
) -> SportsbookResult<StatusCode> {
    if body.winning_option_ids.is_empty() {
        return Err(SportsbookError::Validation(
            "winning_option_ids must contain at least one option".into(),
        ));
    }
    state
        .services
        .settlement
        .settle_game(game_id, &body.winning_option_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Leagues ----

/// POST /leagues
pub async fn create_league(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateLeagueRequest>,
) -> SportsbookResult<(StatusCode, Json<League>)> {
    let league = state
        .services
        .leagues
        .create(NewLeague {
            name: body.name,
            sport_type: body.sport_type,
            country: body.country,
            is_active: body.is_active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(league)))
}

/// GET /leagues
pub async fn list_leagues(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LeagueListQuery>,
) -> ApiResult<Paginated<League>> {
    let page = PageQuery { page: query.page, limit: query.limit }.page()?;
    let filter = LeagueFilter { sport_type: query.sport_type, is_active: query.is_active };
    Ok(Json(state.services.leagues.list(filter, page).await?))
}

/// GET /leagues/:league_id
pub async fn get_league(State(state): State<AppState>, ApiPath(league_id): ApiPath<Uuid>) -> ApiResult<League> {
    Ok(Json(state.services.leagues.get(league_id).await?))
}

/// PATCH /leagues/:league_id
pub async fn update_league(
    State(state): State<AppState>,
    ApiPath(league_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateLeagueRequest>,
) -> ApiResult<League> {
    let update = LeagueUpdate { name: body.name, country: body.country, is_active: body.is_active };
    Ok(Json(state.services.leagues.update(league_id, update).await?))
}

/// DELETE /leagues/:league_id
pub async fn delete_league(
    State(state): State<AppState>,
    ApiPath(league_id): ApiPath<Uuid>,
) -> SportsbookResult<StatusCode> {
    state.services.leagues.delete(league_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- Users ----

/// POST /users
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> SportsbookResult<(StatusCode, Json<User>)> {
    let user = state.services.users.register(&body.username, &body.email, &body.nickname).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/me
pub async fn me(State(state): State<AppState>, CurrentUser(user_id): CurrentUser) -> ApiResult<User> {
    Ok(Json(state.services.users.profile(user_id).await?))
}

/// PATCH /users/me
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> ApiResult<User> {
    Ok(Json(state.services.users.update_profile(user_id, body.into()).await?))
}

/// PATCH /users/me/limits
pub async fn update_my_limits(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<UpdateLimitsRequest>,
) -> ApiResult<User> {
    let users = &state.services.users;
    Ok(Json(users.update_limits(user_id, body.daily_limit, body.is_restricted).await?))
}
