//! Shared types for the sportsbook.
//!
//! These types form the data model used across all modules: money and odds
//! value objects, the status enums, the entities persisted by the stores,
//! and the domain error taxonomy.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Value objects
// ---------------------------------------------------------------------------

/// A non-negative amount of money. Exact decimal, never `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> SportsbookResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(SportsbookError::Domain(format!(
                "Money cannot be negative: {amount}"
            )));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, other: Money) -> SportsbookResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| SportsbookError::Domain("Money overflow".into()))
    }

    /// Subtract, failing instead of going below zero.
    pub fn checked_sub(self, other: Money) -> SportsbookResult<Money> {
        if other.0 > self.0 {
            return Err(SportsbookError::InsufficientFunds {
                needed: other.0,
                available: self.0,
            });
        }
        Ok(Money(self.0 - other.0))
    }
}

impl TryFrom<Decimal> for Money {
    type Error = SportsbookError;

    fn try_from(value: Decimal) -> SportsbookResult<Self> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decimal odds, strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Odds(Decimal);

impl Odds {
    pub const ONE: Odds = Odds(Decimal::ONE);

    pub fn new(value: Decimal) -> SportsbookResult<Self> {
        if value <= Decimal::ZERO {
            return Err(SportsbookError::Domain(format!(
                "Odds must be greater than zero, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Multiply two odds exactly. Overflow is a domain error.
    pub fn combine(self, other: Odds) -> SportsbookResult<Odds> {
        self.0
            .checked_mul(other.0)
            .map(Odds)
            .ok_or_else(|| SportsbookError::Domain("Combined odds overflow".into()))
    }

    /// Stake × odds.
    pub fn payout_for(self, stake: Money) -> SportsbookResult<Money> {
        stake
            .amount()
            .checked_mul(self.0)
            .ok_or_else(|| SportsbookError::Domain("Potential return overflow".into()))
            .and_then(Money::new)
    }
}

impl TryFrom<Decimal> for Odds {
    type Error = SportsbookError;

    fn try_from(value: Decimal) -> SportsbookResult<Self> {
        Odds::new(value)
    }
}

impl From<Odds> for Decimal {
    fn from(odds: Odds) -> Self {
        odds.0
    }
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Login name: 4–50 characters, ASCII letters, digits and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> SportsbookResult<Self> {
        let len = raw.chars().count();
        if !(4..=50).contains(&len) {
            return Err(SportsbookError::Validation(
                "Username must be between 4 and 50 characters".into(),
            ));
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SportsbookError::Validation(
                "Username may only contain letters, digits and underscores".into(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = SportsbookError;

    fn try_from(value: String) -> SportsbookResult<Self> {
        Username::parse(&value)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contact address. Only the shape is checked: non-empty, one `@` with
/// something on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> SportsbookResult<Self> {
        let raw = raw.trim();
        match raw.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(SportsbookError::Validation(format!("Invalid email address: {raw:?}"))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = SportsbookError;

    fn try_from(value: String) -> SportsbookResult<Self> {
        Email::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

fn unknown_variant(kind: &str, raw: &str) -> SportsbookError {
    SportsbookError::Validation(format!("Unknown {kind}: {raw}"))
}

/// Market type of a betting option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionType {
    WinDrawLoss,
    Handicap,
    OverUnder,
    WinnerPrediction,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::WinDrawLoss => "WIN_DRAW_LOSS",
            OptionType::Handicap => "HANDICAP",
            OptionType::OverUnder => "OVER_UNDER",
            OptionType::WinnerPrediction => "WINNER_PREDICTION",
        }
    }
}

impl FromStr for OptionType {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIN_DRAW_LOSS" => Ok(OptionType::WinDrawLoss),
            "HANDICAP" => Ok(OptionType::Handicap),
            "OVER_UNDER" => Ok(OptionType::OverUnder),
            "WINNER_PREDICTION" => Ok(OptionType::WinnerPrediction),
            other => Err(unknown_variant("option type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetType {
    Single,
    Combo,
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Single => "SINGLE",
            BetType::Combo => "COMBO",
        }
    }
}

impl FromStr for BetType {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE" => Ok(BetType::Single),
            "COMBO" => Ok(BetType::Combo),
            other => Err(unknown_variant("bet type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    Pending,
    Win,
    Loss,
    Cancelled,
}

impl BetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Pending => "PENDING",
            BetStatus::Win => "WIN",
            BetStatus::Loss => "LOSS",
            BetStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BetStatus::Pending),
            "WIN" => Ok(BetStatus::Win),
            "LOSS" => Ok(BetStatus::Loss),
            "CANCELLED" => Ok(BetStatus::Cancelled),
            other => Err(unknown_variant("bet status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlipResult {
    Pending,
    Win,
    Loss,
}

impl SlipResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlipResult::Pending => "PENDING",
            SlipResult::Win => "WIN",
            SlipResult::Loss => "LOSS",
        }
    }
}

impl FromStr for SlipResult {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SlipResult::Pending),
            "WIN" => Ok(SlipResult::Win),
            "LOSS" => Ok(SlipResult::Loss),
            other => Err(unknown_variant("slip result", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Scheduled,
    Live,
    Closed,
    Finished,
    Cancelled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "SCHEDULED",
            GameStatus::Live => "LIVE",
            GameStatus::Closed => "CLOSED",
            GameStatus::Finished => "FINISHED",
            GameStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(GameStatus::Scheduled),
            "LIVE" => Ok(GameStatus::Live),
            "CLOSED" => Ok(GameStatus::Closed),
            "FINISHED" => Ok(GameStatus::Finished),
            "CANCELLED" => Ok(GameStatus::Cancelled),
            other => Err(unknown_variant("game status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SportType {
    Soccer,
    Baseball,
    Basketball,
    Volleyball,
}

impl SportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SportType::Soccer => "SOCCER",
            SportType::Baseball => "BASEBALL",
            SportType::Basketball => "BASKETBALL",
            SportType::Volleyball => "VOLLEYBALL",
        }
    }
}

impl FromStr for SportType {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SOCCER" => Ok(SportType::Soccer),
            "BASEBALL" => Ok(SportType::Baseball),
            "BASKETBALL" => Ok(SportType::Basketball),
            "VOLLEYBALL" => Ok(SportType::Volleyball),
            other => Err(unknown_variant("sport type", other)),
        }
    }
}

/// Why a wallet balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    /// Stake debited at placement.
    Bet,
    /// Winnings credited at settlement.
    Payout,
    /// Stake returned after a failed placement.
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Bet => "BET",
            TransactionType::Payout => "PAYOUT",
            TransactionType::Refund => "REFUND",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "BET" => Ok(TransactionType::Bet),
            "PAYOUT" => Ok(TransactionType::Payout),
            "REFUND" => Ok(TransactionType::Refund),
            other => Err(unknown_variant("transaction type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl FromStr for UserRole {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(unknown_variant("user role", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Betting catalog
// ---------------------------------------------------------------------------

/// One selectable outcome on a game, with its current odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BettingOption {
    pub id: Uuid,
    pub game_id: Uuid,
    pub option_type: OptionType,
    pub option_name: String,
    pub odds: Odds,
    pub is_active: bool,
    pub handicap_value: Option<Decimal>,
    pub over_under_line: Option<Decimal>,
}

impl BettingOption {
    pub fn new(game_id: Uuid, option_type: OptionType, option_name: String, odds: Odds) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            option_type,
            option_name,
            odds,
            is_active: true,
            handicap_value: None,
            over_under_line: None,
        }
    }

    /// Take the option off the board. There is no way back.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn update_odds(&mut self, new_odds: Decimal) -> SportsbookResult<()> {
        self.odds = Odds::new(new_odds)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// One leg of a bet. `odds` is frozen at placement time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetSlip {
    pub id: Uuid,
    pub bet_id: Uuid,
    pub game_id: Uuid,
    pub option_id: Uuid,
    pub odds: Odds,
    pub result: SlipResult,
}

impl BetSlip {
    pub fn new(bet_id: Uuid, option: &BettingOption) -> Self {
        Self {
            id: Uuid::new_v4(),
            bet_id,
            game_id: option.game_id,
            option_id: option.id,
            odds: option.odds,
            result: SlipResult::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bet_type: BetType,
    pub total_amount: Money,
    pub potential_return: Money,
    pub total_odds: Odds,
    pub status: BetStatus,
    pub slips: Vec<BetSlip>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    pub fn is_pending(&self) -> bool {
        self.status == BetStatus::Pending
    }

    pub fn win(&mut self) -> SportsbookResult<()> {
        self.settle(BetStatus::Win)
    }

    pub fn lose(&mut self) -> SportsbookResult<()> {
        self.settle(BetStatus::Loss)
    }

    fn settle(&mut self, outcome: BetStatus) -> SportsbookResult<()> {
        if !self.is_pending() {
            return Err(SportsbookError::Domain(format!(
                "Bet {} is already {}",
                self.id, self.status
            )));
        }
        self.status = outcome;
        self.settled_at = Some(Utc::now());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Money,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// An empty wallet for a freshly provisioned user.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: Money::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn deposit(&mut self, amount: Decimal) -> SportsbookResult<()> {
        let amount = positive_amount(amount, "Deposit")?;
        self.balance = self.balance.checked_add(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fails with `InsufficientFunds` and leaves the balance untouched
    /// when `amount` exceeds it.
    pub fn withdraw(&mut self, amount: Decimal) -> SportsbookResult<()> {
        let amount = positive_amount(amount, "Withdrawal")?;
        self.balance = self.balance.checked_sub(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn positive_amount(amount: Decimal, what: &str) -> SportsbookResult<Money> {
    if amount <= Decimal::ZERO {
        return Err(SportsbookError::Validation(format!(
            "{what} amount must be greater than zero"
        )));
    }
    Money::new(amount)
}

/// Journal entry for a single balance movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn record(wallet: &Wallet, transaction_type: TransactionType, amount: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            transaction_type,
            amount,
            balance_after: wallet.balance,
            created_at: wallet.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

/// One balance change and the journal classification it is recorded under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalletMovement {
    pub direction: Direction,
    pub amount: Decimal,
    pub kind: TransactionType,
}

impl WalletMovement {
    pub fn credit(amount: Decimal, kind: TransactionType) -> Self {
        Self { direction: Direction::Credit, amount, kind }
    }

    pub fn debit(amount: Decimal, kind: TransactionType) -> Self {
        Self { direction: Direction::Debit, amount, kind }
    }

    /// Apply to `wallet` and return the journal entry for it. On error the
    /// wallet is left as it was.
    pub fn apply(&self, wallet: &mut Wallet) -> SportsbookResult<WalletTransaction> {
        match self.direction {
            Direction::Credit => wallet.deposit(self.amount)?,
            Direction::Debit => wallet.withdraw(self.amount)?,
        }
        Ok(WalletTransaction::record(wallet, self.kind, Money::new(self.amount)?))
    }
}

/// Credit owed to a winning bet, written together with its settlement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payout {
    pub wallet_id: Uuid,
    pub amount: Money,
}

impl Payout {
    pub fn movement(&self) -> WalletMovement {
        WalletMovement::credit(self.amount.amount(), TransactionType::Payout)
    }
}

// ---------------------------------------------------------------------------
// Games & leagues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub league_id: Uuid,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub betting_deadline: DateTime<Utc>,
    pub sport_type: SportType,
    pub status: GameStatus,
    pub is_live: bool,
    pub external_id: Option<String>,
    pub final_score_home: Option<u32>,
    pub final_score_away: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} [{}] ({})",
            self.home_team, self.away_team, self.status, self.start_time
        )
    }
}

impl Game {
    pub fn new(
        league_id: Uuid,
        home_team: String,
        away_team: String,
        start_time: DateTime<Utc>,
        betting_deadline: DateTime<Utc>,
        sport_type: SportType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            league_id,
            home_team,
            away_team,
            start_time,
            betting_deadline,
            sport_type,
            status: GameStatus::Scheduled,
            is_live: false,
            external_id: None,
            final_score_home: None,
            final_score_away: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn change_status(&mut self, status: GameStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn to_live(&mut self) {
        self.is_live = true;
        self.change_status(GameStatus::Live);
    }

    /// Record the final score. Only a live or finished game has one;
    /// recording it always leaves the game FINISHED.
    pub fn set_final_score(&mut self, home: u32, away: u32) -> SportsbookResult<()> {
        if !matches!(self.status, GameStatus::Live | GameStatus::Finished) {
            return Err(SportsbookError::Domain(format!(
                "Score can only be set on a LIVE or FINISHED game (game is {})",
                self.status
            )));
        }
        self.final_score_home = Some(home);
        self.final_score_away = Some(away);
        self.change_status(GameStatus::Finished);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: Uuid,
    pub name: String,
    pub sport_type: SportType,
    pub country: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl League {
    pub fn new(name: String, sport_type: SportType, country: String, is_active: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            sport_type,
            country,
            is_active,
            created_at: Utc::now(),
        }
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub const DEFAULT_DAILY_LIMIT: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);
const MIN_DAILY_LIMIT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
const MAX_DAILY_LIMIT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: Username,
    pub email: Email,
    pub nickname: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub role: UserRole,
    /// Self-imposed cap on the total staked per calendar day.
    pub daily_limit: Money,
    pub today_total_bet: Money,
    pub last_bet_date: Option<NaiveDate>,
    pub is_active: bool,
    /// Self-exclusion flag.
    pub is_restricted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields a user may change. `None` leaves a field alone, as does
/// an empty bank detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub email: Option<Email>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
}

fn validate_nickname(nickname: &str) -> SportsbookResult<()> {
    let len = nickname.trim().chars().count();
    if !(2..=50).contains(&len) {
        return Err(SportsbookError::Validation(
            "Nickname must be between 2 and 50 characters".into(),
        ));
    }
    Ok(())
}

impl User {
    pub fn new(username: Username, email: Email, nickname: String) -> SportsbookResult<Self> {
        validate_nickname(&nickname)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            username,
            email,
            nickname,
            bank_name: String::new(),
            account_number: String::new(),
            account_holder: String::new(),
            role: UserRole::User,
            daily_limit: Money(DEFAULT_DAILY_LIMIT),
            today_total_bet: Money::ZERO,
            last_bet_date: None,
            is_active: true,
            is_restricted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply every provided field, or none of them if one is invalid.
    pub fn update_profile(&mut self, update: ProfileUpdate) -> SportsbookResult<()> {
        if let Some(nickname) = &update.nickname {
            validate_nickname(nickname)?;
        }
        if let Some(nickname) = update.nickname {
            self.nickname = nickname;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        for (field, value) in [
            (&mut self.bank_name, update.bank_name),
            (&mut self.account_number, update.account_number),
            (&mut self.account_holder, update.account_holder),
        ] {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                *field = value;
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Between 10,000 and 1,000,000 inclusive.
    pub fn set_daily_limit(&mut self, limit: Decimal) -> SportsbookResult<()> {
        if limit < MIN_DAILY_LIMIT || limit > MAX_DAILY_LIMIT {
            return Err(SportsbookError::Validation(format!(
                "Daily limit must be between {MIN_DAILY_LIMIT} and {MAX_DAILY_LIMIT}"
            )));
        }
        self.daily_limit = Money::new(limit)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_restriction(&mut self, is_restricted: bool) {
        self.is_restricted = is_restricted;
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Queries & pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameFilter {
    pub league_id: Option<Uuid>,
    pub status: Option<GameStatus>,
    pub is_live: Option<bool>,
}

impl GameFilter {
    pub fn matches(&self, game: &Game) -> bool {
        self.league_id.map_or(true, |id| game.league_id == id)
            && self.status.map_or(true, |s| game.status == s)
            && self.is_live.map_or(true, |live| game.is_live == live)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeagueFilter {
    pub sport_type: Option<SportType>,
    pub is_active: Option<bool>,
}

impl LeagueFilter {
    pub fn matches(&self, league: &League) -> bool {
        self.sport_type.map_or(true, |s| league.sport_type == s)
            && self.is_active.map_or(true, |a| league.is_active == a)
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> SportsbookResult<Self> {
        if page == 0 {
            return Err(SportsbookError::Validation("page starts at 1".into()));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(SportsbookError::Validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
        let limit = u64::from(page.limit);
        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: total.div_ceil(limit),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the sportsbook.
#[derive(Debug, thiserror::Error)]
pub enum SportsbookError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Domain rule violated: {0}")]
    Domain(String),

    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SportsbookError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        SportsbookError::NotFound { entity, id: id.to_string() }
    }

    /// Only deadline expiry is worth retrying; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SportsbookError::Timeout(_))
    }

    /// Short machine-readable tag used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SportsbookError::Validation(_) => "validation",
            SportsbookError::NotFound { .. } => "not_found",
            SportsbookError::InsufficientFunds { .. } => "insufficient_funds",
            SportsbookError::Domain(_) => "domain",
            SportsbookError::Duplicate { .. } => "duplicate",
            SportsbookError::Unauthorized(_) => "unauthorized",
            SportsbookError::Timeout(_) => "timeout",
            SportsbookError::Storage(_) => "storage",
        }
    }
}

pub type SportsbookResult<T> = std::result::Result<T, SportsbookError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
