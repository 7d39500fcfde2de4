//! SQLite backend.
//!
//! Decimals, uuids and timestamps are stored as TEXT. Timestamps use a
//! fixed-width RFC 3339 form so ORDER BY on them is chronological.
//!
//! Balance changes are compare-and-set on the previously read balance
//! text, so several processes may share one database file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions},
    Pool, QueryBuilder, Sqlite, SqliteConnection,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    BetSlipStore, BetStore, BettingOptionStore, GameStore, LeagueStore, TransactionStore,
    UserStore, WalletStore,
};
use crate::types::{
    Bet, BetSlip, BetStatus, BettingOption, Email, Game, GameFilter, League, LeagueFilter, Money,
    Odds, Page, Payout, SportsbookError, SportsbookResult, User, Username, Wallet, WalletMovement,
    WalletTransaction,
};

/// Compare-and-set rounds before a contended movement gives up.
const MOVEMENT_ATTEMPTS: u32 = 16;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS leagues (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        sport_type TEXT NOT NULL,
        country TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS games (
        id TEXT PRIMARY KEY,
        league_id TEXT NOT NULL,
        home_team TEXT NOT NULL,
        away_team TEXT NOT NULL,
        start_time TEXT NOT NULL,
        betting_deadline TEXT NOT NULL,
        sport_type TEXT NOT NULL,
        status TEXT NOT NULL,
        is_live INTEGER NOT NULL,
        external_id TEXT,
        final_score_home INTEGER,
        final_score_away INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_games_league ON games (league_id)",
    "CREATE INDEX IF NOT EXISTS idx_games_start ON games (start_time)",
    r#"
    CREATE TABLE IF NOT EXISTS betting_options (
        id TEXT PRIMARY KEY,
        game_id TEXT NOT NULL,
        option_type TEXT NOT NULL,
        option_name TEXT NOT NULL,
        odds TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        handicap_value TEXT,
        over_under_line TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_options_game ON betting_options (game_id)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        nickname TEXT NOT NULL,
        bank_name TEXT NOT NULL DEFAULT '',
        account_number TEXT NOT NULL DEFAULT '',
        account_holder TEXT NOT NULL DEFAULT '',
        role TEXT NOT NULL,
        daily_limit TEXT NOT NULL,
        today_total_bet TEXT NOT NULL,
        last_bet_date TEXT,
        is_active INTEGER NOT NULL,
        is_restricted INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wallets (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL UNIQUE,
        balance TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wallet_transactions (
        id TEXT PRIMARY KEY,
        wallet_id TEXT NOT NULL,
        transaction_type TEXT NOT NULL,
        amount TEXT NOT NULL,
        balance_after TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_wallet ON wallet_transactions (wallet_id)",
    r#"
    CREATE TABLE IF NOT EXISTS bets (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        bet_type TEXT NOT NULL,
        total_amount TEXT NOT NULL,
        potential_return TEXT NOT NULL,
        total_odds TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        settled_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_bets_user ON bets (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS bet_slips (
        id TEXT PRIMARY KEY,
        bet_id TEXT NOT NULL REFERENCES bets (id) ON DELETE CASCADE,
        game_id TEXT NOT NULL,
        option_id TEXT NOT NULL,
        odds TEXT NOT NULL,
        result TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_slips_bet ON bet_slips (bet_id)",
    "CREATE INDEX IF NOT EXISTS idx_slips_game ON bet_slips (game_id)",
];

impl From<sqlx::Error> for SportsbookError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => SportsbookError::Timeout("database pool".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => SportsbookError::Duplicate {
                entity: "Record",
                key: db.message().to_string(),
            },
            _ => SportsbookError::Storage(err.to_string()),
        }
    }
}

/// SQLite-backed implementation of every repository trait.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and
    /// bootstrap the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            if let Some(path) = database_url
                .strip_prefix("sqlite://")
                .or_else(|| database_url.strip_prefix("sqlite:"))
            {
                let path = path.split('?').next().unwrap_or(path);
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .context("Failed to create database directory")?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to :memory: is its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(url = %database_url, "SQLite store initialized");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to initialize schema")?;
        }
        Ok(())
    }

    async fn load_slips(&self, bet_id: &str) -> SportsbookResult<Vec<BetSlip>> {
        let rows = sqlx::query_as::<_, SlipRow>(
            "SELECT * FROM bet_slips WHERE bet_id = ? ORDER BY rowid ASC",
        )
        .bind(bet_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BetSlip::try_from).collect()
    }

    async fn hydrate(&self, rows: Vec<BetRow>) -> SportsbookResult<Vec<Bet>> {
        let mut bets = Vec::with_capacity(rows.len());
        for row in rows {
            let slips = self.load_slips(&row.id).await?;
            let mut bet = Bet::try_from(row)?;
            bet.slips = slips;
            bets.push(bet);
        }
        Ok(bets)
    }

    /// Move the balance from `before` to the result of `movement` and
    /// append the journal row. `None` when the stored balance no longer
    /// matches `before`; nothing has been written in that case.
    async fn write_movement(
        conn: &mut SqliteConnection,
        before: &Wallet,
        movement: &WalletMovement,
    ) -> SportsbookResult<Option<(Wallet, WalletTransaction)>> {
        let mut after = before.clone();
        let entry = movement.apply(&mut after)?;

        let swapped = sqlx::query(
            "UPDATE wallets SET balance = ?, updated_at = ? WHERE id = ? AND balance = ?",
        )
        .bind(after.balance.to_string())
        .bind(fmt_time(&after.updated_at))
        .bind(after.id.to_string())
        .bind(before.balance.to_string())
        .execute(&mut *conn)
        .await?;
        if swapped.rows_affected() == 0 {
            return Ok(None);
        }

        insert_journal(&entry).execute(&mut *conn).await?;
        Ok(Some((after, entry)))
    }
}

fn insert_journal(
    entry: &WalletTransaction,
) -> sqlx::query::Query<'static, Sqlite, SqliteArguments<'static>> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id, wallet_id, transaction_type, amount, balance_after, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.wallet_id.to_string())
    .bind(entry.transaction_type.as_str())
    .bind(entry.amount.to_string())
    .bind(entry.balance_after.to_string())
    .bind(fmt_time(&entry.created_at))
}

// ---- Column codecs ----

fn fmt_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> SportsbookResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", raw, e))
}

fn parse_date(raw: &str) -> SportsbookResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| corrupt("date", raw, e))
}

fn parse_uuid(raw: &str) -> SportsbookResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| corrupt("uuid", raw, e))
}

fn parse_decimal(raw: &str) -> SportsbookResult<Decimal> {
    Decimal::from_str(raw).map_err(|e| corrupt("decimal", raw, e))
}

fn parse_money(raw: &str) -> SportsbookResult<Money> {
    parse_decimal(raw).and_then(Money::new)
}

fn parse_odds(raw: &str) -> SportsbookResult<Odds> {
    parse_decimal(raw).and_then(Odds::new)
}

fn parse_label<T: FromStr<Err = SportsbookError>>(raw: &str) -> SportsbookResult<T> {
    raw.parse().map_err(|e: SportsbookError| corrupt("label", raw, e))
}

fn corrupt(what: &str, raw: &str, err: impl std::fmt::Display) -> SportsbookError {
    SportsbookError::Storage(format!("Corrupt {what} column {raw:?}: {err}"))
}

fn score_column(score: Option<u32>) -> Option<i64> {
    score.map(i64::from)
}

fn parse_score(raw: Option<i64>) -> SportsbookResult<Option<u32>> {
    raw.map(|s| u32::try_from(s).map_err(|e| corrupt("score", &s.to_string(), e)))
        .transpose()
}

// ---- Rows ----

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: String,
    game_id: String,
    option_type: String,
    option_name: String,
    odds: String,
    is_active: bool,
    handicap_value: Option<String>,
    over_under_line: Option<String>,
}

impl TryFrom<OptionRow> for BettingOption {
    type Error = SportsbookError;

    fn try_from(row: OptionRow) -> SportsbookResult<Self> {
        Ok(BettingOption {
            id: parse_uuid(&row.id)?,
            game_id: parse_uuid(&row.game_id)?,
            option_type: parse_label(&row.option_type)?,
            option_name: row.option_name,
            odds: parse_odds(&row.odds)?,
            is_active: row.is_active,
            handicap_value: row.handicap_value.as_deref().map(parse_decimal).transpose()?,
            over_under_line: row.over_under_line.as_deref().map(parse_decimal).transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BetRow {
    id: String,
    user_id: String,
    bet_type: String,
    total_amount: String,
    potential_return: String,
    total_odds: String,
    status: String,
    created_at: String,
    settled_at: Option<String>,
}

impl TryFrom<BetRow> for Bet {
    type Error = SportsbookError;

    fn try_from(row: BetRow) -> SportsbookResult<Self> {
        Ok(Bet {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            bet_type: parse_label(&row.bet_type)?,
            total_amount: parse_money(&row.total_amount)?,
            potential_return: parse_money(&row.potential_return)?,
            total_odds: parse_odds(&row.total_odds)?,
            status: parse_label(&row.status)?,
            slips: Vec::new(),
            created_at: parse_time(&row.created_at)?,
            settled_at: row.settled_at.as_deref().map(parse_time).transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SlipRow {
    id: String,
    bet_id: String,
    game_id: String,
    option_id: String,
    odds: String,
    result: String,
}

impl TryFrom<SlipRow> for BetSlip {
    type Error = SportsbookError;

    fn try_from(row: SlipRow) -> SportsbookResult<Self> {
        Ok(BetSlip {
            id: parse_uuid(&row.id)?,
            bet_id: parse_uuid(&row.bet_id)?,
            game_id: parse_uuid(&row.game_id)?,
            option_id: parse_uuid(&row.option_id)?,
            odds: parse_odds(&row.odds)?,
            result: parse_label(&row.result)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WalletRow {
    id: String,
    user_id: String,
    balance: String,
    updated_at: String,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = SportsbookError;

    fn try_from(row: WalletRow) -> SportsbookResult<Self> {
        Ok(Wallet {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            balance: parse_money(&row.balance)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    wallet_id: String,
    transaction_type: String,
    amount: String,
    balance_after: String,
    created_at: String,
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = SportsbookError;

    fn try_from(row: TransactionRow) -> SportsbookResult<Self> {
        Ok(WalletTransaction {
            id: parse_uuid(&row.id)?,
            wallet_id: parse_uuid(&row.wallet_id)?,
            transaction_type: parse_label(&row.transaction_type)?,
            amount: parse_money(&row.amount)?,
            balance_after: parse_money(&row.balance_after)?,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GameRow {
    id: String,
    league_id: String,
    home_team: String,
    away_team: String,
    start_time: String,
    betting_deadline: String,
    sport_type: String,
    status: String,
    is_live: bool,
    external_id: Option<String>,
    final_score_home: Option<i64>,
    final_score_away: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<GameRow> for Game {
    type Error = SportsbookError;

    fn try_from(row: GameRow) -> SportsbookResult<Self> {
        Ok(Game {
            id: parse_uuid(&row.id)?,
            league_id: parse_uuid(&row.league_id)?,
            home_team: row.home_team,
            away_team: row.away_team,
            start_time: parse_time(&row.start_time)?,
            betting_deadline: parse_time(&row.betting_deadline)?,
            sport_type: parse_label(&row.sport_type)?,
            status: parse_label(&row.status)?,
            is_live: row.is_live,
            external_id: row.external_id,
            final_score_home: parse_score(row.final_score_home)?,
            final_score_away: parse_score(row.final_score_away)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LeagueRow {
    id: String,
    name: String,
    sport_type: String,
    country: String,
    is_active: bool,
    created_at: String,
}

impl TryFrom<LeagueRow> for League {
    type Error = SportsbookError;

    fn try_from(row: LeagueRow) -> SportsbookResult<Self> {
        Ok(League {
            id: parse_uuid(&row.id)?,
            name: row.name,
            sport_type: parse_label(&row.sport_type)?,
            country: row.country,
            is_active: row.is_active,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    nickname: String,
    bank_name: String,
    account_number: String,
    account_holder: String,
    role: String,
    daily_limit: String,
    today_total_bet: String,
    last_bet_date: Option<String>,
    is_active: bool,
    is_restricted: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = SportsbookError;

    fn try_from(row: UserRow) -> SportsbookResult<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            username: Username::parse(&row.username)
                .map_err(|e| corrupt("username", &row.username, e))?,
            email: Email::parse(&row.email).map_err(|e| corrupt("email", &row.email, e))?,
            nickname: row.nickname,
            bank_name: row.bank_name,
            account_number: row.account_number,
            account_holder: row.account_holder,
            role: parse_label(&row.role)?,
            daily_limit: parse_money(&row.daily_limit)?,
            today_total_bet: parse_money(&row.today_total_bet)?,
            last_bet_date: row.last_bet_date.as_deref().map(parse_date).transpose()?,
            is_active: row.is_active,
            is_restricted: row.is_restricted,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

// ---- Filters ----

fn push_game_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &GameFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(league_id) = filter.league_id {
        qb.push(" AND league_id = ").push_bind(league_id.to_string());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(is_live) = filter.is_live {
        qb.push(" AND is_live = ").push_bind(is_live);
    }
}

fn push_league_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &LeagueFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(sport_type) = filter.sport_type {
        qb.push(" AND sport_type = ").push_bind(sport_type.as_str());
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Sqlite>, page: Page) {
    qb.push(" LIMIT ")
        .push_bind(i64::from(page.limit))
        .push(" OFFSET ")
        .push_bind(page.offset() as i64);
}

// ---- Betting options ----

#[async_trait]
impl BettingOptionStore for SqliteStore {
    async fn save(&self, option: &BettingOption) -> SportsbookResult<()> {
        sqlx::query(
            r#"
            INSERT INTO betting_options (
                id, game_id, option_type, option_name, odds, is_active,
                handicap_value, over_under_line
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                option_type = excluded.option_type,
                option_name = excluded.option_name,
                odds = excluded.odds,
                is_active = excluded.is_active,
                handicap_value = excluded.handicap_value,
                over_under_line = excluded.over_under_line
            "#,
        )
        .bind(option.id.to_string())
        .bind(option.game_id.to_string())
        .bind(option.option_type.as_str())
        .bind(&option.option_name)
        .bind(option.odds.to_string())
        .bind(option.is_active)
        .bind(option.handicap_value.map(|d| d.to_string()))
        .bind(option.over_under_line.map(|d| d.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<BettingOption>> {
        sqlx::query_as::<_, OptionRow>("SELECT * FROM betting_options WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(BettingOption::try_from)
            .transpose()
    }

    async fn find_by_game_id(&self, game_id: Uuid) -> SportsbookResult<Vec<BettingOption>> {
        let rows = sqlx::query_as::<_, OptionRow>(
            "SELECT * FROM betting_options WHERE game_id = ? ORDER BY option_name",
        )
        .bind(game_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BettingOption::try_from).collect()
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        let result = sqlx::query("DELETE FROM betting_options WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---- Bets ----

#[async_trait]
impl BetStore for SqliteStore {
    async fn create(&self, bet: &Bet) -> SportsbookResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO bets (
                id, user_id, bet_type, total_amount, potential_return,
                total_odds, status, created_at, settled_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(bet.id.to_string())
        .bind(bet.user_id.to_string())
        .bind(bet.bet_type.as_str())
        .bind(bet.total_amount.to_string())
        .bind(bet.potential_return.to_string())
        .bind(bet.total_odds.to_string())
        .bind(bet.status.as_str())
        .bind(fmt_time(&bet.created_at))
        .bind(bet.settled_at.as_ref().map(fmt_time))
        .execute(&mut *tx)
        .await?;

        for slip in &bet.slips {
            sqlx::query(
                r#"
                INSERT INTO bet_slips (id, bet_id, game_id, option_id, odds, result)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(slip.id.to_string())
            .bind(slip.bet_id.to_string())
            .bind(slip.game_id.to_string())
            .bind(slip.option_id.to_string())
            .bind(slip.odds.to_string())
            .bind(slip.result.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, bet: &Bet) -> SportsbookResult<()> {
        let result = sqlx::query("UPDATE bets SET status = ?, settled_at = ? WHERE id = ?")
            .bind(bet.status.as_str())
            .bind(bet.settled_at.as_ref().map(fmt_time))
            .bind(bet.id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SportsbookError::not_found("Bet", bet.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<Bet>> {
        let row = sqlx::query_as::<_, BetRow>("SELECT * FROM bets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> SportsbookResult<Vec<Bet>> {
        let rows = sqlx::query_as::<_, BetRow>(
            "SELECT * FROM bets WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn find_by_game_id(&self, game_id: Uuid) -> SportsbookResult<Vec<Bet>> {
        let rows = sqlx::query_as::<_, BetRow>(
            r#"
            SELECT * FROM bets
            WHERE id IN (SELECT bet_id FROM bet_slips WHERE game_id = ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(game_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn settle(&self, bet: &Bet, payout: Option<Payout>) -> SportsbookResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Claiming the row first makes this transaction the only writer.
        let claimed = sqlx::query(
            "UPDATE bets SET status = ?, settled_at = ? WHERE id = ? AND status = ?",
        )
        .bind(bet.status.as_str())
        .bind(bet.settled_at.as_ref().map(fmt_time))
        .bind(bet.id.to_string())
        .bind(BetStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for slip in &bet.slips {
            sqlx::query("UPDATE bet_slips SET result = ? WHERE id = ? AND bet_id = ?")
                .bind(slip.result.as_str())
                .bind(slip.id.to_string())
                .bind(bet.id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        if let Some(payout) = payout {
            let before = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE id = ?")
                .bind(payout.wallet_id.to_string())
                .fetch_optional(&mut *tx)
                .await?
                .map(Wallet::try_from)
                .transpose()?
                .ok_or_else(|| SportsbookError::not_found("Wallet", payout.wallet_id))?;
            if Self::write_movement(&mut *tx, &before, &payout.movement()).await?.is_none() {
                return Err(SportsbookError::Storage(format!(
                    "Wallet {} changed during settlement",
                    payout.wallet_id
                )));
            }
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl BetSlipStore for SqliteStore {
    async fn save(&self, slip: &BetSlip) -> SportsbookResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bet_slips (id, bet_id, game_id, option_id, odds, result)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET result = excluded.result
            "#,
        )
        .bind(slip.id.to_string())
        .bind(slip.bet_id.to_string())
        .bind(slip.game_id.to_string())
        .bind(slip.option_id.to_string())
        .bind(slip.odds.to_string())
        .bind(slip.result.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_bet_id(&self, bet_id: Uuid) -> SportsbookResult<Vec<BetSlip>> {
        self.load_slips(&bet_id.to_string()).await
    }
}

// ---- Wallets ----

#[async_trait]
impl WalletStore for SqliteStore {
    async fn get_by_id(&self, id: Uuid) -> SportsbookResult<Option<Wallet>> {
        sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Wallet::try_from)
            .transpose()
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> SportsbookResult<Option<Wallet>> {
        sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Wallet::try_from)
            .transpose()
    }

    async fn save(&self, wallet: &Wallet) -> SportsbookResult<()> {
        let result = sqlx::query("UPDATE wallets SET balance = ?, updated_at = ? WHERE id = ?")
            .bind(wallet.balance.to_string())
            .bind(fmt_time(&wallet.updated_at))
            .bind(wallet.id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SportsbookError::not_found("Wallet", wallet.id));
        }
        Ok(())
    }

    async fn apply_movement(
        &self,
        wallet_id: Uuid,
        movement: WalletMovement,
    ) -> SportsbookResult<(Wallet, WalletTransaction)> {
        for attempt in 1..=MOVEMENT_ATTEMPTS {
            let before = self
                .get_by_id(wallet_id)
                .await?
                .ok_or_else(|| SportsbookError::not_found("Wallet", wallet_id))?;

            let mut tx = self.pool.begin().await?;
            match Self::write_movement(&mut *tx, &before, &movement).await? {
                Some(done) => {
                    tx.commit().await?;
                    return Ok(done);
                }
                None => {
                    tx.rollback().await?;
                    debug!(wallet_id = %wallet_id, attempt, "Wallet balance moved concurrently, retrying");
                }
            }
        }
        Err(SportsbookError::Timeout(format!("wallet {wallet_id} update under contention")))
    }

    async fn create(&self, wallet: &Wallet) -> SportsbookResult<()> {
        sqlx::query("INSERT INTO wallets (id, user_id, balance, updated_at) VALUES (?, ?, ?, ?)")
            .bind(wallet.id.to_string())
            .bind(wallet.user_id.to_string())
            .bind(wallet.balance.to_string())
            .bind(fmt_time(&wallet.updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| match SportsbookError::from(e) {
                SportsbookError::Duplicate { .. } => SportsbookError::Duplicate {
                    entity: "Wallet",
                    key: wallet.user_id.to_string(),
                },
                other => other,
            })?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        let result = sqlx::query("DELETE FROM wallets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn append(&self, entry: &WalletTransaction) -> SportsbookResult<()> {
        insert_journal(entry).execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_wallet_id(
        &self,
        wallet_id: Uuid,
        page: Page,
    ) -> SportsbookResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE wallet_id = ?
            ORDER BY rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(wallet_id.to_string())
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WalletTransaction::try_from).collect()
    }

    async fn count_by_wallet_id(&self, wallet_id: Uuid) -> SportsbookResult<u64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM wallet_transactions WHERE wallet_id = ?")
                .bind(wallet_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0 as u64)
    }
}

// ---- Games & leagues ----

#[async_trait]
impl GameStore for SqliteStore {
    async fn save(&self, game: &Game) -> SportsbookResult<()> {
        sqlx::query(
            r#"
            INSERT INTO games (
                id, league_id, home_team, away_team, start_time, betting_deadline,
                sport_type, status, is_live, external_id, final_score_home,
                final_score_away, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                league_id = excluded.league_id,
                home_team = excluded.home_team,
                away_team = excluded.away_team,
                start_time = excluded.start_time,
                betting_deadline = excluded.betting_deadline,
                sport_type = excluded.sport_type,
                status = excluded.status,
                is_live = excluded.is_live,
                external_id = excluded.external_id,
                final_score_home = excluded.final_score_home,
                final_score_away = excluded.final_score_away,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(game.id.to_string())
        .bind(game.league_id.to_string())
        .bind(&game.home_team)
        .bind(&game.away_team)
        .bind(fmt_time(&game.start_time))
        .bind(fmt_time(&game.betting_deadline))
        .bind(game.sport_type.as_str())
        .bind(game.status.as_str())
        .bind(game.is_live)
        .bind(game.external_id.as_deref())
        .bind(score_column(game.final_score_home))
        .bind(score_column(game.final_score_away))
        .bind(fmt_time(&game.created_at))
        .bind(fmt_time(&game.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<Game>> {
        sqlx::query_as::<_, GameRow>("SELECT * FROM games WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Game::try_from)
            .transpose()
    }

    async fn find_all(&self, filter: &GameFilter, page: Page) -> SportsbookResult<Vec<Game>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM games");
        push_game_filter(&mut qb, filter);
        qb.push(" ORDER BY start_time ASC, id ASC");
        push_page(&mut qb, page);
        let rows = qb.build_query_as::<GameRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Game::try_from).collect()
    }

    async fn count_all(&self, filter: &GameFilter) -> SportsbookResult<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM games");
        push_game_filter(&mut qb, filter);
        let row: (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(row.0 as u64)
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        let result = sqlx::query("DELETE FROM games WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LeagueStore for SqliteStore {
    async fn save(&self, league: &League) -> SportsbookResult<()> {
        sqlx::query(
            r#"
            INSERT INTO leagues (id, name, sport_type, country, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                sport_type = excluded.sport_type,
                country = excluded.country,
                is_active = excluded.is_active
            "#,
        )
        .bind(league.id.to_string())
        .bind(&league.name)
        .bind(league.sport_type.as_str())
        .bind(&league.country)
        .bind(league.is_active)
        .bind(fmt_time(&league.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<League>> {
        sqlx::query_as::<_, LeagueRow>("SELECT * FROM leagues WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(League::try_from)
            .transpose()
    }

    async fn find_all(&self, filter: &LeagueFilter, page: Page) -> SportsbookResult<Vec<League>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM leagues");
        push_league_filter(&mut qb, filter);
        qb.push(" ORDER BY name ASC, id ASC");
        push_page(&mut qb, page);
        let rows = qb.build_query_as::<LeagueRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(League::try_from).collect()
    }

    async fn count_all(&self, filter: &LeagueFilter) -> SportsbookResult<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM leagues");
        push_league_filter(&mut qb, filter);
        let row: (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(row.0 as u64)
    }

    async fn delete(&self, id: Uuid) -> SportsbookResult<bool> {
        let result = sqlx::query("DELETE FROM leagues WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---- Users ----

#[async_trait]
impl UserStore for SqliteStore {
    async fn save(&self, user: &User) -> SportsbookResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, nickname, bank_name, account_number, account_holder,
                role, daily_limit, today_total_bet, last_bet_date, is_active, is_restricted,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                nickname = excluded.nickname,
                bank_name = excluded.bank_name,
                account_number = excluded.account_number,
                account_holder = excluded.account_holder,
                role = excluded.role,
                daily_limit = excluded.daily_limit,
                today_total_bet = excluded.today_total_bet,
                last_bet_date = excluded.last_bet_date,
                is_active = excluded.is_active,
                is_restricted = excluded.is_restricted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user.id.to_string())
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.nickname)
        .bind(&user.bank_name)
        .bind(&user.account_number)
        .bind(&user.account_holder)
        .bind(user.role.as_str())
        .bind(user.daily_limit.to_string())
        .bind(user.today_total_bet.to_string())
        .bind(user.last_bet_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(user.is_active)
        .bind(user.is_restricted)
        .bind(fmt_time(&user.created_at))
        .bind(fmt_time(&user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match SportsbookError::from(e) {
            SportsbookError::Duplicate { key, .. } => SportsbookError::Duplicate {
                entity: "User",
                key: if key.contains("users.email") {
                    user.email.to_string()
                } else {
                    user.username.to_string()
                },
            },
            other => other,
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> SportsbookResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> SportsbookResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Stores;
    use crate::types::{
        BetStatus, BetType, GameStatus, OptionType, SlipResult, SportType, TransactionType,
    };
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn stores() -> Stores {
        let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
        Stores::from_backend(Arc::new(store))
    }

    fn game() -> Game {
        let start = Utc::now() + Duration::days(2);
        Game::new(
            Uuid::new_v4(),
            "Lions".into(),
            "Tigers".into(),
            start,
            start - Duration::hours(1),
            SportType::Baseball,
        )
    }

    #[tokio::test]
    async fn test_option_round_trip_keeps_exact_odds() {
        let stores = stores().await;
        let mut option = BettingOption::new(
            Uuid::new_v4(),
            OptionType::OverUnder,
            "Over 8.5".into(),
            Odds::new(dec!(1.875)).unwrap(),
        );
        option.over_under_line = Some(dec!(8.5));
        stores.options.save(&option).await.unwrap();

        let loaded = stores.options.find_by_id(option.id).await.unwrap().unwrap();
        assert_eq!(loaded, option);

        option.deactivate();
        stores.options.save(&option).await.unwrap();
        let loaded = stores.options.find_by_id(option.id).await.unwrap().unwrap();
        assert!(!loaded.is_active);

        assert!(stores.options.delete(option.id).await.unwrap());
        assert!(!stores.options.delete(option.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_bet_with_slips_round_trip() {
        let stores = stores().await;
        let g = game();
        let a = BettingOption::new(g.id, OptionType::WinDrawLoss, "Lions".into(), Odds::new(dec!(1.5)).unwrap());
        let b = BettingOption::new(Uuid::new_v4(), OptionType::Handicap, "Bears -1".into(), Odds::new(dec!(2.0)).unwrap());
        let id = Uuid::new_v4();
        let bet = Bet {
            id,
            user_id: Uuid::new_v4(),
            bet_type: BetType::Combo,
            total_amount: Money::new(dec!(100)).unwrap(),
            potential_return: Money::new(dec!(300.00)).unwrap(),
            total_odds: Odds::new(dec!(3.00)).unwrap(),
            status: BetStatus::Pending,
            slips: vec![BetSlip::new(id, &a), BetSlip::new(id, &b)],
            created_at: Utc::now(),
            settled_at: None,
        };
        stores.bets.create(&bet).await.unwrap();

        let by_game = stores.bets.find_by_game_id(g.id).await.unwrap();
        assert_eq!(by_game.len(), 1);
        assert_eq!(by_game[0].slips.len(), 2);
        assert_eq!(by_game[0].potential_return.amount(), dec!(300));

        let mut slip = by_game[0].slips[0].clone();
        slip.result = SlipResult::Win;
        stores.slips.save(&slip).await.unwrap();

        let mut settled = by_game[0].clone();
        settled.win().unwrap();
        stores.bets.save(&settled).await.unwrap();

        let loaded = stores.bets.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, BetStatus::Win);
        assert!(loaded.settled_at.is_some());
        assert_eq!(loaded.slips[0].result, SlipResult::Win);
        assert_eq!(loaded.slips[1].result, SlipResult::Pending);
    }

    #[tokio::test]
    async fn test_failed_bet_create_writes_nothing() {
        let stores = stores().await;
        let option = BettingOption::new(Uuid::new_v4(), OptionType::WinDrawLoss, "X".into(), Odds::ONE);
        let id = Uuid::new_v4();
        let slip = BetSlip::new(id, &option);
        let bet = Bet {
            id,
            user_id: Uuid::new_v4(),
            bet_type: BetType::Combo,
            total_amount: Money::new(dec!(5)).unwrap(),
            potential_return: Money::new(dec!(5)).unwrap(),
            total_odds: Odds::ONE,
            status: BetStatus::Pending,
            // Same slip twice violates the primary key mid-transaction.
            slips: vec![slip.clone(), slip],
            created_at: Utc::now(),
            settled_at: None,
        };
        assert!(stores.bets.create(&bet).await.is_err());
        assert!(stores.bets.find_by_id(id).await.unwrap().is_none());
        assert!(stores.slips.find_by_bet_id(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_and_journal() {
        let stores = stores().await;
        let mut wallet = Wallet::new(Uuid::new_v4());
        stores.wallets.create(&wallet).await.unwrap();
        let dup = stores.wallets.create(&Wallet::new(wallet.user_id)).await.unwrap_err();
        assert!(matches!(dup, SportsbookError::Duplicate { entity: "Wallet", .. }));

        wallet.deposit(dec!(1000)).unwrap();
        stores.wallets.save(&wallet).await.unwrap();
        let deposit = WalletTransaction::record(&wallet, TransactionType::Deposit, Money::new(dec!(1000)).unwrap());
        stores.transactions.append(&deposit).await.unwrap();

        wallet.withdraw(dec!(200)).unwrap();
        stores.wallets.save(&wallet).await.unwrap();
        let bet = WalletTransaction::record(&wallet, TransactionType::Bet, Money::new(dec!(200)).unwrap());
        stores.transactions.append(&bet).await.unwrap();

        let loaded = stores.wallets.get_by_user_id(wallet.user_id).await.unwrap().unwrap();
        assert_eq!(loaded.balance.amount(), dec!(800));

        let journal = stores.transactions.find_by_wallet_id(wallet.id, Page::default()).await.unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].transaction_type, TransactionType::Bet);
        assert_eq!(journal[0].balance_after.amount(), dec!(800));
        assert_eq!(stores.transactions.count_by_wallet_id(wallet.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_game_filters_and_scores() {
        let stores = stores().await;
        let mut live = game();
        live.to_live();
        live.set_final_score(3, 2).unwrap();
        let scheduled = game();
        stores.games.save(&live).await.unwrap();
        stores.games.save(&scheduled).await.unwrap();

        let finished = GameFilter { status: Some(GameStatus::Finished), ..Default::default() };
        let found = stores.games.find_all(&finished, Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].final_score_home, Some(3));
        assert!(found[0].is_live);
        assert_eq!(stores.games.count_all(&GameFilter::default()).await.unwrap(), 2);
        assert_eq!(
            stores.games.count_all(&GameFilter { is_live: Some(false), ..Default::default() }).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_league_filter() {
        let stores = stores().await;
        stores.leagues.save(&League::new("K League".into(), SportType::Soccer, "KR".into(), true)).await.unwrap();
        stores.leagues.save(&League::new("KBO".into(), SportType::Baseball, "KR".into(), false)).await.unwrap();

        let active = LeagueFilter { is_active: Some(true), ..Default::default() };
        let found = stores.leagues.find_all(&active, Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "K League");
    }

    fn user(name: &str, email: &str) -> User {
        User::new(
            Username::parse(name).unwrap(),
            Email::parse(email).unwrap(),
            "first".into(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_rejected() {
        let stores = stores().await;
        stores.users.save(&user("sharp_bettor", "sharp@example.com")).await.unwrap();

        let err = stores.users.save(&user("sharp_bettor", "other@example.com")).await.unwrap_err();
        assert!(matches!(err, SportsbookError::Duplicate { entity: "User", ref key } if key == "sharp_bettor"));
        let err = stores.users.save(&user("late_bettor", "sharp@example.com")).await.unwrap_err();
        assert!(matches!(err, SportsbookError::Duplicate { entity: "User", ref key } if key == "sharp@example.com"));

        assert!(stores.users.find_by_username("sharp_bettor").await.unwrap().is_some());
        assert!(stores.users.find_by_email("sharp@example.com").await.unwrap().is_some());
        assert!(stores.users.find_by_email("late@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_profile_and_limits_round_trip() {
        let stores = stores().await;
        let mut u = user("steady_hand", "steady@example.com");
        u.bank_name = "First Bank".into();
        u.account_number = "110-22-3333".into();
        u.account_holder = "Steady Hand".into();
        u.set_daily_limit(dec!(50000)).unwrap();
        u.set_restriction(true);
        u.last_bet_date = Some(Utc::now().date_naive());
        stores.users.save(&u).await.unwrap();

        let loaded = stores.users.find_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, u.email);
        assert_eq!(loaded.account_number, "110-22-3333");
        assert_eq!(loaded.daily_limit.amount(), dec!(50000));
        assert_eq!(loaded.today_total_bet.amount(), dec!(0));
        assert_eq!(loaded.last_bet_date, u.last_bet_date);
        assert!(loaded.is_restricted);
    }

    #[tokio::test]
    async fn test_movement_writes_balance_and_journal() {
        let stores = stores().await;
        let wallet = Wallet::new(Uuid::new_v4());
        stores.wallets.create(&wallet).await.unwrap();

        let (after, entry) = stores
            .wallets
            .apply_movement(wallet.id, WalletMovement::credit(dec!(100), TransactionType::Deposit))
            .await
            .unwrap();
        assert_eq!(after.balance.amount(), dec!(100));
        assert_eq!(entry.balance_after.amount(), dec!(100));

        let err = stores
            .wallets
            .apply_movement(wallet.id, WalletMovement::debit(dec!(150), TransactionType::Withdrawal))
            .await
            .unwrap_err();
        assert!(matches!(err, SportsbookError::InsufficientFunds { .. }));

        let loaded = stores.wallets.get_by_id(wallet.id).await.unwrap().unwrap();
        assert_eq!(loaded.balance.amount(), dec!(100));
        assert_eq!(stores.transactions.count_by_wallet_id(wallet.id).await.unwrap(), 1);

        let missing = stores
            .wallets
            .apply_movement(Uuid::new_v4(), WalletMovement::credit(dec!(1), TransactionType::Deposit))
            .await
            .unwrap_err();
        assert!(matches!(missing, SportsbookError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_two_stores_on_one_file_cannot_overdraw() {
        let path = std::env::temp_dir().join(format!("sportsbook-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let first = Stores::from_backend(Arc::new(SqliteStore::connect(&url, 2).await.unwrap()));
        let second = Stores::from_backend(Arc::new(SqliteStore::connect(&url, 2).await.unwrap()));

        let wallet = Wallet::new(Uuid::new_v4());
        first.wallets.create(&wallet).await.unwrap();
        first
            .wallets
            .apply_movement(wallet.id, WalletMovement::credit(dec!(100), TransactionType::Deposit))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            first.wallets.apply_movement(wallet.id, WalletMovement::debit(dec!(60), TransactionType::Withdrawal)),
            second.wallets.apply_movement(wallet.id, WalletMovement::debit(dec!(60), TransactionType::Withdrawal)),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let rejected = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
        assert!(matches!(rejected, SportsbookError::InsufficientFunds { .. }));

        let loaded = second.wallets.get_by_id(wallet.id).await.unwrap().unwrap();
        assert_eq!(loaded.balance.amount(), dec!(40));
        assert_eq!(first.transactions.count_by_wallet_id(wallet.id).await.unwrap(), 2);

        drop((first, second));
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    fn pending_bet(user_id: Uuid, option: &BettingOption) -> Bet {
        let id = Uuid::new_v4();
        Bet {
            id,
            user_id,
            bet_type: BetType::Single,
            total_amount: Money::new(dec!(10)).unwrap(),
            potential_return: Money::new(dec!(20)).unwrap(),
            total_odds: Odds::new(dec!(2)).unwrap(),
            status: BetStatus::Pending,
            slips: vec![BetSlip::new(id, option)],
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    #[tokio::test]
    async fn test_settle_pays_once() {
        let stores = stores().await;
        let wallet = Wallet::new(Uuid::new_v4());
        stores.wallets.create(&wallet).await.unwrap();
        let option = BettingOption::new(Uuid::new_v4(), OptionType::WinDrawLoss, "Lions".into(), Odds::new(dec!(2)).unwrap());
        let bet = pending_bet(wallet.user_id, &option);
        stores.bets.create(&bet).await.unwrap();

        let mut won = bet.clone();
        won.slips[0].result = SlipResult::Win;
        won.win().unwrap();
        let payout = Payout { wallet_id: wallet.id, amount: won.potential_return };

        assert!(stores.bets.settle(&won, Some(payout)).await.unwrap());
        assert!(!stores.bets.settle(&won, Some(payout)).await.unwrap());

        let loaded = stores.bets.find_by_id(bet.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, BetStatus::Win);
        assert_eq!(loaded.slips[0].result, SlipResult::Win);
        let balance = stores.wallets.get_by_id(wallet.id).await.unwrap().unwrap().balance;
        assert_eq!(balance.amount(), dec!(20));
        let journal = stores.transactions.find_by_wallet_id(wallet.id, Page::default()).await.unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].transaction_type, TransactionType::Payout);
    }

    #[tokio::test]
    async fn test_settle_without_wallet_rolls_back() {
        let stores = stores().await;
        let option = BettingOption::new(Uuid::new_v4(), OptionType::WinDrawLoss, "Lions".into(), Odds::new(dec!(2)).unwrap());
        let bet = pending_bet(Uuid::new_v4(), &option);
        stores.bets.create(&bet).await.unwrap();

        let mut won = bet.clone();
        won.slips[0].result = SlipResult::Win;
        won.win().unwrap();
        let payout = Payout { wallet_id: Uuid::new_v4(), amount: won.potential_return };

        let err = stores.bets.settle(&won, Some(payout)).await.unwrap_err();
        assert!(matches!(err, SportsbookError::NotFound { .. }));

        let loaded = stores.bets.find_by_id(bet.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, BetStatus::Pending);
        assert!(loaded.settled_at.is_none());
        assert_eq!(loaded.slips[0].result, SlipResult::Pending);
    }
}
