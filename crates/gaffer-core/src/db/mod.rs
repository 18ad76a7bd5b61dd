// SQLite persistence for players, matches, gameweeks, and fantasy teams.
//
// Each entity is one row; embedded structures (team sheets, event logs,
// rosters, snapshots, points ledgers) are JSON columns.

mod gameweeks;
mod matches;
mod players;
mod teams;

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// SQLite-backed document store.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Typed queries over a borrowed connection. Obtained from
/// [`Database::read`] or [`Database::transaction`].
pub struct Store<'c> {
    conn: &'c Connection,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                name          TEXT NOT NULL,
                position      TEXT NOT NULL,
                team_id       INTEGER NOT NULL,
                price         INTEGER NOT NULL,
                goals         INTEGER NOT NULL DEFAULT 0,
                assists       INTEGER NOT NULL DEFAULT 0,
                yellow_cards  INTEGER NOT NULL DEFAULT 0,
                red_cards     INTEGER NOT NULL DEFAULT 0,
                season_points INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS matches (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                home_team         INTEGER NOT NULL,
                away_team         INTEGER NOT NULL,
                kickoff           TEXT,
                venue             TEXT,
                home_lineup       TEXT NOT NULL,
                away_lineup       TEXT NOT NULL,
                goals             TEXT NOT NULL,
                cards             TEXT NOT NULL,
                substitutions     TEXT NOT NULL,
                man_of_the_match  INTEGER,
                fulltime          INTEGER NOT NULL DEFAULT 0,
                home_score        INTEGER NOT NULL DEFAULT 0,
                away_score        INTEGER NOT NULL DEFAULT 0,
                result            TEXT,
                fantasy_processed INTEGER NOT NULL DEFAULT 0,
                price_processed   INTEGER NOT NULL DEFAULT 0,
                gameweek          INTEGER,
                fantasy_points    TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS player_match_stats (
                player_id        INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
                match_id         INTEGER NOT NULL REFERENCES matches(id),
                gameweek         INTEGER NOT NULL,
                points           INTEGER NOT NULL,
                team_id          INTEGER,
                goals            INTEGER NOT NULL,
                assists          INTEGER NOT NULL,
                own_goals        INTEGER NOT NULL,
                yellow_cards     INTEGER NOT NULL,
                red_card         INTEGER NOT NULL,
                man_of_the_match INTEGER NOT NULL,
                started          INTEGER NOT NULL,
                subbed_on        INTEGER NOT NULL,
                PRIMARY KEY (player_id, match_id)
            );

            CREATE TABLE IF NOT EXISTS gameweeks (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                competition_id INTEGER NOT NULL,
                number         INTEGER NOT NULL,
                deadline       TEXT,
                stage          TEXT NOT NULL DEFAULT 'regular',
                UNIQUE(competition_id, number)
            );

            CREATE TABLE IF NOT EXISTS fixtures (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                gameweek_id INTEGER NOT NULL REFERENCES gameweeks(id),
                home_team   INTEGER,
                away_team   INTEGER,
                match_id    INTEGER REFERENCES matches(id)
            );

            CREATE TABLE IF NOT EXISTS fantasy_teams (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id            INTEGER NOT NULL UNIQUE,
                name               TEXT NOT NULL,
                budget             INTEGER NOT NULL,
                roster             TEXT NOT NULL,
                captain            INTEGER,
                vice_captain       INTEGER,
                effective_gameweek INTEGER,
                transfers          TEXT NOT NULL,
                gameweek_points    TEXT NOT NULL,
                match_points       TEXT NOT NULL,
                lineup_snapshots   TEXT NOT NULL,
                season_points      INTEGER NOT NULL DEFAULT 0,
                created_at         TEXT NOT NULL,
                version            INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_player_match_stats_match ON player_match_stats(match_id);
            CREATE INDEX IF NOT EXISTS idx_fixtures_gameweek ON fixtures(gameweek_id);
            CREATE INDEX IF NOT EXISTS idx_fixtures_match ON fixtures(match_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }

    /// Run read-only (or single-statement) work outside a transaction.
    pub fn read<T, E>(&self, f: impl FnOnce(&Store<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let conn = self.conn()?;
        f(&Store { conn: &conn })
    }

    /// Run `f` inside an IMMEDIATE transaction. The write lock is taken up
    /// front, so concurrent writers serialize instead of failing on upgrade.
    /// Any error from `f` rolls the whole unit back.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Store<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin transaction")?;
        let out = f(&Store { conn: &tx })?;
        tx.commit().context("failed to commit transaction")?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// JSON column helpers
// ---------------------------------------------------------------------------

fn to_json<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("failed to serialize {what}"))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}
