// Match rows: team sheets and event logs as JSON columns.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::{json_column, to_json, Store};
use crate::model::{FantasyTeamId, Match, MatchId};

const MATCH_COLUMNS: &str = "id, home_team, away_team, kickoff, venue, home_lineup, away_lineup, \
     goals, cards, substitutions, man_of_the_match, fulltime, home_score, away_score, result, \
     fantasy_processed, price_processed, gameweek, fantasy_points";

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<Match> {
    Ok(Match {
        id: row.get(0)?,
        home_team: row.get(1)?,
        away_team: row.get(2)?,
        kickoff: row.get(3)?,
        venue: row.get(4)?,
        home_lineup: json_column(row, 5)?,
        away_lineup: json_column(row, 6)?,
        goals: json_column(row, 7)?,
        cards: json_column(row, 8)?,
        substitutions: json_column(row, 9)?,
        man_of_the_match: row.get(10)?,
        fulltime: row.get(11)?,
        home_score: row.get(12)?,
        away_score: row.get(13)?,
        result: row.get(14)?,
        fantasy_processed: row.get(15)?,
        price_processed: row.get(16)?,
        gameweek: row.get(17)?,
        fantasy_points: json_column(row, 18)?,
    })
}

/// Serialized JSON columns of a match, in column order.
struct MatchJson {
    home_lineup: String,
    away_lineup: String,
    goals: String,
    cards: String,
    substitutions: String,
    fantasy_points: String,
}

impl MatchJson {
    fn of(m: &Match) -> Result<Self> {
        Ok(MatchJson {
            home_lineup: to_json(&m.home_lineup, "home lineup")?,
            away_lineup: to_json(&m.away_lineup, "away lineup")?,
            goals: to_json(&m.goals, "goal events")?,
            cards: to_json(&m.cards, "card events")?,
            substitutions: to_json(&m.substitutions, "substitutions")?,
            fantasy_points: to_json(&m.fantasy_points, "fantasy points")?,
        })
    }
}

impl Store<'_> {
    /// Insert a match; its cached score is refreshed from the goal log first.
    pub fn insert_match(&self, m: &Match) -> Result<MatchId> {
        let mut m = m.clone();
        m.recompute_score();
        let j = MatchJson::of(&m)?;
        let id: MatchId = self
            .conn
            .query_row(
                "INSERT INTO matches
                    (home_team, away_team, kickoff, venue, home_lineup, away_lineup, goals, cards,
                     substitutions, man_of_the_match, fulltime, home_score, away_score, result,
                     fantasy_processed, price_processed, gameweek, fantasy_points)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 RETURNING id",
                params![
                    m.home_team,
                    m.away_team,
                    m.kickoff,
                    m.venue,
                    j.home_lineup,
                    j.away_lineup,
                    j.goals,
                    j.cards,
                    j.substitutions,
                    m.man_of_the_match,
                    m.fulltime,
                    m.home_score,
                    m.away_score,
                    m.result,
                    m.fantasy_processed,
                    m.price_processed,
                    m.gameweek,
                    j.fantasy_points,
                ],
                |row| row.get(0),
            )
            .context("failed to insert match")?;
        Ok(id)
    }

    pub fn load_match(&self, id: MatchId) -> Result<Option<Match>> {
        self.conn
            .query_row(
                &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1"),
                params![id],
                match_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load match {id}"))
    }

    pub fn all_matches(&self) -> Result<Vec<Match>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {MATCH_COLUMNS} FROM matches ORDER BY id"))
            .context("failed to prepare all_matches query")?;
        let matches = stmt
            .query_map([], match_from_row)
            .context("failed to query matches")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map match rows")?;
        Ok(matches)
    }

    /// Write back the editable parts of a match: schedule, team sheets, event
    /// log, and fulltime flag. The cached score and result are recomputed from
    /// the goal log. Processing flags and the points audit are left to their
    /// own guarded updates.
    pub fn save_match(&self, m: &mut Match) -> Result<()> {
        m.recompute_score();
        let j = MatchJson::of(m)?;
        let n = self
            .conn
            .execute(
                "UPDATE matches SET
                    kickoff          = ?2,
                    venue            = ?3,
                    home_lineup      = ?4,
                    away_lineup      = ?5,
                    goals            = ?6,
                    cards            = ?7,
                    substitutions    = ?8,
                    man_of_the_match = ?9,
                    fulltime         = ?10,
                    home_score       = ?11,
                    away_score       = ?12,
                    result           = ?13
                 WHERE id = ?1",
                params![
                    m.id,
                    m.kickoff,
                    m.venue,
                    j.home_lineup,
                    j.away_lineup,
                    j.goals,
                    j.cards,
                    j.substitutions,
                    m.man_of_the_match,
                    m.fulltime,
                    m.home_score,
                    m.away_score,
                    m.result,
                ],
            )
            .with_context(|| format!("failed to save match {}", m.id))?;
        anyhow::ensure!(n == 1, "match {} does not exist", m.id);
        Ok(())
    }

    /// Mark a match fantasy-processed and record its gameweek and the points
    /// each fantasy team earned from it.
    pub fn record_fantasy_points(
        &self,
        match_id: MatchId,
        gameweek: u32,
        points: &BTreeMap<FantasyTeamId, i32>,
    ) -> Result<()> {
        let points_json = to_json(points, "fantasy points")?;
        self.conn
            .execute(
                "UPDATE matches SET fantasy_processed = 1, gameweek = ?2, fantasy_points = ?3
                 WHERE id = ?1",
                params![match_id, gameweek, points_json],
            )
            .with_context(|| format!("failed to record fantasy points for match {match_id}"))?;
        Ok(())
    }

    /// Fulltime matches the price sweep has not handled yet.
    pub fn matches_pending_pricing(&self) -> Result<Vec<MatchId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM matches WHERE fulltime = 1 AND price_processed = 0 ORDER BY id")
            .context("failed to prepare matches_pending_pricing")?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .context("failed to query pending matches")?
            .collect::<rusqlite::Result<Vec<MatchId>>>()
            .context("failed to map pending match rows")?;
        Ok(ids)
    }

    /// Flip `price_processed` if it is still unset. Returns `false` when
    /// another run already claimed the match.
    pub fn claim_price_processing(&self, match_id: MatchId) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "UPDATE matches SET price_processed = 1
                 WHERE id = ?1 AND fulltime = 1 AND price_processed = 0",
                params![match_id],
            )
            .with_context(|| format!("failed to claim match {match_id} for pricing"))?;
        Ok(n == 1)
    }
}
