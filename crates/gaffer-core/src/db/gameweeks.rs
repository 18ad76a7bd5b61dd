// Gameweek and fixture rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{conversion_error, Store};
use crate::model::{CompetitionId, Fixture, FixtureId, Gameweek, GameweekId, MatchId, Stage};

const GAMEWEEK_COLUMNS: &str = "id, competition_id, number, deadline, stage";

fn gameweek_from_row(row: &Row<'_>) -> rusqlite::Result<Gameweek> {
    let stage: String = row.get(4)?;
    Ok(Gameweek {
        id: row.get(0)?,
        competition_id: row.get(1)?,
        number: row.get(2)?,
        deadline: row.get(3)?,
        stage: Stage::from_str_stage(&stage)
            .ok_or_else(|| conversion_error(4, format!("unknown stage {stage:?}")))?,
    })
}

fn fixture_from_row(row: &Row<'_>) -> rusqlite::Result<Fixture> {
    Ok(Fixture {
        id: row.get(0)?,
        gameweek_id: row.get(1)?,
        home_team: row.get(2)?,
        away_team: row.get(3)?,
        match_id: row.get(4)?,
    })
}

impl Store<'_> {
    pub fn insert_gameweek(
        &self,
        competition_id: CompetitionId,
        number: u32,
        stage: Stage,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<GameweekId> {
        let id: GameweekId = self
            .conn
            .query_row(
                "INSERT INTO gameweeks (competition_id, number, deadline, stage)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                params![competition_id, number, deadline, stage.as_str()],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to insert gameweek {number}"))?;
        Ok(id)
    }

    pub fn gameweek(&self, id: GameweekId) -> Result<Option<Gameweek>> {
        self.conn
            .query_row(
                &format!("SELECT {GAMEWEEK_COLUMNS} FROM gameweeks WHERE id = ?1"),
                params![id],
                gameweek_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load gameweek {id}"))
    }

    /// Every gameweek of a competition, ordered by number.
    pub fn gameweeks(&self, competition_id: CompetitionId) -> Result<Vec<Gameweek>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {GAMEWEEK_COLUMNS} FROM gameweeks WHERE competition_id = ?1 ORDER BY number"
            ))
            .context("failed to prepare gameweeks query")?;
        let gameweeks = stmt
            .query_map(params![competition_id], gameweek_from_row)
            .context("failed to query gameweeks")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map gameweek rows")?;
        Ok(gameweeks)
    }

    /// Gameweeks of any competition still waiting for a deadline.
    pub fn gameweeks_without_deadline(&self) -> Result<Vec<Gameweek>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {GAMEWEEK_COLUMNS} FROM gameweeks WHERE deadline IS NULL
                 ORDER BY competition_id, number"
            ))
            .context("failed to prepare gameweeks_without_deadline")?;
        let gameweeks = stmt
            .query_map([], gameweek_from_row)
            .context("failed to query gameweeks without deadline")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map gameweek rows")?;
        Ok(gameweeks)
    }

    /// Set a deadline only if none is set yet. Returns whether it was written.
    pub fn set_deadline(&self, gameweek_id: GameweekId, deadline: DateTime<Utc>) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "UPDATE gameweeks SET deadline = ?2 WHERE id = ?1 AND deadline IS NULL",
                params![gameweek_id, deadline],
            )
            .with_context(|| format!("failed to set deadline of gameweek {gameweek_id}"))?;
        Ok(n == 1)
    }

    pub fn insert_fixture(
        &self,
        gameweek_id: GameweekId,
        home_team: Option<i64>,
        away_team: Option<i64>,
        match_id: Option<MatchId>,
    ) -> Result<FixtureId> {
        let id: FixtureId = self
            .conn
            .query_row(
                "INSERT INTO fixtures (gameweek_id, home_team, away_team, match_id)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                params![gameweek_id, home_team, away_team, match_id],
                |row| row.get(0),
            )
            .context("failed to insert fixture")?;
        Ok(id)
    }

    pub fn fixtures_for_gameweek(&self, gameweek_id: GameweekId) -> Result<Vec<Fixture>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, gameweek_id, home_team, away_team, match_id
                 FROM fixtures WHERE gameweek_id = ?1 ORDER BY id",
            )
            .context("failed to prepare fixtures_for_gameweek")?;
        let fixtures = stmt
            .query_map(params![gameweek_id], fixture_from_row)
            .context("failed to query fixtures")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map fixture rows")?;
        Ok(fixtures)
    }

    /// Kickoff of every fixture in a gameweek; `None` for a fixture with no
    /// match yet or a match with no kickoff.
    pub fn fixture_kickoffs(&self, gameweek_id: GameweekId) -> Result<Vec<Option<DateTime<Utc>>>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT m.kickoff FROM fixtures f
                 LEFT JOIN matches m ON m.id = f.match_id
                 WHERE f.gameweek_id = ?1",
            )
            .context("failed to prepare fixture_kickoffs")?;
        let kickoffs = stmt
            .query_map(params![gameweek_id], |row| row.get(0))
            .context("failed to query fixture kickoffs")?
            .collect::<rusqlite::Result<Vec<Option<DateTime<Utc>>>>>()
            .context("failed to map kickoff rows")?;
        Ok(kickoffs)
    }

    /// Gameweek number of the fixture a match is linked to.
    pub fn gameweek_number_for_match(&self, match_id: MatchId) -> Result<Option<u32>> {
        self.conn
            .query_row(
                "SELECT g.number FROM fixtures f
                 JOIN gameweeks g ON g.id = f.gameweek_id
                 WHERE f.match_id = ?1
                 LIMIT 1",
                params![match_id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to resolve gameweek of match {match_id}"))
    }
}
