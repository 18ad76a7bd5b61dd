// Fantasy team rows with a version column for optimistic concurrency.

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::{json_column, to_json, Store};
use crate::model::{FantasyTeam, FantasyTeamId, PlayerId, UserId};

const TEAM_COLUMNS: &str = "id, user_id, name, budget, roster, captain, vice_captain, \
     effective_gameweek, transfers, gameweek_points, match_points, lineup_snapshots, \
     season_points, created_at, version";

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<FantasyTeam> {
    Ok(FantasyTeam {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        budget: row.get(3)?,
        roster: json_column(row, 4)?,
        captain: row.get(5)?,
        vice_captain: row.get(6)?,
        effective_gameweek: row.get(7)?,
        transfers: json_column(row, 8)?,
        gameweek_points: json_column(row, 9)?,
        match_points: json_column(row, 10)?,
        lineup_snapshots: json_column(row, 11)?,
        season_points: row.get(12)?,
        created_at: row.get(13)?,
        version: row.get(14)?,
    })
}

struct TeamJson {
    roster: String,
    transfers: String,
    gameweek_points: String,
    match_points: String,
    lineup_snapshots: String,
}

impl TeamJson {
    fn of(team: &FantasyTeam) -> Result<Self> {
        Ok(TeamJson {
            roster: to_json(&team.roster, "roster")?,
            transfers: to_json(&team.transfers, "transfer quota")?,
            gameweek_points: to_json(&team.gameweek_points, "gameweek points")?,
            match_points: to_json(&team.match_points, "match points")?,
            lineup_snapshots: to_json(&team.lineup_snapshots, "lineup snapshots")?,
        })
    }
}

impl Store<'_> {
    /// Insert a new team. Fails if the user already owns one.
    pub fn insert_team(&self, team: &FantasyTeam) -> Result<FantasyTeamId> {
        let j = TeamJson::of(team)?;
        let id: FantasyTeamId = self
            .conn
            .query_row(
                "INSERT INTO fantasy_teams
                    (user_id, name, budget, roster, captain, vice_captain, effective_gameweek,
                     transfers, gameweek_points, match_points, lineup_snapshots, season_points,
                     created_at, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0)
                 RETURNING id",
                params![
                    team.user_id,
                    team.name,
                    team.budget,
                    j.roster,
                    team.captain,
                    team.vice_captain,
                    team.effective_gameweek,
                    j.transfers,
                    j.gameweek_points,
                    j.match_points,
                    j.lineup_snapshots,
                    team.season_points,
                    team.created_at,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to insert fantasy team for user {}", team.user_id))?;
        Ok(id)
    }

    pub fn team(&self, id: FantasyTeamId) -> Result<Option<FantasyTeam>> {
        self.conn
            .query_row(
                &format!("SELECT {TEAM_COLUMNS} FROM fantasy_teams WHERE id = ?1"),
                params![id],
                team_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load fantasy team {id}"))
    }

    pub fn team_for_user(&self, user_id: UserId) -> Result<Option<FantasyTeam>> {
        self.conn
            .query_row(
                &format!("SELECT {TEAM_COLUMNS} FROM fantasy_teams WHERE user_id = ?1"),
                params![user_id],
                team_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load fantasy team of user {user_id}"))
    }

    pub fn all_teams(&self) -> Result<Vec<FantasyTeam>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TEAM_COLUMNS} FROM fantasy_teams ORDER BY id"))
            .context("failed to prepare all_teams query")?;
        let teams = stmt
            .query_map([], team_from_row)
            .context("failed to query fantasy teams")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map fantasy team rows")?;
        Ok(teams)
    }

    /// Teams whose roster contains any of `player_ids`.
    pub fn teams_holding(&self, player_ids: &[PlayerId]) -> Result<Vec<FantasyTeam>> {
        let ids = to_json(player_ids, "player ids")?;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {TEAM_COLUMNS} FROM fantasy_teams t
                 WHERE EXISTS (
                     SELECT 1 FROM json_each(t.roster) r
                     WHERE json_extract(r.value, '$.player_id') IN (SELECT value FROM json_each(?1))
                 )
                 ORDER BY t.id"
            ))
            .context("failed to prepare teams_holding query")?;
        let teams = stmt
            .query_map(params![ids], team_from_row)
            .context("failed to query teams holding players")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map fantasy team rows")?;
        Ok(teams)
    }

    /// Write a team back if nobody else saved it since it was loaded.
    /// Returns `false` on a version mismatch; `team.version` is bumped on
    /// success.
    pub fn save_team(&self, team: &mut FantasyTeam) -> Result<bool> {
        let j = TeamJson::of(team)?;
        let n = self
            .conn
            .execute(
                "UPDATE fantasy_teams SET
                    name               = ?3,
                    budget             = ?4,
                    roster             = ?5,
                    captain            = ?6,
                    vice_captain       = ?7,
                    effective_gameweek = ?8,
                    transfers          = ?9,
                    gameweek_points    = ?10,
                    match_points       = ?11,
                    lineup_snapshots   = ?12,
                    season_points      = ?13,
                    version            = version + 1
                 WHERE id = ?1 AND version = ?2",
                params![
                    team.id,
                    team.version,
                    team.name,
                    team.budget,
                    j.roster,
                    team.captain,
                    team.vice_captain,
                    team.effective_gameweek,
                    j.transfers,
                    j.gameweek_points,
                    j.match_points,
                    j.lineup_snapshots,
                    team.season_points,
                ],
            )
            .with_context(|| format!("failed to save fantasy team {}", team.id))?;
        if n == 1 {
            team.version += 1;
        }
        Ok(n == 1)
    }

    pub fn delete_team(&self, id: FantasyTeamId) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM fantasy_teams WHERE id = ?1", params![id])
            .with_context(|| format!("failed to delete fantasy team {id}"))?;
        Ok(n == 1)
    }
}
