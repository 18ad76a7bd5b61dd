// Player rows and their per-match stat records.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::{conversion_error, to_json, Store};
use crate::events::Performance;
use crate::model::{
    MatchId, NewPlayer, Player, PlayerId, PlayerMatchStat, Position, Price, SeasonStats,
};

const PLAYER_COLUMNS: &str =
    "id, name, position, team_id, price, goals, assists, yellow_cards, red_cards, season_points";

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    let code: String = row.get(2)?;
    let position = Position::from_str_pos(&code)
        .ok_or_else(|| conversion_error(2, format!("unknown position code {code:?}")))?;
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        position,
        team_id: row.get(3)?,
        price: row.get(4)?,
        stats: SeasonStats {
            goals: row.get(5)?,
            assists: row.get(6)?,
            yellow_cards: row.get(7)?,
            red_cards: row.get(8)?,
        },
        season_points: row.get(9)?,
    })
}

fn stat_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerMatchStat> {
    Ok(PlayerMatchStat {
        player_id: row.get(0)?,
        match_id: row.get(1)?,
        gameweek: row.get(2)?,
        points: row.get(3)?,
        performance: Performance {
            team_id: row.get(4)?,
            goals: row.get(5)?,
            assists: row.get(6)?,
            own_goals: row.get(7)?,
            yellow_cards: row.get(8)?,
            red_card: row.get(9)?,
            man_of_the_match: row.get(10)?,
            started: row.get(11)?,
            subbed_on: row.get(12)?,
        },
    })
}

const STAT_COLUMNS: &str = "player_id, match_id, gameweek, points, team_id, goals, assists, \
     own_goals, yellow_cards, red_card, man_of_the_match, started, subbed_on";

impl Store<'_> {
    pub fn insert_player(&self, player: &NewPlayer) -> Result<PlayerId> {
        let id: PlayerId = self
            .conn
            .query_row(
                "INSERT INTO players (name, position, team_id, price)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                params![
                    player.name,
                    player.position.display_str(),
                    player.team_id,
                    player.price
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to insert player {}", player.name))?;
        Ok(id)
    }

    /// Insert a batch of players, returning their new ids in order.
    pub fn insert_players(&self, players: &[NewPlayer]) -> Result<Vec<PlayerId>> {
        players.iter().map(|p| self.insert_player(p)).collect()
    }

    pub fn player(&self, id: PlayerId) -> Result<Option<Player>> {
        self.conn
            .query_row(
                &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
                params![id],
                player_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load player {id}"))
    }

    /// Load the given players, keyed by id. Unknown ids are simply absent.
    pub fn players_by_ids(&self, ids: &[PlayerId]) -> Result<HashMap<PlayerId, Player>> {
        let ids_json = to_json(ids, "player ids")?;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE id IN (SELECT value FROM json_each(?1))"
            ))
            .context("failed to prepare players_by_ids query")?;
        let players = stmt
            .query_map(params![ids_json], player_from_row)
            .context("failed to query players")?
            .map(|r| r.map(|p| (p.id, p)))
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    pub fn all_players(&self) -> Result<Vec<Player>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY id"))
            .context("failed to prepare all_players query")?;
        let players = stmt
            .query_map([], player_from_row)
            .context("failed to query players")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    pub fn delete_player(&self, id: PlayerId) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM players WHERE id = ?1", params![id])
            .with_context(|| format!("failed to delete player {id}"))?;
        Ok(n > 0)
    }

    /// Store (or overwrite) one player's scored record for one match.
    /// Keyed by `(player_id, match_id)`, so re-scoring a match replaces the
    /// earlier row instead of adding another.
    pub fn upsert_match_stat(&self, stat: &PlayerMatchStat) -> Result<()> {
        let p = &stat.performance;
        self.conn
            .execute(
                "INSERT INTO player_match_stats
                    (player_id, match_id, gameweek, points, team_id, goals, assists, own_goals,
                     yellow_cards, red_card, man_of_the_match, started, subbed_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(player_id, match_id) DO UPDATE SET
                    gameweek         = excluded.gameweek,
                    points           = excluded.points,
                    team_id          = excluded.team_id,
                    goals            = excluded.goals,
                    assists          = excluded.assists,
                    own_goals        = excluded.own_goals,
                    yellow_cards     = excluded.yellow_cards,
                    red_card         = excluded.red_card,
                    man_of_the_match = excluded.man_of_the_match,
                    started          = excluded.started,
                    subbed_on        = excluded.subbed_on",
                params![
                    stat.player_id,
                    stat.match_id,
                    stat.gameweek,
                    stat.points,
                    p.team_id,
                    p.goals,
                    p.assists,
                    p.own_goals,
                    p.yellow_cards,
                    p.red_card,
                    p.man_of_the_match,
                    p.started,
                    p.subbed_on,
                ],
            )
            .with_context(|| {
                format!(
                    "failed to store stats for player {} in match {}",
                    stat.player_id, stat.match_id
                )
            })?;
        Ok(())
    }

    /// Drop a match's stat rows for players no longer in its performance map.
    pub fn prune_match_stats(&self, match_id: MatchId, keep: &[PlayerId]) -> Result<Vec<PlayerId>> {
        let keep_json = to_json(keep, "player ids")?;
        let mut stmt = self
            .conn
            .prepare(
                "DELETE FROM player_match_stats
                 WHERE match_id = ?1 AND player_id NOT IN (SELECT value FROM json_each(?2))
                 RETURNING player_id",
            )
            .context("failed to prepare prune_match_stats")?;
        let removed = stmt
            .query_map(params![match_id, keep_json], |row| row.get(0))
            .context("failed to prune match stats")?
            .collect::<rusqlite::Result<Vec<PlayerId>>>()
            .context("failed to read pruned rows")?;
        Ok(removed)
    }

    pub fn match_stats_for_match(&self, match_id: MatchId) -> Result<Vec<PlayerMatchStat>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {STAT_COLUMNS} FROM player_match_stats WHERE match_id = ?1 ORDER BY player_id"
            ))
            .context("failed to prepare match_stats_for_match")?;
        let stats = stmt
            .query_map(params![match_id], stat_from_row)
            .context("failed to query match stats")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map match stat rows")?;
        Ok(stats)
    }

    pub fn stats_for_player(&self, player_id: PlayerId) -> Result<Vec<PlayerMatchStat>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {STAT_COLUMNS} FROM player_match_stats WHERE player_id = ?1 ORDER BY match_id"
            ))
            .context("failed to prepare stats_for_player")?;
        let stats = stmt
            .query_map(params![player_id], stat_from_row)
            .context("failed to query player stats")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to map player stat rows")?;
        Ok(stats)
    }

    /// Rebuild a player's season aggregates from their per-match rows in one
    /// statement.
    pub fn recompute_player_aggregates(&self, player_id: PlayerId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE players SET
                    goals         = (SELECT COALESCE(SUM(goals), 0)        FROM player_match_stats WHERE player_id = ?1),
                    assists       = (SELECT COALESCE(SUM(assists), 0)      FROM player_match_stats WHERE player_id = ?1),
                    yellow_cards  = (SELECT COALESCE(SUM(yellow_cards), 0) FROM player_match_stats WHERE player_id = ?1),
                    red_cards     = (SELECT COALESCE(SUM(red_card), 0)     FROM player_match_stats WHERE player_id = ?1),
                    season_points = (SELECT COALESCE(SUM(points), 0)       FROM player_match_stats WHERE player_id = ?1)
                 WHERE id = ?1",
                params![player_id],
            )
            .with_context(|| format!("failed to recompute aggregates for player {player_id}"))?;
        Ok(())
    }

    /// Move a price by `delta`, clamped to `[min, max]`, in one statement.
    /// Returns the new price, or `None` for an unknown player.
    pub fn adjust_price(
        &self,
        player_id: PlayerId,
        delta: i64,
        min: Price,
        max: Price,
    ) -> Result<Option<Price>> {
        self.conn
            .query_row(
                "UPDATE players SET price = MIN(MAX(price + ?2, ?3), ?4)
                 WHERE id = ?1
                 RETURNING price",
                params![player_id, delta, min, max],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to adjust price of player {player_id}"))
    }

    /// Re-key every stat row of `from` onto `to`. Where both players have a
    /// row for the same match, `to`'s row wins and `from`'s is dropped.
    pub fn reassign_match_stats(&self, from: PlayerId, to: PlayerId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE OR IGNORE player_match_stats SET player_id = ?2 WHERE player_id = ?1",
                params![from, to],
            )
            .context("failed to re-key match stats")?;
        self.conn
            .execute(
                "DELETE FROM player_match_stats WHERE player_id = ?1",
                params![from],
            )
            .context("failed to drop colliding match stats")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::model::Match;

    fn test_db() -> Database {
        Database::open(":memory:").unwrap()
    }

    fn new_player(name: &str, position: Position, price: Price) -> NewPlayer {
        NewPlayer {
            name: name.to_string(),
            position,
            team_id: 1,
            price,
        }
    }

    fn stat(player_id: PlayerId, match_id: MatchId, points: i32, goals: u32) -> PlayerMatchStat {
        PlayerMatchStat {
            player_id,
            match_id,
            gameweek: 1,
            points,
            performance: Performance {
                team_id: Some(1),
                goals,
                started: true,
                ..Performance::default()
            },
        }
    }

    fn seed_match(store: &Store<'_>) -> MatchId {
        store.insert_match(&Match::new(1, 2, None)).unwrap()
    }

    #[test]
    fn insert_and_load_player() {
        let db = test_db();
        db.read(|store| -> Result<()> {
            let id = store.insert_player(&new_player("Keeper", Position::Goalkeeper, 45))?;
            let p = store.player(id)?.unwrap();
            assert_eq!(p.name, "Keeper");
            assert_eq!(p.position, Position::Goalkeeper);
            assert_eq!(p.price, 45);
            assert_eq!(p.stats, SeasonStats::default());
            assert!(store.player(id + 100)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn players_by_ids_skips_unknown() {
        let db = test_db();
        db.read(|store| -> Result<()> {
            let ids = store.insert_players(&[
                new_player("A", Position::Striker, 80),
                new_player("B", Position::CentreBack, 50),
            ])?;
            let found = store.players_by_ids(&[ids[0], ids[1], 999])?;
            assert_eq!(found.len(), 2);
            assert_eq!(found[&ids[1]].position, Position::CentreBack);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn stat_upsert_overwrites_and_aggregates_do_not_double_count() {
        let db = test_db();
        db.read(|store| -> Result<()> {
            let pid = store.insert_player(&new_player("A", Position::Striker, 80))?;
            let m1 = seed_match(store);
            let m2 = seed_match(store);

            store.upsert_match_stat(&stat(pid, m1, 6, 1))?;
            store.upsert_match_stat(&stat(pid, m1, 6, 1))?;
            store.upsert_match_stat(&stat(pid, m2, 10, 2))?;
            store.recompute_player_aggregates(pid)?;
            store.recompute_player_aggregates(pid)?;

            let p = store.player(pid)?.unwrap();
            assert_eq!(p.stats.goals, 3);
            assert_eq!(p.season_points, 16);

            // Re-edit of match 1 replaces its row.
            store.upsert_match_stat(&stat(pid, m1, 2, 0))?;
            store.recompute_player_aggregates(pid)?;
            let p = store.player(pid)?.unwrap();
            assert_eq!(p.stats.goals, 2);
            assert_eq!(p.season_points, 12);
            assert_eq!(store.stats_for_player(pid)?.len(), 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn prune_removes_players_dropped_from_a_match() {
        let db = test_db();
        db.read(|store| -> Result<()> {
            let a = store.insert_player(&new_player("A", Position::Striker, 80))?;
            let b = store.insert_player(&new_player("B", Position::Striker, 80))?;
            let m = seed_match(store);
            store.upsert_match_stat(&stat(a, m, 2, 0))?;
            store.upsert_match_stat(&stat(b, m, 2, 0))?;

            assert_eq!(store.prune_match_stats(m, &[a])?, vec![b]);
            let left: Vec<PlayerId> = store
                .match_stats_for_match(m)?
                .into_iter()
                .map(|s| s.player_id)
                .collect();
            assert_eq!(left, vec![a]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn price_adjustment_is_clamped() {
        let db = test_db();
        db.read(|store| -> Result<()> {
            let pid = store.insert_player(&new_player("A", Position::Striker, 148))?;
            assert_eq!(store.adjust_price(pid, 3, 40, 150)?, Some(150));
            assert_eq!(store.adjust_price(pid, -200, 40, 150)?, Some(40));
            assert_eq!(store.adjust_price(999, 1, 40, 150)?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn reassign_keeps_canonical_row_on_collision() {
        let db = test_db();
        db.read(|store| -> Result<()> {
            let dup = store.insert_player(&new_player("Dup", Position::Striker, 80))?;
            let canon = store.insert_player(&new_player("Canon", Position::Striker, 80))?;
            let shared = seed_match(store);
            let only_dup = seed_match(store);
            store.upsert_match_stat(&stat(dup, shared, 99, 0))?;
            store.upsert_match_stat(&stat(canon, shared, 5, 1))?;
            store.upsert_match_stat(&stat(dup, only_dup, 7, 1))?;

            store.reassign_match_stats(dup, canon)?;
            assert!(store.stats_for_player(dup)?.is_empty());
            let rows = store.stats_for_player(canon)?;
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].points, 5);
            assert_eq!(rows[1].points, 7);
            Ok(())
        })
        .unwrap();
    }
}
