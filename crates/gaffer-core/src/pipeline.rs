// Points distribution: one fulltime match fanned out to player stat rows
// and every fantasy team that holds a scored player.
//
// Runs against a `Store` so the caller decides the transaction; all writes
// for a match land together or not at all. Every stored value is keyed by
// match id and totals are rebuilt from those entries, so a re-run
// overwrites instead of adding.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::{Database, Store};
use crate::error::LeagueError;
use crate::events::{self, MatchSummary};
use crate::gameweek::gameweek_for_kickoff;
use crate::model::{
    Contribution, FantasyTeam, FantasyTeamId, Gameweek, Match, MatchId, MatchPoints, Player,
    PlayerId, PlayerMatchStat,
};
use crate::scoring::{score_player_performance, ScoringRules};

/// What one distribution run did.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionReport {
    pub match_id: MatchId,
    pub gameweek: u32,
    /// Raw points per scored player.
    pub player_points: BTreeMap<PlayerId, i32>,
    /// Points per fantasy team that earned anything from this match.
    pub team_points: BTreeMap<FantasyTeamId, i32>,
    /// Teams holding a scored player whose squad was not active yet.
    pub skipped_teams: Vec<FantasyTeamId>,
}

/// Inputs a run needs beyond the match itself.
#[derive(Debug, Clone, Copy)]
pub struct DistributionContext<'a> {
    pub scoring: &'a ScoringRules,
    /// Size of a full starting set, for freezing gameweek snapshots.
    pub starters: usize,
    /// Gameweeks used for the kickoff-date fallback.
    pub gameweeks: &'a [Gameweek],
    pub now: DateTime<Utc>,
}

/// Gameweek a match counts towards: its fixture's gameweek, else the one
/// stamped on the match, else the gameweek its kickoff falls in.
pub fn resolve_gameweek(
    store: &Store<'_>,
    m: &Match,
    gameweeks: &[Gameweek],
) -> Result<Option<u32>, LeagueError> {
    if let Some(number) = store.gameweek_number_for_match(m.id)? {
        return Ok(Some(number));
    }
    Ok(m.gameweek
        .or_else(|| m.kickoff.and_then(|k| gameweek_for_kickoff(gameweeks, k))))
}

/// Raw fantasy points for every player in the summary whose player row is
/// known.
pub fn score_match(
    rules: &ScoringRules,
    summary: &MatchSummary,
    players: &HashMap<PlayerId, Player>,
) -> BTreeMap<PlayerId, i32> {
    summary
        .performances
        .iter()
        .filter_map(|(&player_id, perf)| {
            let Some(player) = players.get(&player_id) else {
                warn!(
                    "Match {} references unknown player {}, not scored",
                    summary.match_id, player_id
                );
                return None;
            };
            let points = score_player_performance(
                rules,
                perf,
                player.position.category(),
                summary.conceded_for(player_id),
                perf.started,
                perf.subbed_on,
                summary.outcome_for(player_id),
            );
            Some((player_id, points))
        })
        .collect()
}

/// A team's share of one match, or `None` when it held none of the scored
/// players.
///
/// A player counts when they are in the team's starting set for the
/// gameweek or came off the bench in this match. The captain's points are
/// multiplied. With vice promotion on, the vice-captain takes the
/// multiplier instead when the captain's club played this match and the
/// captain did not appear.
///
/// The squad is the one recorded when the match was first scored for this
/// team, so a re-run after a transfer still credits players sold since.
/// `players` resolves clubs for captains no longer on the roster.
pub fn team_match_points(
    team: &FantasyTeam,
    gameweek: u32,
    m: &Match,
    summary: &MatchSummary,
    scores: &BTreeMap<PlayerId, i32>,
    players: &HashMap<PlayerId, Player>,
    rules: &ScoringRules,
) -> Option<MatchPoints> {
    let (starting, captain, vice_captain) = team.lineup_for(gameweek);

    let held: Vec<PlayerId> = match team.match_points.get(&m.id) {
        Some(previous) if !previous.held.is_empty() => previous.held.clone(),
        _ => team.roster.iter().map(|e| e.player_id).collect(),
    };
    let mut candidates = held.clone();
    candidates.extend(starting.iter().copied().filter(|id| !held.contains(id)));

    let captain_missed = captain.is_some_and(|c| {
        let club = team
            .entry(c)
            .map(|e| e.team_id)
            .or_else(|| players.get(&c).map(|p| p.team_id));
        let club_played = club.is_some_and(|club| m.side_of(club).is_some());
        let appeared = summary.performances.get(&c).is_some_and(|p| p.appeared());
        club_played && !appeared
    });
    let multiplied = if rules.promote_vice_captain && captain_missed {
        vice_captain
    } else {
        captain
    };

    let contributions: Vec<Contribution> = candidates
        .iter()
        .filter_map(|&player_id| {
            let raw_points = *scores.get(&player_id)?;
            let subbed_on = summary
                .performances
                .get(&player_id)
                .is_some_and(|p| p.subbed_on);
            let counted = starting.contains(&player_id) || subbed_on;
            let counted_points = match (counted, multiplied == Some(player_id)) {
                (false, _) => 0,
                (true, true) => raw_points * rules.captain_multiplier,
                (true, false) => raw_points,
            };
            Some(Contribution {
                player_id,
                raw_points,
                counted_points,
                is_captain: captain == Some(player_id),
                is_vice_captain: vice_captain == Some(player_id),
            })
        })
        .collect();

    if contributions.is_empty() {
        return None;
    }
    Some(MatchPoints {
        gameweek,
        total: contributions.iter().map(|c| c.counted_points).sum(),
        contributions,
        held,
    })
}

/// Score a fulltime match and fan the points out. Safe to repeat.
pub fn distribute_points(
    store: &Store<'_>,
    match_id: MatchId,
    ctx: DistributionContext<'_>,
) -> Result<DistributionReport, LeagueError> {
    let m = store
        .load_match(match_id)?
        .ok_or_else(|| LeagueError::not_found("match", match_id))?;
    if !m.fulltime {
        return Err(LeagueError::InvalidEvent {
            message: format!("match {match_id} is not at fulltime"),
        });
    }
    if m.fantasy_processed {
        warn!("Match {} already processed, recomputing", match_id);
    }

    let summary = events::extract(&m);
    let gameweek = resolve_gameweek(store, &m, ctx.gameweeks)?
        .ok_or_else(|| LeagueError::not_found("gameweek for match", match_id))?;

    // Player stat rows and season aggregates.
    let ids: Vec<PlayerId> = summary.performances.keys().copied().collect();
    let players = store.players_by_ids(&ids)?;
    let scores = score_match(ctx.scoring, &summary, &players);
    for (&player_id, perf) in &summary.performances {
        let Some(&points) = scores.get(&player_id) else {
            continue;
        };
        store.upsert_match_stat(&PlayerMatchStat {
            player_id,
            match_id,
            gameweek,
            points,
            performance: perf.clone(),
        })?;
    }
    let scored: Vec<PlayerId> = scores.keys().copied().collect();
    let removed = store.prune_match_stats(match_id, &scored)?;
    for &player_id in scored.iter().chain(&removed) {
        store.recompute_player_aggregates(player_id)?;
    }
    debug!(
        "Match {}: scored {} players, dropped {} stale rows",
        match_id,
        scored.len(),
        removed.len()
    );

    // Teams holding a scored (or formerly scored) player, plus teams that
    // earned from this match on an earlier run.
    let mut teams: BTreeMap<FantasyTeamId, FantasyTeam> = BTreeMap::new();
    let affected: Vec<PlayerId> = scored.iter().chain(&removed).copied().collect();
    for team in store.teams_holding(&affected)? {
        teams.insert(team.id, team);
    }
    for team_id in m.fantasy_points.keys() {
        if !teams.contains_key(team_id) {
            if let Some(team) = store.team(*team_id)? {
                teams.insert(team.id, team);
            }
        }
    }

    // Captains sold since an earlier run still need a club for vice
    // promotion.
    let mut players = players;
    let missing: Vec<PlayerId> = teams
        .values()
        .filter_map(|team| team.lineup_for(gameweek).1)
        .filter(|c| !players.contains_key(c))
        .collect();
    if !missing.is_empty() {
        players.extend(store.players_by_ids(&missing)?);
    }

    let mut team_points = BTreeMap::new();
    let mut skipped_teams = Vec::new();
    for (team_id, mut team) in teams {
        let earned = if team.effective_gameweek.is_some_and(|eff| eff > gameweek) {
            debug!(
                "Team {} starts in gameweek {:?}, skipping match {} (gameweek {})",
                team_id, team.effective_gameweek, match_id, gameweek
            );
            skipped_teams.push(team_id);
            None
        } else {
            team_match_points(
                &team,
                gameweek,
                &m,
                &summary,
                &scores,
                &players,
                ctx.scoring,
            )
        };

        match earned {
            Some(points) => {
                team_points.insert(team_id, points.total);
                team.match_points.insert(match_id, points);
            }
            None => {
                team.match_points.remove(&match_id);
            }
        }
        team.recompute_totals();
        team.freeze_gameweek(gameweek, ctx.starters, ctx.now);
        if !store.save_team(&mut team)? {
            return Err(LeagueError::Conflict {
                entity: "fantasy team",
                id: team_id,
            });
        }
    }

    store.record_fantasy_points(match_id, gameweek, &team_points)?;
    info!(
        "Processed match {} for gameweek {}: {} players, {} teams",
        match_id,
        gameweek,
        scores.len(),
        team_points.len()
    );

    Ok(DistributionReport {
        match_id,
        gameweek,
        player_points: scores,
        team_points,
        skipped_teams,
    })
}

/// `distribute_points` in its own transaction.
pub fn process_match(
    db: &Database,
    match_id: MatchId,
    ctx: DistributionContext<'_>,
) -> Result<DistributionReport, LeagueError> {
    db.transaction(|store| distribute_points(store, match_id, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        GoalEvent, LineupSnapshot, NewPlayer, Position, RosterEntry, SnapshotKey, Stage,
        SubstitutionEvent,
    };
    use chrono::TimeZone;

    const HOME: i64 = 1;
    const AWAY: i64 = 2;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 9, 20, 0, 0).unwrap()
    }

    fn ctx<'a>(rules: &'a ScoringRules, gameweeks: &'a [Gameweek]) -> DistributionContext<'a> {
        DistributionContext {
            scoring: rules,
            starters: 2,
            gameweeks,
            now: now(),
        }
    }

    struct Scenario {
        db: Database,
        match_id: MatchId,
        striker: PlayerId,
        midfielder: PlayerId,
        defender: PlayerId,
        sub: PlayerId,
        bench: PlayerId,
    }

    fn entry(player: &Player, starting: bool) -> RosterEntry {
        RosterEntry {
            player_id: player.id,
            starting,
            locked_price: player.price,
            position: player.position,
            team_id: player.team_id,
        }
    }

    /// Home win 1-0: striker scores, midfielder assists, defender starts,
    /// `sub` comes on for the defender, `bench` never plays. The match is
    /// linked to gameweek 3 through a fixture.
    fn setup() -> Scenario {
        let db = Database::open(":memory:").unwrap();
        let (match_id, ids) = db
            .transaction(|store| -> anyhow::Result<_> {
                let mut ids = Vec::new();
                for (name, position) in [
                    ("Striker", Position::Striker),
                    ("Midfielder", Position::CentralMidfield),
                    ("Defender", Position::CentreBack),
                    ("Sub", Position::LeftBack),
                    ("Bench", Position::RightBack),
                ] {
                    ids.push(store.insert_player(&NewPlayer {
                        name: name.into(),
                        position,
                        team_id: HOME,
                        price: 60,
                    })?);
                }
                let mut m = Match::new(HOME, AWAY, Some(now()));
                m.home_lineup.starting = vec![ids[0], ids[1], ids[2]];
                m.home_lineup.bench = vec![ids[3], ids[4]];
                m.goals.push(GoalEvent {
                    minute: 20,
                    team_id: HOME,
                    scorer: Some(ids[0]),
                    assist: Some(ids[1]),
                    own_goal: false,
                    own_goal_by: None,
                });
                m.substitutions.push(SubstitutionEvent {
                    minute: 70,
                    team_id: HOME,
                    player_in: ids[3],
                    player_out: ids[2],
                });
                m.fulltime = true;
                let match_id = store.insert_match(&m)?;
                let gw = store.insert_gameweek(1, 3, Stage::Regular, None)?;
                store.insert_fixture(gw, Some(HOME), Some(AWAY), Some(match_id))?;
                Ok((match_id, ids))
            })
            .unwrap();
        Scenario {
            db,
            match_id,
            striker: ids[0],
            midfielder: ids[1],
            defender: ids[2],
            sub: ids[3],
            bench: ids[4],
        }
    }

    /// A team starting the striker (captain) and midfielder, with the sub
    /// and bench player on its bench.
    fn insert_team(f: &Scenario, user_id: i64, effective_gameweek: Option<u32>) -> FantasyTeamId {
        f.db.transaction(|store| -> anyhow::Result<_> {
            let players = store.players_by_ids(&[f.striker, f.midfielder, f.sub, f.bench])?;
            let roster = vec![
                entry(&players[&f.striker], true),
                entry(&players[&f.midfielder], true),
                entry(&players[&f.sub], false),
                entry(&players[&f.bench], false),
            ];
            let mut team =
                FantasyTeam::new(user_id, "Test XI", 1000, roster, effective_gameweek, now());
            team.captain = Some(f.striker);
            team.vice_captain = Some(f.midfielder);
            store.insert_team(&team)
        })
        .unwrap()
    }

    fn process(f: &Scenario, rules: &ScoringRules) -> DistributionReport {
        process_match(&f.db, f.match_id, ctx(rules, &[])).unwrap()
    }

    // -----------------------------------------------------------------
    // Scoring and fan-out
    // -----------------------------------------------------------------

    #[test]
    fn scores_players_and_counts_captain_twice() {
        let f = setup();
        let team_id = insert_team(&f, 1, None);
        let report = process(&f, &ScoringRules::default());

        assert_eq!(report.gameweek, 3);
        // Start 2 + forward goal 4.
        assert_eq!(report.player_points[&f.striker], 6);
        // Start 2 + assist 3 + midfield clean sheet 1.
        assert_eq!(report.player_points[&f.midfielder], 6);
        // Start 2 + defensive clean sheet 4.
        assert_eq!(report.player_points[&f.defender], 6);
        // Sub appearance only.
        assert_eq!(report.player_points[&f.sub], 1);
        assert!(!report.player_points.contains_key(&f.bench));

        // Captain 12 + midfielder 6 + sub 1 (came on, so counted).
        assert_eq!(report.team_points[&team_id], 19);

        let team = f.db.read(|store| store.team(team_id)).unwrap().unwrap();
        assert_eq!(team.gameweek_points.get(&3), Some(&19));
        assert_eq!(team.season_points, 19);
        let points = &team.match_points[&f.match_id];
        assert_eq!(points.contributions.len(), 3);
        assert!(points.contributions.iter().any(|c| c.is_captain && c.counted_points == 12));

        let m = f.db.read(|store| store.load_match(f.match_id)).unwrap().unwrap();
        assert!(m.fantasy_processed);
        assert_eq!(m.gameweek, Some(3));
        assert_eq!(m.fantasy_points.get(&team_id), Some(&19));
    }

    #[test]
    fn reprocessing_overwrites_instead_of_adding() {
        let f = setup();
        let team_id = insert_team(&f, 1, None);
        let rules = ScoringRules::default();
        let first = process(&f, &rules);
        let second = process(&f, &rules);
        assert_eq!(first.team_points, second.team_points);

        let (team, striker) = f
            .db
            .read(|store| -> anyhow::Result<_> {
                Ok((store.team(team_id)?.unwrap(), store.player(f.striker)?.unwrap()))
            })
            .unwrap();
        assert_eq!(team.season_points, 19);
        assert_eq!(striker.season_points, 6);
        assert_eq!(striker.stats.goals, 1);
    }

    #[test]
    fn reprocessing_after_a_sale_keeps_the_squad_that_played() {
        let f = setup();
        let team_id = insert_team(&f, 1, None);
        let rules = ScoringRules::default();
        process(&f, &rules);

        // The captain is sold once the match has been scored.
        f.db.transaction(|store| -> anyhow::Result<()> {
            let mut team = store.team(team_id)?.unwrap();
            team.roster.retain(|e| e.player_id != f.striker);
            team.captain = Some(f.midfielder);
            team.vice_captain = None;
            anyhow::ensure!(store.save_team(&mut team)?);
            Ok(())
        })
        .unwrap();

        let report = process(&f, &rules);
        assert_eq!(report.team_points[&team_id], 19);
        let team = f.db.read(|store| store.team(team_id)).unwrap().unwrap();
        assert_eq!(team.season_points, 19);
        let points = &team.match_points[&f.match_id];
        assert!(points.held.contains(&f.striker));
        assert!(points
            .contributions
            .iter()
            .any(|c| c.player_id == f.striker && c.counted_points == 12));
    }

    #[test]
    fn removed_event_drops_stale_stats() {
        let f = setup();
        let rules = ScoringRules::default();
        process(&f, &rules);

        f.db.transaction(|store| -> anyhow::Result<()> {
            let mut m = store.load_match(f.match_id)?.unwrap();
            m.goals.clear();
            m.substitutions.clear();
            store.save_match(&mut m)
        })
        .unwrap();
        let report = process(&f, &rules);
        assert!(!report.player_points.contains_key(&f.sub));

        let (striker, sub) = f
            .db
            .read(|store| -> anyhow::Result<_> {
                Ok((store.player(f.striker)?.unwrap(), store.player(f.sub)?.unwrap()))
            })
            .unwrap();
        assert_eq!(striker.stats.goals, 0);
        // Start only: forwards earn nothing for a clean sheet.
        assert_eq!(striker.season_points, 2);
        assert_eq!(sub.season_points, 0);
    }

    #[test]
    fn team_not_yet_active_is_skipped() {
        let f = setup();
        let late = insert_team(&f, 1, Some(4));
        let on_time = insert_team(&f, 2, Some(3));
        let report = process(&f, &ScoringRules::default());

        assert_eq!(report.skipped_teams, vec![late]);
        assert!(!report.team_points.contains_key(&late));
        assert!(report.team_points.contains_key(&on_time));
        let team = f.db.read(|store| store.team(late)).unwrap().unwrap();
        assert_eq!(team.season_points, 0);
        assert!(team.match_points.is_empty());
    }

    #[test]
    fn gameweek_snapshot_is_frozen_on_first_points() {
        let f = setup();
        let team_id = insert_team(&f, 1, None);
        process(&f, &ScoringRules::default());
        let team = f.db.read(|store| store.team(team_id)).unwrap().unwrap();
        let snapshot = &team.lineup_snapshots[&SnapshotKey::Gameweek(3)];
        assert_eq!(snapshot.starting, vec![f.striker, f.midfielder]);
        assert_eq!(snapshot.captain, Some(f.striker));
    }

    #[test]
    fn gameweek_snapshot_decides_who_counts() {
        let f = setup();
        let team_id = insert_team(&f, 1, None);
        // For gameweek 3 the user picked the bench player and the
        // midfielder, with the midfielder as captain.
        f.db.transaction(|store| -> anyhow::Result<()> {
            let mut team = store.team(team_id)?.unwrap();
            team.lineup_snapshots.insert(
                SnapshotKey::Gameweek(3),
                LineupSnapshot {
                    starting: vec![f.bench, f.midfielder],
                    captain: Some(f.midfielder),
                    vice_captain: None,
                    taken_at: now(),
                    is_default: false,
                },
            );
            anyhow::ensure!(store.save_team(&mut team)?);
            Ok(())
        })
        .unwrap();

        let report = process(&f, &ScoringRules::default());
        // Midfielder captain 12 + sub 1; striker was benched for the week.
        assert_eq!(report.team_points[&team_id], 13);
    }

    #[test]
    fn vice_promotion_only_when_enabled() {
        let f = setup();
        let team_id = insert_team(&f, 1, None);
        // Captain the bench player, who never came on.
        f.db.transaction(|store| -> anyhow::Result<()> {
            let mut team = store.team(team_id)?.unwrap();
            team.captain = Some(f.bench);
            anyhow::ensure!(store.save_team(&mut team)?);
            Ok(())
        })
        .unwrap();

        let plain = process(&f, &ScoringRules::default());
        // Striker 6 + midfielder 6 + sub 1.
        assert_eq!(plain.team_points[&team_id], 13);

        let rules = ScoringRules {
            promote_vice_captain: true,
            ..ScoringRules::default()
        };
        let promoted = process(&f, &rules);
        // Vice (midfielder) doubled.
        assert_eq!(promoted.team_points[&team_id], 19);
    }

    // -----------------------------------------------------------------
    // Gameweek resolution
    // -----------------------------------------------------------------

    #[test]
    fn falls_back_to_kickoff_date() {
        let db = Database::open(":memory:").unwrap();
        let match_id = db
            .transaction(|store| -> anyhow::Result<_> {
                let mut m = Match::new(HOME, AWAY, Some(now()));
                m.fulltime = true;
                store.insert_match(&m)
            })
            .unwrap();
        let gameweeks = vec![
            Gameweek {
                id: 1,
                competition_id: 1,
                number: 1,
                deadline: Some(now() - chrono::Duration::days(8)),
                stage: Stage::Regular,
            },
            Gameweek {
                id: 2,
                competition_id: 1,
                number: 2,
                deadline: Some(now() - chrono::Duration::days(1)),
                stage: Stage::Regular,
            },
        ];
        let rules = ScoringRules::default();
        let report = process_match(&db, match_id, ctx(&rules, &gameweeks)).unwrap();
        assert_eq!(report.gameweek, 2);
    }

    #[test]
    fn unresolvable_gameweek_is_not_found_and_leaves_match_unprocessed() {
        let db = Database::open(":memory:").unwrap();
        let match_id = db
            .transaction(|store| -> anyhow::Result<_> {
                let mut m = Match::new(HOME, AWAY, None);
                m.fulltime = true;
                store.insert_match(&m)
            })
            .unwrap();
        let rules = ScoringRules::default();
        let err = process_match(&db, match_id, ctx(&rules, &[])).unwrap_err();
        assert!(matches!(err, LeagueError::NotFound { .. }));
        let m = db.read(|store| store.load_match(match_id)).unwrap().unwrap();
        assert!(!m.fantasy_processed);
    }

    #[test]
    fn unfinished_match_is_rejected() {
        let db = Database::open(":memory:").unwrap();
        let match_id = db
            .transaction(|store| store.insert_match(&Match::new(HOME, AWAY, None)))
            .unwrap();
        let rules = ScoringRules::default();
        assert!(matches!(
            process_match(&db, match_id, ctx(&rules, &[])),
            Err(LeagueError::InvalidEvent { .. })
        ));
    }
}
