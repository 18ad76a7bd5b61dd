// Offline reconciliation: fold a duplicate player identity into the
// canonical one across every match, stat row and fantasy team.

use tracing::info;

use crate::db::Database;
use crate::error::LeagueError;
use crate::model::{FantasyTeam, Lineup, Match, PlayerId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub matches_rewritten: usize,
    pub teams_rewritten: usize,
}

fn swap(id: &mut PlayerId, from: PlayerId, to: PlayerId) -> bool {
    if *id == from {
        *id = to;
        true
    } else {
        false
    }
}

fn swap_opt(id: &mut Option<PlayerId>, from: PlayerId, to: PlayerId) -> bool {
    id.as_mut().is_some_and(|id| swap(id, from, to))
}

fn swap_all<'a>(
    ids: impl IntoIterator<Item = &'a mut PlayerId>,
    from: PlayerId,
    to: PlayerId,
) -> bool {
    ids.into_iter().fold(false, |changed, id| swap(id, from, to) | changed)
}

fn rewrite_lineup(lineup: &mut Lineup, from: PlayerId, to: PlayerId) -> bool {
    let starting = swap_all(lineup.starting.iter_mut(), from, to);
    let bench = swap_all(lineup.bench.iter_mut(), from, to);
    starting | bench
}

/// Point every reference to `from` in a match at `to`.
fn rewrite_match(m: &mut Match, from: PlayerId, to: PlayerId) -> bool {
    let mut changed = rewrite_lineup(&mut m.home_lineup, from, to);
    changed |= rewrite_lineup(&mut m.away_lineup, from, to);
    for goal in m.goals.iter_mut() {
        changed |= swap_opt(&mut goal.scorer, from, to);
        changed |= swap_opt(&mut goal.assist, from, to);
        changed |= swap_opt(&mut goal.own_goal_by, from, to);
    }
    changed |= swap_all(m.cards.iter_mut().map(|c| &mut c.player_id), from, to);
    for sub in m.substitutions.iter_mut() {
        changed |= swap(&mut sub.player_in, from, to);
        changed |= swap(&mut sub.player_out, from, to);
    }
    changed |= swap_opt(&mut m.man_of_the_match, from, to);
    changed
}

/// Point every reference to `from` in a fantasy team at `to`: roster,
/// captaincy, snapshots, and the points breakdown.
fn rewrite_team(team: &mut FantasyTeam, from: PlayerId, to: PlayerId) -> bool {
    let mut changed = swap_all(team.roster.iter_mut().map(|e| &mut e.player_id), from, to);
    changed |= swap_opt(&mut team.captain, from, to);
    changed |= swap_opt(&mut team.vice_captain, from, to);
    for snapshot in team.lineup_snapshots.values_mut() {
        changed |= swap_all(snapshot.starting.iter_mut(), from, to);
        changed |= swap_opt(&mut snapshot.captain, from, to);
        changed |= swap_opt(&mut snapshot.vice_captain, from, to);
    }
    for points in team.match_points.values_mut() {
        changed |= swap_all(
            points.contributions.iter_mut().map(|c| &mut c.player_id),
            from,
            to,
        );
        changed |= swap_all(points.held.iter_mut(), from, to);
    }
    changed
}

/// Merge `duplicate` into `canonical` in one transaction.
///
/// Stat rows move to the canonical player; where both have a row for the
/// same match the canonical row is kept. A fantasy team holding both
/// identities blocks the merge, since its roster would collapse.
pub fn merge_players(
    db: &Database,
    duplicate: PlayerId,
    canonical: PlayerId,
) -> Result<MergeReport, LeagueError> {
    if duplicate == canonical {
        return Err(LeagueError::MergeBlocked {
            message: format!("player {duplicate} cannot be merged into itself"),
        });
    }
    db.transaction(|store| {
        for id in [duplicate, canonical] {
            if store.player(id)?.is_none() {
                return Err(LeagueError::not_found("player", id));
            }
        }

        let mut report = MergeReport::default();
        for mut team in store.all_teams()? {
            if team.holds(duplicate) && team.holds(canonical) {
                return Err(LeagueError::MergeBlocked {
                    message: format!(
                        "fantasy team {} holds both player {duplicate} and player {canonical}",
                        team.id
                    ),
                });
            }
            if rewrite_team(&mut team, duplicate, canonical) {
                if !store.save_team(&mut team)? {
                    return Err(LeagueError::Conflict {
                        entity: "fantasy team",
                        id: team.id,
                    });
                }
                report.teams_rewritten += 1;
            }
        }

        for mut m in store.all_matches()? {
            if rewrite_match(&mut m, duplicate, canonical) {
                store.save_match(&mut m)?;
                report.matches_rewritten += 1;
            }
        }

        store.reassign_match_stats(duplicate, canonical)?;
        store.recompute_player_aggregates(canonical)?;
        store.delete_player(duplicate)?;

        info!(
            "Merged player {} into {}: {} matches, {} teams rewritten",
            duplicate, canonical, report.matches_rewritten, report.teams_rewritten
        );
        Ok(report)
    })
}
