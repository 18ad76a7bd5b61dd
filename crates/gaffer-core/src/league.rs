// Service surface for an outer request layer.
//
// Every operation is one transaction: authorization first, then fresh
// gameweeks and deadline checks, then validation against a working copy,
// then a version-checked save. Nothing is cached between calls.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::db::{Database, Store};
use crate::error::LeagueError;
use crate::gameweek::{
    effective_gameweek, ensure_before_deadline, gating_gameweek, lineup_window, quota_gameweek,
};
use crate::model::{
    CardEvent, FantasyTeam, FantasyTeamId, Gameweek, GoalEvent, Lineup, Match, MatchId, PlayerId,
    SnapshotKey, SubstitutionEvent, TeamId, UserId,
};
use crate::pipeline::{distribute_points, DistributionContext, DistributionReport};
use crate::roster::{LineupRequest, Transfer};
use crate::squad::validate_squad;

/// Trusted identity of whoever is calling, supplied by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: UserId) -> Self {
        Caller {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Caller {
            user_id,
            is_admin: true,
        }
    }
}

/// Changes to a fantasy team's metadata or whole squad.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub players: Option<Vec<PlayerId>>,
}

/// Admin edit of a match. Events are appended to the existing log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchUpdate {
    pub kickoff: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub home_lineup: Option<Lineup>,
    pub away_lineup: Option<Lineup>,
    pub goals: Vec<GoalEvent>,
    pub cards: Vec<CardEvent>,
    pub substitutions: Vec<SubstitutionEvent>,
    pub man_of_the_match: Option<PlayerId>,
    /// Blow the final whistle.
    pub finish: bool,
}

impl MatchUpdate {
    fn changes_events(&self) -> bool {
        self.home_lineup.is_some()
            || self.away_lineup.is_some()
            || !self.goals.is_empty()
            || !self.cards.is_empty()
            || !self.substitutions.is_empty()
            || self.man_of_the_match.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchUpdateOutcome {
    pub game: Match,
    /// Present when this update ran the points pipeline.
    pub distribution: Option<DistributionReport>,
}

fn invalid_event(message: String) -> LeagueError {
    LeagueError::InvalidEvent { message }
}

fn check_team(m: &Match, team_id: TeamId, what: &str) -> Result<(), LeagueError> {
    if m.side_of(team_id).is_none() {
        return Err(invalid_event(format!(
            "{what} names team {team_id}, which is not playing in match {}",
            m.id
        )));
    }
    Ok(())
}

/// Check new events against the match before anything is appended.
fn validate_events(m: &Match, update: &MatchUpdate) -> Result<(), LeagueError> {
    if !update.goals.is_empty() && m.fulltime {
        return Err(LeagueError::MatchFinished { match_id: m.id });
    }
    for goal in &update.goals {
        check_team(m, goal.team_id, "goal")?;
        if goal.own_goal && goal.scorer.is_some() {
            return Err(invalid_event("an own goal cannot credit a scorer".into()));
        }
        if goal.scorer.is_some() && goal.scorer == goal.assist {
            return Err(invalid_event("a player cannot assist their own goal".into()));
        }
    }
    for card in &update.cards {
        check_team(m, card.team_id, "card")?;
    }
    for sub in &update.substitutions {
        check_team(m, sub.team_id, "substitution")?;
        if sub.player_in == sub.player_out {
            return Err(invalid_event(format!(
                "player {} cannot replace themselves",
                sub.player_in
            )));
        }
    }
    Ok(())
}

pub struct League {
    db: Database,
    config: Config,
}

impl League {
    pub fn new(db: Database, config: Config) -> Self {
        League { db, config }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn gameweeks(&self, store: &Store<'_>) -> Result<Vec<Gameweek>, LeagueError> {
        Ok(store.gameweeks(self.config.league.competition_id)?)
    }

    fn require_admin(caller: &Caller, action: &'static str) -> Result<(), LeagueError> {
        if caller.is_admin {
            Ok(())
        } else {
            Err(LeagueError::Unauthorized { action })
        }
    }

    /// Load a team the caller owns, let `f` change it, and save it with a
    /// version check, all in one transaction.
    fn mutate_team<F>(
        &self,
        caller: &Caller,
        team_id: FantasyTeamId,
        action: &'static str,
        f: F,
    ) -> Result<FantasyTeam, LeagueError>
    where
        F: FnOnce(&Store<'_>, &mut FantasyTeam, &[Gameweek]) -> Result<(), LeagueError>,
    {
        self.db.transaction(|store| {
            let mut team = store
                .team(team_id)?
                .ok_or_else(|| LeagueError::not_found("fantasy team", team_id))?;
            if team.user_id != caller.user_id {
                return Err(LeagueError::Unauthorized { action });
            }
            let gameweeks = self.gameweeks(store)?;
            f(store, &mut team, &gameweeks)?;
            if !store.save_team(&mut team)? {
                return Err(LeagueError::Conflict {
                    entity: "fantasy team",
                    id: team_id,
                });
            }
            Ok(team)
        })
    }

    // -----------------------------------------------------------------------
    // Fantasy teams
    // -----------------------------------------------------------------------

    pub fn team(&self, team_id: FantasyTeamId) -> Result<FantasyTeam, LeagueError> {
        self.db
            .read(|store| store.team(team_id))?
            .ok_or_else(|| LeagueError::not_found("fantasy team", team_id))
    }

    pub fn team_for_user(&self, user_id: UserId) -> Result<Option<FantasyTeam>, LeagueError> {
        Ok(self.db.read(|store| store.team_for_user(user_id))?)
    }

    /// Create the caller's team from a full squad. One team per user.
    pub fn create_team(
        &self,
        caller: &Caller,
        name: &str,
        player_ids: &[PlayerId],
        now: DateTime<Utc>,
    ) -> Result<FantasyTeam, LeagueError> {
        self.db.transaction(|store| {
            if store.team_for_user(caller.user_id)?.is_some() {
                return Err(LeagueError::AlreadyExists {
                    entity: "fantasy team",
                    owner: format!("user {}", caller.user_id),
                });
            }
            let players = store.players_by_ids(player_ids)?;
            let budget = self.config.league.budget;
            let roster = validate_squad(player_ids, &players, budget, &self.config.squad)?;
            let gameweeks = self.gameweeks(store)?;
            let effective = effective_gameweek(&gameweeks, now);

            let mut team = FantasyTeam::new(caller.user_id, name, budget, roster, effective, now);
            team.id = store.insert_team(&team)?;
            info!(
                "Created team {} '{}' for user {}, effective gameweek {:?}",
                team.id, team.name, team.user_id, team.effective_gameweek
            );
            Ok(team)
        })
    }

    /// Rename the team and/or replace its whole squad. Closed at the
    /// upcoming gameweek's deadline.
    pub fn update_team(
        &self,
        caller: &Caller,
        team_id: FantasyTeamId,
        update: &TeamUpdate,
        now: DateTime<Utc>,
    ) -> Result<FantasyTeam, LeagueError> {
        let squad_rules = &self.config.squad;
        let team = self.mutate_team(
            caller,
            team_id,
            "edit this team",
            |store, team, gameweeks| {
                ensure_before_deadline(gameweeks, now)?;
                if let Some(name) = &update.name {
                    team.name = name.clone();
                }
                if let Some(ids) = &update.players {
                    let players = store.players_by_ids(ids)?;
                    let validated = validate_squad(ids, &players, team.budget, squad_rules)?;
                    team.replace_squad(validated);
                }
                Ok(())
            },
        )?;
        info!("Updated team {}", team_id);
        Ok(team)
    }

    pub fn delete_team(&self, caller: &Caller, team_id: FantasyTeamId) -> Result<(), LeagueError> {
        self.db.transaction(|store| {
            let team = store
                .team(team_id)?
                .ok_or_else(|| LeagueError::not_found("fantasy team", team_id))?;
            if team.user_id != caller.user_id {
                return Err(LeagueError::Unauthorized {
                    action: "delete this team",
                });
            }
            store.delete_team(team_id)?;
            info!("Deleted team {} of user {}", team_id, team.user_id);
            Ok(())
        })
    }

    /// Apply a transfer batch against the upcoming gameweek's free quota.
    pub fn make_transfers(
        &self,
        caller: &Caller,
        team_id: FantasyTeamId,
        transfers: &[Transfer],
        now: DateTime<Utc>,
    ) -> Result<FantasyTeam, LeagueError> {
        let config = &self.config;
        let team = self.mutate_team(
            caller,
            team_id,
            "transfer for this team",
            |store, team, gameweeks| {
                ensure_before_deadline(gameweeks, now)?;
                // Matches of the running gameweek score the squad picked
                // before its deadline.
                if let Some(gameweek) = lineup_window(gameweeks, now).in_progress {
                    team.freeze_gameweek(gameweek, config.lineup.starters, now);
                }
                let mut ids: Vec<PlayerId> = team.player_ids();
                ids.extend(transfers.iter().map(|t| t.player_in));
                let players = store.players_by_ids(&ids)?;
                team.apply_transfers(
                    transfers,
                    &players,
                    quota_gameweek(gameweeks, now),
                    &config.squad,
                    &config.transfers,
                )?;
                Ok(())
            },
        )?;
        info!(
            "Team {} made {} transfers ({} used this gameweek)",
            team_id,
            transfers.len(),
            team.transfers.used
        );
        Ok(team)
    }

    /// Pick a starting set and captaincy for a gameweek or as the default.
    pub fn set_lineup(
        &self,
        caller: &Caller,
        team_id: FantasyTeamId,
        request: &LineupRequest,
        now: DateTime<Utc>,
    ) -> Result<FantasyTeam, LeagueError> {
        let rules = &self.config.lineup;
        let team = self.mutate_team(
            caller,
            team_id,
            "set this team's lineup",
            |_, team, gameweeks| {
                let gated = match request.target {
                    SnapshotKey::Default => true,
                    SnapshotKey::Gameweek(n) => {
                        gating_gameweek(gameweeks, now).is_some_and(|gw| gw.number == n)
                    }
                };
                if gated {
                    ensure_before_deadline(gameweeks, now)?;
                }
                team.set_lineup(request, rules, lineup_window(gameweeks, now), now)?;
                Ok(())
            },
        )?;
        info!("Team {} set lineup for {}", team_id, request.target);
        Ok(team)
    }

    /// Swap one starter with one bench player.
    pub fn substitute(
        &self,
        caller: &Caller,
        team_id: FantasyTeamId,
        first: PlayerId,
        second: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<FantasyTeam, LeagueError> {
        let rules = &self.config.lineup;
        let team = self.mutate_team(
            caller,
            team_id,
            "change this team's lineup",
            |_, team, gameweeks| {
                ensure_before_deadline(gameweeks, now)?;
                team.substitute(first, second, rules, lineup_window(gameweeks, now), now)?;
                Ok(())
            },
        )?;
        info!("Team {} swapped players {} and {}", team_id, first, second);
        Ok(team)
    }

    pub fn set_captaincy(
        &self,
        caller: &Caller,
        team_id: FantasyTeamId,
        captain: PlayerId,
        vice_captain: Option<PlayerId>,
        now: DateTime<Utc>,
    ) -> Result<FantasyTeam, LeagueError> {
        let rules = &self.config.lineup;
        let team = self.mutate_team(
            caller,
            team_id,
            "change this team's captain",
            |_, team, gameweeks| {
                ensure_before_deadline(gameweeks, now)?;
                let window = lineup_window(gameweeks, now);
                team.set_captaincy(captain, vice_captain, rules, window, now)?;
                Ok(())
            },
        )?;
        info!(
            "Team {} captain {} vice {:?}",
            team_id, captain, vice_captain
        );
        Ok(team)
    }

    // -----------------------------------------------------------------------
    // Matches
    // -----------------------------------------------------------------------

    fn distribution_context<'a>(
        &'a self,
        gameweeks: &'a [Gameweek],
        now: DateTime<Utc>,
    ) -> DistributionContext<'a> {
        DistributionContext {
            scoring: &self.config.scoring,
            starters: self.config.lineup.starters,
            gameweeks,
            now,
        }
    }

    /// Append events to a match and optionally finish it. Finishing it, or
    /// editing a match that is already finished, runs the points pipeline
    /// in the same transaction.
    pub fn update_match(
        &self,
        caller: &Caller,
        match_id: MatchId,
        update: &MatchUpdate,
        now: DateTime<Utc>,
    ) -> Result<MatchUpdateOutcome, LeagueError> {
        Self::require_admin(caller, "edit matches")?;
        self.db.transaction(|store| {
            let mut m = store
                .load_match(match_id)?
                .ok_or_else(|| LeagueError::not_found("match", match_id))?;
            validate_events(&m, update)?;

            let was_fulltime = m.fulltime;
            if let Some(kickoff) = update.kickoff {
                m.kickoff = Some(kickoff);
            }
            if let Some(venue) = &update.venue {
                m.venue = Some(venue.clone());
            }
            if let Some(lineup) = &update.home_lineup {
                m.home_lineup = lineup.clone();
            }
            if let Some(lineup) = &update.away_lineup {
                m.away_lineup = lineup.clone();
            }
            m.goals.extend(update.goals.iter().cloned());
            m.cards.extend(update.cards.iter().cloned());
            m.substitutions.extend(update.substitutions.iter().cloned());
            if update.man_of_the_match.is_some() {
                m.man_of_the_match = update.man_of_the_match;
            }
            if update.finish {
                m.fulltime = true;
            }
            store.save_match(&mut m)?;

            let rerun = was_fulltime && update.changes_events();
            let distribution = if (m.fulltime && !was_fulltime) || rerun {
                let gameweeks = self.gameweeks(store)?;
                let report =
                    distribute_points(store, match_id, self.distribution_context(&gameweeks, now))?;
                m = store
                    .load_match(match_id)?
                    .ok_or_else(|| LeagueError::not_found("match", match_id))?;
                Some(report)
            } else {
                None
            };
            info!(
                "Updated match {}: {}-{}{}",
                match_id,
                m.home_score,
                m.away_score,
                if m.fulltime { " (fulltime)" } else { "" }
            );
            Ok(MatchUpdateOutcome {
                game: m,
                distribution,
            })
        })
    }

    /// Re-run the points pipeline for a finished match. Totals are rebuilt,
    /// never added to.
    pub fn reprocess_match(
        &self,
        caller: &Caller,
        match_id: MatchId,
        now: DateTime<Utc>,
    ) -> Result<DistributionReport, LeagueError> {
        Self::require_admin(caller, "reprocess matches")?;
        self.db.transaction(|store| {
            let gameweeks = self.gameweeks(store)?;
            distribute_points(store, match_id, self.distribution_context(&gameweeks, now))
        })
    }

    /// Players holding a starting place in the team's lineup for a gameweek.
    pub fn lineup_for(
        &self,
        team_id: FantasyTeamId,
        gameweek: u32,
    ) -> Result<BTreeSet<PlayerId>, LeagueError> {
        let team = self.team(team_id)?;
        Ok(team.lineup_for(gameweek).0)
    }
}
