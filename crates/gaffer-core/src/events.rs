// Per-player performance summaries built from a match's event log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{CardColor, Match, MatchId, PlayerId, Side, TeamId, TeamOutcome};

/// What one player did in one match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    /// Club the player turned out for, when the event log tells us.
    pub team_id: Option<TeamId>,
    pub goals: u32,
    pub assists: u32,
    pub own_goals: u32,
    pub yellow_cards: u32,
    /// Straight red, or a second yellow.
    pub red_card: bool,
    pub man_of_the_match: bool,
    pub started: bool,
    pub subbed_on: bool,
}

impl Performance {
    pub fn appeared(&self) -> bool {
        self.started || self.subbed_on
    }
}

/// One club's view of the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamSummary {
    pub team_id: TeamId,
    pub goals_for: u32,
    pub conceded: u32,
    pub outcome: TeamOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub home: TeamSummary,
    pub away: TeamSummary,
    pub performances: BTreeMap<PlayerId, Performance>,
}

impl MatchSummary {
    pub fn team(&self, team_id: TeamId) -> Option<&TeamSummary> {
        if self.home.team_id == team_id {
            Some(&self.home)
        } else if self.away.team_id == team_id {
            Some(&self.away)
        } else {
            None
        }
    }

    /// Goals conceded by the club a player turned out for. Unknown club
    /// means no clean sheet can be claimed, so it reports `None`.
    pub fn conceded_for(&self, player_id: PlayerId) -> Option<u32> {
        let team_id = self.performances.get(&player_id)?.team_id?;
        self.team(team_id).map(|t| t.conceded)
    }

    pub fn outcome_for(&self, player_id: PlayerId) -> Option<TeamOutcome> {
        let team_id = self.performances.get(&player_id)?.team_id?;
        self.team(team_id).map(|t| t.outcome)
    }
}

fn team_summary(m: &Match, side: Side) -> TeamSummary {
    let (home, away) = m.score();
    let (goals_for, conceded) = match side {
        Side::Home => (home, away),
        Side::Away => (away, home),
    };
    let outcome = match goals_for.cmp(&conceded) {
        std::cmp::Ordering::Greater => TeamOutcome::Win,
        std::cmp::Ordering::Less => TeamOutcome::Loss,
        std::cmp::Ordering::Equal => TeamOutcome::Draw,
    };
    TeamSummary {
        team_id: m.team_id(side),
        goals_for,
        conceded,
        outcome,
    }
}

/// Fetch (or create) a player's record, filling in their club the first
/// time one is known.
fn performance<'a>(
    performances: &'a mut BTreeMap<PlayerId, Performance>,
    player_id: PlayerId,
    team_id: Option<TeamId>,
) -> &'a mut Performance {
    let perf = performances.entry(player_id).or_default();
    if perf.team_id.is_none() {
        perf.team_id = team_id;
    }
    perf
}

/// Build the per-player performance map for a match.
///
/// A player is included if they started, came on, scored, assisted, scored
/// an own goal, were booked, or were named man of the match. Players only
/// named on the bench who never came on are left out.
pub fn extract(m: &Match) -> MatchSummary {
    let mut performances: BTreeMap<PlayerId, Performance> = BTreeMap::new();

    for side in [Side::Home, Side::Away] {
        let team_id = m.team_id(side);
        for &player_id in &m.lineup(side).starting {
            performance(&mut performances, player_id, Some(team_id)).started = true;
        }
    }

    for sub in &m.substitutions {
        performance(&mut performances, sub.player_in, Some(sub.team_id)).subbed_on = true;
    }
    // The outgoing half of a substitution was on the pitch, so unless they
    // came on earlier themselves they started.
    for sub in &m.substitutions {
        let out = performance(&mut performances, sub.player_out, Some(sub.team_id));
        if !out.subbed_on {
            out.started = true;
        }
    }

    for goal in &m.goals {
        if goal.own_goal {
            match goal.own_goal_by {
                Some(player_id) => {
                    let club = m.lineup_team_of(player_id).or(m.opponent_of(goal.team_id));
                    performance(&mut performances, player_id, club).own_goals += 1;
                }
                None => warn!("Own goal in match {} has no player attached", m.id),
            }
            continue;
        }
        if let Some(scorer) = goal.scorer {
            performance(&mut performances, scorer, Some(goal.team_id)).goals += 1;
        }
        if let Some(assist) = goal.assist {
            performance(&mut performances, assist, Some(goal.team_id)).assists += 1;
        }
    }

    for card in &m.cards {
        let perf = performance(&mut performances, card.player_id, Some(card.team_id));
        match card.color {
            CardColor::Yellow => perf.yellow_cards += 1,
            CardColor::Red => perf.red_card = true,
        }
    }
    for perf in performances.values_mut() {
        if perf.yellow_cards >= 2 {
            perf.red_card = true;
        }
    }

    if let Some(motm) = m.man_of_the_match {
        let club = m.lineup_team_of(motm);
        performance(&mut performances, motm, club).man_of_the_match = true;
    }

    MatchSummary {
        match_id: m.id,
        home: team_summary(m, Side::Home),
        away: team_summary(m, Side::Away),
        performances,
    }
}
