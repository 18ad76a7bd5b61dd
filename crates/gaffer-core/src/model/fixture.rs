// Matches, their event logs, and the gameweek/fixture schedule.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CompetitionId, FantasyTeamId, FixtureId, GameweekId, MatchId, PlayerId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

/// One side's team sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    pub starting: Vec<PlayerId>,
    pub bench: Vec<PlayerId>,
}

impl Lineup {
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.starting.contains(&player_id) || self.bench.contains(&player_id)
    }
}

/// A goal on the scoreboard.
///
/// `team_id` is the beneficiary: the team whose score goes up. For an own
/// goal that is the opponent of `own_goal_by`'s club, and `scorer` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalEvent {
    pub minute: u16,
    pub team_id: TeamId,
    pub scorer: Option<PlayerId>,
    pub assist: Option<PlayerId>,
    #[serde(default)]
    pub own_goal: bool,
    #[serde(default)]
    pub own_goal_by: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardColor {
    Yellow,
    Red,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEvent {
    pub minute: u16,
    pub team_id: TeamId,
    pub player_id: PlayerId,
    pub color: CardColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionEvent {
    pub minute: u16,
    pub team_id: TeamId,
    pub player_in: PlayerId,
    pub player_out: PlayerId,
}

/// Final result from the home side's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    HomeWin,
    AwayWin,
    Draw,
}

/// Result from one team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamOutcome {
    Win,
    Draw,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub kickoff: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    pub home_lineup: Lineup,
    pub away_lineup: Lineup,
    pub goals: Vec<GoalEvent>,
    pub cards: Vec<CardEvent>,
    pub substitutions: Vec<SubstitutionEvent>,
    pub man_of_the_match: Option<PlayerId>,
    pub fulltime: bool,
    /// Cached from the goal log by `recompute_score`.
    pub home_score: u32,
    /// Cached from the goal log by `recompute_score`.
    pub away_score: u32,
    /// `"<home>-<away>"` once the match is fulltime.
    pub result: Option<String>,
    pub fantasy_processed: bool,
    pub price_processed: bool,
    /// Gameweek stamped by the points pipeline.
    pub gameweek: Option<u32>,
    /// Points each fantasy team earned from this match, for audit/display.
    pub fantasy_points: BTreeMap<FantasyTeamId, i32>,
}

impl Match {
    /// A fresh, unplayed match. The id is assigned on insert.
    pub fn new(home_team: TeamId, away_team: TeamId, kickoff: Option<DateTime<Utc>>) -> Self {
        Match {
            id: 0,
            home_team,
            away_team,
            kickoff,
            venue: None,
            home_lineup: Lineup::default(),
            away_lineup: Lineup::default(),
            goals: Vec::new(),
            cards: Vec::new(),
            substitutions: Vec::new(),
            man_of_the_match: None,
            fulltime: false,
            home_score: 0,
            away_score: 0,
            result: None,
            fantasy_processed: false,
            price_processed: false,
            gameweek: None,
            fantasy_points: BTreeMap::new(),
        }
    }

    /// Score derived from the goal log's beneficiary field. Goals crediting
    /// neither side are ignored.
    pub fn score(&self) -> (u32, u32) {
        self.goals.iter().fold((0, 0), |(home, away), goal| {
            if goal.team_id == self.home_team {
                (home + 1, away)
            } else if goal.team_id == self.away_team {
                (home, away + 1)
            } else {
                (home, away)
            }
        })
    }

    /// Refresh the cached score fields (and the result string once fulltime).
    /// Called before every save.
    pub fn recompute_score(&mut self) {
        let (home, away) = self.score();
        self.home_score = home;
        self.away_score = away;
        self.result = self.fulltime.then(|| format!("{home}-{away}"));
    }

    pub fn outcome(&self) -> MatchOutcome {
        let (home, away) = self.score();
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => MatchOutcome::HomeWin,
            std::cmp::Ordering::Less => MatchOutcome::AwayWin,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
        }
    }

    pub fn side_of(&self, team_id: TeamId) -> Option<Side> {
        if team_id == self.home_team {
            Some(Side::Home)
        } else if team_id == self.away_team {
            Some(Side::Away)
        } else {
            None
        }
    }

    /// The other club in this match.
    pub fn opponent_of(&self, team_id: TeamId) -> Option<TeamId> {
        match self.side_of(team_id)? {
            Side::Home => Some(self.away_team),
            Side::Away => Some(self.home_team),
        }
    }

    pub fn team_id(&self, side: Side) -> TeamId {
        match side {
            Side::Home => self.home_team,
            Side::Away => self.away_team,
        }
    }

    pub fn lineup(&self, side: Side) -> &Lineup {
        match side {
            Side::Home => &self.home_lineup,
            Side::Away => &self.away_lineup,
        }
    }

    /// Club of a player according to the team sheets.
    pub fn lineup_team_of(&self, player_id: PlayerId) -> Option<TeamId> {
        if self.home_lineup.contains(player_id) {
            Some(self.home_team)
        } else if self.away_lineup.contains(player_id) {
            Some(self.away_team)
        } else {
            None
        }
    }

    /// Every player id this match refers to, in any role.
    pub fn referenced_players(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = Vec::new();
        for lineup in [&self.home_lineup, &self.away_lineup] {
            ids.extend(&lineup.starting);
            ids.extend(&lineup.bench);
        }
        for goal in &self.goals {
            ids.extend(goal.scorer);
            ids.extend(goal.assist);
            ids.extend(goal.own_goal_by);
        }
        ids.extend(self.cards.iter().map(|c| c.player_id));
        for sub in &self.substitutions {
            ids.push(sub.player_in);
            ids.push(sub.player_out);
        }
        ids.extend(self.man_of_the_match);
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Round tag carried by a gameweek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Regular,
    Playoff,
    Semifinal,
    Final,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Regular => "regular",
            Stage::Playoff => "playoff",
            Stage::Semifinal => "semifinal",
            Stage::Final => "final",
        }
    }

    pub fn from_str_stage(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(Stage::Regular),
            "playoff" => Some(Stage::Playoff),
            "semifinal" => Some(Stage::Semifinal),
            "final" => Some(Stage::Final),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gameweek {
    pub id: GameweekId,
    pub competition_id: CompetitionId,
    pub number: u32,
    /// One hour before the earliest kickoff; unset until every fixture is scheduled.
    pub deadline: Option<DateTime<Utc>>,
    pub stage: Stage,
}

/// A pairing within a gameweek. Knockout placeholders have no teams yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: FixtureId,
    pub gameweek_id: GameweekId,
    pub home_team: Option<TeamId>,
    pub away_team: Option<TeamId>,
    pub match_id: Option<MatchId>,
}
