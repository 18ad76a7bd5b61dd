// Real-world players, their positions, and per-match stat records.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{MatchId, PlayerId, Price, TeamId};
use crate::events::Performance;

/// Fine-grained playing positions as entered by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    CentreBack,
    LeftBack,
    RightBack,
    LeftWingBack,
    RightWingBack,
    DefensiveMidfield,
    CentralMidfield,
    AttackingMidfield,
    LeftMidfield,
    RightMidfield,
    LeftWing,
    RightWing,
    SecondStriker,
    CentreForward,
    Striker,
}

impl Position {
    /// Parse a position code into a Position.
    ///
    /// Accepts the common abbreviations (`GK`, `CB`, `LWB`, `CDM`, `CAM`, `ST`, ...)
    /// as well as the bare category codes (`DEF`, `MID`, `FWD`) which map to
    /// the most generic position of that category.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GK" | "G" => Some(Position::Goalkeeper),
            "CB" | "DEF" | "D" => Some(Position::CentreBack),
            "LB" => Some(Position::LeftBack),
            "RB" => Some(Position::RightBack),
            "LWB" => Some(Position::LeftWingBack),
            "RWB" => Some(Position::RightWingBack),
            "DM" | "CDM" => Some(Position::DefensiveMidfield),
            "CM" | "MID" | "M" => Some(Position::CentralMidfield),
            "AM" | "CAM" => Some(Position::AttackingMidfield),
            "LM" => Some(Position::LeftMidfield),
            "RM" => Some(Position::RightMidfield),
            "LW" => Some(Position::LeftWing),
            "RW" => Some(Position::RightWing),
            "SS" => Some(Position::SecondStriker),
            "CF" => Some(Position::CentreForward),
            "ST" | "FWD" | "F" => Some(Position::Striker),
            _ => None,
        }
    }

    /// Return the display code for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::CentreBack => "CB",
            Position::LeftBack => "LB",
            Position::RightBack => "RB",
            Position::LeftWingBack => "LWB",
            Position::RightWingBack => "RWB",
            Position::DefensiveMidfield => "DM",
            Position::CentralMidfield => "CM",
            Position::AttackingMidfield => "AM",
            Position::LeftMidfield => "LM",
            Position::RightMidfield => "RM",
            Position::LeftWing => "LW",
            Position::RightWing => "RW",
            Position::SecondStriker => "SS",
            Position::CentreForward => "CF",
            Position::Striker => "ST",
        }
    }

    /// The scoring/squad category this position belongs to.
    pub fn category(&self) -> PositionCategory {
        match self {
            Position::Goalkeeper => PositionCategory::Goalkeeper,
            Position::CentreBack
            | Position::LeftBack
            | Position::RightBack
            | Position::LeftWingBack
            | Position::RightWingBack => PositionCategory::Defender,
            Position::DefensiveMidfield
            | Position::CentralMidfield
            | Position::AttackingMidfield
            | Position::LeftMidfield
            | Position::RightMidfield => PositionCategory::Midfielder,
            Position::LeftWing
            | Position::RightWing
            | Position::SecondStriker
            | Position::CentreForward
            | Position::Striker => PositionCategory::Forward,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// The four buckets squads, lineups and scoring rules are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionCategory {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl PositionCategory {
    pub const ALL: [PositionCategory; 4] = [
        PositionCategory::Goalkeeper,
        PositionCategory::Defender,
        PositionCategory::Midfielder,
        PositionCategory::Forward,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            PositionCategory::Goalkeeper => "GK",
            PositionCategory::Defender => "DEF",
            PositionCategory::Midfielder => "MID",
            PositionCategory::Forward => "FWD",
        }
    }

    /// Goalkeepers and defenders share clean-sheet and goal values.
    pub fn is_defensive(&self) -> bool {
        matches!(self, PositionCategory::Goalkeeper | PositionCategory::Defender)
    }
}

impl fmt::Display for PositionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Season-cumulative counting stats. Always derived from the per-match
/// stat rows, never incremented in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonStats {
    pub goals: u32,
    pub assists: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    /// The real-world club this player belongs to.
    pub team_id: TeamId,
    pub price: Price,
    pub stats: SeasonStats,
    pub season_points: i32,
}

/// A player about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlayer {
    pub name: String,
    pub position: Position,
    pub team_id: TeamId,
    pub price: Price,
}

/// One player's scored performance in one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatchStat {
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub gameweek: u32,
    pub points: i32,
    pub performance: Performance,
}
