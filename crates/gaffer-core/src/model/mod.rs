// Persisted entities: players, matches, gameweeks, fixtures, fantasy teams.

pub mod fantasy;
pub mod fixture;
pub mod player;

pub use fantasy::{
    Contribution, FantasyTeam, LineupSnapshot, MatchPoints, RosterEntry, SnapshotKey,
    TransferQuota,
};
pub use fixture::{
    CardColor, CardEvent, Fixture, Gameweek, GoalEvent, Lineup, Match, MatchOutcome, Side, Stage,
    SubstitutionEvent, TeamOutcome,
};
pub use player::{NewPlayer, Player, PlayerMatchStat, Position, PositionCategory, SeasonStats};

/// Row id of a real-world player.
pub type PlayerId = i64;
/// Row id of a real-world club.
pub type TeamId = i64;
/// Row id of a match.
pub type MatchId = i64;
/// Row id of a gameweek.
pub type GameweekId = i64;
/// Row id of a fixture.
pub type FixtureId = i64;
/// Row id of a fantasy team.
pub type FantasyTeamId = i64;
/// Identity of the user owning a fantasy team, supplied by the auth layer.
pub type UserId = i64;
/// Competition a gameweek belongs to.
pub type CompetitionId = i64;

/// Player price in tenths of a currency unit (`55` means 5.5m).
pub type Price = u32;
