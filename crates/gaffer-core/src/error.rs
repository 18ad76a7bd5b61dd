// Error taxonomy for squad, lineup, transfer, and service operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{PlayerId, PositionCategory, Price, TeamId};

/// Why a squad failed composition or budget validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquadError {
    #[error("squad must have exactly {expected} players, got {actual}")]
    WrongSize { expected: usize, actual: usize },

    #[error("player {player_id} appears more than once in the squad")]
    DuplicatePlayer { player_id: PlayerId },

    #[error("player {player_id} not found")]
    PlayerNotFound { player_id: PlayerId },

    #[error("squad needs between {min} and {max} {category} players, got {actual}")]
    WrongCount {
        category: PositionCategory,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("{count} players from team {team_id} exceeds the limit of {cap}")]
    TeamCapExceeded {
        team_id: TeamId,
        count: usize,
        cap: usize,
    },

    #[error("squad costs {total}, over the budget of {budget}")]
    BudgetExceeded { total: Price, budget: Price },
}

/// Why a lineup, substitution, or captaincy change was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineupError {
    #[error("lineup must name exactly {expected} starters, got {actual}")]
    WrongStarterCount { expected: usize, actual: usize },

    #[error("player {player_id} is not on the roster")]
    NotOnRoster { player_id: PlayerId },

    #[error("player {player_id} is named twice in the lineup")]
    DuplicateStarter { player_id: PlayerId },

    #[error("lineup needs between {min} and {max} {category} starters, got {actual}")]
    Formation {
        category: PositionCategory,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("captain {player_id} is not in the starting lineup")]
    CaptainNotStarting { player_id: PlayerId },

    #[error("vice-captain {player_id} is not in the starting lineup")]
    ViceNotStarting { player_id: PlayerId },

    #[error("captain and vice-captain must be different players")]
    CaptainIsVice,

    #[error("goalkeepers can only be swapped with goalkeepers")]
    GoalkeeperSwap,

    #[error("a substitution swaps one starter with one bench player")]
    NotABenchSwap,

    #[error("gameweek {gameweek} is closed for lineup changes")]
    GameweekClosed { gameweek: u32 },
}

/// Why a transfer batch was refused. Nothing is applied on any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("no transfers requested")]
    Empty,

    #[error("{requested} transfers requested but only {remaining} free transfers remain")]
    QuotaExceeded { requested: usize, remaining: usize },

    #[error("player {player_id} is not on the roster")]
    OutgoingNotOnRoster { player_id: PlayerId },

    #[error("player {player_id} is already on the roster")]
    IncomingAlreadyOnRoster { player_id: PlayerId },

    #[error("player {player_id} appears more than once in the transfer batch")]
    DuplicateInBatch { player_id: PlayerId },

    #[error("resulting squad is invalid: {0}")]
    Squad(#[from] SquadError),
}

/// Coarse classification an outer layer can map to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Conflict,
    Infrastructure,
}

/// Every failure a `League` operation can report.
#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("invalid squad: {0}")]
    Squad(#[from] SquadError),

    #[error("invalid lineup: {0}")]
    Lineup(#[from] LineupError),

    #[error("transfer rejected: {0}")]
    Transfer(#[from] TransferError),

    #[error("gameweek {gameweek} deadline passed at {deadline}")]
    DeadlinePassed {
        gameweek: u32,
        deadline: DateTime<Utc>,
    },

    #[error("{entity} already exists for {owner}")]
    AlreadyExists { entity: &'static str, owner: String },

    #[error("match {match_id} is already at fulltime")]
    MatchFinished { match_id: i64 },

    #[error("invalid match event: {message}")]
    InvalidEvent { message: String },

    #[error("cannot merge players: {message}")]
    MergeBlocked { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("not allowed to {action}")]
    Unauthorized { action: &'static str },

    #[error("{entity} {id} was modified concurrently, retry")]
    Conflict { entity: &'static str, id: i64 },

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl LeagueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeagueError::Squad(_)
            | LeagueError::Lineup(_)
            | LeagueError::Transfer(_)
            | LeagueError::DeadlinePassed { .. }
            | LeagueError::AlreadyExists { .. }
            | LeagueError::MatchFinished { .. }
            | LeagueError::InvalidEvent { .. }
            | LeagueError::MergeBlocked { .. } => ErrorKind::Validation,
            LeagueError::NotFound { .. } => ErrorKind::NotFound,
            LeagueError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LeagueError::Conflict { .. } => ErrorKind::Conflict,
            LeagueError::Storage(_) => ErrorKind::Infrastructure,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        LeagueError::NotFound { entity, id }
    }
}
