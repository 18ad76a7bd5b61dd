// Gameweek and deadline resolution.
//
// Everything here is a pure query over a competition's gameweeks. Callers
// load the gameweeks fresh for every request and pass the current time in;
// nothing is cached across calls.

use chrono::{DateTime, Duration, Utc};

use crate::error::LeagueError;
use crate::model::Gameweek;

/// How long before the first kickoff a gameweek's deadline falls.
pub fn deadline_lead() -> Duration {
    Duration::hours(1)
}

/// The gameweek a team created (or re-squadded) at `at` first scores in.
///
/// The lowest-numbered gameweek whose deadline is unset or still ahead of
/// `at`. Past every deadline, one beyond the highest known number. No
/// gameweeks at all gives `None`.
pub fn effective_gameweek(gameweeks: &[Gameweek], at: DateTime<Utc>) -> Option<u32> {
    let open = gameweeks
        .iter()
        .filter(|gw| gw.deadline.map_or(true, |d| d > at))
        .map(|gw| gw.number)
        .min();
    open.or_else(|| gameweeks.iter().map(|gw| gw.number).max().map(|n| n + 1))
}

/// The gameweek with the soonest deadline strictly after `now`.
pub fn upcoming_gameweek(gameweeks: &[Gameweek], now: DateTime<Utc>) -> Option<&Gameweek> {
    gameweeks
        .iter()
        .filter(|gw| gw.deadline.is_some_and(|d| d > now))
        .min_by_key(|gw| (gw.deadline, gw.number))
}

/// The gameweek whose deadline gates roster changes at `now`.
///
/// Normally the upcoming gameweek. With no future deadline left, the most
/// recently passed one, so changes stay closed. With no deadlines set at
/// all (pre-season) nothing gates.
pub fn gating_gameweek(gameweeks: &[Gameweek], now: DateTime<Utc>) -> Option<&Gameweek> {
    upcoming_gameweek(gameweeks, now).or_else(|| {
        gameweeks
            .iter()
            .filter(|gw| gw.deadline.is_some())
            .max_by_key(|gw| (gw.deadline, gw.number))
    })
}

/// Reject when the gating gameweek's deadline is at or before `now`.
/// Returns the gating gameweek when changes are still open.
pub fn ensure_before_deadline(
    gameweeks: &[Gameweek],
    now: DateTime<Utc>,
) -> Result<Option<&Gameweek>, LeagueError> {
    let Some(gw) = gating_gameweek(gameweeks, now) else {
        return Ok(None);
    };
    match gw.deadline {
        Some(deadline) if now >= deadline => Err(LeagueError::DeadlinePassed {
            gameweek: gw.number,
            deadline,
        }),
        _ => Ok(Some(gw)),
    }
}

/// Gameweek whose quota a transfer made at `now` spends.
pub fn quota_gameweek(gameweeks: &[Gameweek], now: DateTime<Utc>) -> Option<u32> {
    upcoming_gameweek(gameweeks, now)
        .map(|gw| gw.number)
        .or_else(|| effective_gameweek(gameweeks, now))
}

/// Which gameweeks a lineup change at some instant may still touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineupWindow {
    /// Lowest gameweek whose deadline has not passed.
    pub first_open: Option<u32>,
    /// Gameweek whose deadline most recently passed; its lineup is frozen.
    pub in_progress: Option<u32>,
}

pub fn lineup_window(gameweeks: &[Gameweek], now: DateTime<Utc>) -> LineupWindow {
    LineupWindow {
        first_open: effective_gameweek(gameweeks, now),
        in_progress: gameweek_for_kickoff(gameweeks, now),
    }
}

/// Deadline for a gameweek given its fixtures' kickoffs: the earliest
/// kickoff minus the lead time. `None` while any fixture is unscheduled
/// or when there are no fixtures.
pub fn deadline_for(kickoffs: &[Option<DateTime<Utc>>]) -> Option<DateTime<Utc>> {
    let scheduled: Option<Vec<DateTime<Utc>>> = kickoffs.iter().copied().collect();
    scheduled?.into_iter().min().map(|first| first - deadline_lead())
}

/// Fallback gameweek for a match with no fixture link: the latest
/// gameweek whose deadline falls at or before the kickoff.
pub fn gameweek_for_kickoff(gameweeks: &[Gameweek], kickoff: DateTime<Utc>) -> Option<u32> {
    gameweeks
        .iter()
        .filter(|gw| gw.deadline.is_some_and(|d| d <= kickoff))
        .max_by_key(|gw| (gw.deadline, gw.number))
        .map(|gw| gw.number)
}
