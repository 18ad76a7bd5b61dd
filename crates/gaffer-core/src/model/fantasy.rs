// Fantasy teams: roster entries, lineup snapshots, and points ledgers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FantasyTeamId, MatchId, PlayerId, Position, Price, TeamId, UserId};

/// One player's membership on a fantasy roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    /// Whether the player is in the currently active starting set.
    pub starting: bool,
    /// Price at signing time; later price moves do not touch it.
    pub locked_price: Price,
    /// Cached from the player for fast validation.
    pub position: Position,
    /// Cached real-world club for the per-club cap.
    pub team_id: TeamId,
}

/// Free-transfer bookkeeping. The used counter belongs to
/// `last_reset_gameweek` and is zeroed when a later gameweek comes round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferQuota {
    pub last_reset_gameweek: Option<u32>,
    pub used: u32,
}

/// Key of the lineup-snapshot map: a concrete gameweek or the durable
/// fallback lineup. Stored as `"default"` or the gameweek number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SnapshotKey {
    Default,
    Gameweek(u32),
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotKey::Default => write!(f, "default"),
            SnapshotKey::Gameweek(n) => write!(f, "{n}"),
        }
    }
}

impl From<SnapshotKey> for String {
    fn from(key: SnapshotKey) -> String {
        key.to_string()
    }
}

impl TryFrom<String> for SnapshotKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "default" {
            return Ok(SnapshotKey::Default);
        }
        s.parse::<u32>()
            .map(SnapshotKey::Gameweek)
            .map_err(|_| format!("invalid lineup snapshot key: {s:?}"))
    }
}

/// A recorded starting eleven and captaincy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupSnapshot {
    pub starting: Vec<PlayerId>,
    pub captain: Option<PlayerId>,
    pub vice_captain: Option<PlayerId>,
    pub taken_at: DateTime<Utc>,
    pub is_default: bool,
}

/// One roster player's share of a fantasy team's match total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub player_id: PlayerId,
    pub raw_points: i32,
    pub counted_points: i32,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

/// Points a fantasy team earned from one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPoints {
    pub gameweek: u32,
    pub total: i32,
    pub contributions: Vec<Contribution>,
    /// Squad held when the match was first scored for this team.
    #[serde(default)]
    pub held: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FantasyTeam {
    pub id: FantasyTeamId,
    pub user_id: UserId,
    pub name: String,
    /// Budget ceiling for squad validation.
    pub budget: Price,
    pub roster: Vec<RosterEntry>,
    pub captain: Option<PlayerId>,
    pub vice_captain: Option<PlayerId>,
    /// First gameweek this squad scores in. `None` means from the start.
    pub effective_gameweek: Option<u32>,
    pub transfers: TransferQuota,
    /// Derived from `match_points` by `recompute_totals`.
    pub gameweek_points: BTreeMap<u32, i32>,
    pub match_points: BTreeMap<MatchId, MatchPoints>,
    pub lineup_snapshots: BTreeMap<SnapshotKey, LineupSnapshot>,
    /// Derived from `gameweek_points` by `recompute_totals`.
    pub season_points: i32,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every save.
    pub version: i64,
}

impl FantasyTeam {
    /// A new, unsaved team around an already validated roster.
    pub fn new(
        user_id: UserId,
        name: &str,
        budget: Price,
        roster: Vec<RosterEntry>,
        effective_gameweek: Option<u32>,
        created_at: DateTime<Utc>,
    ) -> Self {
        FantasyTeam {
            id: 0,
            user_id,
            name: name.to_string(),
            budget,
            roster,
            captain: None,
            vice_captain: None,
            effective_gameweek,
            transfers: TransferQuota {
                last_reset_gameweek: effective_gameweek,
                used: 0,
            },
            gameweek_points: BTreeMap::new(),
            match_points: BTreeMap::new(),
            lineup_snapshots: BTreeMap::new(),
            season_points: 0,
            created_at,
            version: 0,
        }
    }

    pub fn entry(&self, player_id: PlayerId) -> Option<&RosterEntry> {
        self.roster.iter().find(|e| e.player_id == player_id)
    }

    pub fn holds(&self, player_id: PlayerId) -> bool {
        self.entry(player_id).is_some()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.roster.iter().map(|e| e.player_id).collect()
    }

    /// Players currently flagged as starting, in roster order.
    pub fn starters(&self) -> Vec<PlayerId> {
        self.roster
            .iter()
            .filter(|e| e.starting)
            .map(|e| e.player_id)
            .collect()
    }

    /// Starting set and captaincy in force for a gameweek: that gameweek's
    /// snapshot, else the default snapshot, else the live roster flags.
    pub fn lineup_for(
        &self,
        gameweek: u32,
    ) -> (BTreeSet<PlayerId>, Option<PlayerId>, Option<PlayerId>) {
        let snapshot = self
            .lineup_snapshots
            .get(&SnapshotKey::Gameweek(gameweek))
            .or_else(|| self.lineup_snapshots.get(&SnapshotKey::Default));
        match snapshot {
            Some(snapshot) => (
                snapshot.starting.iter().copied().collect(),
                snapshot.captain,
                snapshot.vice_captain,
            ),
            None => (
                self.starters().into_iter().collect(),
                self.captain,
                self.vice_captain,
            ),
        }
    }

    /// Snapshot of the live roster flags and captaincy.
    pub fn current_snapshot(&self, taken_at: DateTime<Utc>, is_default: bool) -> LineupSnapshot {
        LineupSnapshot {
            starting: self.starters(),
            captain: self.captain,
            vice_captain: self.vice_captain,
            taken_at,
            is_default,
        }
    }

    /// Rebuild gameweek totals from the per-match ledger, then the season
    /// total from the gameweek totals.
    pub fn recompute_totals(&mut self) {
        let mut by_gameweek: BTreeMap<u32, i32> = BTreeMap::new();
        for points in self.match_points.values() {
            *by_gameweek.entry(points.gameweek).or_insert(0) += points.total;
        }
        self.season_points = by_gameweek.values().sum();
        self.gameweek_points = by_gameweek;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(player_id: PlayerId, starting: bool) -> RosterEntry {
        RosterEntry {
            player_id,
            starting,
            locked_price: 50,
            position: Position::CentralMidfield,
            team_id: 1,
        }
    }

    fn team() -> FantasyTeam {
        FantasyTeam::new(
            7,
            "Sunday League",
            1000,
            vec![entry(1, true), entry(2, false), entry(3, true)],
            Some(1),
            Utc::now(),
        )
    }

    fn points(gameweek: u32, total: i32) -> MatchPoints {
        MatchPoints {
            gameweek,
            total,
            contributions: vec![],
            held: vec![],
        }
    }

    #[test]
    fn snapshot_keys_serialize_as_strings() {
        let mut map: BTreeMap<SnapshotKey, u8> = BTreeMap::new();
        map.insert(SnapshotKey::Default, 0);
        map.insert(SnapshotKey::Gameweek(12), 1);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"default":0,"12":1}"#);

        let back: BTreeMap<SnapshotKey, u8> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn snapshot_key_rejects_garbage() {
        assert!(SnapshotKey::try_from("next".to_string()).is_err());
    }

    #[test]
    fn recompute_totals_groups_by_gameweek() {
        let mut t = team();
        t.match_points.insert(100, points(1, 12));
        t.match_points.insert(101, points(1, 3));
        t.match_points.insert(102, points(2, -1));
        t.recompute_totals();

        assert_eq!(t.gameweek_points.get(&1), Some(&15));
        assert_eq!(t.gameweek_points.get(&2), Some(&-1));
        assert_eq!(t.season_points, 14);
    }

    #[test]
    fn recompute_totals_drops_stale_gameweeks() {
        let mut t = team();
        t.gameweek_points.insert(9, 40);
        t.season_points = 40;
        t.recompute_totals();
        assert!(t.gameweek_points.is_empty());
        assert_eq!(t.season_points, 0);
    }

    #[test]
    fn lineup_for_prefers_gameweek_snapshot() {
        let mut t = team();
        t.captain = Some(1);
        let (starting, captain, _) = t.lineup_for(4);
        assert_eq!(starting.into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(captain, Some(1));

        t.lineup_snapshots.insert(
            SnapshotKey::Gameweek(4),
            LineupSnapshot {
                starting: vec![2, 3],
                captain: Some(3),
                vice_captain: Some(2),
                taken_at: Utc::now(),
                is_default: false,
            },
        );
        let (starting, captain, vice) = t.lineup_for(4);
        assert_eq!(starting.into_iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(captain, Some(3));
        assert_eq!(vice, Some(2));
    }

    #[test]
    fn lineup_for_falls_back_to_default_snapshot() {
        let mut t = team();
        t.lineup_snapshots.insert(
            SnapshotKey::Default,
            LineupSnapshot {
                starting: vec![2],
                captain: Some(2),
                vice_captain: None,
                taken_at: Utc::now(),
                is_default: true,
            },
        );
        let (starting, captain, _) = t.lineup_for(9);
        assert_eq!(starting.into_iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(captain, Some(2));
    }
}
