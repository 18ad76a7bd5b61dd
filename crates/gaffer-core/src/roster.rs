// Transfer and lineup state machine for a single fantasy team.
//
// Every operation validates against a working copy and only replaces the
// team once all checks pass, so a rejected request never leaves a partial
// change behind. Deadline and ownership checks belong to the caller.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LineupError, TransferError};
use crate::gameweek::LineupWindow;
use crate::model::{
    FantasyTeam, LineupSnapshot, Player, PlayerId, PositionCategory, RosterEntry, SnapshotKey,
    TransferQuota,
};
use crate::squad::{category_counts, validate_squad, Band, SquadRules};

/// Formation rules from `[lineup]` in league.toml.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineupRules {
    pub starters: usize,
    pub goalkeepers: usize,
    pub defenders: Band,
    pub midfielders: Band,
    pub forwards: Band,
}

impl Default for LineupRules {
    fn default() -> Self {
        LineupRules {
            starters: 11,
            goalkeepers: 1,
            defenders: Band::new(3, 5),
            midfielders: Band::new(2, 5),
            forwards: Band::new(1, 3),
        }
    }
}

impl LineupRules {
    pub fn band(&self, category: PositionCategory) -> Band {
        match category {
            PositionCategory::Goalkeeper => Band::exactly(self.goalkeepers),
            PositionCategory::Defender => self.defenders,
            PositionCategory::Midfielder => self.midfielders,
            PositionCategory::Forward => self.forwards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferRules {
    pub free_per_gameweek: u32,
}

impl Default for TransferRules {
    fn default() -> Self {
        TransferRules {
            free_per_gameweek: 3,
        }
    }
}

/// One (outgoing, incoming) pair of a transfer batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub player_out: PlayerId,
    pub player_in: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupRequest {
    pub starting: Vec<PlayerId>,
    pub captain: PlayerId,
    pub vice_captain: Option<PlayerId>,
    pub target: SnapshotKey,
}

/// Check a starting set against the formation rules. Every id must already
/// be known to be on the roster.
pub fn validate_formation(
    roster: &[RosterEntry],
    starting: &BTreeSet<PlayerId>,
    rules: &LineupRules,
) -> Result<(), LineupError> {
    if starting.len() != rules.starters {
        return Err(LineupError::WrongStarterCount {
            expected: rules.starters,
            actual: starting.len(),
        });
    }
    let counts = category_counts(
        roster
            .iter()
            .filter(|e| starting.contains(&e.player_id))
            .map(|e| e.position.category()),
    );
    for (&category, &actual) in &counts {
        let band = rules.band(category);
        if !band.contains(actual) {
            return Err(LineupError::Formation {
                category,
                min: band.min,
                max: band.max,
                actual,
            });
        }
    }
    Ok(())
}

fn check_captaincy(
    starting: &BTreeSet<PlayerId>,
    captain: PlayerId,
    vice_captain: Option<PlayerId>,
) -> Result<(), LineupError> {
    if !starting.contains(&captain) {
        return Err(LineupError::CaptainNotStarting { player_id: captain });
    }
    if let Some(vice) = vice_captain {
        if !starting.contains(&vice) {
            return Err(LineupError::ViceNotStarting { player_id: vice });
        }
        if vice == captain {
            return Err(LineupError::CaptainIsVice);
        }
    }
    Ok(())
}

impl FantasyTeam {
    /// Zero the used counter when `gameweek` is later than the one the
    /// quota was last reset for.
    pub fn reset_quota(&mut self, gameweek: Option<u32>) {
        let Some(gameweek) = gameweek else {
            return;
        };
        if self
            .transfers
            .last_reset_gameweek
            .map_or(true, |last| last < gameweek)
        {
            self.transfers = TransferQuota {
                last_reset_gameweek: Some(gameweek),
                used: 0,
            };
        }
    }

    pub fn remaining_transfers(&self, rules: &TransferRules) -> u32 {
        rules.free_per_gameweek.saturating_sub(self.transfers.used)
    }

    /// Pin down the lineup `lineup_for(gameweek)` resolves to right now, so
    /// later changes to the default or the live flags cannot reach it.
    /// No-op when the gameweek already has a snapshot or the lineup in force
    /// is not a full starting set.
    pub fn freeze_gameweek(&mut self, gameweek: u32, starters: usize, taken_at: DateTime<Utc>) {
        let key = SnapshotKey::Gameweek(gameweek);
        if self.lineup_snapshots.contains_key(&key) {
            return;
        }
        let snapshot = match self.lineup_snapshots.get(&SnapshotKey::Default) {
            Some(default) => LineupSnapshot {
                taken_at,
                is_default: false,
                ..default.clone()
            },
            None => self.current_snapshot(taken_at, false),
        };
        if snapshot.starting.len() != starters {
            return;
        }
        self.lineup_snapshots.insert(key, snapshot);
    }

    /// Apply a transfer batch atomically.
    ///
    /// `players` must hold every current and incoming player. `quota_gameweek`
    /// is the gameweek the quota is spent against; snapshots for earlier
    /// gameweeks are history and are left alone.
    pub fn apply_transfers(
        &mut self,
        transfers: &[Transfer],
        players: &HashMap<PlayerId, Player>,
        quota_gameweek: Option<u32>,
        squad_rules: &SquadRules,
        transfer_rules: &TransferRules,
    ) -> Result<(), TransferError> {
        if transfers.is_empty() {
            return Err(TransferError::Empty);
        }

        let mut next = self.clone();
        next.reset_quota(quota_gameweek);

        let remaining = next.remaining_transfers(transfer_rules) as usize;
        if transfers.len() > remaining {
            return Err(TransferError::QuotaExceeded {
                requested: transfers.len(),
                remaining,
            });
        }

        let mut seen: HashSet<PlayerId> = HashSet::new();
        for t in transfers {
            for player_id in [t.player_out, t.player_in] {
                if !seen.insert(player_id) {
                    return Err(TransferError::DuplicateInBatch { player_id });
                }
            }
        }

        for t in transfers {
            if !next.holds(t.player_out) {
                return Err(TransferError::OutgoingNotOnRoster {
                    player_id: t.player_out,
                });
            }
            if next.holds(t.player_in) {
                return Err(TransferError::IncomingAlreadyOnRoster {
                    player_id: t.player_in,
                });
            }
        }

        let swaps: HashMap<PlayerId, PlayerId> = transfers
            .iter()
            .map(|t| (t.player_out, t.player_in))
            .collect();
        let swap = |id: PlayerId| swaps.get(&id).copied().unwrap_or(id);

        let ids: Vec<PlayerId> = next.roster.iter().map(|e| swap(e.player_id)).collect();
        let validated = validate_squad(&ids, players, next.budget, squad_rules)?;

        // Incoming players take over the outgoing entry's starting flag; kept
        // players keep the price they were signed at.
        next.roster = next
            .roster
            .iter()
            .zip(validated)
            .map(|(old, mut new)| {
                new.starting = old.starting;
                if old.player_id == new.player_id {
                    new.locked_price = old.locked_price;
                }
                new
            })
            .collect();

        if next.captain.is_some_and(|c| swaps.contains_key(&c)) {
            next.captain = None;
        }
        if next.vice_captain.is_some_and(|v| swaps.contains_key(&v)) {
            next.vice_captain = None;
        }

        for (key, snapshot) in next.lineup_snapshots.iter_mut() {
            let editable = match key {
                SnapshotKey::Default => true,
                SnapshotKey::Gameweek(n) => quota_gameweek.map_or(true, |q| *n >= q),
            };
            if !editable {
                continue;
            }
            for id in snapshot.starting.iter_mut() {
                *id = swap(*id);
            }
            if snapshot.captain.is_some_and(|c| swaps.contains_key(&c)) {
                snapshot.captain = None;
            }
            if snapshot.vice_captain.is_some_and(|v| swaps.contains_key(&v)) {
                snapshot.vice_captain = None;
            }
        }

        next.transfers.used += transfers.len() as u32;
        debug!(
            "Team {} transfers {:?}, {} used for gameweek {:?}",
            next.id, transfers, next.transfers.used, next.transfers.last_reset_gameweek
        );
        *self = next;
        Ok(())
    }

    /// Replace the whole squad with an already validated roster. Players who
    /// stay keep their starting flag and locked price; new players start on
    /// the bench.
    pub fn replace_squad(&mut self, validated: Vec<RosterEntry>) {
        let previous: HashMap<PlayerId, RosterEntry> = self
            .roster
            .drain(..)
            .map(|e| (e.player_id, e))
            .collect();
        self.roster = validated
            .into_iter()
            .map(|mut entry| {
                if let Some(prev) = previous.get(&entry.player_id) {
                    entry.starting = prev.starting;
                    entry.locked_price = prev.locked_price;
                }
                entry
            })
            .collect();
        if self.captain.is_some_and(|c| !self.holds(c)) {
            self.captain = None;
        }
        if self.vice_captain.is_some_and(|v| !self.holds(v)) {
            self.vice_captain = None;
        }
    }

    /// Choose a starting set and captaincy for a gameweek or as the default.
    ///
    /// A gameweek target only ever moves `effective_gameweek` earlier: picking
    /// gameweek 7 while it already points at 5 leaves it at 5.
    pub fn set_lineup(
        &mut self,
        request: &LineupRequest,
        rules: &LineupRules,
        window: LineupWindow,
        now: DateTime<Utc>,
    ) -> Result<(), LineupError> {
        if request.starting.len() != rules.starters {
            return Err(LineupError::WrongStarterCount {
                expected: rules.starters,
                actual: request.starting.len(),
            });
        }
        let mut starting: BTreeSet<PlayerId> = BTreeSet::new();
        for &player_id in &request.starting {
            if !self.holds(player_id) {
                return Err(LineupError::NotOnRoster { player_id });
            }
            if !starting.insert(player_id) {
                return Err(LineupError::DuplicateStarter { player_id });
            }
        }
        validate_formation(&self.roster, &starting, rules)?;
        check_captaincy(&starting, request.captain, request.vice_captain)?;

        if let SnapshotKey::Gameweek(gameweek) = request.target {
            if window.first_open.is_some_and(|open| gameweek < open) {
                return Err(LineupError::GameweekClosed { gameweek });
            }
        }

        if let Some(frozen) = window.in_progress {
            self.freeze_gameweek(frozen, rules.starters, now);
        }

        for entry in self.roster.iter_mut() {
            entry.starting = starting.contains(&entry.player_id);
        }
        self.captain = Some(request.captain);
        self.vice_captain = request.vice_captain;

        let is_default = request.target == SnapshotKey::Default;
        let snapshot = self.current_snapshot(now, is_default);
        self.lineup_snapshots.insert(request.target, snapshot);

        if let SnapshotKey::Gameweek(gameweek) = request.target {
            if self.effective_gameweek.map_or(true, |current| gameweek < current) {
                self.effective_gameweek = Some(gameweek);
            }
        }
        Ok(())
    }

    /// Swap one starter with one bench player.
    pub fn substitute(
        &mut self,
        first: PlayerId,
        second: PlayerId,
        rules: &LineupRules,
        window: LineupWindow,
        now: DateTime<Utc>,
    ) -> Result<(), LineupError> {
        let a = self
            .entry(first)
            .ok_or(LineupError::NotOnRoster { player_id: first })?;
        let b = self
            .entry(second)
            .ok_or(LineupError::NotOnRoster { player_id: second })?;
        let (starter, bench) = match (a.starting, b.starting) {
            (true, false) => (a, b),
            (false, true) => (b, a),
            _ => return Err(LineupError::NotABenchSwap),
        };
        let starter_gk = starter.position.category() == PositionCategory::Goalkeeper;
        let bench_gk = bench.position.category() == PositionCategory::Goalkeeper;
        if starter_gk != bench_gk {
            return Err(LineupError::GoalkeeperSwap);
        }
        let (out_id, in_id) = (starter.player_id, bench.player_id);

        let mut starting: BTreeSet<PlayerId> = self.starters().into_iter().collect();
        starting.remove(&out_id);
        starting.insert(in_id);
        validate_formation(&self.roster, &starting, rules)?;

        if let Some(frozen) = window.in_progress {
            self.freeze_gameweek(frozen, rules.starters, now);
        }
        for entry in self.roster.iter_mut() {
            if entry.player_id == out_id {
                entry.starting = false;
            } else if entry.player_id == in_id {
                entry.starting = true;
            }
        }
        if self.captain == Some(out_id) {
            self.captain = None;
        }
        if self.vice_captain == Some(out_id) {
            self.vice_captain = None;
        }
        let snapshot = self.current_snapshot(now, true);
        self.lineup_snapshots.insert(SnapshotKey::Default, snapshot);
        Ok(())
    }

    /// Name a captain and optional vice from the current starters.
    pub fn set_captaincy(
        &mut self,
        captain: PlayerId,
        vice_captain: Option<PlayerId>,
        rules: &LineupRules,
        window: LineupWindow,
        now: DateTime<Utc>,
    ) -> Result<(), LineupError> {
        let starting: BTreeSet<PlayerId> = self.starters().into_iter().collect();
        check_captaincy(&starting, captain, vice_captain)?;

        if let Some(frozen) = window.in_progress {
            self.freeze_gameweek(frozen, rules.starters, now);
        }
        self.captain = Some(captain);
        self.vice_captain = vice_captain;
        let snapshot = self.current_snapshot(now, true);
        self.lineup_snapshots.insert(SnapshotKey::Default, snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SquadError;
    use crate::model::{LineupSnapshot, Position, Price};
    use crate::squad::tests::{player, standard_pool};
    use chrono::TimeZone;

    const BUDGET: Price = 150;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    /// Standard pool plus free agents from clubs 6 and 7.
    fn pool() -> HashMap<PlayerId, Player> {
        let mut pool = standard_pool();
        for p in [
            player(16, Position::CentreBack, 6, 9),
            player(17, Position::CentralMidfield, 6, 10),
            player(18, Position::Striker, 7, 11),
            player(19, Position::Goalkeeper, 7, 8),
            player(20, Position::CentreBack, 6, 20),
        ] {
            pool.insert(p.id, p);
        }
        pool
    }

    /// 1 GK, 4 DEF, 4 MID, 2 FWD.
    fn eleven() -> Vec<PlayerId> {
        vec![1, 3, 4, 5, 6, 8, 9, 10, 11, 13, 14]
    }

    fn team() -> FantasyTeam {
        let pool = pool();
        let ids: Vec<PlayerId> = (1..=15).collect();
        let roster = validate_squad(&ids, &pool, BUDGET, &SquadRules::default()).unwrap();
        let mut team = FantasyTeam::new(42, "Route One FC", BUDGET, roster, Some(1), now());
        team.id = 1;
        team
    }

    fn lineup_team() -> FantasyTeam {
        let mut t = team();
        let request = LineupRequest {
            starting: eleven(),
            captain: 13,
            vice_captain: Some(8),
            target: SnapshotKey::Default,
        };
        t.set_lineup(&request, &LineupRules::default(), LineupWindow::default(), now())
            .unwrap();
        t
    }

    fn transfer(player_out: PlayerId, player_in: PlayerId) -> Transfer {
        Transfer {
            player_out,
            player_in,
        }
    }

    fn apply(
        t: &mut FantasyTeam,
        batch: &[Transfer],
        gw: Option<u32>,
    ) -> Result<(), TransferError> {
        t.apply_transfers(
            batch,
            &pool(),
            gw,
            &SquadRules::default(),
            &TransferRules::default(),
        )
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    #[test]
    fn transfer_preserves_bench_status_and_clears_captaincy() {
        // 13 is the starting captain.
        let mut t = lineup_team();
        apply(&mut t, &[transfer(13, 18)], Some(1)).unwrap();
        let incoming = t.entry(18).unwrap();
        assert!(incoming.starting);
        assert_eq!(incoming.locked_price, 11);
        assert!(!t.holds(13));
        assert_eq!(t.captain, None);
        assert_eq!(t.vice_captain, Some(8));
        assert_eq!(t.transfers.used, 1);

        let default = &t.lineup_snapshots[&SnapshotKey::Default];
        assert!(default.starting.contains(&18));
        assert!(!default.starting.contains(&13));
        assert_eq!(default.captain, None);
    }

    #[test]
    fn benched_player_replacement_stays_benched() {
        let mut t = lineup_team();
        apply(&mut t, &[transfer(2, 19)], Some(1)).unwrap();
        assert!(!t.entry(19).unwrap().starting);
    }

    #[test]
    fn four_transfers_with_three_free_changes_nothing() {
        let mut t = lineup_team();
        let before = t.clone();
        let batch = [
            transfer(2, 19),
            transfer(13, 18),
            transfer(3, 16),
            transfer(8, 17),
        ];
        let err = apply(&mut t, &batch, Some(1)).unwrap_err();
        assert_eq!(
            err,
            TransferError::QuotaExceeded {
                requested: 4,
                remaining: 3
            }
        );
        assert_eq!(t, before);
    }

    #[test]
    fn over_budget_batch_is_rejected_atomically() {
        let mut t = lineup_team();
        let before = t.clone();
        // 148 - 9 + 20 = 159
        let err = apply(&mut t, &[transfer(4, 20)], Some(1)).unwrap_err();
        assert_eq!(
            err,
            TransferError::Squad(SquadError::BudgetExceeded {
                total: 159,
                budget: 150
            })
        );
        assert_eq!(t, before);
        assert_eq!(t.transfers.used, 0);
    }

    #[test]
    fn outgoing_must_be_on_roster_and_incoming_must_not() {
        let mut t = lineup_team();
        assert_eq!(
            apply(&mut t, &[transfer(16, 17)], Some(1)).unwrap_err(),
            TransferError::OutgoingNotOnRoster { player_id: 16 }
        );
        assert_eq!(
            apply(&mut t, &[transfer(3, 4)], Some(1)).unwrap_err(),
            TransferError::IncomingAlreadyOnRoster { player_id: 4 }
        );
        assert_eq!(
            apply(&mut t, &[transfer(3, 16), transfer(4, 16)], Some(1)).unwrap_err(),
            TransferError::DuplicateInBatch { player_id: 16 }
        );
        assert_eq!(apply(&mut t, &[], Some(1)).unwrap_err(), TransferError::Empty);
    }

    #[test]
    fn quota_resets_when_a_new_gameweek_comes_round() {
        let mut t = lineup_team();
        apply(&mut t, &[transfer(2, 19), transfer(13, 18), transfer(3, 16)], Some(1)).unwrap();
        assert_eq!(t.remaining_transfers(&TransferRules::default()), 0);
        assert!(matches!(
            apply(&mut t, &[transfer(8, 17)], Some(1)),
            Err(TransferError::QuotaExceeded { remaining: 0, .. })
        ));

        apply(&mut t, &[transfer(8, 17)], Some(2)).unwrap();
        assert_eq!(t.transfers.last_reset_gameweek, Some(2));
        assert_eq!(t.transfers.used, 1);
    }

    #[test]
    fn past_snapshots_are_left_alone() {
        let mut t = lineup_team();
        let past = LineupSnapshot {
            starting: eleven(),
            captain: Some(13),
            vice_captain: None,
            taken_at: now(),
            is_default: false,
        };
        t.lineup_snapshots.insert(SnapshotKey::Gameweek(1), past.clone());
        t.lineup_snapshots.insert(SnapshotKey::Gameweek(3), past.clone());
        apply(&mut t, &[transfer(13, 18)], Some(2)).unwrap();

        assert_eq!(t.lineup_snapshots[&SnapshotKey::Gameweek(1)], past);
        let future = &t.lineup_snapshots[&SnapshotKey::Gameweek(3)];
        assert!(future.starting.contains(&18));
        assert_eq!(future.captain, None);
    }

    // ------------------------------------------------------------------
    // Squad replacement
    // ------------------------------------------------------------------

    #[test]
    fn replace_squad_keeps_flags_for_kept_players() {
        let mut t = lineup_team();
        let mut ids: Vec<PlayerId> = (1..=15).collect();
        ids[12] = 18; // 13 -> 18
        let mut p = pool();
        p.get_mut(&14).unwrap().price = 12;
        let validated = validate_squad(&ids, &p, BUDGET, &SquadRules::default()).unwrap();
        t.replace_squad(validated);

        assert!(t.entry(14).unwrap().starting);
        assert_eq!(t.entry(14).unwrap().locked_price, 11);
        assert!(!t.entry(18).unwrap().starting);
        assert_eq!(t.captain, None);
        assert_eq!(t.vice_captain, Some(8));
    }

    // ------------------------------------------------------------------
    // Lineups
    // ------------------------------------------------------------------

    #[test]
    fn set_lineup_updates_flags_snapshot_and_effective_gameweek() {
        let mut t = team();
        t.effective_gameweek = None;
        let request = LineupRequest {
            starting: eleven(),
            captain: 13,
            vice_captain: None,
            target: SnapshotKey::Gameweek(3),
        };
        let window = LineupWindow {
            first_open: Some(2),
            in_progress: Some(1),
        };
        t.set_lineup(&request, &LineupRules::default(), window, now()).unwrap();

        assert_eq!(t.starters(), eleven());
        assert_eq!(t.captain, Some(13));
        let snap = &t.lineup_snapshots[&SnapshotKey::Gameweek(3)];
        assert_eq!(snap.starting, eleven());
        assert!(!snap.is_default);
        assert_eq!(t.effective_gameweek, Some(3));
        // Team had no full eleven before, so nothing was frozen for gameweek 1.
        assert!(!t.lineup_snapshots.contains_key(&SnapshotKey::Gameweek(1)));
    }

    #[test]
    fn set_lineup_rejects_closed_gameweek() {
        let mut t = team();
        let request = LineupRequest {
            starting: eleven(),
            captain: 13,
            vice_captain: None,
            target: SnapshotKey::Gameweek(1),
        };
        let window = LineupWindow {
            first_open: Some(2),
            in_progress: Some(1),
        };
        assert_eq!(
            t.set_lineup(&request, &LineupRules::default(), window, now()),
            Err(LineupError::GameweekClosed { gameweek: 1 })
        );
    }

    #[test]
    fn set_lineup_validates_formation_and_captaincy() {
        let mut t = team();
        let rules = LineupRules::default();
        let window = LineupWindow::default();

        // Two goalkeepers.
        let mut two_keepers = eleven();
        two_keepers[1] = 2;
        let request = LineupRequest {
            starting: two_keepers,
            captain: 13,
            vice_captain: None,
            target: SnapshotKey::Default,
        };
        assert!(matches!(
            t.set_lineup(&request, &rules, window, now()),
            Err(LineupError::Formation {
                category: PositionCategory::Goalkeeper,
                actual: 2,
                ..
            })
        ));

        let request = LineupRequest {
            starting: eleven(),
            captain: 15,
            vice_captain: None,
            target: SnapshotKey::Default,
        };
        assert_eq!(
            t.set_lineup(&request, &rules, window, now()),
            Err(LineupError::CaptainNotStarting { player_id: 15 })
        );

        let request = LineupRequest {
            starting: eleven(),
            captain: 13,
            vice_captain: Some(13),
            target: SnapshotKey::Default,
        };
        assert_eq!(
            t.set_lineup(&request, &rules, window, now()),
            Err(LineupError::CaptainIsVice)
        );

        let request = LineupRequest {
            starting: eleven()[..10].to_vec(),
            captain: 13,
            vice_captain: None,
            target: SnapshotKey::Default,
        };
        assert_eq!(
            t.set_lineup(&request, &rules, window, now()),
            Err(LineupError::WrongStarterCount {
                expected: 11,
                actual: 10
            })
        );
        assert!(t.starters().is_empty());
    }

    #[test]
    fn lineup_change_freezes_the_gameweek_in_progress() {
        let mut t = lineup_team();
        let mut starting = eleven();
        starting[10] = 15; // 14 -> 15, both forwards
        let request = LineupRequest {
            starting,
            captain: 13,
            vice_captain: None,
            target: SnapshotKey::Gameweek(2),
        };
        let window = LineupWindow {
            first_open: Some(2),
            in_progress: Some(1),
        };
        t.set_lineup(&request, &LineupRules::default(), window, now()).unwrap();

        let frozen = &t.lineup_snapshots[&SnapshotKey::Gameweek(1)];
        assert!(frozen.starting.contains(&14));
        assert!(!frozen.starting.contains(&15));
        assert!(t.entry(15).unwrap().starting);
        // A later target never pushes the first scoring gameweek back.
        assert_eq!(t.effective_gameweek, Some(1));
    }

    #[test]
    fn freeze_keeps_the_lineup_points_were_scored_with() {
        let mut t = lineup_team();
        let window = LineupWindow {
            first_open: Some(4),
            in_progress: None,
        };
        let mut later = eleven();
        later[10] = 15;
        let request = LineupRequest {
            starting: later,
            captain: 15,
            vice_captain: None,
            target: SnapshotKey::Gameweek(5),
        };
        t.set_lineup(&request, &LineupRules::default(), window, now()).unwrap();
        // Live flags now hold the gameweek 5 pick; gameweek 3 still runs on
        // the default.
        assert!(t.entry(15).unwrap().starting);

        let scored_with = t.lineup_for(3);
        t.freeze_gameweek(3, 11, now());
        assert_eq!(t.lineup_for(3), scored_with);
        assert!(scored_with.0.contains(&14));
        assert_eq!(scored_with.1, Some(13));
        assert_eq!(scored_with.2, Some(8));
        assert!(!t.lineup_snapshots[&SnapshotKey::Gameweek(3)].is_default);
    }

    // ------------------------------------------------------------------
    // Substitutions and captaincy
    // ------------------------------------------------------------------

    #[test]
    fn substitute_swaps_flags_and_writes_default_snapshot() {
        let mut t = lineup_team();
        t.substitute(15, 13, &LineupRules::default(), LineupWindow::default(), now())
            .unwrap();
        assert!(t.entry(15).unwrap().starting);
        assert!(!t.entry(13).unwrap().starting);
        // 13 was captain and is now benched.
        assert_eq!(t.captain, None);
        let default = &t.lineup_snapshots[&SnapshotKey::Default];
        assert!(default.starting.contains(&15));
        assert!(default.is_default);
    }

    #[test]
    fn goalkeepers_only_swap_with_goalkeepers() {
        let mut t = lineup_team();
        let rules = LineupRules::default();
        assert_eq!(
            t.substitute(1, 15, &rules, LineupWindow::default(), now()),
            Err(LineupError::GoalkeeperSwap)
        );
        t.substitute(1, 2, &rules, LineupWindow::default(), now()).unwrap();
        assert!(t.entry(2).unwrap().starting);
    }

    #[test]
    fn substitute_revalidates_formation() {
        let mut t = lineup_team();
        // Down to three defenders, then one more would leave two.
        t.substitute(3, 15, &LineupRules::default(), LineupWindow::default(), now())
            .unwrap();
        assert_eq!(
            t.substitute(4, 12, &LineupRules::default(), LineupWindow::default(), now()),
            Err(LineupError::Formation {
                category: PositionCategory::Defender,
                min: 3,
                max: 5,
                actual: 2,
            })
        );
    }

    #[test]
    fn substitute_needs_one_starter_and_one_bench_player() {
        let mut t = lineup_team();
        assert_eq!(
            t.substitute(3, 4, &LineupRules::default(), LineupWindow::default(), now()),
            Err(LineupError::NotABenchSwap)
        );
        assert_eq!(
            t.substitute(3, 99, &LineupRules::default(), LineupWindow::default(), now()),
            Err(LineupError::NotOnRoster { player_id: 99 })
        );
    }

    #[test]
    fn captaincy_must_come_from_starters() {
        let mut t = lineup_team();
        let rules = LineupRules::default();
        assert_eq!(
            t.set_captaincy(15, None, &rules, LineupWindow::default(), now()),
            Err(LineupError::CaptainNotStarting { player_id: 15 })
        );
        assert_eq!(
            t.set_captaincy(13, Some(7), &rules, LineupWindow::default(), now()),
            Err(LineupError::ViceNotStarting { player_id: 7 })
        );
        t.set_captaincy(9, Some(13), &rules, LineupWindow::default(), now())
            .unwrap();
        assert_eq!(t.captain, Some(9));
        assert_eq!(t.lineup_snapshots[&SnapshotKey::Default].captain, Some(9));
    }
}
