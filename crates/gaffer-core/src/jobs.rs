// Scheduled sweeps: gameweek deadlines and post-match price moves.
//
// Both are idempotent and take "now" from the caller, so a scheduler can
// run them as often as it likes.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::events::{self, MatchSummary};
use crate::gameweek::deadline_for;
use crate::model::{Gameweek, MatchId, Player, PlayerId, Price};

/// Price movement per match, loaded from `[pricing]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceRules {
    pub goal_delta: u32,
    pub assist_delta: u32,
    /// Goalkeepers and defenders who started and kept a clean sheet.
    pub clean_sheet_delta: u32,
    pub max_delta_per_match: u32,
    pub min_price: Price,
    pub max_price: Price,
}

impl Default for PriceRules {
    fn default() -> Self {
        PriceRules {
            goal_delta: 2,
            assist_delta: 1,
            clean_sheet_delta: 1,
            max_delta_per_match: 3,
            min_price: 40,
            max_price: 150,
        }
    }
}

/// One price move applied by the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub delta: u32,
    pub new_price: Price,
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

/// Stamp a deadline on every gameweek whose fixtures all have a kickoff.
/// Gameweeks with a deadline already are never touched. Returns the
/// gameweeks stamped by this run.
pub fn set_deadlines(db: &Database, now: DateTime<Utc>) -> Result<Vec<Gameweek>> {
    db.transaction(|store| {
        let mut stamped = Vec::new();
        for mut gameweek in store.gameweeks_without_deadline()? {
            let kickoffs = store.fixture_kickoffs(gameweek.id)?;
            let Some(deadline) = deadline_for(&kickoffs) else {
                debug!(
                    "Gameweek {} (competition {}) not fully scheduled yet",
                    gameweek.number, gameweek.competition_id
                );
                continue;
            };
            if !store.set_deadline(gameweek.id, deadline)? {
                continue;
            }
            if deadline <= now {
                warn!(
                    "Gameweek {} deadline {} is already in the past",
                    gameweek.number, deadline
                );
            }
            info!(
                "Set deadline of gameweek {} (competition {}) to {}",
                gameweek.number, gameweek.competition_id, deadline
            );
            gameweek.deadline = Some(deadline);
            stamped.push(gameweek);
        }
        Ok(stamped)
    })
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Upward price move a player earned in one match, already capped.
pub fn price_delta(rules: &PriceRules, summary: &MatchSummary, player: &Player) -> u32 {
    let Some(perf) = summary.performances.get(&player.id) else {
        return 0;
    };
    let mut delta = perf.goals * rules.goal_delta + perf.assists * rules.assist_delta;
    if perf.started
        && player.position.category().is_defensive()
        && summary.conceded_for(player.id) == Some(0)
    {
        delta += rules.clean_sheet_delta;
    }
    delta.min(rules.max_delta_per_match)
}

/// Apply price moves for every fulltime match not yet priced. Each match is
/// its own transaction and is claimed before any price moves, so a second
/// run (or a concurrent one) skips it.
pub fn run_price_sweep(db: &Database, rules: &PriceRules) -> Result<Vec<PriceChange>> {
    let pending = db.read(|store| store.matches_pending_pricing())?;
    let mut changes = Vec::new();

    for match_id in pending {
        let applied = db.transaction(|store| -> Result<Vec<PriceChange>> {
            if !store.claim_price_processing(match_id)? {
                debug!("Match {} already priced", match_id);
                return Ok(Vec::new());
            }
            let Some(m) = store.load_match(match_id)? else {
                return Ok(Vec::new());
            };
            let summary = events::extract(&m);
            let ids: Vec<PlayerId> = summary.performances.keys().copied().collect();
            let players = store.players_by_ids(&ids)?;

            let mut applied = Vec::new();
            let deltas: BTreeMap<PlayerId, u32> = ids
                .iter()
                .filter_map(|id| match players.get(id) {
                    Some(player) => Some((*id, price_delta(rules, &summary, player))),
                    None => {
                        warn!("Match {} references unknown player {}", match_id, id);
                        None
                    }
                })
                .filter(|&(_, delta)| delta > 0)
                .collect();
            for (player_id, delta) in deltas {
                let new_price = store.adjust_price(
                    player_id,
                    i64::from(delta),
                    rules.min_price,
                    rules.max_price,
                )?;
                if let Some(new_price) = new_price {
                    debug!("Player {} +{} -> {}", player_id, delta, new_price);
                    applied.push(PriceChange {
                        match_id,
                        player_id,
                        delta,
                        new_price,
                    });
                }
            }
            Ok(applied)
        })?;
        info!("Priced match {}: {} players moved", match_id, applied.len());
        changes.extend(applied);
    }
    Ok(changes)
}
