// Squad composition and budget validation.
//
// Used identically at squad creation, full squad replacement, and on the
// resulting roster of a transfer batch.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::SquadError;
use crate::model::{Player, PlayerId, PositionCategory, Price, RosterEntry, TeamId};

/// Inclusive `[min, max]` count band, written as a two-element array in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct Band {
    pub min: usize,
    pub max: usize,
}

impl Band {
    pub const fn new(min: usize, max: usize) -> Self {
        Band { min, max }
    }

    pub const fn exactly(n: usize) -> Self {
        Band { min: n, max: n }
    }

    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

impl From<[usize; 2]> for Band {
    fn from([min, max]: [usize; 2]) -> Self {
        Band { min, max }
    }
}

impl From<Band> for [usize; 2] {
    fn from(band: Band) -> Self {
        [band.min, band.max]
    }
}

/// Composition rules from `[squad]` in league.toml.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SquadRules {
    pub size: usize,
    pub goalkeepers: usize,
    pub defenders: Band,
    pub midfielders: Band,
    pub forwards: Band,
    pub max_per_team: usize,
}

impl Default for SquadRules {
    fn default() -> Self {
        SquadRules {
            size: 15,
            goalkeepers: 2,
            defenders: Band::new(3, 5),
            midfielders: Band::new(3, 5),
            forwards: Band::new(1, 3),
            max_per_team: 3,
        }
    }
}

impl SquadRules {
    pub fn band(&self, category: PositionCategory) -> Band {
        match category {
            PositionCategory::Goalkeeper => Band::exactly(self.goalkeepers),
            PositionCategory::Defender => self.defenders,
            PositionCategory::Midfielder => self.midfielders,
            PositionCategory::Forward => self.forwards,
        }
    }
}

/// Count players per category, every category present (zero-filled).
pub fn category_counts<I>(categories: I) -> BTreeMap<PositionCategory, usize>
where
    I: IntoIterator<Item = PositionCategory>,
{
    let mut counts: BTreeMap<PositionCategory, usize> =
        PositionCategory::ALL.iter().map(|&c| (c, 0)).collect();
    for category in categories {
        *counts.entry(category).or_insert(0) += 1;
    }
    counts
}

/// Validate a full squad and stamp each player into a roster entry.
///
/// Checks run in a fixed order (size, duplicates, existence, category
/// counts, per-club cap, budget) and the first violation is reported.
/// Prices are the players' current prices; entries come back benched.
pub fn validate_squad(
    player_ids: &[PlayerId],
    players: &HashMap<PlayerId, Player>,
    budget: Price,
    rules: &SquadRules,
) -> Result<Vec<RosterEntry>, SquadError> {
    if player_ids.len() != rules.size {
        return Err(SquadError::WrongSize {
            expected: rules.size,
            actual: player_ids.len(),
        });
    }

    let mut seen: HashSet<PlayerId> = HashSet::with_capacity(player_ids.len());
    for &player_id in player_ids {
        if !seen.insert(player_id) {
            return Err(SquadError::DuplicatePlayer { player_id });
        }
    }

    let squad: Vec<&Player> = player_ids
        .iter()
        .map(|&player_id| {
            players
                .get(&player_id)
                .ok_or(SquadError::PlayerNotFound { player_id })
        })
        .collect::<Result<_, _>>()?;

    let counts = category_counts(squad.iter().map(|p| p.position.category()));
    for (&category, &actual) in &counts {
        let band = rules.band(category);
        if !band.contains(actual) {
            return Err(SquadError::WrongCount {
                category,
                min: band.min,
                max: band.max,
                actual,
            });
        }
    }

    let mut per_team: BTreeMap<TeamId, usize> = BTreeMap::new();
    for player in &squad {
        *per_team.entry(player.team_id).or_insert(0) += 1;
    }
    if let Some((&team_id, &count)) = per_team.iter().find(|&(_, &n)| n > rules.max_per_team) {
        return Err(SquadError::TeamCapExceeded {
            team_id,
            count,
            cap: rules.max_per_team,
        });
    }

    let total: Price = squad.iter().map(|p| p.price).sum();
    if total > budget {
        return Err(SquadError::BudgetExceeded { total, budget });
    }

    Ok(squad
        .into_iter()
        .map(|p| RosterEntry {
            player_id: p.id,
            starting: false,
            locked_price: p.price,
            position: p.position,
            team_id: p.team_id,
        })
        .collect())
}
