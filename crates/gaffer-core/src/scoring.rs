// Fantasy points for one player in one match.
//
// Pure: output depends only on the rules and the arguments, so the same
// performance always scores the same.

use serde::Deserialize;

use crate::events::Performance;
use crate::model::{PositionCategory, TeamOutcome};

/// Point values for every scoring event. Loaded from `[scoring]` in
/// league.toml; `Default` mirrors the shipped defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringRules {
    pub start_appearance: f64,
    pub sub_appearance: f64,
    pub goal_goalkeeper: f64,
    pub goal_defender: f64,
    pub goal_midfielder: f64,
    pub goal_forward: f64,
    pub assist: f64,
    pub man_of_the_match: f64,
    pub yellow_card: f64,
    /// Replaces the yellow-card penalty for a sent-off player.
    pub red_card: f64,
    pub own_goal: f64,
    /// Goalkeepers and defenders who started and kept a clean sheet.
    pub clean_sheet_defensive: f64,
    /// Midfielders who started and kept a clean sheet.
    pub clean_sheet_midfielder: f64,
    /// For appearing in a winning side.
    pub win_bonus: f64,
    /// Applied to the captain's points when counted for a fantasy team.
    pub captain_multiplier: i32,
    /// Give the vice-captain the captain multiplier when the captain did not play.
    #[serde(default)]
    pub promote_vice_captain: bool,
}

impl Default for ScoringRules {
    fn default() -> Self {
        ScoringRules {
            start_appearance: 2.0,
            sub_appearance: 1.0,
            goal_goalkeeper: 6.0,
            goal_defender: 6.0,
            goal_midfielder: 5.0,
            goal_forward: 4.0,
            assist: 3.0,
            man_of_the_match: 3.0,
            yellow_card: -1.0,
            red_card: -3.0,
            own_goal: -2.0,
            clean_sheet_defensive: 4.0,
            clean_sheet_midfielder: 1.0,
            win_bonus: 0.0,
            captain_multiplier: 2,
            promote_vice_captain: false,
        }
    }
}

impl ScoringRules {
    pub fn goal_value(&self, category: PositionCategory) -> f64 {
        match category {
            PositionCategory::Goalkeeper => self.goal_goalkeeper,
            PositionCategory::Defender => self.goal_defender,
            PositionCategory::Midfielder => self.goal_midfielder,
            PositionCategory::Forward => self.goal_forward,
        }
    }

    pub fn clean_sheet_value(&self, category: PositionCategory) -> f64 {
        match category {
            PositionCategory::Goalkeeper | PositionCategory::Defender => {
                self.clean_sheet_defensive
            }
            PositionCategory::Midfielder => self.clean_sheet_midfielder,
            PositionCategory::Forward => 0.0,
        }
    }
}

/// Score one player's match.
///
/// `conceded` is the goals conceded by the player's club, `None` when the
/// club is unknown (no clean sheet can be awarded). The result may be
/// negative.
pub fn score_player_performance(
    rules: &ScoringRules,
    performance: &Performance,
    category: PositionCategory,
    conceded: Option<u32>,
    started: bool,
    subbed_on: bool,
    outcome: Option<TeamOutcome>,
) -> i32 {
    let mut points = 0.0;

    if started {
        points += rules.start_appearance;
    } else if subbed_on {
        points += rules.sub_appearance;
    }

    points += f64::from(performance.goals) * rules.goal_value(category);
    points += f64::from(performance.assists) * rules.assist;
    points += f64::from(performance.own_goals) * rules.own_goal;

    if performance.man_of_the_match {
        points += rules.man_of_the_match;
    }

    if performance.red_card {
        points += rules.red_card;
    } else {
        points += f64::from(performance.yellow_cards) * rules.yellow_card;
    }

    if started && conceded == Some(0) {
        points += rules.clean_sheet_value(category);
    }

    if (started || subbed_on) && outcome == Some(TeamOutcome::Win) {
        points += rules.win_bonus;
    }

    points.round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ScoringRules {
        ScoringRules::default()
    }

    fn perf() -> Performance {
        Performance {
            started: true,
            ..Performance::default()
        }
    }

    fn score(p: &Performance, category: PositionCategory, conceded: u32) -> i32 {
        score_player_performance(
            &rules(),
            p,
            category,
            Some(conceded),
            p.started,
            p.subbed_on,
            Some(TeamOutcome::Draw),
        )
    }

    // ------------------------------------------------------------------
    // Appearance
    // ------------------------------------------------------------------

    #[test]
    fn starting_beats_coming_off_the_bench() {
        let starter = perf();
        let sub = Performance {
            subbed_on: true,
            ..Performance::default()
        };
        let unused = Performance::default();
        assert_eq!(score(&starter, PositionCategory::Forward, 1), 2);
        assert_eq!(score(&sub, PositionCategory::Forward, 1), 1);
        assert_eq!(score(&unused, PositionCategory::Forward, 1), 0);
    }

    // ------------------------------------------------------------------
    // Goals and assists
    // ------------------------------------------------------------------

    #[test]
    fn goal_value_rewards_rarity() {
        let scorer = Performance {
            goals: 1,
            ..perf()
        };
        let gk = score(&scorer, PositionCategory::Goalkeeper, 1);
        let def = score(&scorer, PositionCategory::Defender, 1);
        let mid = score(&scorer, PositionCategory::Midfielder, 1);
        let fwd = score(&scorer, PositionCategory::Forward, 1);
        assert_eq!(gk, def);
        assert!(def > mid);
        assert!(mid > fwd);
        assert_eq!(fwd, 2 + 4);
    }

    #[test]
    fn assists_are_uncapped() {
        let p = Performance {
            assists: 4,
            ..perf()
        };
        assert_eq!(score(&p, PositionCategory::Forward, 2), 2 + 12);
    }

    #[test]
    fn own_goal_is_a_penalty_not_a_goal() {
        let p = Performance {
            own_goals: 1,
            ..perf()
        };
        assert_eq!(score(&p, PositionCategory::Defender, 1), 2 - 2);
    }

    #[test]
    fn man_of_the_match_bonus() {
        let p = Performance {
            man_of_the_match: true,
            ..perf()
        };
        assert_eq!(score(&p, PositionCategory::Forward, 3), 5);
    }

    // ------------------------------------------------------------------
    // Cards
    // ------------------------------------------------------------------

    #[test]
    fn yellow_then_red_only_costs_the_red() {
        let yellow = Performance {
            yellow_cards: 1,
            ..perf()
        };
        let second_yellow = Performance {
            yellow_cards: 2,
            red_card: true,
            ..perf()
        };
        let straight_red = Performance {
            red_card: true,
            ..perf()
        };
        assert_eq!(score(&yellow, PositionCategory::Midfielder, 1), 1);
        assert_eq!(score(&second_yellow, PositionCategory::Midfielder, 1), -1);
        assert_eq!(score(&straight_red, PositionCategory::Midfielder, 1), -1);
    }

    // ------------------------------------------------------------------
    // Clean sheets
    // ------------------------------------------------------------------

    #[test]
    fn clean_sheet_by_category() {
        let p = perf();
        assert_eq!(score(&p, PositionCategory::Goalkeeper, 0), 6);
        assert_eq!(score(&p, PositionCategory::Defender, 0), 6);
        assert_eq!(score(&p, PositionCategory::Midfielder, 0), 3);
        assert_eq!(score(&p, PositionCategory::Forward, 0), 2);
    }

    #[test]
    fn clean_sheet_requires_starting() {
        let sub = Performance {
            subbed_on: true,
            ..Performance::default()
        };
        assert_eq!(score(&sub, PositionCategory::Defender, 0), 1);
    }

    #[test]
    fn unknown_club_gets_no_clean_sheet() {
        let p = perf();
        let points = score_player_performance(
            &rules(),
            &p,
            PositionCategory::Defender,
            None,
            true,
            false,
            None,
        );
        assert_eq!(points, 2);
    }

    // ------------------------------------------------------------------
    // Rule variations
    // ------------------------------------------------------------------

    #[test]
    fn fractional_values_round_to_nearest() {
        let rules = ScoringRules {
            assist: 1.5,
            ..ScoringRules::default()
        };
        let p = Performance {
            assists: 1,
            ..perf()
        };
        let points = score_player_performance(
            &rules,
            &p,
            PositionCategory::Forward,
            Some(1),
            true,
            false,
            None,
        );
        // 2 + 1.5 = 3.5 rounds away from zero.
        assert_eq!(points, 4);
    }

    #[test]
    fn win_bonus_needs_an_appearance() {
        let rules = ScoringRules {
            win_bonus: 1.0,
            ..ScoringRules::default()
        };
        let played = perf();
        let unused = Performance::default();
        let win = Some(TeamOutcome::Win);
        let fwd = PositionCategory::Forward;
        assert_eq!(
            score_player_performance(&rules, &played, fwd, Some(1), true, false, win),
            3
        );
        assert_eq!(
            score_player_performance(&rules, &unused, fwd, Some(1), false, false, win),
            0
        );
    }

    #[test]
    fn scores_can_go_negative() {
        let p = Performance {
            red_card: true,
            own_goals: 2,
            ..Performance::default()
        };
        assert_eq!(score(&p, PositionCategory::Defender, 3), -3 - 4);
    }

    #[test]
    fn scoring_is_repeatable() {
        let p = Performance {
            goals: 2,
            assists: 1,
            yellow_cards: 1,
            man_of_the_match: true,
            ..perf()
        };
        let first = score(&p, PositionCategory::Midfielder, 0);
        for _ in 0..10 {
            assert_eq!(score(&p, PositionCategory::Midfielder, 0), first);
        }
    }
}
