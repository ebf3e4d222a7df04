//! Greedy grinding between two experience points.
//!
//! The current tier is hunted until either the goal or the next tier's unlock
//! level is reached, whichever takes fewer kills. A tier whose unlock level
//! lies beyond the maximum base level is never a threshold. Higher tiers are assumed to
//! pay at least as well per kill, so a lower tier is never revisited.
use log::trace;
use std::collections::BTreeSet;

use crate::curve::{ExpCurve, RawExp};
use crate::journey::Step;
use crate::ladder::{MonsterCursor, MonsterLadder};
use crate::numbers::div_ceil_or_none;
use crate::quest::QuestId;
use crate::reward::Reward;

/// Result of a grind: one step per tier hunted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillsJourney {
    pub steps: Vec<Step>,
    pub kills: u64,
    pub exp: RawExp,
    pub cursor: MonsterCursor,
}

/// Kills of one monster needed to reach `goal` on both tracks.
///
/// `None` when a track still needs experience the monster does not give.
#[must_use]
pub fn kills_needed(exp: RawExp, goal: RawExp, reward: Reward) -> Option<u64> {
    let base = div_ceil_or_none(goal.base_exp.saturating_sub(exp.base_exp), reward.base)?;
    let job = div_ceil_or_none(goal.job_exp.saturating_sub(exp.job_exp), reward.job)?;
    Some(base.max(job))
}

/// Plan the kills needed to move from `start` to `goal`.
///
/// Returns `None` when the allowed monsters can never reach `goal`.
#[must_use]
pub fn plan_kills(
    curve: &ExpCurve,
    ladder: &MonsterLadder,
    start: RawExp,
    goal: RawExp,
    cursor: MonsterCursor,
    completed: &BTreeSet<QuestId>,
) -> Option<KillsJourney> {
    let mut journey = KillsJourney {
        steps: Vec::new(),
        kills: 0,
        exp: start,
        cursor,
    };

    loop {
        journey.cursor = ladder.advance(
            journey.cursor,
            curve.base.floor_level(journey.exp.base_exp),
            completed,
        );
        if journey.exp.meets(&goal) {
            return Some(journey);
        }
        let tier = ladder.tier(journey.cursor)?;
        let to_goal = kills_needed(journey.exp, goal, tier.reward);

        // a tier above the top of the base curve never unlocks
        let to_threshold = ladder
            .next_unlock_level(journey.cursor, completed)
            .filter(|&level| level <= curve.base.max_level())
            .map(|level| RawExp::new(curve.base.exp_at(level), 0))
            .and_then(|threshold| kills_needed(journey.exp, threshold, tier.reward))
            .filter(|&kills| to_goal.is_none_or(|goal_kills| kills < goal_kills));

        let (kills, reached_goal) = match (to_threshold, to_goal) {
            (Some(kills), _) => (kills, false),
            (None, Some(kills)) => (kills, true),
            (None, None) => {
                trace!("{} cannot reach the goal and nothing better unlocks", tier.id);
                return None;
            }
        };

        journey.exp = curve.add_reward(journey.exp, tier.reward.times(kills));
        journey.kills = journey.kills.saturating_add(kills);
        journey.steps.push(Step::Monster {
            monster_id: tier.id.clone(),
            name: tier.name.clone(),
            kills,
            exp_after: journey.exp,
        });
        trace!(
            "hunt {} x{kills} -> base {} job {}",
            tier.id, journey.exp.base_exp, journey.exp.job_exp
        );

        if reached_goal {
            return Some(journey);
        }
    }
}
