//! Anytime best-first search for the fewest-kills journey.
//!
//! The frontier is ordered by kills so far (ties in insertion order). Each
//! popped state either completes the target or is expanded by turning in
//! every available quest, plus one direct grind to the target. Every new best
//! journey is yielded from [`Iterator::next`] as soon as it is found; the
//! last one yielded is the answer.
mod transition;

pub use transition::{PlanContext, grind, perform_quest};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use thiserror::Error;

use crate::catalog::{Catalog, Rates};
use crate::curve::{ExpCurve, ExpPoint, RawExp};
use crate::journey::{Journey, JourneyState};
use crate::ladder::MonsterId;
use crate::quest::QuestId;
use crate::reward::OvercapSettings;

/// Configuration errors; the search never starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("unknown monster `{0}`")]
    UnknownMonster(MonsterId),
    #[error("unknown quest `{0}`")]
    UnknownQuest(QuestId),
    #[error("quest prerequisites form a cycle through `{0}`")]
    QuestCycle(QuestId),
}

/// How to order journeys with equal kills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    #[default]
    MoreQuests,
    FewerQuests,
}

impl TieBreak {
    fn compare_quests(self, candidate: usize, best: usize) -> Ordering {
        match self {
            Self::MoreQuests => best.cmp(&candidate),
            Self::FewerQuests => candidate.cmp(&best),
        }
    }

    /// `Less` when the candidate is the better journey.
    #[must_use]
    pub fn compare(self, candidate: (u64, usize), best: (u64, usize)) -> Ordering {
        candidate
            .0
            .cmp(&best.0)
            .then_with(|| self.compare_quests(candidate.1, best.1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub start: ExpPoint,
    pub target: ExpPoint,
    #[serde(default)]
    pub allowed_quests: Vec<QuestId>,
    #[serde(default)]
    pub allowed_monsters: Vec<MonsterId>,
    #[serde(default)]
    pub completed_quests: Vec<QuestId>,
    #[serde(default)]
    pub overcap: OvercapSettings,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub rates: Rates,
}

impl PlanRequest {
    /// A request with no quests, no monsters and default policies.
    #[must_use]
    pub fn new(start: ExpPoint, target: ExpPoint) -> Self {
        Self {
            start,
            target,
            allowed_quests: Vec::new(),
            allowed_monsters: Vec::new(),
            completed_quests: Vec::new(),
            overcap: OvercapSettings::default(),
            tie_break: TieBreak::default(),
            rates: Rates::default(),
        }
    }
}

/// Counters describing how much work the search has done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlannerStats {
    pub expanded: u64,
    pub pushed: u64,
    pub rejected: u64,
    pub pruned: u64,
    pub improvements: u64,
}

struct Queued {
    kills: u64,
    sequence: u64,
    state: JourneyState,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kills
            .cmp(&other.kills)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// The search. Drive it as an iterator; stop whenever the latest journey is
/// good enough.
pub struct Planner<'a> {
    context: PlanContext<'a>,
    start: RawExp,
    tie_break: TieBreak,
    frontier: BinaryHeap<Reverse<Queued>>,
    sequence: u64,
    best: Option<JourneyState>,
    stats: PlannerStats,
}

impl<'a> Planner<'a> {
    /// # Errors
    ///
    /// Returns a [`PlanError`] if the request names unknown monsters or
    /// quests, or if the scoped quests have cyclic prerequisites.
    pub fn new(
        curve: &'a ExpCurve,
        catalog: &Catalog,
        request: &PlanRequest,
    ) -> Result<Self, PlanError> {
        let context = PlanContext::new(curve, catalog, request)?;
        let start = curve.resolve(request.start);
        let root = context.initial_state(start, &request.completed_quests);

        let mut planner = Self {
            context,
            start,
            tie_break: request.tie_break,
            frontier: BinaryHeap::new(),
            sequence: 0,
            best: None,
            stats: PlannerStats::default(),
        };
        planner.push(root);
        Ok(planner)
    }

    #[must_use]
    pub const fn stats(&self) -> PlannerStats {
        self.stats
    }

    #[must_use]
    pub fn context(&self) -> &PlanContext<'a> {
        &self.context
    }

    /// The best journey found so far.
    #[must_use]
    pub fn best(&self) -> Option<Journey> {
        self.best.as_ref().map(|state| self.snapshot(state))
    }

    #[must_use]
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    fn best_kills(&self) -> Option<u64> {
        self.best.as_ref().map(|state| state.kills)
    }

    fn snapshot(&self, state: &JourneyState) -> Journey {
        Journey::from_state(self.context.curve, self.start, state)
    }

    fn push(&mut self, state: JourneyState) {
        self.frontier.push(Reverse(Queued {
            kills: state.kills,
            sequence: self.sequence,
            state,
        }));
        self.sequence += 1;
        self.stats.pushed += 1;
    }

    fn improves(&self, state: &JourneyState) -> bool {
        self.best.as_ref().is_none_or(|best| {
            let candidate = (state.kills, state.quests.completed_count());
            let current = (best.kills, best.quests.completed_count());
            self.tie_break.compare(candidate, current) == Ordering::Less
        })
    }

    /// Record `state` as the new best and drop every frontier entry that can
    /// no longer beat it.
    fn record(&mut self, state: JourneyState) -> Journey {
        let kills = state.kills;
        let before = self.frontier.len();
        self.frontier.retain(|Reverse(queued)| queued.kills < kills);
        let pruned = before - self.frontier.len();

        self.stats.pruned += u64::try_from(pruned).unwrap_or(u64::MAX);
        self.stats.improvements += 1;
        debug!(
            "best journey: {kills} kills, {} quests completed, frontier {}, pruned {pruned}",
            state.quests.completed_count(),
            self.frontier.len(),
        );

        let journey = self.snapshot(&state);
        self.best = Some(state);
        journey
    }

    /// Push every quest child of `state` and return the direct grind to the
    /// target, if reachable.
    fn expand(&mut self, state: &JourneyState) -> Option<JourneyState> {
        self.stats.expanded += 1;
        let bound = self.best_kills();
        trace!(
            "expand: {} kills, {} quests available, bound {bound:?}",
            state.kills,
            state.quests.available().len()
        );

        for quest_id in state.quests.available() {
            match perform_quest(&self.context, state, quest_id, bound) {
                Some(child) => self.push(child),
                None => {
                    self.stats.rejected += 1;
                    trace!("rejected {quest_id}");
                }
            }
        }

        grind(&self.context, state, self.context.target, None)
    }
}

impl Iterator for Planner<'_> {
    type Item = Journey;

    fn next(&mut self) -> Option<Journey> {
        while let Some(Reverse(Queued { state, .. })) = self.frontier.pop() {
            if self.context.meets_target(&state) {
                if self.improves(&state) {
                    return Some(self.record(state));
                }
                continue;
            }

            if let Some(direct) = self.expand(&state)
                && self.improves(&direct)
            {
                return Some(self.record(direct));
            }
        }
        None
    }
}

/// Run the search to completion and return the final journey.
///
/// `Ok(None)` means the target is unreachable with the allowed monsters and
/// quests.
///
/// # Errors
///
/// Returns a [`PlanError`] for an invalid request.
pub fn plan_journey(
    curve: &ExpCurve,
    catalog: &Catalog,
    request: &PlanRequest,
) -> Result<Option<Journey>, PlanError> {
    Ok(Planner::new(curve, catalog, request)?.last())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::LevelExp;

    fn all_quests() -> Vec<QuestId> {
        Catalog::bundled().quest_ids().cloned().collect()
    }

    fn job_fifty(quests: Vec<QuestId>) -> PlanRequest {
        PlanRequest {
            allowed_quests: quests,
            allowed_monsters: ["spore", "muka", "wolf"].map(MonsterId::new).to_vec(),
            ..PlanRequest::new(
                ExpPoint::Level(LevelExp::new(11.0, 1.0)),
                ExpPoint::Level(LevelExp::new(1.0, 50.0)),
            )
        }
    }

    #[test]
    fn tie_break_orders_equal_kills_by_quest_count() {
        assert_eq!(TieBreak::MoreQuests.compare((5, 3), (5, 2)), Ordering::Less);
        assert_eq!(TieBreak::FewerQuests.compare((5, 3), (5, 2)), Ordering::Greater);
        assert_eq!(TieBreak::FewerQuests.compare((4, 9), (5, 0)), Ordering::Less);
        assert_eq!(TieBreak::MoreQuests.compare((5, 2), (5, 2)), Ordering::Equal);
    }

    #[test]
    fn frontier_pops_fewest_kills_then_oldest() {
        let context = PlanContext::new(
            ExpCurve::bundled(),
            Catalog::bundled(),
            &job_fifty(Vec::new()),
        )
        .unwrap();
        let state = context.initial_state(RawExp::ZERO, &[]);
        let mut heap = BinaryHeap::new();
        for (sequence, kills) in [(0, 7), (1, 3), (2, 3)] {
            heap.push(Reverse(Queued {
                kills,
                sequence,
                state: state.clone(),
            }));
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(queued)| (queued.kills, queued.sequence))
            .collect();
        assert_eq!(order, [(3, 1), (3, 2), (7, 0)]);
    }

    #[test]
    fn without_quests_the_only_journey_is_the_grind() {
        let journeys: Vec<_> = Planner::new(
            ExpCurve::bundled(),
            Catalog::bundled(),
            &job_fifty(Vec::new()),
        )
        .unwrap()
        .collect();
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].kills, 34_756);
        assert!(journeys[0].completed_quests.is_empty());
    }

    #[test]
    fn full_catalog_converges_on_reference_route() {
        let mut planner = Planner::new(
            ExpCurve::bundled(),
            Catalog::bundled(),
            &job_fifty(all_quests()),
        )
        .unwrap();
        let journeys: Vec<_> = planner.by_ref().collect();
        let kills: Vec<u64> = journeys.iter().map(|journey| journey.kills).collect();
        assert_eq!(
            kills,
            [
                34_756, 19_555, 19_555, 19_555, 19_555, 19_555, 19_555, 19_555, 17_935, 15_515,
                15_515, 10_992, 10_992
            ]
        );

        let best = journeys.last().unwrap();
        assert_eq!(best.completed_quests.len(), 11);
        assert_eq!(best.exp, RawExp::new(10_532_390, 3_753_621));
        assert_eq!(planner.best().as_ref(), Some(best));

        let stats = planner.stats();
        assert_eq!(stats.expanded, 29);
        assert_eq!(stats.improvements, 13);
    }

    #[test]
    fn fewer_quests_tie_break_keeps_the_first_equal_route() {
        let mut request = job_fifty(all_quests());
        request.tie_break = TieBreak::FewerQuests;
        let best = plan_journey(ExpCurve::bundled(), Catalog::bundled(), &request)
            .unwrap()
            .unwrap();
        assert_eq!(best.kills, 10_992);
        assert!(best.completed_quests.len() <= 10);
    }

    #[test]
    fn start_at_target_needs_nothing() {
        let mut request = job_fifty(all_quests());
        request.target = request.start;
        let best = plan_journey(ExpCurve::bundled(), Catalog::bundled(), &request)
            .unwrap()
            .unwrap();
        assert_eq!(best.kills, 0);
        assert!(best.steps.is_empty());
    }

    #[test]
    fn no_monsters_and_no_quests_is_no_solution() {
        let request = PlanRequest::new(
            ExpPoint::Level(LevelExp::new(1.0, 1.0)),
            ExpPoint::Level(LevelExp::new(10.0, 1.0)),
        );
        assert_eq!(
            plan_journey(ExpCurve::bundled(), Catalog::bundled(), &request),
            Ok(None)
        );
    }

    #[test]
    fn monster_beyond_max_level_does_not_stall_the_search() {
        let bundled = Catalog::bundled();
        let spore = bundled.monster(&MonsterId::new("spore")).unwrap().clone();
        let boss = crate::ladder::Monster {
            id: MonsterId::new("boss"),
            name: "Boss".to_string(),
            reward: crate::reward::Reward::new(90_000, 90_000),
            prerequisite: Some(crate::ladder::MonsterPrerequisite {
                min_base_level: 120,
                quest_id: None,
            }),
        };
        let catalog = Catalog::new(vec![spore, boss], Vec::new()).unwrap();
        let request = PlanRequest {
            allowed_monsters: ["spore", "boss"].map(MonsterId::new).to_vec(),
            ..PlanRequest::new(
                ExpPoint::Level(LevelExp::new(99.0, 1.0)),
                ExpPoint::Level(LevelExp::new(1.0, 10.0)),
            )
        };

        let best = plan_journey(ExpCurve::bundled(), &catalog, &request)
            .unwrap()
            .unwrap();
        assert!(best.kills > 0);
        assert_eq!(best.steps.len(), 1);
        assert_eq!(best.steps[0].monster_id(), Some(&MonsterId::new("spore")));
    }

    #[test]
    fn requests_parse_from_json() {
        let json = r#"{
            "start": { "base_lvl": 11, "job_lvl": 1 },
            "target": { "base_exp": 0, "job_exp": 3753621 },
            "allowed_monsters": ["spore"],
            "overcap": { "ignore_waste": "never", "allow_percent_waste": 5 },
            "tie_break": "fewer-quests",
            "rates": { "monster": 2 }
        }"#;
        let request: PlanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.tie_break, TieBreak::FewerQuests);
        assert_eq!(request.target, ExpPoint::Raw(RawExp::new(0, 3_753_621)));
        assert!(request.allowed_quests.is_empty());
        assert!((request.rates.quest - 1.0).abs() < f64::EPSILON);
    }
}
