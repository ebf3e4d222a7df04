//! Levelpath Engine
//!
//! Finds the leveling route with the fewest monster kills from one base/job
//! experience point to another, choosing which quests to turn in and when.
//! Quest rewards are subject to overlevel capping, so the search weighs
//! grinding up before a quest against losing part of its reward.
//!
//! The search is anytime: [`Planner`] is an iterator that yields each better
//! journey as soon as it is found.

pub mod catalog;
pub mod curve;
pub mod journey;
pub mod kills;
pub mod ladder;
pub mod numbers;
pub mod planner;
pub mod quest;
pub mod reward;

pub use catalog::{Catalog, CatalogError, Rates};
pub use curve::{CurveError, ExpCurve, ExpPoint, LevelExp, LevelFloor, LevelTable, RawExp};
pub use journey::{Journey, JourneyState, Step, StepLog};
pub use kills::{KillsJourney, kills_needed, plan_kills};
pub use ladder::{Monster, MonsterCursor, MonsterId, MonsterLadder, MonsterPrerequisite, MonsterTier};
pub use planner::{
    PlanContext, PlanError, PlanRequest, Planner, PlannerStats, TieBreak, grind, perform_quest,
    plan_journey,
};
pub use quest::{
    ExpQuest, MonsterKills, MonsterQuest, Quest, QuestGraph, QuestId, QuestPrerequisite,
    QuestProgress,
};
pub use reward::{
    IgnoreWaste, Overlevel, OvercapSettings, Reward, RewardBatch, RewardOutcome, TrackOverlevel,
    apply_batch, cap_amount, cap_reward, min_level_for_reward, will_overlevel,
};
