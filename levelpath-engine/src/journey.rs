//! Search nodes and the step log they carry.
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::curve::{ExpCurve, LevelExp, RawExp};
use crate::ladder::{MonsterCursor, MonsterId};
use crate::quest::{QuestId, QuestProgress};

/// One action of a journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Step {
    Monster {
        monster_id: MonsterId,
        name: String,
        kills: u64,
        exp_after: RawExp,
    },
    /// `kills` is non-zero for hunting quests only.
    Quest {
        quest_id: QuestId,
        name: String,
        kills: u64,
        exp_after: RawExp,
    },
}

impl Step {
    #[must_use]
    pub const fn kills(&self) -> u64 {
        match self {
            Self::Monster { kills, .. } | Self::Quest { kills, .. } => *kills,
        }
    }

    #[must_use]
    pub const fn exp_after(&self) -> RawExp {
        match self {
            Self::Monster { exp_after, .. } | Self::Quest { exp_after, .. } => *exp_after,
        }
    }

    #[must_use]
    pub const fn monster_id(&self) -> Option<&MonsterId> {
        match self {
            Self::Monster { monster_id, .. } => Some(monster_id),
            Self::Quest { .. } => None,
        }
    }

    /// Fold `next` into `self` when both hunt the same monster.
    fn merged_with(&self, next: &Self) -> Option<Self> {
        match (self, next) {
            (
                Self::Monster {
                    monster_id,
                    name,
                    kills,
                    ..
                },
                Self::Monster {
                    monster_id: next_id,
                    kills: next_kills,
                    exp_after,
                    ..
                },
            ) if monster_id == next_id => Some(Self::Monster {
                monster_id: monster_id.clone(),
                name: name.clone(),
                kills: kills.saturating_add(*next_kills),
                exp_after: *exp_after,
            }),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct StepNode {
    step: Step,
    prev: Option<Arc<StepNode>>,
}

/// Persistent step log. Pushing returns a new log that shares every earlier
/// step with its parent; consecutive hunts of one monster are coalesced.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    head: Option<Arc<StepNode>>,
    len: usize,
}

impl StepLog {
    #[must_use]
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn last(&self) -> Option<&Step> {
        self.head.as_deref().map(|node| &node.step)
    }

    #[must_use]
    pub fn push(&self, step: Step) -> Self {
        if let Some(head) = &self.head
            && let Some(merged) = head.step.merged_with(&step)
        {
            return Self {
                head: Some(Arc::new(StepNode {
                    step: merged,
                    prev: head.prev.clone(),
                })),
                len: self.len,
            };
        }
        Self {
            head: Some(Arc::new(StepNode {
                step,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    #[must_use]
    pub fn extend(&self, steps: impl IntoIterator<Item = Step>) -> Self {
        steps.into_iter().fold(self.clone(), |log, step| log.push(step))
    }

    /// Steps in the order they were taken.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(self.len);
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            steps.push(node.step.clone());
            cursor = node.prev.as_deref();
        }
        steps.reverse();
        steps
    }
}

/// A search node. Cloning is cheap: quest sets and the log are shared.
#[derive(Debug, Clone)]
pub struct JourneyState {
    pub exp: RawExp,
    pub cursor: MonsterCursor,
    pub kills: u64,
    pub quests: QuestProgress,
    pub steps: StepLog,
}

impl JourneyState {
    #[must_use]
    pub fn new(exp: RawExp, cursor: MonsterCursor, quests: QuestProgress) -> Self {
        Self {
            exp,
            cursor,
            kills: 0,
            quests,
            steps: StepLog::new(),
        }
    }
}

/// A finished route, detached from the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub start: RawExp,
    pub exp: RawExp,
    pub levels: LevelExp,
    pub kills: u64,
    pub completed_quests: Vec<QuestId>,
    pub steps: Vec<Step>,
}

impl Journey {
    #[must_use]
    pub fn from_state(curve: &ExpCurve, start: RawExp, state: &JourneyState) -> Self {
        Self {
            start,
            exp: state.exp,
            levels: curve.to_level(state.exp),
            kills: state.kills,
            completed_quests: state.quests.completed().iter().cloned().collect(),
            steps: state.steps.to_vec(),
        }
    }

    /// Quests turned in along the route, in order.
    pub fn quest_steps(&self) -> impl Iterator<Item = &QuestId> {
        self.steps.iter().filter_map(|step| match step {
            Step::Quest { quest_id, .. } => Some(quest_id),
            Step::Monster { .. } => None,
        })
    }
}
