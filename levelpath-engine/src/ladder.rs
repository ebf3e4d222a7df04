//! Grindable monsters ordered by the base level that unlocks them.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::quest::QuestId;
use crate::reward::Reward;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonsterId(String);

impl MonsterId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonsterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MonsterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

const fn default_min_base_level() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterPrerequisite {
    #[serde(default = "default_min_base_level")]
    pub min_base_level: u32,
    #[serde(default)]
    pub quest_id: Option<QuestId>,
}

impl Default for MonsterPrerequisite {
    fn default() -> Self {
        Self {
            min_base_level: default_min_base_level(),
            quest_id: None,
        }
    }
}

/// A catalog monster. `reward` is per kill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub id: MonsterId,
    pub name: String,
    pub reward: Reward,
    #[serde(default)]
    pub prerequisite: Option<MonsterPrerequisite>,
}

impl Monster {
    #[must_use]
    pub fn min_base_level(&self) -> u32 {
        self.prerequisite
            .as_ref()
            .map_or_else(default_min_base_level, |pre| pre.min_base_level)
    }

    #[must_use]
    pub fn quest_gate(&self) -> Option<&QuestId> {
        self.prerequisite.as_ref().and_then(|pre| pre.quest_id.as_ref())
    }
}

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonsterTier {
    pub id: MonsterId,
    pub name: String,
    pub reward: Reward,
    pub min_base_level: u32,
    pub quest_gate: Option<QuestId>,
}

impl MonsterTier {
    /// The gating quest, if any, is complete.
    #[must_use]
    pub fn quest_gate_met(&self, completed: &BTreeSet<QuestId>) -> bool {
        self.quest_gate
            .as_ref()
            .is_none_or(|quest| completed.contains(quest))
    }
}

impl From<&Monster> for MonsterTier {
    fn from(monster: &Monster) -> Self {
        Self {
            id: monster.id.clone(),
            name: monster.name.clone(),
            reward: monster.reward,
            min_base_level: monster.min_base_level(),
            quest_gate: monster.quest_gate().cloned(),
        }
    }
}

/// Position on the ladder. Only ever moves up within one journey branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MonsterCursor {
    index: usize,
    is_last: bool,
}

impl MonsterCursor {
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.is_last
    }
}

/// Monsters sorted by unlock level (stable for equal levels).
///
/// The first tier is always huntable; its own gate is ignored since there is
/// nothing lower to fall back to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonsterLadder {
    tiers: Vec<MonsterTier>,
}

impl MonsterLadder {
    #[must_use]
    pub fn new<'a>(monsters: impl IntoIterator<Item = &'a Monster>) -> Self {
        let mut tiers: Vec<MonsterTier> = monsters.into_iter().map(MonsterTier::from).collect();
        tiers.sort_by_key(|tier| tier.min_base_level);
        Self { tiers }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[must_use]
    pub fn tiers(&self) -> &[MonsterTier] {
        &self.tiers
    }

    #[must_use]
    pub fn tier(&self, cursor: MonsterCursor) -> Option<&MonsterTier> {
        self.tiers.get(cursor.index)
    }

    fn cursor_at(&self, index: usize) -> MonsterCursor {
        MonsterCursor {
            index,
            is_last: index + 1 >= self.tiers.len(),
        }
    }

    /// Cursor for a fresh journey at `base_level`.
    #[must_use]
    pub fn start(&self, base_level: u32, completed: &BTreeSet<QuestId>) -> MonsterCursor {
        self.advance(self.cursor_at(0), base_level, completed)
    }

    /// Catch the cursor up to the highest tier reachable without skipping a
    /// quest-blocked one.
    #[must_use]
    pub fn advance(
        &self,
        cursor: MonsterCursor,
        base_level: u32,
        completed: &BTreeSet<QuestId>,
    ) -> MonsterCursor {
        let mut index = cursor.index;
        while let Some(next) = self.tiers.get(index + 1) {
            if next.min_base_level > base_level || !next.quest_gate_met(completed) {
                break;
            }
            index += 1;
        }
        self.cursor_at(index)
    }

    /// The current tier and every following one up to (not including) the
    /// first that is quest-blocked. The grind may climb through these, in
    /// order, without completing another quest.
    #[must_use]
    pub fn relevant_thresholds(
        &self,
        cursor: MonsterCursor,
        completed: &BTreeSet<QuestId>,
    ) -> &[MonsterTier] {
        let Some(rest) = self.tiers.get(cursor.index..) else {
            return &[];
        };
        let blocked = rest
            .iter()
            .skip(1)
            .position(|tier| !tier.quest_gate_met(completed))
            .map_or(rest.len(), |offset| offset + 1);
        &rest[..blocked]
    }

    /// Base level at which the cursor could move up next, if the next tier
    /// is not quest-blocked.
    #[must_use]
    pub fn next_unlock_level(
        &self,
        cursor: MonsterCursor,
        completed: &BTreeSet<QuestId>,
    ) -> Option<u32> {
        self.relevant_thresholds(cursor, completed)
            .get(1)
            .map(|next| next.min_base_level)
    }
}
