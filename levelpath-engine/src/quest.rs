//! Quests, their prerequisite graph and per-branch completion bookkeeping.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::ladder::MonsterId;
use crate::planner::PlanError;
use crate::reward::RewardBatch;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestId(String);

impl QuestId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestPrerequisite {
    #[serde(default)]
    pub min_base_level: Option<u32>,
    #[serde(default)]
    pub min_job_level: Option<u32>,
    #[serde(default)]
    pub quest_ids: Vec<QuestId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpQuest {
    pub id: QuestId,
    pub name: String,
    pub reward: RewardBatch,
    #[serde(default)]
    pub prerequisite: QuestPrerequisite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterKills {
    pub monster_id: MonsterId,
    pub count: u64,
}

/// A hunting quest: its only reward is the experience of the kills themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterQuest {
    pub id: QuestId,
    pub name: String,
    pub kills: MonsterKills,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Quest {
    Exp(ExpQuest),
    Monster(MonsterQuest),
}

impl Quest {
    #[must_use]
    pub const fn id(&self) -> &QuestId {
        match self {
            Self::Exp(quest) => &quest.id,
            Self::Monster(quest) => &quest.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Exp(quest) => &quest.name,
            Self::Monster(quest) => &quest.name,
        }
    }

    /// Quests that must be completed first.
    #[must_use]
    pub fn prerequisite_ids(&self) -> &[QuestId] {
        match self {
            Self::Exp(quest) => &quest.prerequisite.quest_ids,
            Self::Monster(_) => &[],
        }
    }
}

/// Prerequisite edges among the quests of one planning session, built once
/// and shared by every branch.
#[derive(Debug, Clone, Default)]
pub struct QuestGraph {
    prerequisites: BTreeMap<QuestId, BTreeSet<QuestId>>,
    dependents: BTreeMap<QuestId, Vec<QuestId>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Open,
    Done,
}

impl QuestGraph {
    /// Build the graph for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::UnknownQuest`] if a scoped quest or one of its
    /// prerequisites is not in the catalog, and [`PlanError::QuestCycle`] if
    /// the scoped prerequisites loop.
    pub fn new(catalog: &Catalog, scope: &BTreeSet<QuestId>) -> Result<Self, PlanError> {
        let mut graph = Self::default();
        for id in scope {
            let quest = catalog
                .quest(id)
                .ok_or_else(|| PlanError::UnknownQuest(id.clone()))?;
            let mut required = BTreeSet::new();
            for prerequisite in quest.prerequisite_ids() {
                if catalog.quest(prerequisite).is_none() {
                    return Err(PlanError::UnknownQuest(prerequisite.clone()));
                }
                required.insert(prerequisite.clone());
                graph
                    .dependents
                    .entry(prerequisite.clone())
                    .or_default()
                    .push(id.clone());
            }
            graph.prerequisites.insert(id.clone(), required);
        }
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), PlanError> {
        let mut visits: BTreeMap<&QuestId, Visit> = BTreeMap::new();
        for root in self.prerequisites.keys() {
            if visits.contains_key(root) {
                continue;
            }
            let mut stack = vec![(root, false)];
            while let Some((id, leaving)) = stack.pop() {
                if leaving {
                    visits.insert(id, Visit::Done);
                    continue;
                }
                match visits.get(id) {
                    Some(Visit::Done) => continue,
                    Some(Visit::Open) => return Err(PlanError::QuestCycle(id.clone())),
                    None => {}
                }
                visits.insert(id, Visit::Open);
                stack.push((id, true));
                for next in self.prerequisites_of(id) {
                    match visits.get(next) {
                        Some(Visit::Open) => return Err(PlanError::QuestCycle(next.clone())),
                        Some(Visit::Done) => {}
                        None if self.prerequisites.contains_key(next) => stack.push((next, false)),
                        None => {}
                    }
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: &QuestId) -> bool {
        self.prerequisites.contains_key(id)
    }

    pub fn prerequisites_of<'a>(
        &'a self,
        id: &QuestId,
    ) -> impl Iterator<Item = &'a QuestId> + use<'a> {
        self.prerequisites.get(id).into_iter().flatten()
    }

    pub fn dependents_of<'a>(
        &'a self,
        id: &QuestId,
    ) -> impl Iterator<Item = &'a QuestId> + use<'a> {
        self.dependents.get(id).into_iter().flatten()
    }

    #[must_use]
    pub fn is_unlocked(&self, id: &QuestId, completed: &BTreeSet<QuestId>) -> bool {
        self.prerequisites_of(id).all(|required| completed.contains(required))
    }

    /// Scoped quest ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &QuestId> {
        self.prerequisites.keys()
    }
}

/// Completed, available and locked quests of one journey branch.
///
/// The three sets are disjoint and cover every scoped quest. Each set is
/// shared with the parent branch until it changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestProgress {
    completed: Arc<BTreeSet<QuestId>>,
    available: Arc<BTreeSet<QuestId>>,
    locked: Arc<BTreeSet<QuestId>>,
}

impl QuestProgress {
    /// Partition the graph's quests given what is already done.
    #[must_use]
    pub fn new(graph: &QuestGraph, completed: BTreeSet<QuestId>) -> Self {
        let (available, locked): (BTreeSet<QuestId>, BTreeSet<QuestId>) = graph
            .ids()
            .filter(|id| !completed.contains(*id))
            .cloned()
            .partition(|id| graph.is_unlocked(id, &completed));
        Self {
            completed: Arc::new(completed),
            available: Arc::new(available),
            locked: Arc::new(locked),
        }
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<QuestId> {
        &self.completed
    }

    #[must_use]
    pub fn available(&self) -> &BTreeSet<QuestId> {
        &self.available
    }

    #[must_use]
    pub fn locked(&self) -> &BTreeSet<QuestId> {
        &self.locked
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Mark `id` complete and promote every locked dependent whose
    /// prerequisites are now all done.
    #[must_use]
    pub fn complete(&self, graph: &QuestGraph, id: &QuestId) -> Self {
        let mut completed = (*self.completed).clone();
        completed.insert(id.clone());

        let promoted: Vec<&QuestId> = graph
            .dependents_of(id)
            .filter(|dependent| self.locked.contains(*dependent))
            .filter(|dependent| graph.is_unlocked(dependent, &completed))
            .collect();

        let mut available = (*self.available).clone();
        available.remove(id);
        available.extend(promoted.iter().map(|&dependent| dependent.clone()));

        let locked = if promoted.is_empty() {
            Arc::clone(&self.locked)
        } else {
            let mut locked = (*self.locked).clone();
            for dependent in &promoted {
                locked.remove(*dependent);
            }
            Arc::new(locked)
        };

        Self {
            completed: Arc::new(completed),
            available: Arc::new(available),
            locked,
        }
    }

    /// Shares all three sets with `other`.
    #[must_use]
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.completed, &other.completed)
            && Arc::ptr_eq(&self.available, &other.available)
            && Arc::ptr_eq(&self.locked, &other.locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::Reward;

    fn exp_quest(id: &str, requires: &[&str]) -> Quest {
        Quest::Exp(ExpQuest {
            id: QuestId::new(id),
            name: id.to_string(),
            reward: Reward::new(100, 0).into(),
            prerequisite: QuestPrerequisite {
                quest_ids: requires.iter().copied().map(QuestId::new).collect(),
                ..QuestPrerequisite::default()
            },
        })
    }

    fn ids(values: &[&str]) -> BTreeSet<QuestId> {
        values.iter().copied().map(QuestId::new).collect()
    }

    fn chain_catalog() -> Catalog {
        Catalog::new(
            Vec::new(),
            vec![
                exp_quest("a", &[]),
                exp_quest("b", &["a"]),
                exp_quest("c", &["a", "b"]),
                exp_quest("d", &[]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn initial_partition_follows_prerequisites() {
        let catalog = chain_catalog();
        let graph = QuestGraph::new(&catalog, &ids(&["a", "b", "c", "d"])).unwrap();
        let progress = QuestProgress::new(&graph, BTreeSet::new());
        assert_eq!(progress.available(), &ids(&["a", "d"]));
        assert_eq!(progress.locked(), &ids(&["b", "c"]));
        assert!(progress.completed().is_empty());
    }

    #[test]
    fn completing_promotes_only_fully_unlocked_dependents() {
        let catalog = chain_catalog();
        let graph = QuestGraph::new(&catalog, &ids(&["a", "b", "c", "d"])).unwrap();
        let start = QuestProgress::new(&graph, BTreeSet::new());

        let after_a = start.complete(&graph, &QuestId::new("a"));
        assert_eq!(after_a.available(), &ids(&["b", "d"]));
        assert_eq!(after_a.locked(), &ids(&["c"]));

        let after_b = after_a.complete(&graph, &QuestId::new("b"));
        assert_eq!(after_b.available(), &ids(&["c", "d"]));
        assert!(after_b.locked().is_empty());

        // the parent branch is untouched
        assert_eq!(start.available(), &ids(&["a", "d"]));
    }

    #[test]
    fn unchanged_sets_are_shared() {
        let catalog = chain_catalog();
        let graph = QuestGraph::new(&catalog, &ids(&["a", "b", "c", "d"])).unwrap();
        let start = QuestProgress::new(&graph, BTreeSet::new());
        let after_d = start.complete(&graph, &QuestId::new("d"));
        assert!(Arc::ptr_eq(&start.locked, &after_d.locked));
        assert!(!start.shares_with(&after_d));
        assert!(start.shares_with(&start.clone()));
    }

    #[test]
    fn out_of_scope_prerequisite_keeps_quest_locked() {
        let catalog = chain_catalog();
        let graph = QuestGraph::new(&catalog, &ids(&["b"])).unwrap();
        let progress = QuestProgress::new(&graph, BTreeSet::new());
        assert_eq!(progress.locked(), &ids(&["b"]));

        let seeded = QuestProgress::new(&graph, ids(&["a"]));
        assert_eq!(seeded.available(), &ids(&["b"]));
    }

    #[test]
    fn cycles_and_unknown_ids_are_rejected() {
        let catalog = Catalog::new(
            Vec::new(),
            vec![exp_quest("x", &["y"]), exp_quest("y", &["x"]), exp_quest("z", &["ghost"])],
        )
        .unwrap();

        assert!(matches!(
            QuestGraph::new(&catalog, &ids(&["x", "y"])),
            Err(PlanError::QuestCycle(_))
        ));
        assert!(matches!(
            QuestGraph::new(&catalog, &ids(&["z"])),
            Err(PlanError::UnknownQuest(id)) if id.as_str() == "ghost"
        ));
        assert!(matches!(
            QuestGraph::new(&catalog, &ids(&["nope"])),
            Err(PlanError::UnknownQuest(_))
        ));
        // a cycle that is only half in scope cannot deadlock the search
        assert!(QuestGraph::new(&catalog, &ids(&["x"])).is_ok());
    }

    #[test]
    fn quests_parse_by_kind() {
        let json = r#"[
            { "kind": "exp", "id": "q", "name": "Q", "reward": { "base": 1, "job": 2 } },
            { "kind": "monster", "id": "m", "name": "M", "kills": { "monster_id": "spore", "count": 3 } }
        ]"#;
        let quests: Vec<Quest> = serde_json::from_str(json).unwrap();
        assert_eq!(quests[0].id().as_str(), "q");
        assert!(quests[0].prerequisite_ids().is_empty());
        assert!(matches!(&quests[1], Quest::Monster(quest) if quest.kills.count == 3));
    }
}
