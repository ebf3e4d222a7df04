//! Monster and quest catalogs.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::ladder::{Monster, MonsterId};
use crate::quest::{Quest, QuestId};

const DEFAULT_MONSTERS_DATA: &str = include_str!("../data/monsters.json");
const DEFAULT_QUESTS_DATA: &str = include_str!("../data/quests.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("monster `{0}` is listed more than once")]
    DuplicateMonster(MonsterId),
    #[error("quest `{0}` is listed more than once")]
    DuplicateQuest(QuestId),
}

const fn default_rate() -> f64 {
    1.0
}

/// Session multipliers applied to every catalog reward before planning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    #[serde(default = "default_rate")]
    pub monster: f64,
    #[serde(default = "default_rate")]
    pub quest: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            monster: default_rate(),
            quest: default_rate(),
        }
    }
}

impl Rates {
    #[must_use]
    pub const fn uniform(rate: f64) -> Self {
        Self {
            monster: rate,
            quest: rate,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MonsterFile {
    monsters: Vec<Monster>,
}

#[derive(Debug, Deserialize)]
struct QuestFile {
    quests: Vec<Quest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    monsters: BTreeMap<MonsterId, Monster>,
    quests: BTreeMap<QuestId, Quest>,
}

impl Catalog {
    /// # Errors
    ///
    /// Returns an error if a monster or quest id repeats.
    pub fn new(monsters: Vec<Monster>, quests: Vec<Quest>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for monster in monsters {
            if catalog.monsters.contains_key(&monster.id) {
                return Err(CatalogError::DuplicateMonster(monster.id));
            }
            catalog.monsters.insert(monster.id.clone(), monster);
        }
        for quest in quests {
            if catalog.quests.contains_key(quest.id()) {
                return Err(CatalogError::DuplicateQuest(quest.id().clone()));
            }
            catalog.quests.insert(quest.id().clone(), quest);
        }
        Ok(catalog)
    }

    /// Parse `{ "monsters": [...] }` and `{ "quests": [...] }` documents.
    ///
    /// # Errors
    ///
    /// Returns an error if either document is malformed or an id repeats.
    pub fn from_json(monsters_json: &str, quests_json: &str) -> Result<Self, CatalogError> {
        let MonsterFile { monsters } = serde_json::from_str(monsters_json)?;
        let QuestFile { quests } = serde_json::from_str(quests_json)?;
        Self::new(monsters, quests)
    }

    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_MONSTERS_DATA, DEFAULT_QUESTS_DATA).unwrap_or_default()
    }

    /// The bundled catalog at rate 1.
    #[must_use]
    pub fn bundled() -> &'static Self {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    /// A copy with monster and quest rewards multiplied by `rates`.
    #[must_use]
    pub fn with_rates(&self, rates: Rates) -> Self {
        let monsters = self
            .monsters
            .iter()
            .map(|(id, monster)| {
                let mut monster = monster.clone();
                monster.reward = monster.reward.scaled(rates.monster);
                (id.clone(), monster)
            })
            .collect();
        let quests = self
            .quests
            .iter()
            .map(|(id, quest)| {
                let mut quest = quest.clone();
                if let Quest::Exp(exp) = &mut quest {
                    exp.reward = exp.reward.scaled(rates.quest);
                }
                (id.clone(), quest)
            })
            .collect();
        Self { monsters, quests }
    }

    #[must_use]
    pub fn monster(&self, id: &MonsterId) -> Option<&Monster> {
        self.monsters.get(id)
    }

    #[must_use]
    pub fn quest(&self, id: &QuestId) -> Option<&Quest> {
        self.quests.get(id)
    }

    pub fn monsters(&self) -> impl Iterator<Item = &Monster> {
        self.monsters.values()
    }

    pub fn quests(&self) -> impl Iterator<Item = &Quest> {
        self.quests.values()
    }

    pub fn monster_ids(&self) -> impl Iterator<Item = &MonsterId> {
        self.monsters.keys()
    }

    pub fn quest_ids(&self) -> impl Iterator<Item = &QuestId> {
        self.quests.keys()
    }
}
