//! Journey transitions: grinding and turning in one quest.
use log::{trace, warn};
use std::collections::BTreeSet;

use crate::catalog::Catalog;
use crate::curve::{ExpCurve, LevelFloor, RawExp};
use crate::journey::{JourneyState, Step};
use crate::kills::plan_kills;
use crate::ladder::{MonsterId, MonsterLadder};
use crate::quest::{ExpQuest, MonsterQuest, Quest, QuestGraph, QuestId, QuestProgress};
use crate::reward::{OvercapSettings, apply_batch, min_level_for_reward};

use super::{PlanError, PlanRequest};

/// Everything fixed for one planning session.
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    pub curve: &'a ExpCurve,
    /// The catalog with the session rates applied.
    pub catalog: Catalog,
    pub ladder: MonsterLadder,
    pub graph: QuestGraph,
    pub overcap: OvercapSettings,
    pub target: RawExp,
}

impl<'a> PlanContext<'a> {
    /// Validate `request` against `catalog` and build the session context.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown monster or quest ids and for cyclic
    /// quest prerequisites.
    pub fn new(
        curve: &'a ExpCurve,
        catalog: &Catalog,
        request: &PlanRequest,
    ) -> Result<Self, PlanError> {
        let catalog = catalog.with_rates(request.rates);

        let mut monsters = Vec::with_capacity(request.allowed_monsters.len());
        for id in request.allowed_monsters.iter().collect::<BTreeSet<_>>() {
            let monster = catalog
                .monster(id)
                .ok_or_else(|| PlanError::UnknownMonster(id.clone()))?;
            if let Some(gate) = monster.quest_gate()
                && catalog.quest(gate).is_none()
            {
                return Err(PlanError::UnknownQuest(gate.clone()));
            }
            monsters.push(monster);
        }
        let ladder = MonsterLadder::new(monsters);

        let scope: BTreeSet<QuestId> = request
            .allowed_quests
            .iter()
            .chain(&request.completed_quests)
            .cloned()
            .collect();
        let graph = QuestGraph::new(&catalog, &scope)?;
        for id in &scope {
            if let Some(Quest::Monster(hunt)) = catalog.quest(id) {
                check_monster(&catalog, &hunt.kills.monster_id)?;
            }
        }

        Ok(Self {
            curve,
            ladder,
            graph,
            overcap: request.overcap,
            target: curve.resolve(request.target),
            catalog,
        })
    }

    /// The root search node.
    #[must_use]
    pub fn initial_state(&self, start: RawExp, completed: &[QuestId]) -> JourneyState {
        let quests = QuestProgress::new(&self.graph, completed.iter().cloned().collect());
        let cursor = self
            .ladder
            .start(self.curve.base.floor_level(start.base_exp), quests.completed());
        JourneyState::new(start, cursor, quests)
    }

    #[must_use]
    pub fn meets_target(&self, state: &JourneyState) -> bool {
        state.exp.meets(&self.target)
    }
}

fn check_monster(catalog: &Catalog, id: &MonsterId) -> Result<(), PlanError> {
    catalog
        .monster(id)
        .map(|_| ())
        .ok_or_else(|| PlanError::UnknownMonster(id.clone()))
}

const fn over_bound(kills: u64, bound: Option<u64>) -> bool {
    match bound {
        Some(best) => kills >= best,
        None => false,
    }
}

/// Grind from `state` until `goal` is met on both tracks.
///
/// `None` if the goal is out of reach or the kills would reach `bound`.
#[must_use]
pub fn grind(
    context: &PlanContext<'_>,
    state: &JourneyState,
    goal: RawExp,
    bound: Option<u64>,
) -> Option<JourneyState> {
    if state.exp.meets(&goal) {
        return Some(state.clone());
    }
    let hunt = plan_kills(
        context.curve,
        &context.ladder,
        state.exp,
        goal,
        state.cursor,
        state.quests.completed(),
    )?;
    let kills = state.kills.saturating_add(hunt.kills);
    if over_bound(kills, bound) {
        trace!("grind to {goal:?} needs {kills} kills, bound is {bound:?}");
        return None;
    }
    Some(JourneyState {
        exp: hunt.exp,
        cursor: hunt.cursor,
        kills,
        quests: state.quests.clone(),
        steps: state.steps.extend(hunt.steps),
    })
}

/// Turn in `quest_id` from `state`, grinding first where needed.
///
/// `None` when the branch cannot beat `bound` or cannot take the quest.
#[must_use]
pub fn perform_quest(
    context: &PlanContext<'_>,
    state: &JourneyState,
    quest_id: &QuestId,
    bound: Option<u64>,
) -> Option<JourneyState> {
    match context.catalog.quest(quest_id)? {
        Quest::Exp(quest) => perform_exp_quest(context, state, quest, bound),
        Quest::Monster(quest) => perform_monster_quest(context, state, quest, bound),
    }
}

fn perform_exp_quest(
    context: &PlanContext<'_>,
    state: &JourneyState,
    quest: &ExpQuest,
    bound: Option<u64>,
) -> Option<JourneyState> {
    let curve = context.curve;
    let stated = LevelFloor::new(
        quest.prerequisite.min_base_level.unwrap_or(1),
        quest.prerequisite.min_job_level.unwrap_or(1),
    );
    let required = min_level_for_reward(curve, &quest.reward).join(stated);
    let mut state = grind(context, state, curve.exp_at(required), bound)?;

    let attempts = curve.base.max_level() + curve.job.max_level();
    for _ in 0..attempts {
        let outcome = apply_batch(curve, state.exp, &quest.reward);
        if context.overcap.accepts(curve, &outcome) {
            return Some(complete(context, &state, &quest.id, &quest.name, 0, outcome.exp));
        }

        let floor = curve.floor_levels(state.exp);
        let next = RawExp::new(
            if outcome.wasted.base > 0 {
                curve.base.exp_at(floor.base + 1)
            } else {
                state.exp.base_exp
            },
            if outcome.wasted.job > 0 {
                curve.job.exp_at(floor.job + 1)
            } else {
                state.exp.job_exp
            },
        );
        state = grind(context, &state, next, bound)?;
    }

    warn!(
        "gave up on {} after {attempts} grind-first attempts",
        quest.id
    );
    None
}

fn perform_monster_quest(
    context: &PlanContext<'_>,
    state: &JourneyState,
    quest: &MonsterQuest,
    bound: Option<u64>,
) -> Option<JourneyState> {
    let monster = context.catalog.monster(&quest.kills.monster_id)?;
    if let Some(gate) = monster.quest_gate()
        && !state.quests.completed().contains(gate)
    {
        return None;
    }

    let unlock = context
        .curve
        .exp_at(LevelFloor::new(monster.min_base_level(), 1));
    let state = grind(context, state, unlock, bound)?;

    let count = quest.kills.count;
    let kills = state.kills.saturating_add(count);
    if over_bound(kills, bound) {
        trace!("{} needs {kills} kills, bound is {bound:?}", quest.id);
        return None;
    }
    let exp = context
        .curve
        .add_reward(state.exp, monster.reward.times(count));
    let mut done = complete(context, &state, &quest.id, &quest.name, count, exp);
    done.kills = kills;
    Some(done)
}

fn complete(
    context: &PlanContext<'_>,
    state: &JourneyState,
    quest_id: &QuestId,
    name: &str,
    kills: u64,
    exp: RawExp,
) -> JourneyState {
    let quests = state.quests.complete(&context.graph, quest_id);
    let cursor = context.ladder.advance(
        state.cursor,
        context.curve.base.floor_level(exp.base_exp),
        quests.completed(),
    );
    JourneyState {
        exp,
        cursor,
        kills: state.kills,
        steps: state.steps.push(Step::Quest {
            quest_id: quest_id.clone(),
            name: name.to_string(),
            kills,
            exp_after: exp,
        }),
        quests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{ExpPoint, LevelExp};
    use crate::reward::IgnoreWaste;

    fn request(quests: &[&str], completed: &[&str]) -> PlanRequest {
        PlanRequest {
            allowed_quests: quests.iter().copied().map(QuestId::new).collect(),
            allowed_monsters: ["spore", "muka", "wolf"].map(MonsterId::new).to_vec(),
            completed_quests: completed.iter().copied().map(QuestId::new).collect(),
            ..PlanRequest::new(
                ExpPoint::Level(LevelExp::new(11.0, 1.0)),
                ExpPoint::Level(LevelExp::new(1.0, 50.0)),
            )
        }
    }

    fn start() -> RawExp {
        ExpCurve::bundled().to_raw(LevelExp::new(11.0, 1.0))
    }

    #[test]
    fn exp_quest_grinds_to_its_waste_free_level_first() {
        let curve = ExpCurve::bundled();
        let request = request(&["acolyte-training"], &[]);
        let context = PlanContext::new(curve, Catalog::bundled(), &request).unwrap();
        let state = context.initial_state(start(), &[]);

        let done = perform_quest(&context, &state, &QuestId::new("acolyte-training"), None).unwrap();
        let steps = done.steps.to_vec();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kills(), 369);
        assert_eq!(steps[0].exp_after(), RawExp::new(25_555, 39_852));
        assert_eq!(done.exp, RawExp::new(32_555, 45_852));
        assert_eq!(done.kills, 369);
        assert!(done.quests.completed().contains(&QuestId::new("acolyte-training")));
        // muka unlocks at 26 once the quest is done
        assert_eq!(done.cursor.index(), 1);
    }

    #[test]
    fn bound_rejects_expensive_branches() {
        let curve = ExpCurve::bundled();
        let request = request(&["acolyte-training"], &[]);
        let context = PlanContext::new(curve, Catalog::bundled(), &request).unwrap();
        let state = context.initial_state(start(), &[]);
        let id = QuestId::new("acolyte-training");

        assert!(perform_quest(&context, &state, &id, Some(369)).is_none());
        assert!(perform_quest(&context, &state, &id, Some(370)).is_some());
    }

    fn single_quest_context(overcap: OvercapSettings) -> (Catalog, PlanRequest) {
        let monsters = r#"{ "monsters": [
            { "id": "spore", "name": "Spore", "reward": { "base": 66, "job": 108 } }
        ] }"#;
        let quests = r#"{ "quests": [
            { "kind": "exp", "id": "q", "name": "Q", "reward": { "base": 1399, "job": 0 } }
        ] }"#;
        let request = PlanRequest {
            allowed_quests: vec![QuestId::new("q")],
            allowed_monsters: vec![MonsterId::new("spore")],
            overcap,
            ..PlanRequest::new(
                ExpPoint::Raw(RawExp::new(2_761, 0)),
                ExpPoint::Level(LevelExp::new(20.0, 1.0)),
            )
        };
        (Catalog::from_json(monsters, quests).unwrap(), request)
    }

    #[test]
    fn waste_policy_decides_between_turning_in_and_grinding_up() {
        let curve = ExpCurve::bundled();
        // level 14 with 100 of 700 progress: 1399 is capped to 1299
        let start = RawExp::new(2_761, 0);
        let id = QuestId::new("q");

        let (catalog, request) = single_quest_context(OvercapSettings::new(IgnoreWaste::Never, 0.0));
        let context = PlanContext::new(curve, &catalog, &request).unwrap();
        let strict = perform_quest(&context, &context.initial_state(start, &[]), &id, None).unwrap();
        assert_eq!(strict.kills, 10);
        assert_eq!(strict.exp, RawExp::new(3_421 + 1_399, 1_080));

        let (catalog, request) = single_quest_context(OvercapSettings::new(IgnoreWaste::Always, 0.0));
        let context = PlanContext::new(curve, &catalog, &request).unwrap();
        let lax = perform_quest(&context, &context.initial_state(start, &[]), &id, None).unwrap();
        assert_eq!(lax.kills, 0);
        assert_eq!(lax.exp, RawExp::new(2_761 + 1_299, 0));

        let (catalog, request) = single_quest_context(OvercapSettings::new(IgnoreWaste::Never, 10.0));
        let context = PlanContext::new(curve, &catalog, &request).unwrap();
        let tolerant = perform_quest(&context, &context.initial_state(start, &[]), &id, None).unwrap();
        assert_eq!(tolerant.kills, 0);
    }

    #[test]
    fn monster_quest_counts_its_kills_uncapped() {
        let curve = ExpCurve::bundled();
        let request = request(&["rachel-sanctuary-siroma"], &[]);
        let context = PlanContext::new(curve, Catalog::bundled(), &request).unwrap();
        let at_66 = curve.exp_at(LevelFloor::new(66, 30));
        let state = context.initial_state(at_66, &[]);

        let done =
            perform_quest(&context, &state, &QuestId::new("rachel-sanctuary-siroma"), None).unwrap();
        assert_eq!(done.kills, 400);
        assert_eq!(
            done.exp,
            RawExp::new(at_66.base_exp + 2_230 * 400, at_66.job_exp + 1_005 * 400)
        );
        assert!(matches!(
            done.steps.last(),
            Some(Step::Quest { kills: 400, .. })
        ));
        assert!(perform_quest(&context, &state, &QuestId::new("rachel-sanctuary-siroma"), Some(400)).is_none());
    }

    #[test]
    fn gated_monster_quest_waits_for_its_gate() {
        let monsters = r#"{ "monsters": [
            { "id": "spore", "name": "Spore", "reward": { "base": 66, "job": 108 } },
            { "id": "muka", "name": "Muka", "reward": { "base": 273, "job": 120 },
              "prerequisite": { "min_base_level": 26, "quest_id": "gate" } }
        ] }"#;
        let quests = r#"{ "quests": [
            { "kind": "exp", "id": "gate", "name": "Gate", "reward": { "base": 1, "job": 1 } },
            { "kind": "monster", "id": "hunt", "name": "Hunt",
              "kills": { "monster_id": "muka", "count": 10 } }
        ] }"#;
        let catalog = Catalog::from_json(monsters, quests).unwrap();
        let curve = ExpCurve::bundled();
        let request = PlanRequest {
            allowed_quests: vec![QuestId::new("gate"), QuestId::new("hunt")],
            allowed_monsters: vec![MonsterId::new("spore")],
            ..PlanRequest::new(
                ExpPoint::Raw(RawExp::ZERO),
                ExpPoint::Level(LevelExp::new(30.0, 1.0)),
            )
        };
        let context = PlanContext::new(curve, &catalog, &request).unwrap();
        let state = context.initial_state(RawExp::ZERO, &[]);
        assert!(perform_quest(&context, &state, &QuestId::new("hunt"), None).is_none());

        let gated = perform_quest(&context, &state, &QuestId::new("gate"), None).unwrap();
        let hunted = perform_quest(&context, &gated, &QuestId::new("hunt"), None).unwrap();
        assert!(curve.floor_levels(hunted.exp).base >= 26);
    }

    #[test]
    fn unknown_ids_are_configuration_errors() {
        let curve = ExpCurve::bundled();
        let mut bad_monster = request(&[], &[]);
        bad_monster.allowed_monsters.push(MonsterId::new("poring"));
        assert!(matches!(
            PlanContext::new(curve, Catalog::bundled(), &bad_monster),
            Err(PlanError::UnknownMonster(id)) if id.as_str() == "poring"
        ));

        let bad_quest = request(&["no-such-quest"], &[]);
        assert!(matches!(
            PlanContext::new(curve, Catalog::bundled(), &bad_quest),
            Err(PlanError::UnknownQuest(_))
        ));
    }
}
