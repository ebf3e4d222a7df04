use std::collections::BTreeSet;

use levelpath_engine::{
    Catalog, ExpCurve, ExpPoint, ExpQuest, LevelExp, MonsterId, PlanRequest, Planner, Quest,
    QuestGraph, QuestId, QuestPrerequisite, QuestProgress, RawExp, Reward, Step, StepLog,
    cap_amount,
};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn random_catalog(rng: &mut impl Rng, quest_count: usize) -> Catalog {
    let monsters = Catalog::bundled().monsters().cloned().collect();
    let quests = (0..quest_count)
        .map(|index| {
            let earlier: Vec<QuestId> = (0..index)
                .filter(|_| rng.gen_bool(0.3))
                .map(|other| QuestId::new(format!("q{other}")))
                .collect();
            Quest::Exp(ExpQuest {
                id: QuestId::new(format!("q{index}")),
                name: format!("Quest {index}"),
                reward: Reward::new(rng.gen_range(100..40_000), rng.gen_range(0..8_000)).into(),
                prerequisite: QuestPrerequisite {
                    min_base_level: rng.gen_bool(0.5).then(|| rng.gen_range(1..40)),
                    min_job_level: None,
                    quest_ids: earlier,
                },
            })
        })
        .collect();
    Catalog::new(monsters, quests).unwrap()
}

#[test]
fn cap_allows_exactly_one_short_of_double() {
    let curve = ExpCurve::bundled();
    let mut rng = ChaCha20Rng::seed_from_u64(0x00C0_FFEE);
    for _ in 0..500 {
        let level = rng.gen_range(1..curve.base.max_level());
        let per_level = curve.base.exp_to_next(level);
        let progress = rng.gen_range(0..per_level);
        let raw = curve.base.exp_at(level) + progress;
        let limit = 2 * per_level - progress - 1;

        assert_eq!(cap_amount(&curve.base, raw, limit), limit);
        assert_eq!(cap_amount(&curve.base, raw, limit + 1), limit);
    }
}

#[test]
fn fractional_levels_round_up_by_less_than_one_point() {
    let curve = ExpCurve::bundled();
    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..500 {
        let level: f64 = rng.gen_range(1.0..50.0);
        let raw = curve.job.to_raw(level);
        let back = curve.job.to_level(raw);
        assert!(back >= level - 1e-9, "{back} < {level}");
        // at most one experience point of rounding within the level
        let per_level = curve.job.exp_to_next(curve.job.floor_level(curve.job.to_raw(level.floor())));
        assert!(back - level <= 1.0 / f64::from(u32::try_from(per_level).unwrap()) + 1e-9);
    }
}

#[test]
fn quest_availability_stays_a_partition() {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    for _ in 0..50 {
        let catalog = random_catalog(&mut rng, 12);
        let scope: BTreeSet<QuestId> = catalog.quest_ids().cloned().collect();
        let graph = QuestGraph::new(&catalog, &scope).unwrap();
        let mut progress = QuestProgress::new(&graph, BTreeSet::new());

        loop {
            let completed = progress.completed();
            let available = progress.available();
            let locked = progress.locked();
            assert!(completed.is_disjoint(available));
            assert!(completed.is_disjoint(locked));
            assert!(available.is_disjoint(locked));
            assert_eq!(completed.len() + available.len() + locked.len(), scope.len());
            for id in &scope {
                if completed.contains(id) {
                    continue;
                }
                let unlocked = graph.is_unlocked(id, completed);
                assert_eq!(available.contains(id), unlocked, "{id}");
            }

            let choices: Vec<QuestId> = available.iter().cloned().collect();
            let Some(next) = choices.choose(&mut rng) else {
                break;
            };
            progress = progress.complete(&graph, next);
        }
        assert_eq!(progress.completed().len(), scope.len());
    }
}

#[test]
fn step_log_never_repeats_a_monster() {
    let mut rng = ChaCha20Rng::seed_from_u64(99);
    let ids = ["spore", "muka", "wolf"];
    for _ in 0..100 {
        let mut log = StepLog::new();
        let mut total = 0;
        let mut base = 0;
        for _ in 0..rng.gen_range(1..40) {
            let kills = rng.gen_range(1..50);
            base += kills;
            total += kills;
            let step = if rng.gen_bool(0.2) {
                Step::Quest {
                    quest_id: QuestId::new("q"),
                    name: "Q".to_string(),
                    kills,
                    exp_after: RawExp::new(base, 0),
                }
            } else {
                let id = ids[rng.gen_range(0..ids.len())];
                Step::Monster {
                    monster_id: MonsterId::new(id),
                    name: id.to_string(),
                    kills,
                    exp_after: RawExp::new(base, 0),
                }
            };
            log = log.push(step);
        }

        let steps = log.to_vec();
        assert_eq!(steps.len(), log.len());
        assert_eq!(steps.iter().map(Step::kills).sum::<u64>(), total);
        assert_eq!(steps.last().map(Step::exp_after), Some(RawExp::new(base, 0)));
        for pair in steps.windows(2) {
            let same = pair[0].monster_id().is_some() && pair[0].monster_id() == pair[1].monster_id();
            assert!(!same);
        }
    }
}

#[test]
fn random_catalogs_yield_monotonic_valid_journeys() {
    let curve = ExpCurve::bundled();
    let mut rng = ChaCha20Rng::seed_from_u64(0xACED);
    for _ in 0..8 {
        let catalog = random_catalog(&mut rng, 5);
        let target_level = f64::from(rng.gen_range(20_u32..46));
        let request = PlanRequest {
            allowed_quests: catalog.quest_ids().cloned().collect(),
            allowed_monsters: ["spore", "wolf"].map(MonsterId::new).to_vec(),
            ..PlanRequest::new(
                ExpPoint::Level(LevelExp::new(1.0, 1.0)),
                ExpPoint::Level(LevelExp::new(target_level, 1.0)),
            )
        };
        let target = curve.resolve(request.target);
        let journeys: Vec<_> = Planner::new(curve, &catalog, &request).unwrap().collect();

        // spore alone always reaches the target
        assert!(!journeys.is_empty());
        let mut last_kills = u64::MAX;
        for journey in &journeys {
            assert!(journey.exp.meets(&target));
            assert!(journey.kills <= last_kills);
            last_kills = journey.kills;
            assert_eq!(journey.steps.iter().map(Step::kills).sum::<u64>(), journey.kills);
        }
    }
}
