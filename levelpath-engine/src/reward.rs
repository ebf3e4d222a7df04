//! Experience rewards, overlevel capping and the waste policy.
//!
//! A single reward may not carry a track further than one experience point
//! short of twice its remaining distance to the next level. Whatever is cut
//! off is waste; the [`OvercapSettings`] decide whether a wasteful outcome is
//! acceptable or whether the character should grind up first.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::curve::{ExpCurve, LevelFloor, LevelTable, RawExp};
use crate::numbers::{floor_f64_to_u64, ratio, u64_to_f64};

/// Experience granted on each track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Reward {
    #[serde(default)]
    pub base: u64,
    #[serde(default)]
    pub job: u64,
}

impl Reward {
    pub const ZERO: Self = Self::new(0, 0);

    #[must_use]
    pub const fn new(base: u64, job: u64) -> Self {
        Self { base, job }
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.base == 0 && self.job == 0
    }

    /// Multiply by `rate`, rounding down.
    #[must_use]
    pub fn scaled(self, rate: f64) -> Self {
        Self::new(
            floor_f64_to_u64(u64_to_f64(self.base) * rate),
            floor_f64_to_u64(u64_to_f64(self.job) * rate),
        )
    }

    /// `count` copies of this reward.
    #[must_use]
    pub const fn times(self, count: u64) -> Self {
        Self::new(
            self.base.saturating_mul(count),
            self.job.saturating_mul(count),
        )
    }

    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self::new(
            self.base.saturating_add(other.base),
            self.job.saturating_add(other.job),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RewardSpec {
    Single(Reward),
    Batch(Vec<Reward>),
}

/// A quest reward: one or more entries applied (and capped) in order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RewardSpec")]
pub struct RewardBatch(SmallVec<[Reward; 2]>);

impl From<RewardSpec> for RewardBatch {
    fn from(spec: RewardSpec) -> Self {
        match spec {
            RewardSpec::Single(reward) => Self::single(reward),
            RewardSpec::Batch(rewards) => rewards.into_iter().collect(),
        }
    }
}

impl From<Reward> for RewardBatch {
    fn from(reward: Reward) -> Self {
        Self::single(reward)
    }
}

impl FromIterator<Reward> for RewardBatch {
    fn from_iter<I: IntoIterator<Item = Reward>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl RewardBatch {
    #[must_use]
    pub fn single(reward: Reward) -> Self {
        Self(smallvec::smallvec![reward])
    }

    #[must_use]
    pub fn entries(&self) -> &[Reward] {
        &self.0
    }

    #[must_use]
    pub fn total(&self) -> Reward {
        self.0
            .iter()
            .fold(Reward::ZERO, |acc, reward| acc.saturating_add(*reward))
    }

    #[must_use]
    pub fn scaled(&self, rate: f64) -> Self {
        self.0.iter().map(|reward| reward.scaled(rate)).collect()
    }

    fn track(&self, pick: fn(&Reward) -> u64) -> SmallVec<[u64; 2]> {
        self.0.iter().map(pick).collect()
    }
}

/// Largest part of `amount` a track at `raw` may take in one reward.
///
/// No cap applies at the maximum level.
#[must_use]
pub fn cap_amount(table: &LevelTable, raw: u64, amount: u64) -> u64 {
    let level = table.floor_level(raw);
    if level >= table.max_level() {
        return amount;
    }
    let progress = raw.saturating_sub(table.exp_at(level));
    let limit = table
        .exp_to_next(level)
        .saturating_mul(2)
        .saturating_sub(progress)
        .saturating_sub(1);
    amount.min(limit)
}

/// Cap both tracks of `reward` for a character at `exp`.
#[must_use]
pub fn cap_reward(curve: &ExpCurve, exp: RawExp, reward: Reward) -> Reward {
    Reward::new(
        cap_amount(&curve.base, exp.base_exp, reward.base),
        cap_amount(&curve.job, exp.job_exp, reward.job),
    )
}

/// How an uncapped reward would land on one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrackOverlevel {
    /// The reward exceeds the cap.
    pub exceeds_cap: bool,
    /// The uncapped result is the maximum level, so no cap applies.
    pub reaches_max: bool,
}

impl TrackOverlevel {
    /// Part of the reward would be thrown away.
    #[must_use]
    pub const fn wastes(&self) -> bool {
        self.exceeds_cap && !self.reaches_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Overlevel {
    pub base: TrackOverlevel,
    pub job: TrackOverlevel,
}

fn track_overlevel(table: &LevelTable, raw: u64, amount: u64) -> TrackOverlevel {
    let full = table.clamp(raw.saturating_add(amount));
    TrackOverlevel {
        exceeds_cap: cap_amount(table, raw, amount) < amount,
        reaches_max: table.floor_level(full) >= table.max_level(),
    }
}

/// Report, per track, whether `reward` would be capped at `exp`.
#[must_use]
pub fn will_overlevel(curve: &ExpCurve, exp: RawExp, reward: Reward) -> Overlevel {
    Overlevel {
        base: track_overlevel(&curve.base, exp.base_exp, reward.base),
        job: track_overlevel(&curve.job, exp.job_exp, reward.job),
    }
}

/// Result of applying a reward batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RewardOutcome {
    pub exp: RawExp,
    pub applied: Reward,
    pub wasted: Reward,
    pub total: Reward,
}

impl RewardOutcome {
    #[must_use]
    pub const fn has_waste(&self) -> bool {
        !self.wasted.is_zero()
    }

    /// The larger of the two per-track waste percentages.
    #[must_use]
    pub fn waste_percent(&self) -> f64 {
        let base = ratio(self.wasted.base, self.total.base) * 100.0;
        let job = ratio(self.wasted.job, self.total.job) * 100.0;
        base.max(job)
    }
}

/// Returns (new raw, applied amount). Reaching the maximum takes the full reward.
fn apply_track(table: &LevelTable, raw: u64, amount: u64) -> (u64, u64) {
    let full = table.clamp(raw.saturating_add(amount));
    if table.floor_level(full) >= table.max_level() {
        return (full, amount);
    }
    let capped = cap_amount(table, raw, amount);
    (raw.saturating_add(capped), capped)
}

/// Apply every batch entry in order, capping each one against the experience
/// left by the previous entries.
#[must_use]
pub fn apply_batch(curve: &ExpCurve, exp: RawExp, batch: &RewardBatch) -> RewardOutcome {
    let mut outcome = RewardOutcome {
        exp,
        ..RewardOutcome::default()
    };
    for reward in batch.entries() {
        let (base_exp, base_applied) = apply_track(&curve.base, outcome.exp.base_exp, reward.base);
        let (job_exp, job_applied) = apply_track(&curve.job, outcome.exp.job_exp, reward.job);
        let applied = Reward::new(base_applied, job_applied);

        outcome.exp = RawExp::new(base_exp, job_exp);
        outcome.applied = outcome.applied.saturating_add(applied);
        outcome.total = outcome.total.saturating_add(*reward);
        outcome.wasted = outcome.wasted.saturating_add(Reward::new(
            reward.base - base_applied,
            reward.job - job_applied,
        ));
    }
    outcome
}

fn wastes_from(table: &LevelTable, level: u32, amounts: &[u64]) -> bool {
    let mut raw = table.exp_at(level);
    for &amount in amounts {
        let (next, applied) = apply_track(table, raw, amount);
        if applied < amount {
            return true;
        }
        raw = next;
    }
    false
}

fn min_track_level(table: &LevelTable, amounts: &[u64]) -> u32 {
    (1..=table.max_level())
        .find(|&level| !wastes_from(table, level, amounts))
        .unwrap_or_else(|| table.max_level())
}

/// Lowest level pair from which the whole batch applies without waste.
#[must_use]
pub fn min_level_for_reward(curve: &ExpCurve, batch: &RewardBatch) -> LevelFloor {
    LevelFloor::new(
        min_track_level(&curve.base, &batch.track(|reward| reward.base)),
        min_track_level(&curve.job, &batch.track(|reward| reward.job)),
    )
}

/// What to do when a quest reward would be partially capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IgnoreWaste {
    /// Take the capped reward regardless.
    Always,
    /// Take it unless it leaves either track within one level of its maximum.
    #[default]
    ShortOfTarget,
    /// Take it unless it reaches the maximum on either track.
    FullTarget,
    /// Never accept waste; grind up first.
    Never,
}

fn default_allow_percent_waste() -> f64 {
    0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OvercapSettings {
    #[serde(default)]
    pub ignore_waste: IgnoreWaste,
    /// Waste at or below this percentage of a track's reward is always fine.
    #[serde(default = "default_allow_percent_waste")]
    pub allow_percent_waste: f64,
}

impl Default for OvercapSettings {
    fn default() -> Self {
        Self {
            ignore_waste: IgnoreWaste::default(),
            allow_percent_waste: default_allow_percent_waste(),
        }
    }
}

impl OvercapSettings {
    #[must_use]
    pub const fn new(ignore_waste: IgnoreWaste, allow_percent_waste: f64) -> Self {
        Self {
            ignore_waste,
            allow_percent_waste,
        }
    }

    /// Whether the quest may be turned in with this outcome.
    #[must_use]
    pub fn accepts(&self, curve: &ExpCurve, outcome: &RewardOutcome) -> bool {
        if !outcome.has_waste() || outcome.waste_percent() <= self.allow_percent_waste {
            return true;
        }
        let reached = curve.floor_levels(outcome.exp);
        let max = curve.max_levels();
        match self.ignore_waste {
            IgnoreWaste::Always => true,
            IgnoreWaste::ShortOfTarget => {
                reached.base.saturating_add(1) < max.base && reached.job.saturating_add(1) < max.job
            }
            IgnoreWaste::FullTarget => reached.base < max.base && reached.job < max.job,
            IgnoreWaste::Never => false,
        }
    }
}
