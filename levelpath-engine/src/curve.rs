//! Experience curves for the base and job tracks.
//!
//! Each track is a contiguous table of levels starting at 1, holding the
//! cumulative experience needed to reach the level and the experience needed to
//! advance past it. The last level is the track maximum and has nothing left to
//! gain.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::numbers::{ceil_f64_to_u64, floor_level, ratio, u64_to_f64};
use crate::reward::Reward;

const DEFAULT_BASE_CHART: &str = include_str!("../data/base-exp-chart.json");
const DEFAULT_JOB_CHART: &str = include_str!("../data/job-exp-chart-first-class.json");

/// Errors raised while building an experience table.
#[derive(Debug, Error)]
pub enum CurveError {
    #[error("experience chart has no levels")]
    Empty,
    #[error("experience chart is not contiguous (expected level {expected}, found {found})")]
    NonContiguous { expected: u32, found: u32 },
    #[error("level {level} total is {found}, expected {expected} from the previous level")]
    TotalMismatch { level: u32, expected: u64, found: u64 },
    #[error("level {level} is below the maximum level but needs no experience to advance")]
    ZeroDelta { level: u32 },
    #[error("experience chart overflows a 64-bit total at level {level}")]
    Overflow { level: u32 },
    #[error("experience chart is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cumulative experience on both tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RawExp {
    pub base_exp: u64,
    pub job_exp: u64,
}

impl RawExp {
    pub const ZERO: Self = Self::new(0, 0);

    #[must_use]
    pub const fn new(base_exp: u64, job_exp: u64) -> Self {
        Self { base_exp, job_exp }
    }

    /// Both tracks are at or past `target`.
    #[must_use]
    pub const fn meets(&self, target: &Self) -> bool {
        self.base_exp >= target.base_exp && self.job_exp >= target.job_exp
    }

    /// Per-track maximum of the two points.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        Self {
            base_exp: self.base_exp.max(other.base_exp),
            job_exp: self.job_exp.max(other.job_exp),
        }
    }
}

/// Levels on both tracks; the fractional part is progress toward the next level.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelExp {
    pub base_lvl: f64,
    pub job_lvl: f64,
}

impl LevelExp {
    #[must_use]
    pub const fn new(base_lvl: f64, job_lvl: f64) -> Self {
        Self { base_lvl, job_lvl }
    }
}

/// Whole levels on both tracks. Used for every gating decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelFloor {
    pub base: u32,
    pub job: u32,
}

impl LevelFloor {
    #[must_use]
    pub const fn new(base: u32, job: u32) -> Self {
        Self { base, job }
    }

    /// Per-track maximum of the two floors.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        Self {
            base: self.base.max(other.base),
            job: self.job.max(other.job),
        }
    }
}

impl Default for LevelFloor {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl From<LevelFloor> for LevelExp {
    fn from(floor: LevelFloor) -> Self {
        Self::new(f64::from(floor.base), f64::from(floor.job))
    }
}

/// A point given either as raw totals or as (possibly fractional) levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpPoint {
    Raw(RawExp),
    Level(LevelExp),
}

impl From<RawExp> for ExpPoint {
    fn from(raw: RawExp) -> Self {
        Self::Raw(raw)
    }
}

impl From<LevelExp> for ExpPoint {
    fn from(level: LevelExp) -> Self {
        Self::Level(level)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartRow {
    total_exp: u64,
    exp_to_next_level: u64,
}

/// One experience track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    totals: Vec<u64>,
    to_next: Vec<u64>,
}

impl Default for LevelTable {
    /// A table with a single, already maximal level.
    fn default() -> Self {
        Self {
            totals: vec![0],
            to_next: vec![0],
        }
    }
}

impl LevelTable {
    /// Build a table from the experience needed to leave each level below the
    /// maximum. The maximum level is `deltas.len() + 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if any delta is zero or the totals overflow.
    pub fn from_deltas(deltas: &[u64]) -> Result<Self, CurveError> {
        let mut totals = Vec::with_capacity(deltas.len() + 1);
        let mut total = 0_u64;
        totals.push(total);
        for (level, &delta) in (1_u32..).zip(deltas) {
            if delta == 0 {
                return Err(CurveError::ZeroDelta { level });
            }
            total = total
                .checked_add(delta)
                .ok_or(CurveError::Overflow { level: level + 1 })?;
            totals.push(total);
        }
        let mut to_next = deltas.to_vec();
        to_next.push(0);
        Ok(Self { totals, to_next })
    }

    /// Parse a chart of the form `{ "1": { "totalExp": 0, "expToNextLevel": 9 }, ... }`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, the levels are not contiguous
    /// from 1, or the cumulative totals disagree with the deltas.
    pub fn from_json(json: &str) -> Result<Self, CurveError> {
        let rows: BTreeMap<u32, ChartRow> = serde_json::from_str(json)?;
        if rows.is_empty() {
            return Err(CurveError::Empty);
        }

        let last = rows.len();
        let mut deltas = Vec::with_capacity(last);
        let mut expected_total = 0_u64;
        for (index, (&level, row)) in rows.iter().enumerate() {
            let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if level != expected {
                return Err(CurveError::NonContiguous {
                    expected,
                    found: level,
                });
            }
            if row.total_exp != expected_total {
                return Err(CurveError::TotalMismatch {
                    level,
                    expected: expected_total,
                    found: row.total_exp,
                });
            }
            if index + 1 < last {
                deltas.push(row.exp_to_next_level);
                expected_total = expected_total
                    .checked_add(row.exp_to_next_level)
                    .ok_or(CurveError::Overflow { level })?;
            }
        }

        Self::from_deltas(&deltas)
    }

    #[must_use]
    pub fn max_level(&self) -> u32 {
        u32::try_from(self.totals.len()).unwrap_or(u32::MAX)
    }

    /// Cumulative experience at the top of the table.
    #[must_use]
    pub fn max_exp(&self) -> u64 {
        self.totals.last().copied().unwrap_or(0)
    }

    fn index(&self, level: u32) -> usize {
        let level = level.clamp(1, self.max_level());
        usize::try_from(level - 1).unwrap_or(0)
    }

    /// Cumulative experience at the start of `level` (clamped to the table).
    #[must_use]
    pub fn exp_at(&self, level: u32) -> u64 {
        self.totals[self.index(level)]
    }

    /// Experience needed to leave `level`; 0 at the maximum level.
    #[must_use]
    pub fn exp_to_next(&self, level: u32) -> u64 {
        self.to_next[self.index(level)]
    }

    #[must_use]
    pub fn clamp(&self, raw: u64) -> u64 {
        raw.min(self.max_exp())
    }

    /// Greatest level whose cumulative total is at or below `raw`.
    #[must_use]
    pub fn floor_level(&self, raw: u64) -> u32 {
        let reached = self.totals.partition_point(|&total| total <= raw);
        u32::try_from(reached.max(1)).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn to_level(&self, raw: u64) -> f64 {
        let raw = self.clamp(raw);
        let level = self.floor_level(raw);
        let progress = raw - self.exp_at(level);
        f64::from(level) + ratio(progress, self.exp_to_next(level))
    }

    /// Experience for a (possibly fractional) level; the in-level part rounds up.
    #[must_use]
    pub fn to_raw(&self, level: f64) -> u64 {
        let whole = floor_level(level, 1, self.max_level());
        let fraction = (level - f64::from(whole)).clamp(0.0, 1.0);
        let within = ceil_f64_to_u64(u64_to_f64(self.exp_to_next(whole)) * fraction);
        self.clamp(self.exp_at(whole).saturating_add(within))
    }
}

/// The pair of experience tracks a character levels on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpCurve {
    pub base: LevelTable,
    pub job: LevelTable,
}

impl ExpCurve {
    #[must_use]
    pub const fn new(base: LevelTable, job: LevelTable) -> Self {
        Self { base, job }
    }

    /// # Errors
    ///
    /// Returns an error if either chart is invalid.
    pub fn from_json(base_json: &str, job_json: &str) -> Result<Self, CurveError> {
        Ok(Self::new(
            LevelTable::from_json(base_json)?,
            LevelTable::from_json(job_json)?,
        ))
    }

    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_BASE_CHART, DEFAULT_JOB_CHART).unwrap_or_default()
    }

    /// The bundled base chart (to 99) and first-class job chart (to 50).
    #[must_use]
    pub fn bundled() -> &'static Self {
        static CURVE: OnceLock<ExpCurve> = OnceLock::new();
        CURVE.get_or_init(Self::load_from_static)
    }

    #[must_use]
    pub fn max_levels(&self) -> LevelFloor {
        LevelFloor::new(self.base.max_level(), self.job.max_level())
    }

    #[must_use]
    pub fn max_exp(&self) -> RawExp {
        RawExp::new(self.base.max_exp(), self.job.max_exp())
    }

    #[must_use]
    pub fn clamp(&self, raw: RawExp) -> RawExp {
        RawExp::new(self.base.clamp(raw.base_exp), self.job.clamp(raw.job_exp))
    }

    #[must_use]
    pub fn floor_levels(&self, raw: RawExp) -> LevelFloor {
        LevelFloor::new(
            self.base.floor_level(raw.base_exp),
            self.job.floor_level(raw.job_exp),
        )
    }

    #[must_use]
    pub fn exp_at(&self, floor: LevelFloor) -> RawExp {
        RawExp::new(self.base.exp_at(floor.base), self.job.exp_at(floor.job))
    }

    #[must_use]
    pub fn to_level(&self, raw: RawExp) -> LevelExp {
        LevelExp::new(
            self.base.to_level(raw.base_exp),
            self.job.to_level(raw.job_exp),
        )
    }

    #[must_use]
    pub fn to_raw(&self, level: LevelExp) -> RawExp {
        RawExp::new(self.base.to_raw(level.base_lvl), self.job.to_raw(level.job_lvl))
    }

    /// Resolve a caller-supplied point to clamped raw experience.
    #[must_use]
    pub fn resolve(&self, point: ExpPoint) -> RawExp {
        match point {
            ExpPoint::Raw(raw) => self.clamp(raw),
            ExpPoint::Level(level) => self.to_raw(level),
        }
    }

    /// Add an uncapped reward, clamping at the track maxima.
    #[must_use]
    pub fn add_reward(&self, raw: RawExp, reward: Reward) -> RawExp {
        self.clamp(RawExp::new(
            raw.base_exp.saturating_add(reward.base),
            raw.job_exp.saturating_add(reward.job),
        ))
    }
}
