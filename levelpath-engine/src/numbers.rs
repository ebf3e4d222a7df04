//! Numeric conversion helpers centralizing the lossy casts between experience
//! totals and fractional levels.

use num_traits::cast::cast;

/// Convert a u64 to f64, accepting precision loss above 2^53 in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Floor a f64 and clamp it to the u64 range, returning 0 for NaN and negatives.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = u64_to_f64(u64::MAX);
    cast::<f64, u64>(value.min(max).floor()).unwrap_or(u64::MAX)
}

/// Ceil a f64 and clamp it to the u64 range, returning 0 for NaN and negatives.
#[must_use]
pub fn ceil_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = u64_to_f64(u64::MAX);
    cast::<f64, u64>(value.min(max).ceil()).unwrap_or(u64::MAX)
}

/// Floor a f64 level into the `[min, max]` integer level range.
#[must_use]
pub fn floor_level(value: f64, min: u32, max: u32) -> u32 {
    if value.is_nan() {
        return min;
    }
    let clamped = value.clamp(f64::from(min), f64::from(max)).floor();
    cast::<f64, u32>(clamped).unwrap_or(min)
}

/// `numerator / denominator` as a fraction, 0 when the denominator is 0.
#[must_use]
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    u64_to_f64(numerator) / u64_to_f64(denominator)
}

/// Ceiling division that treats a zero divisor as "never reachable" unless
/// there is nothing to cover.
#[must_use]
pub const fn div_ceil_or_none(amount: u64, per_unit: u64) -> Option<u64> {
    if amount == 0 {
        return Some(0);
    }
    if per_unit == 0 {
        return None;
    }
    Some(amount.div_ceil(per_unit))
}
