// Price -> tick alignment for range positions.
// Lower bounds round down, upper bounds round up, both onto the pool's tick grid
// and inside the aligned full range. Prices here are raw (token1 per token0) unless
// a function says it works in display orientation.

use std::fmt;

use crate::math::fixed_point::price_from_tick;
use crate::math::tick_math::{MAX_TICK, MIN_TICK};
use crate::models::TickRange;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Distance under which a float tick is treated as exactly on the grid.
const TICK_SNAP_EPSILON: f64 = 1e-7;
/// Relative snap tolerance; f64 `ln` error grows with the tick magnitude.
const TICK_SNAP_RELATIVE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RangeError {
    #[error("invalid price bound: {0}")]
    InvalidPrice(f64),
    #[error("tick spacing must be positive, got {0}")]
    InvalidSpacing(i32),
    #[error("invalid range: lower {lower} is not below upper {upper}")]
    InvalidRange { lower: f64, upper: f64 },
}

#[inline]
fn floor_to_spacing(tick: i64, spacing: i32) -> i64 {
    let s = spacing as i64;
    tick.div_euclid(s) * s
}

#[inline]
fn ceil_to_spacing(tick: i64, spacing: i32) -> i64 {
    let s = spacing as i64;
    -((-tick).div_euclid(s)) * s
}

fn check_spacing(spacing: i32) -> Result<(), RangeError> {
    if spacing <= 0 { Err(RangeError::InvalidSpacing(spacing)) } else { Ok(()) }
}

/// Widest range the pool accepts for this spacing.
pub fn full_range(spacing: i32) -> Result<TickRange, RangeError> {
    check_spacing(spacing)?;
    Ok(TickRange {
        tick_lower: ceil_to_spacing(MIN_TICK as i64, spacing) as i32,
        tick_upper: floor_to_spacing(MAX_TICK as i64, spacing) as i32,
    })
}

/// Unrounded float tick, snapped to the integer when within epsilon.
fn float_tick(price: f64) -> f64 {
    let raw = price.ln() / 1.0001f64.ln();
    let nearest = raw.round();
    let tolerance = TICK_SNAP_EPSILON.max(TICK_SNAP_RELATIVE * raw.abs());
    if (raw - nearest).abs() < tolerance { nearest } else { raw }
}

/// Clamp a float tick into i64 range before rounding; beyond the full range it is clamped anyway.
fn bounded(t: f64) -> f64 {
    t.clamp((MIN_TICK as f64) * 2.0, (MAX_TICK as f64) * 2.0)
}

fn check_price(price: f64) -> Result<(), RangeError> {
    if price.is_nan() || price < 0.0 { Err(RangeError::InvalidPrice(price)) } else { Ok(()) }
}

pub fn align_lower_tick(price: f64, spacing: i32) -> Result<i32, RangeError> {
    let full = full_range(spacing)?;
    check_price(price)?;
    if price == 0.0 {
        return Ok(full.tick_lower);
    }
    if price.is_infinite() {
        return Ok(full.tick_upper);
    }
    let t = bounded(float_tick(price)).floor() as i64;
    let aligned = floor_to_spacing(t, spacing);
    Ok(aligned.clamp(full.tick_lower as i64, full.tick_upper as i64) as i32)
}

pub fn align_upper_tick(price: f64, spacing: i32) -> Result<i32, RangeError> {
    let full = full_range(spacing)?;
    check_price(price)?;
    if price.is_infinite() {
        return Ok(full.tick_upper);
    }
    if price == 0.0 {
        return Ok(full.tick_lower);
    }
    let t = bounded(float_tick(price)).ceil() as i64;
    let aligned = ceil_to_spacing(t, spacing);
    Ok(aligned.clamp(full.tick_lower as i64, full.tick_upper as i64) as i32)
}

// ---------------------------- Offsets ----------------------------------------

/// Position of a bound relative to the current price.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RangeOffset {
    Percent(f64),
    /// Upper bound sits at the full-range limit.
    Unbounded,
    /// No current price to compare against.
    Undefined,
}

impl fmt::Display for RangeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeOffset::Percent(p) => write!(f, "{:+.2}%", p),
            RangeOffset::Unbounded => write!(f, "+∞%"),
            RangeOffset::Undefined => write!(f, "-"),
        }
    }
}

pub fn offset_percent(aligned_price: f64, current_price: f64) -> RangeOffset {
    if !(current_price.is_finite() && current_price > 0.0) {
        return RangeOffset::Undefined;
    }
    RangeOffset::Percent((aligned_price / current_price - 1.0) * 100.0)
}

// ------------------------- Display orientation -------------------------------

/// Reciprocal of a bound, mapping 0 <-> +inf.
pub fn invert_bound(price: f64) -> f64 {
    if price == 0.0 {
        f64::INFINITY
    } else if price.is_infinite() {
        0.0
    } else {
        1.0 / price
    }
}

/// User bounds (quote-token terms) -> raw token1/token0 bounds, ordered low to high.
pub fn raw_bounds_from_display(lower: f64, upper: f64, token0_is_quote: bool) -> (f64, f64) {
    if token0_is_quote {
        (invert_bound(upper), invert_bound(lower))
    } else {
        (lower, upper)
    }
}

/// Aligned ticks -> prices in quote-token terms, ordered low to high.
pub fn display_bounds(range: TickRange, token0_is_quote: bool) -> (f64, f64) {
    let lo = price_from_tick(range.tick_lower);
    let hi = price_from_tick(range.tick_upper);
    if token0_is_quote { (1.0 / hi, 1.0 / lo) } else { (lo, hi) }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedRange {
    pub range: TickRange,
    /// Display-oriented aligned bounds.
    pub min_price: f64,
    pub max_price: f64,
    pub min_offset: RangeOffset,
    pub max_offset: RangeOffset,
}

/// Align raw bounds and report offsets against the raw current price.
pub fn align_range(lower: f64, upper: f64, spacing: i32, current: f64) -> Result<AlignedRange, RangeError> {
    align_display_range(lower, upper, spacing, current, false)
}

/// Align user bounds given in quote-token terms. `current_display` is in the same terms.
pub fn align_display_range(
    lower: f64,
    upper: f64,
    spacing: i32,
    current_display: f64,
    token0_is_quote: bool,
) -> Result<AlignedRange, RangeError> {
    if upper < lower {
        return Err(RangeError::InvalidRange { lower, upper });
    }
    let (raw_lower, raw_upper) = raw_bounds_from_display(lower, upper, token0_is_quote);
    let range = TickRange {
        tick_lower: align_lower_tick(raw_lower, spacing)?,
        tick_upper: align_upper_tick(raw_upper, spacing)?,
    };
    if range.tick_lower >= range.tick_upper {
        return Err(RangeError::InvalidRange { lower, upper });
    }
    describe_range(range, spacing, current_display, token0_is_quote)
}

/// Display prices and offsets for an already aligned range.
pub fn describe_range(
    range: TickRange,
    spacing: i32,
    current_display: f64,
    token0_is_quote: bool,
) -> Result<AlignedRange, RangeError> {
    let full = full_range(spacing)?;
    let (min_price, max_price) = display_bounds(range, token0_is_quote);

    // which tick ends up as the displayed max depends on orientation
    let (min_at_limit, max_at_limit) = if token0_is_quote {
        (range.tick_upper == full.tick_upper, range.tick_lower == full.tick_lower)
    } else {
        (range.tick_lower == full.tick_lower, range.tick_upper == full.tick_upper)
    };

    let min_offset = match offset_percent(min_price, current_display) {
        RangeOffset::Percent(_) if min_at_limit => RangeOffset::Percent(-100.0),
        other => other,
    };
    let max_offset = if max_at_limit {
        RangeOffset::Unbounded
    } else {
        offset_percent(max_price, current_display)
    };

    Ok(AlignedRange { range, min_price, max_price, min_offset, max_offset })
}

// ------------------------------ Presets --------------------------------------

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RangePreset {
    FullRange,
    /// Symmetric band as a fraction of the current price (0.15 = ±15%).
    Percent(f64),
}

impl RangePreset {
    pub const STANDARD: [RangePreset; 4] = [
        RangePreset::FullRange,
        RangePreset::Percent(0.15),
        RangePreset::Percent(0.075),
        RangePreset::Percent(0.02),
    ];
}

pub fn range_from_preset(raw_price: f64, preset: RangePreset, spacing: i32) -> Result<TickRange, RangeError> {
    match preset {
        RangePreset::FullRange => full_range(spacing),
        RangePreset::Percent(f) => {
            if !(f > 0.0 && f < 1.0) {
                return Err(RangeError::InvalidPrice(f));
            }
            let lower = raw_price * (1.0 - f);
            let upper = raw_price * (1.0 + f);
            let range = TickRange {
                tick_lower: align_lower_tick(lower, spacing)?,
                tick_upper: align_upper_tick(upper, spacing)?,
            };
            if range.tick_lower >= range.tick_upper {
                return Err(RangeError::InvalidRange { lower, upper });
            }
            Ok(range)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeeTier;

    #[test]
    fn test_full_range_spacing_200() {
        let full = full_range(200).unwrap();
        assert_eq!(full, TickRange { tick_lower: -887_200, tick_upper: 887_200 });
        assert_eq!(full_range(60).unwrap(), TickRange { tick_lower: -887_220, tick_upper: 887_220 });
        assert_eq!(full_range(1).unwrap(), TickRange { tick_lower: MIN_TICK, tick_upper: MAX_TICK });
    }

    #[test]
    fn test_zero_and_infinite_prices_map_to_full_range() {
        assert_eq!(align_lower_tick(0.0, 200), Ok(-887_200));
        assert_eq!(align_upper_tick(f64::INFINITY, 200), Ok(887_200));
    }

    #[test]
    fn test_directional_rounding() {
        // 1.0001^61 is between ticks 60 and 120
        let p = price_from_tick(61);
        assert_eq!(align_lower_tick(p, 60), Ok(60));
        assert_eq!(align_upper_tick(p, 60), Ok(120));

        let n = price_from_tick(-61);
        assert_eq!(align_lower_tick(n, 60), Ok(-120));
        assert_eq!(align_upper_tick(n, 60), Ok(-60));
    }

    #[test]
    fn test_aligned_tick_round_trip() {
        for spacing in [1, 10, 60, 200] {
            for k in [-4000, -17, -1, 0, 1, 3, 999] {
                let t = k * spacing;
                assert_eq!(align_lower_tick(price_from_tick(t), spacing), Ok(t));
                assert_eq!(align_upper_tick(price_from_tick(t), spacing), Ok(t));
            }
        }
    }

    #[test]
    fn test_round_trip_holds_at_large_ticks() {
        for tier in FeeTier::ALL {
            let spacing = tier.default_tick_spacing();
            let full = full_range(spacing).unwrap();
            let deep = (600_000 / spacing) * spacing;
            let far = (800_000 / spacing) * spacing;
            for t in [full.tick_lower, -far, -deep, deep, far, full.tick_upper] {
                let p = price_from_tick(t);
                assert_eq!(align_lower_tick(p, spacing), Ok(t), "lower, spacing {} tick {}", spacing, t);
                assert_eq!(align_upper_tick(p, spacing), Ok(t), "upper, spacing {} tick {}", spacing, t);
            }
        }
    }

    #[test]
    fn test_large_ticks_still_round_directionally() {
        // one tick past an aligned bound is far outside the snap tolerance
        let p = price_from_tick(600_001);
        assert_eq!(align_lower_tick(p, 200), Ok(600_000));
        assert_eq!(align_upper_tick(p, 200), Ok(600_200));
        let n = price_from_tick(-600_001);
        assert_eq!(align_lower_tick(n, 200), Ok(-600_200));
        assert_eq!(align_upper_tick(n, 200), Ok(-600_000));
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(align_lower_tick(-1.0, 60), Err(RangeError::InvalidPrice(-1.0)));
        assert!(matches!(align_upper_tick(f64::NAN, 60), Err(RangeError::InvalidPrice(_))));
        assert_eq!(align_lower_tick(1.0, 0), Err(RangeError::InvalidSpacing(0)));
    }

    #[test]
    fn test_extreme_prices_clamp() {
        assert_eq!(align_lower_tick(1e-300, 200), Ok(-887_200));
        assert_eq!(align_upper_tick(1e300, 200), Ok(887_200));
    }

    #[test]
    fn test_align_range_rejects_inverted_bounds() {
        assert_eq!(
            align_range(2.0, 1.0, 60, 1.5),
            Err(RangeError::InvalidRange { lower: 2.0, upper: 1.0 })
        );
        // same tick after alignment
        assert!(matches!(align_range(1.0, 1.0, 60, 1.0), Err(RangeError::InvalidRange { .. })));
    }

    #[test]
    fn test_full_range_offsets() {
        let aligned = align_range(0.0, f64::INFINITY, 200, 1.0).unwrap();
        assert_eq!(aligned.range, TickRange { tick_lower: -887_200, tick_upper: 887_200 });
        assert_eq!(aligned.min_offset, RangeOffset::Percent(-100.0));
        assert_eq!(aligned.max_offset, RangeOffset::Unbounded);
        assert_eq!(aligned.max_offset.to_string(), "+∞%");
    }

    #[test]
    fn test_bounded_offsets() {
        let aligned = align_range(0.9, 1.1, 10, 1.0).unwrap();
        match (aligned.min_offset, aligned.max_offset) {
            (RangeOffset::Percent(lo), RangeOffset::Percent(hi)) => {
                assert!(lo <= -10.0 && lo > -10.2, "lo {}", lo);
                assert!(hi >= 10.0 && hi < 10.2, "hi {}", hi);
            }
            other => panic!("unexpected offsets {:?}", other),
        }
        assert_eq!(offset_percent(1.0, 0.0), RangeOffset::Undefined);
    }

    #[test]
    fn test_display_orientation_inverts_and_swaps() {
        assert_eq!(raw_bounds_from_display(0.5, 2.0, true), (0.5, 2.0));
        assert_eq!(raw_bounds_from_display(0.25, 4.0, false), (0.25, 4.0));
        assert_eq!(raw_bounds_from_display(0.0, f64::INFINITY, true), (0.0, f64::INFINITY));
        assert_eq!(raw_bounds_from_display(0.2, 0.5, true), (2.0, 5.0));

        // display 0.2..0.5 of token0 per token1 == raw 2..5
        let aligned = align_display_range(0.2, 0.5, 1, 0.3, true).unwrap();
        let raw = align_range(2.0, 5.0, 1, 1.0 / 0.3).unwrap();
        assert_eq!(aligned.range, raw.range);
        assert!(aligned.min_price <= 0.2 && aligned.max_price >= 0.5);
    }

    #[test]
    fn test_display_full_range_inverted() {
        let aligned = align_display_range(0.0, f64::INFINITY, 60, 2.0, true).unwrap();
        assert_eq!(aligned.min_offset, RangeOffset::Percent(-100.0));
        assert_eq!(aligned.max_offset, RangeOffset::Unbounded);
    }

    #[test]
    fn test_presets() {
        let full = range_from_preset(1.0, RangePreset::FullRange, 60).unwrap();
        assert_eq!(full, full_range(60).unwrap());

        let band = range_from_preset(1.0, RangePreset::Percent(0.15), 60).unwrap();
        assert!(price_from_tick(band.tick_lower) <= 0.85);
        assert!(price_from_tick(band.tick_upper) >= 1.15);
        assert_eq!(band.tick_lower % 60, 0);
        assert_eq!(band.tick_upper % 60, 0);

        assert!(range_from_preset(1.0, RangePreset::Percent(1.5), 60).is_err());
    }
}
