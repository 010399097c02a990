use clmm_quote_engine::math::fixed_point::price_from_tick;
use clmm_quote_engine::math::tick_align::{
    align_display_range, align_lower_tick, align_upper_tick, full_range, range_from_preset, RangeOffset, RangePreset,
};
use clmm_quote_engine::math::tick_math::{get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, MAX_TICK, MIN_TICK};
use clmm_quote_engine::models::FeeTier;

const PRICES: [f64; 9] = [1e-30, 1e-9, 0.0003, 0.5, 1.0, 1.7, 3000.0, 1e12, 1e35];

#[test]
fn test_aligned_ticks_sit_on_grid_within_full_range() {
    for tier in FeeTier::ALL {
        let spacing = tier.default_tick_spacing();
        let full = full_range(spacing).unwrap();
        assert!(full.tick_lower >= MIN_TICK && full.tick_upper <= MAX_TICK);
        assert_eq!(full.tick_lower % spacing, 0);
        assert_eq!(full.tick_upper % spacing, 0);

        for price in PRICES {
            let lo = align_lower_tick(price, spacing).unwrap();
            let hi = align_upper_tick(price, spacing).unwrap();
            assert_eq!(lo % spacing, 0, "lower {} spacing {}", lo, spacing);
            assert_eq!(hi % spacing, 0, "upper {} spacing {}", hi, spacing);
            assert!(lo >= full.tick_lower && hi <= full.tick_upper);
            assert!(lo <= hi, "price {} spacing {}", price, spacing);
        }
    }
}

#[test]
fn test_aligned_tick_round_trips_through_price() {
    for spacing in [1i32, 10, 60, 200] {
        for tick in [-887_200i32, -800_000, -120_000, -600, 0, 600, 46_000, 600_000, 887_200] {
            let aligned = tick - tick.rem_euclid(spacing);
            let price = price_from_tick(aligned);
            assert_eq!(align_lower_tick(price, spacing).unwrap(), aligned, "spacing {}", spacing);
            assert_eq!(align_upper_tick(price, spacing).unwrap(), aligned, "spacing {}", spacing);
        }
    }
}

#[test]
fn test_sqrt_ratio_and_tick_invert() {
    for tick in [MIN_TICK, -500_000, -1, 0, 1, 300_000, MAX_TICK - 1] {
        let sqrt = get_sqrt_ratio_at_tick(tick).unwrap();
        assert_eq!(get_tick_at_sqrt_ratio(&sqrt), tick);
    }
    assert!(get_sqrt_ratio_at_tick(MAX_TICK + 1).is_none());
}

#[test]
fn test_full_range_spacing_200_reports_unbounded_upper() {
    let aligned = align_display_range(0.0, f64::INFINITY, 200, 1.0, false).unwrap();
    assert_eq!(aligned.range.tick_lower, -887_200);
    assert_eq!(aligned.range.tick_upper, 887_200);
    assert_eq!(aligned.max_offset, RangeOffset::Unbounded);
    assert_eq!(aligned.max_offset.to_string(), "+∞%");
    assert_eq!(aligned.min_offset, RangeOffset::Percent(-100.0));
}

#[test]
fn test_percent_presets_bracket_current_price() {
    let current = 1850.0;
    for preset in RangePreset::STANDARD {
        let range = range_from_preset(current, preset, 60).unwrap();
        assert!(price_from_tick(range.tick_lower) <= current);
        assert!(price_from_tick(range.tick_upper) >= current);
        if let RangePreset::Percent(f) = preset {
            assert!(price_from_tick(range.tick_lower) <= current * (1.0 - f) * (1.0 + 1e-9));
            assert!(price_from_tick(range.tick_upper) >= current * (1.0 + f) * (1.0 - 1e-9));
        }
    }
}
