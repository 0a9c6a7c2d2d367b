//! Property tests for fixed-point demurrage

use freicoin_consensus::*;
use freicoin_consensus::demurrage::*;
use proptest::prelude::*;

proptest! {
    /// Invariant: zero distance is the identity in both directions
    ///
    /// ∀ v ∈ [-M_max, M_max]: Forward(v, 0) = v ∧ Reverse(v, 0) = v
    #[test]
    fn prop_zero_distance_identity(v in -MAX_MONEY..=MAX_MONEY) {
        prop_assert_eq!(time_adjust_value_forward(v, 0), v);
        prop_assert_eq!(time_adjust_value_reverse(v, 0), v);
    }

    /// Invariant: decay is non-increasing in distance and never negative
    ///
    /// ∀ v ≥ 0, d1 < d2: Forward(v, d1) ≥ Forward(v, d2) ≥ 0
    #[test]
    fn prop_forward_monotonic(
        v in 0..=MAX_MONEY,
        d1 in 0u32..2_000_000,
        delta in 1u32..100_000,
    ) {
        let d2 = d1 + delta;
        let a = time_adjust_value_forward(v, d1);
        let b = time_adjust_value_forward(v, d2);
        prop_assert!(a >= b, "Forward({}, {}) = {} < Forward({}, {}) = {}", v, d1, a, v, d2, b);
        prop_assert!(b >= 0);
        prop_assert!(a <= v);
    }

    /// Invariant: both transforms are odd functions
    #[test]
    fn prop_odd(v in 0..=MAX_MONEY, d in any::<u32>()) {
        prop_assert_eq!(time_adjust_value_forward(-v, d), -time_adjust_value_forward(v, d));
        prop_assert_eq!(time_adjust_value_reverse(-v, d), -time_adjust_value_reverse(v, d));
    }

    /// Invariant: results stay within [-M_max, M_max] for any input
    #[test]
    fn prop_outputs_in_range(v in any::<i64>(), d in any::<u32>()) {
        let f = time_adjust_value_forward(v, d);
        let r = time_adjust_value_reverse(v, d);
        prop_assert!((-MAX_MONEY..=MAX_MONEY).contains(&f));
        prop_assert!((-MAX_MONEY..=MAX_MONEY).contains(&r));
    }

    /// Invariant: a round trip never creates value and loses at most
    /// Reverse(1, d) + 1 kria
    #[test]
    fn prop_round_trip_bound(v in 0..=MAX_MONEY, d in 0u32..=1_000_000) {
        let r = time_adjust_value_reverse(time_adjust_value_forward(v, d), d);
        prop_assert!(r <= v);
        prop_assert!(v - r <= time_adjust_value_reverse(1, d) + 1);
        prop_assert!(v - r <= 3);
    }

    /// Invariant: scrip conversion below the epoch round-trips within the
    /// same bound
    #[test]
    fn prop_scrip_round_trip(v in 0..=MAX_MONEY, back in 0u32..=1_000_000) {
        let params = ConsensusParams::main();
        let height = SCRIP_EPOCH as u32 - back;
        let scrip = freicoin_to_scrip(&params, v, height);
        let r = scrip_to_freicoin(&params, scrip, height);
        prop_assert!(r <= v);
        prop_assert!(v - r <= time_adjust_value_reverse(1, back) + 1);
    }

    /// Invariant: the regtest switch makes every adjustment the identity
    #[test]
    fn prop_disable_time_adjust(v in any::<i64>(), depth in any::<i64>()) {
        let params = ConsensusParams::regtest();
        prop_assert_eq!(get_time_adjusted_value(&params, v, depth), v);
    }
}

#[test]
fn test_hundred_frc_zero_distance() {
    assert_eq!(time_adjust_value_forward(100_000_000, 0), 100_000_000);
}

#[test]
fn test_factor_monotonic_over_long_range() {
    let mut previous = demurrage_factor(0);
    for d in (1..5_000_000u32).step_by(997) {
        let factor = demurrage_factor(d);
        assert!(factor <= previous, "factor increased at distance {}", d);
        previous = factor;
    }
}

#[test]
fn test_negative_depth_reverses() {
    let params = ConsensusParams::main();
    let decayed = get_time_adjusted_value(&params, 50 * COIN, 1000);
    let restored = get_time_adjusted_value(&params, decayed, -1000);
    assert!(restored <= 50 * COIN);
    assert!(50 * COIN - restored <= 2);
}
