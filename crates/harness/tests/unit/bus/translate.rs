use std::collections::HashSet;

use crate::common::harness::grid_map;
use gridsim_core::bus::{AddressMap, Placement, Region, TransferSpec};
use gridsim_core::common::error::ConfigError;
use gridsim_core::config::{Config, Variant};
use proptest::prelude::*;
use rstest::rstest;

const BOUNDARY: u32 = 131_072;
const WINDOW: u32 = 256;

fn scalable_map(clusters: u32) -> AddressMap {
    AddressMap::new(&Config::for_variant(Variant::Scalable).device).with_clusters(clusters)
}

#[rstest]
#[case(Region::Scratchpad, 0, 0, 0)]
#[case(Region::Scratchpad, 50, 3, 212)]
#[case(Region::Cluster { cluster: 3 }, 10_001, 0, 40_004)]
#[case(Region::PeLocal { pe: 0 }, BOUNDARY, 5, (BOUNDARY + 5) * 4)]
#[case(Region::PeLocal { pe: 2 }, BOUNDARY, 1, (BOUNDARY + 1 + 2 * WINDOW) * 4)]
fn translate_follows_region_arithmetic(
    #[case] region: Region,
    #[case] base: u32,
    #[case] index: u32,
    #[case] expected: u32,
) {
    assert_eq!(grid_map().translate(region, base, index).val(), expected);
}

#[test]
fn scratchpad_plan_is_contiguous() {
    let plan = grid_map().plan(TransferSpec::new(50, 4)).unwrap();
    let addrs: Vec<u32> = plan.addresses().map(|a| a.val()).collect();
    assert_eq!(addrs, vec![200, 204, 208, 212]);
    assert_eq!(plan.region(3), Region::Scratchpad);
    assert_eq!(plan.cluster_gate(), None);
}

#[test]
fn plan_ending_exactly_at_boundary_is_accepted() {
    let plan = grid_map().plan(TransferSpec::new(BOUNDARY - 4, 4)).unwrap();
    assert_eq!(plan.len(), 4);
}

#[test]
fn plan_crossing_boundary_overflows() {
    let err = grid_map()
        .plan(TransferSpec::new(BOUNDARY - 4, 5).placed(Placement::Scratchpad))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ScratchpadOverflow {
            base: 131_068,
            length: 5,
            capacity: BOUNDARY
        }
    ));
}

#[test]
fn auto_placement_goes_local_at_the_boundary() {
    let plan = grid_map().plan(TransferSpec::new(BOUNDARY, 32)).unwrap();
    assert_eq!(plan.region(0), Region::PeLocal { pe: 0 });
    assert_eq!(plan.region(31), Region::PeLocal { pe: 15 });
}

#[test]
fn local_fold_splits_evenly_across_pes() {
    // 32 words over 16 PEs: two words per PE.
    let plan = grid_map().plan(TransferSpec::new(BOUNDARY, 32)).unwrap();
    assert_eq!(plan.address(0).val(), BOUNDARY * 4);
    assert_eq!(plan.address(1).val(), (BOUNDARY + 1) * 4);
    assert_eq!(plan.address(2).val(), (BOUNDARY + WINDOW) * 4);
    assert_eq!(plan.address(31).val(), (BOUNDARY + 1 + 15 * WINDOW) * 4);
}

#[test]
fn fold_count_override_narrows_the_split() {
    let plan = scalable_map(4)
        .plan(TransferSpec::new(BOUNDARY, 1024).folded_across(16))
        .unwrap();
    assert_eq!(plan.region(63), Region::PeLocal { pe: 0 });
    assert_eq!(plan.region(64), Region::PeLocal { pe: 1 });
    assert_eq!(plan.address(64).val(), (BOUNDARY + WINDOW) * 4);
}

#[test]
fn local_placement_below_boundary_is_rejected() {
    let err = grid_map()
        .plan(TransferSpec::new(100, 16).placed(Placement::PeLocal))
        .unwrap_err();
    assert!(matches!(err, ConfigError::LocalBelowBoundary { base: 100, .. }));
}

#[rstest]
#[case(17)]
#[case(8)]
fn uneven_local_split_is_rejected(#[case] length: u32) {
    let err = grid_map().plan(TransferSpec::new(BOUNDARY, length)).unwrap_err();
    assert!(matches!(err, ConfigError::UnevenPeSplit { pe_count: 16, .. }));
}

#[test]
fn per_pe_share_past_window_is_rejected() {
    let err = grid_map()
        .plan(TransferSpec::new(BOUNDARY + 200, 16 * 64))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::PeWindowOverflow {
            offset: 200,
            per_pe: 64,
            window: WINDOW
        }
    ));
}

#[rstest]
#[case(0)]
#[case(17)]
fn fold_count_outside_device_is_rejected(#[case] pes: u32) {
    let err = grid_map()
        .plan(TransferSpec::new(BOUNDARY, 64).folded_across(pes))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Geometry(_)));
}

#[test]
fn cluster_gate_is_one_hot() {
    let plan = scalable_map(4)
        .plan(TransferSpec::new(10_001, 8).in_cluster(2))
        .unwrap();
    assert_eq!(plan.cluster_gate(), Some(0b100));
    assert_eq!(plan.region(0), Region::Cluster { cluster: 2 });
    assert_eq!(plan.address(0).val(), 40_004);
}

#[test]
fn cluster_beyond_device_is_rejected() {
    let err = scalable_map(2)
        .plan(TransferSpec::new(0, 1).in_cluster(2))
        .unwrap_err();
    assert!(matches!(err, ConfigError::ClusterOutOfRange { cluster: 2, count: 2 }));
}

#[test]
fn empty_plan_has_no_addresses() {
    let plan = grid_map().plan(TransferSpec::new(0, 0)).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.addresses().count(), 0);
}

proptest! {
    #[test]
    fn scratchpad_addresses_are_distinct(base in 0u32..BOUNDARY - 512, len in 1u32..512) {
        let plan = grid_map().plan(TransferSpec::new(base, len)).unwrap();
        let addrs: HashSet<u32> = plan.addresses().map(|a| a.val()).collect();
        prop_assert_eq!(addrs.len(), len as usize);
        prop_assert!(addrs.iter().all(|a| a % 4 == 0 && *a < BOUNDARY * 4));
    }

    #[test]
    fn local_addresses_are_distinct_and_stay_in_their_window(
        per_pe in 1u32..=WINDOW,
        offset in 0u32..WINDOW,
    ) {
        prop_assume!(offset + per_pe <= WINDOW);
        let plan = grid_map()
            .plan(TransferSpec::new(BOUNDARY + offset, per_pe * 16))
            .unwrap();
        let mut seen = HashSet::new();
        for i in 0..plan.len() {
            let word = plan.address(i).val() / 4;
            let Region::PeLocal { pe } = plan.region(i) else {
                panic!("expected PE-local region");
            };
            let window_start = BOUNDARY + pe * WINDOW;
            prop_assert!(word >= window_start && word < window_start + WINDOW);
            prop_assert!(seen.insert(word));
        }
    }
}
