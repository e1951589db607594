use std::path::PathBuf;

use crate::common::harness::SoftwareTree;
use gridsim_core::bus::Placement;
use gridsim_core::common::error::ConfigError;
use gridsim_core::config::Variant;
use gridsim_core::sim::transfer::Packing;
use gridsim_core::sim::workload::{
    Catalog, Partition, Readback, Reference, Segment, builtin, folder_name, phase_two_folder,
    program_image,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("gemm", Variant::Grid, 2, Some(10_001))]
#[case("gemm", Variant::Scalable, 2, Some(10_001))]
#[case("gemmadd64x64", Variant::Grid, 2, Some(10_001))]
#[case("gemm32x32", Variant::Grid, 2, Some(22_500))]
#[case("gemm32x32", Variant::Scalable, 2, Some(10_001))]
#[case("others", Variant::Grid, 2, Some(22_500))]
#[case("others", Variant::Scalable, 0, None)]
#[case("gemm128x128", Variant::Grid, 2, Some(37_501))]
#[case("gemm128x128", Variant::Scalable, 2, Some(40_001))]
#[case("gemm_dup", Variant::Grid, 4, Some(10_001))]
#[case("2mm", Variant::Grid, 3, Some(20_000))]
#[case("conv", Variant::Grid, 2, Some(11_000))]
#[case("conv", Variant::Scalable, 2, Some(1750))]
#[case("relu", Variant::Grid, 1, Some(21))]
#[case("instTest", Variant::Grid, 0, Some(101))]
#[case("resnet_conv1", Variant::Grid, 2, Some(23_500))]
#[case("madd_8x8", Variant::Scalable, 2, Some(8192))]
#[case("gemm_local", Variant::Scalable, 2, None)]
fn builtin_catalog_shapes(
    #[case] token: &str,
    #[case] variant: Variant,
    #[case] loads: usize,
    #[case] first_readback: Option<u32>,
) {
    let w = builtin(token, variant).unwrap();
    assert_eq!(w.name, token);
    assert_eq!(w.loads.len(), loads);
    assert_eq!(
        w.readback.as_ref().map(|r| r.segments[0].base_word),
        first_readback
    );
}

#[rstest]
#[case("madd_8x8")]
#[case("gemm_local")]
#[case("gemm64x64")]
#[case("")]
fn grid_rejects_unknown_and_scalable_only_tokens(#[case] token: &str) {
    let err = Catalog::builtin().lookup(token, Variant::Grid).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownWorkload { variant: Variant::Grid, .. }));
}

#[test]
fn scalable_conv_moves_bytes() {
    let w = builtin("conv", Variant::Scalable).unwrap();
    assert!(w.loads.iter().all(|l| l.packing == Packing::Bytes));
    let rb = w.readback.unwrap();
    assert_eq!(rb.packing, Packing::Bytes);
    assert_eq!(rb.segments[0].length, 8192);
}

#[test]
fn two_matrix_workload_has_a_second_phase() {
    let w = builtin("2mm", Variant::Grid).unwrap();
    assert!(w.phase_two);
    assert_eq!(
        w.reference,
        Reference::File(PathBuf::from("kernel/2mm/ncubed/output_raw.data"))
    );
}

#[test]
fn inst_test_carries_inline_golden() {
    let w = builtin("instTest", Variant::Grid).unwrap();
    match w.reference {
        Reference::Inline(values) => {
            assert_eq!(values.len(), 25);
            assert_eq!(values[0], -100);
            assert_eq!(values[10], 16_777_215);
        }
        other => panic!("unexpected reference {other:?}"),
    }
}

#[test]
fn gemm_local_folds_across_sixteen_pes_in_four_clusters() {
    let w = builtin("gemm_local", Variant::Scalable).unwrap();
    let a = &w.loads[0];
    assert_eq!(a.placement, Placement::PeLocal);
    assert_eq!(a.pe_count, Some(16));
    assert!(a.applies_to(3));
    assert!(!a.applies_to(4));
    assert_eq!(a.path_for(2), PathBuf::from("kernel/gemm/ncubed/input_A3.data"));
    assert_eq!(a.path_for(6), a.path.as_path());
}

#[test]
fn madd_offsets_each_cluster_by_its_stride() {
    let w = builtin("madd_8x8", Variant::Scalable).unwrap();
    assert_eq!(w.loads[0].start_line_for(0), 0);
    assert_eq!(w.loads[0].start_line_for(3), 1536);

    let rb = w.readback.unwrap();
    assert_eq!(rb.partition, Partition::Shared);
    let segs = rb.cluster_segments(4).unwrap();
    assert!(segs.iter().all(|(_, s)| s.base_word == 8192 && s.length == 1024));
}

#[test]
fn split_partition_covers_the_range_once() {
    let rb = builtin("gemm", Variant::Scalable).unwrap().readback.unwrap();
    let segs = rb.cluster_segments(4).unwrap();
    let bases: Vec<(u32, u32)> = segs.iter().map(|(c, s)| (*c, s.base_word)).collect();
    assert_eq!(bases, vec![(0, 10_001), (1, 11_025), (2, 12_049), (3, 13_073)]);
}

#[rstest]
#[case(Partition::Split)]
#[case(Partition::Shared)]
fn uneven_cluster_split_is_rejected(#[case] partition: Partition) {
    let rb = Readback {
        segments: vec![
            Segment {
                base_word: 0,
                length: 9,
            },
            Segment {
                base_word: 100,
                length: 10,
            },
        ],
        packing: Packing::Word,
        partition,
    };

    let err = rb.cluster_segments(3).unwrap_err();

    assert!(matches!(
        err,
        ConfigError::UnevenClusterSplit {
            base: 100,
            length: 10,
            clusters: 3
        }
    ));
    assert_eq!(rb.cluster_segments(1).unwrap().len(), 2);
}

#[test]
fn custom_workload_file_overrides_builtins() {
    let tree = SoftwareTree::new();
    let path = tree.write(
        "workloads.json",
        r#"[
            {
                "name": "gemm",
                "loads": [{ "path": "a.data", "base_word": 8, "length": 4, "packing": "bytes" }],
                "readback": { "segments": [{ "base_word": 100, "length": 2 }] },
                "reference": { "inline": [1, 2] }
            },
            { "name": "probe", "program": "p.mem" }
        ]"#,
    );

    let catalog = Catalog::builtin().with_json_file(&path).unwrap();

    let gemm = catalog.lookup("gemm", Variant::Grid).unwrap();
    assert_eq!(gemm.loads[0].packing, Packing::Bytes);
    assert_eq!(gemm.loads[0].placement, Placement::Auto);
    assert_eq!(gemm.reference, Reference::Inline(vec![1, 2]));

    let probe = catalog.lookup("probe", Variant::Scalable).unwrap();
    assert_eq!(probe.program_path("run_1"), PathBuf::from("p.mem"));
    assert!(probe.readback.is_none());

    assert!(catalog.lookup("relu", Variant::Grid).is_ok());
}

#[test]
fn single_workload_object_is_accepted() {
    let tree = SoftwareTree::new();
    let path = tree.write("one.json", r#"{ "name": "solo", "phase_two": true }"#);
    let catalog = Catalog::builtin().with_json_file(&path).unwrap();
    assert!(catalog.lookup("solo", Variant::Grid).unwrap().phase_two);
}

#[test]
fn malformed_workload_file_is_a_file_error() {
    let tree = SoftwareTree::new();
    let path = tree.write("bad.json", "{ not json");
    let err = Catalog::builtin().with_json_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::File { .. }));
}

#[rstest]
#[case("../compiled/gemm_4x4_1.bin", "gemm_4x4_1")]
#[case("relu_run", "relu_run")]
#[case("dir/.hidden", ".hidden")]
#[case("a/b/c.d.e", "c.d")]
fn folder_name_takes_last_component_without_extension(#[case] arg: &str, #[case] expected: &str) {
    assert_eq!(folder_name(arg), expected);
}

#[rstest]
#[case("2mm_4x4_1", "2mm_4x4_2")]
#[case("2mm_4x4_13", "2mm_4x4_2")]
#[case("2mm_plain", "2mm_plain_2")]
#[case("solo", "solo_2")]
fn phase_two_folder_swaps_the_numeric_suffix(#[case] folder: &str, #[case] expected: &str) {
    assert_eq!(phase_two_folder(folder), expected);
}

#[test]
fn default_program_lives_under_output() {
    assert_eq!(
        program_image("gemm_1"),
        PathBuf::from("output/gemm_1/combined_memory.mem")
    );
    let w = builtin("relu", Variant::Grid).unwrap();
    assert_eq!(w.program_path("gemm_1"), program_image("gemm_1"));
}
