use std::fs;

use crate::common::harness::{SoftwareTree, grid_map, recording_engine};
use crate::common::mocks::device::{Event, RecordingDevice};
use gridsim_core::bus::{AddressMap, BusEngine, TransferSpec};
use gridsim_core::common::error::HarnessError;
use gridsim_core::config::{Config, Variant};
use gridsim_core::device::ScratchpadModel;
use gridsim_core::sim::transfer::{
    LogMode, Packing, ResultLog, bulk_read, bulk_write, gated, pack_bytes,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn scalable_engine(clusters: u32) -> (BusEngine<RecordingDevice>, AddressMap) {
    let map = AddressMap::new(&Config::for_variant(Variant::Scalable).device).with_clusters(clusters);
    let engine = BusEngine::new(RecordingDevice::new(ScratchpadModel::scalable(2, 2, clusters)));
    (engine, map)
}

#[test]
fn word_write_issues_one_transaction_per_word_then_flushes() {
    let mut engine = recording_engine();
    let plan = grid_map().plan(TransferSpec::new(50, 3)).unwrap();

    let writes = bulk_write(&mut engine, &plan, &[7, -1, 9], Packing::Word).unwrap();

    assert_eq!(writes, 3);
    assert_eq!(
        engine.device().events,
        vec![
            Event::Write {
                addr: 200,
                data: 7,
                cluster: 0
            },
            Event::Write {
                addr: 204,
                data: 0xFFFF_FFFF,
                cluster: 0
            },
            Event::Write {
                addr: 208,
                data: 9,
                cluster: 0
            },
            Event::Idle,
        ]
    );
}

#[test]
fn short_source_writes_only_what_it_has() {
    let mut engine = recording_engine();
    let plan = grid_map().plan(TransferSpec::new(0, 10)).unwrap();
    assert_eq!(bulk_write(&mut engine, &plan, &[1, 2], Packing::Word).unwrap(), 2);
    assert_eq!(engine.device().data_writes().len(), 2);
}

#[test]
fn byte_write_packs_four_lanes_per_word() {
    let mut engine = recording_engine();
    let values = [1, -1, 2, -128, 127];
    let plan = grid_map()
        .plan(TransferSpec::new(21, Packing::Bytes.device_words(5)))
        .unwrap();

    let writes = bulk_write(&mut engine, &plan, &values, Packing::Bytes).unwrap();

    assert_eq!(writes, 2);
    assert_eq!(
        engine.device().data_writes(),
        vec![(84, 0x80_02_FF_01), (88, 0x0000_007F)]
    );
}

#[test]
fn byte_out_of_range_aborts_before_any_write() {
    let mut engine = recording_engine();
    let plan = grid_map().plan(TransferSpec::new(0, 1)).unwrap();

    let err = bulk_write(&mut engine, &plan, &[1, 2, 300, 4], Packing::Bytes).unwrap_err();

    assert!(matches!(err, HarnessError::ByteRange { value: 300, index: 2 }));
    assert!(engine.device().events.is_empty());
}

#[test]
fn byte_read_sign_extends_every_lane() {
    let mut engine = recording_engine();
    let values = [1, -1, 2, -128, 127];
    let plan = grid_map().plan(TransferSpec::new(21, 2)).unwrap();
    let _ = bulk_write(&mut engine, &plan, &values, Packing::Bytes).unwrap();

    let read = bulk_read(&mut engine, &plan, Packing::Bytes);

    assert_eq!(read, vec![1, -1, 2, -128, 127, 0, 0, 0]);
}

#[test]
fn read_issues_one_period_per_word_without_trailing_flush() {
    let mut engine = recording_engine();
    let plan = grid_map().plan(TransferSpec::new(10, 3)).unwrap();

    let _ = bulk_read(&mut engine, &plan, Packing::Word);

    assert_eq!(engine.device().events.len(), 3);
    assert_eq!(engine.device().data_reads(), vec![40, 44, 48]);
}

#[test]
fn unwritten_words_read_as_zero() {
    let mut engine = recording_engine();
    let plan = grid_map().plan(TransferSpec::new(1000, 2)).unwrap();
    assert_eq!(bulk_read(&mut engine, &plan, Packing::Word), vec![0, 0]);
}

#[test]
fn local_write_lands_in_each_pe_window() {
    let mut engine = recording_engine();
    let map = grid_map();
    let boundary = map.scratchpad_boundary();
    let plan = map.plan(TransferSpec::new(boundary, 32)).unwrap();
    let values: Vec<i32> = (0..32).collect();

    let _ = bulk_write(&mut engine, &plan, &values, Packing::Word).unwrap();

    let model = &engine.device().inner;
    assert_eq!(model.peek(0, boundary), Some(0));
    assert_eq!(model.peek(0, boundary + 1), Some(1));
    assert_eq!(model.peek(0, boundary + 256), Some(2));
    assert_eq!(model.peek(0, boundary + 15 * 256 + 1), Some(31));
}

#[test]
fn gated_writes_reach_only_the_selected_cluster() {
    let (mut engine, map) = scalable_engine(2);
    let plan = map.plan(TransferSpec::new(5, 2).in_cluster(1)).unwrap();

    let _ = gated(&mut engine, 0b10, |engine| {
        bulk_write(engine, &plan, &[11, 12], Packing::Word).unwrap()
    });

    let device = engine.device();
    assert_eq!(device.inner.peek(1, 5), Some(11));
    assert_eq!(device.inner.peek(0, 5), None);
    assert!(device.events.iter().all(|e| match e {
        Event::Write { cluster, .. } => *cluster == 0b10,
        _ => true,
    }));
    // two writes, the flush, then the gate's own two periods
    assert_eq!(device.events.len(), 5);
}

#[test]
fn gate_is_cleared_after_the_body() {
    let (mut engine, map) = scalable_engine(2);
    let plan = map.plan(TransferSpec::new(0, 1).in_cluster(0)).unwrap();
    gated(&mut engine, 0b01, |engine| {
        let _ = bulk_write(engine, &plan, &[3], Packing::Word).unwrap();
    });

    // Without a gate the clustered model ignores the access.
    let ungated = map.plan(TransferSpec::new(0, 1)).unwrap();
    let _ = bulk_write(&mut engine, &ungated, &[99], Packing::Word).unwrap();
    assert_eq!(engine.device().inner.peek(0, 0), Some(3));
}

#[test]
fn gated_plan_drops_its_gate_when_the_transfer_ends() {
    let (mut engine, map) = scalable_engine(2);
    let in_cluster = map.plan(TransferSpec::new(5, 1).in_cluster(1)).unwrap();
    let ungated = map.plan(TransferSpec::new(6, 1)).unwrap();

    let _ = bulk_write(&mut engine, &in_cluster, &[11], Packing::Word).unwrap();
    let _ = bulk_write(&mut engine, &ungated, &[99], Packing::Word).unwrap();
    let _ = bulk_read(&mut engine, &in_cluster, Packing::Word);
    let _ = bulk_read(&mut engine, &ungated, Packing::Word);

    let device = engine.device();
    assert_eq!(device.inner.peek(1, 5), Some(11));
    assert_eq!(device.inner.peek(1, 6), None);
    let masks: Vec<u8> = device
        .events
        .iter()
        .filter_map(|e| match *e {
            Event::Write { cluster, .. } | Event::Read { cluster, .. } => Some(cluster),
            Event::Imem { .. } | Event::Idle => None,
        })
        .collect();
    assert_eq!(masks, vec![0b10, 0, 0b10, 0]);
}

#[test]
fn pack_bytes_validates_everything_first() {
    assert!(pack_bytes(&[-128, 127]).is_ok());
    assert!(matches!(
        pack_bytes(&[-129]),
        Err(HarnessError::ByteRange { value: -129, index: 0 })
    ));
}

#[test]
fn result_log_truncates_then_appends() {
    let tree = SoftwareTree::new();
    let log = ResultLog::new(tree.root().join("mem_dump_bytes.txt"));
    fs::write(log.path(), "stale\n").unwrap();

    log.write(&[1, -2], LogMode::Truncate).unwrap();
    log.write(&[3], LogMode::Append).unwrap();

    assert_eq!(fs::read_to_string(log.path()).unwrap(), "1\n-2\n3\n");
}

#[test]
fn result_log_reports_unwritable_path() {
    let tree = SoftwareTree::new();
    let log = ResultLog::new(tree.root().join("missing_dir").join("log.txt"));
    assert!(log.write(&[1], LogMode::Truncate).unwrap_err().is_resource());
}

proptest! {
    #[test]
    fn words_read_back_what_was_written(
        base in 0u32..100_000,
        values in prop::collection::vec(any::<i32>(), 1..64),
    ) {
        let mut engine = BusEngine::new(ScratchpadModel::grid(2, 2));
        let plan = grid_map().plan(TransferSpec::new(base, values.len() as u32)).unwrap();
        let _ = bulk_write(&mut engine, &plan, &values, Packing::Word).unwrap();
        prop_assert_eq!(bulk_read(&mut engine, &plan, Packing::Word), values);
    }
}
