use std::fs;

use crate::common::harness::SoftwareTree;
use gridsim_core::device::{Device, PeCounters, ScratchpadModel};
use gridsim_core::stats::{ExecutionTrace, PeSummary, PhaseCounters};
use pretty_assertions::assert_eq;

fn period(model: &mut ScratchpadModel) {
    model.set_clock(true);
    model.eval();
    model.set_clock(false);
    model.eval();
}

#[test]
fn trace_files_have_one_line_per_sample() {
    let tree = SoftwareTree::new();
    let mut trace = ExecutionTrace::with_capacity(3);
    trace.push(2, 0);
    trace.push(0, 0);
    trace.push(7, 0xFFFF);

    let conflicts = tree.root().join("t_run_rr.txt");
    let finishes = tree.root().join("f_run_rr.txt");
    trace.write_conflicts(&conflicts).unwrap();
    trace.write_finishes(&finishes).unwrap();

    assert_eq!(
        fs::read_to_string(conflicts).unwrap(),
        "Cycle 0: 2\nCycle 1: 0\nCycle 2: 7\n"
    );
    assert_eq!(
        fs::read_to_string(finishes).unwrap(),
        "Cycle 0: 0\nCycle 1: 0\nCycle 2: 65535\n"
    );
}

#[test]
fn empty_trace_writes_empty_files() {
    let tree = SoftwareTree::new();
    let path = tree.root().join("t.txt");
    ExecutionTrace::default().write_conflicts(&path).unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "");
}

#[test]
fn trace_write_into_missing_directory_is_an_io_error() {
    let tree = SoftwareTree::new();
    let err = ExecutionTrace::default()
        .write_finishes(&tree.root().join("rpt_fc").join("f.txt"))
        .unwrap_err();
    assert!(err.is_resource());
}

#[test]
fn sample_reads_both_outputs_of_the_device() {
    let mut model = ScratchpadModel::grid(1, 2).with_exec_latency(2);
    model.set_exec_enable(true);
    let mut trace = ExecutionTrace::default();

    period(&mut model);
    trace.sample(&model);
    period(&mut model);
    trace.sample(&model);

    assert_eq!(trace.conflicts(), &[0, 1]);
    assert_eq!(trace.finishes(), &[0, 0b11]);
}

#[test]
fn pe_summary_collects_every_pe_and_the_maximum() {
    let summary = PeSummary {
        counters: vec![
            PeCounters {
                conflicts: 4,
                instructions: 10,
                traps: 0,
            },
            PeCounters {
                conflicts: 9,
                instructions: 3,
                traps: 1,
            },
        ],
    };
    assert_eq!(summary.max_conflicts(), 9);

    let model = ScratchpadModel::grid(2, 2);
    assert_eq!(PeSummary::collect(&model, 4).counters.len(), 4);
}

#[test]
fn phase_counters_reset_to_zero() {
    let mut counters = PhaseCounters {
        load_instruction: 1,
        load_data: 2,
        read_data: 3,
        preload: 4,
        execution: 5,
    };
    counters.reset();
    assert_eq!(counters, PhaseCounters::default());
}
