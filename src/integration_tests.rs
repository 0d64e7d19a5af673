//! Cross-component scenarios: a full simulated cell driven end to end
//! through the scheduler, gate, coordinators, and workflow sequencer.

#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use crate::arm::ArmCoordinator;
use crate::cell::CellController;
use crate::config::CellConfig;
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerError};
use crate::sim::{FixedClassifier, ScriptedDetections, SimArm, SimGripper};
use crate::traits::{GripperTransport, MotionTransport};
use crate::types::{BinId, GripCommand, PoseTarget};

struct SimCell {
    cell: CellController<ScriptedDetections, FixedClassifier>,
    scheduler: Scheduler,
    arm: Arc<SimArm>,
    gripper: Arc<SimGripper>,
}

fn build_cell(detections: ScriptedDetections, classifier: FixedClassifier) -> SimCell {
    let config = CellConfig::default_cell();
    let (scheduler, worker) = Scheduler::new(config.scheduler.to_scheduler_config());
    worker.spawn();

    let arm = Arc::new(SimArm::new());
    let gripper = Arc::new(SimGripper::new());
    let coordinator = ArmCoordinator::new(
        scheduler.clone(),
        Arc::clone(&arm) as Arc<dyn MotionTransport>,
        Arc::clone(&gripper) as Arc<dyn GripperTransport>,
        config.gripper.dwell(),
    );

    let cell = CellController::new(config, scheduler.clone(), coordinator, detections, classifier);
    SimCell {
        cell,
        scheduler,
        arm,
        gripper,
    }
}

async fn settle(scheduler: &Scheduler) {
    let done = scheduler.barrier().unwrap();
    done.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_full_cell_places_three_objects() {
    let mut detections = ScriptedDetections::new();
    detections.push_drifting_object(430.0, 655.0, 2);
    detections.push_drifting_object(455.0, 645.0, 1);
    detections.push_drifting_object(480.0, 635.0, 0);

    let classifier =
        FixedClassifier::cycling(vec![BinId::new(0), BinId::new(2), BinId::new(5)]);
    let mut sim = build_cell(detections, classifier);

    sim.cell.startup().unwrap();
    settle(&sim.scheduler).await;

    let mut placed = 0;
    while placed < 3 {
        match sim.cell.process_frame().await.unwrap() {
            Some(_id) => {
                settle(&sim.scheduler).await;
                placed += 1;
            }
            None => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }

    // startup close, then open/close/open/close per object
    let mut expected = vec![GripCommand::Close];
    for _ in 0..3 {
        expected.extend([
            GripCommand::Open,
            GripCommand::Close,
            GripCommand::Open,
            GripCommand::Close,
        ]);
    }
    assert_eq!(sim.gripper.commands(), expected);

    // every chain ended parked at home with the gate open
    assert_eq!(sim.arm.pose(), CellConfig::default_cell().arm.home);
    assert!(!sim.cell.gate().is_busy());

    // each admitted object was approached at its centred coordinates
    let moves = sim.arm.moves();
    for (x, y) in [(430.0, 655.0), (455.0, 645.0), (480.0, 635.0)] {
        assert!(moves.contains(&PoseTarget::position(x, y, 330.0)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_nothing_admitted_before_startup_chain_completes() {
    let mut detections = ScriptedDetections::new();
    detections.push_drifting_object(430.0, 655.0, 1);
    let mut sim = build_cell(detections, FixedClassifier::always(BinId::new(0)));

    sim.cell.startup().unwrap();

    // the startup chain has not run yet: the gate is still busy, so the
    // object's first reading is consumed and dropped
    assert!(sim.cell.gate().is_busy());
    assert!(sim.cell.process_frame().await.unwrap().is_none());

    settle(&sim.scheduler).await;
    assert!(!sim.cell.gate().is_busy());

    // the next frame admits
    assert!(sim.cell.process_frame().await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_motion_stall_trips_configured_deadline() {
    let config = CellConfig::default_cell();
    let (scheduler, worker) = Scheduler::new(SchedulerConfig {
        wait_deadline: Some(Duration::from_secs(5)),
        ..config.scheduler.to_scheduler_config()
    });
    let handle = worker.spawn();

    // an arm that will not be ready again for a very long time
    let arm = Arc::new(SimArm::with_latency(Duration::from_secs(3600)));
    let gripper = Arc::new(SimGripper::new());
    let coordinator = ArmCoordinator::new(
        scheduler.clone(),
        Arc::clone(&arm) as Arc<dyn MotionTransport>,
        gripper as Arc<dyn GripperTransport>,
        config.gripper.dwell(),
    );

    coordinator
        .move_and_await_ready("move to object", PoseTarget::height(330.0))
        .unwrap();
    drop(coordinator);
    drop(scheduler);

    let err = handle.await.unwrap().unwrap_err();
    match err {
        SchedulerError::Stalled { label, waited } => {
            assert_eq!(label, "move to object");
            assert!(waited >= Duration::from_secs(5));
        }
        other => panic!("expected stall, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_workflow_actions_queue_within_default_capacity() {
    // one full admission (centering moves included) must fit the default
    // queue bound with room to spare
    let mut detections = ScriptedDetections::new();
    detections.push_drifting_object(430.0, 655.0, 3);
    let mut sim = build_cell(detections, FixedClassifier::always(BinId::new(1)));

    sim.cell.startup().unwrap();
    settle(&sim.scheduler).await;

    let id = sim.cell.process_frame().await.unwrap();
    assert!(id.is_some());
    settle(&sim.scheduler).await;
    assert!(!sim.cell.gate().is_busy());
}
