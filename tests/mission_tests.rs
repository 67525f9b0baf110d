//! End-to-end missions against the simulated vehicle

use std::io::Write;

use seed_sweep::mission::WaypointReport;
use seed_sweep::vehicle::{Fault, Operation, VehicleCommand};
use seed_sweep::*;
use tempfile::NamedTempFile;

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[tokio::test(start_paused = true)]
async fn test_mission_from_config_file_writes_flight_log() {
    let file = config_file(
        r#"{
            "step_size_m": 5.0,
            "sim_home": { "latitude_deg": 0.0, "longitude_deg": 0.0 },
            "sim_home_altitude_m": 20.0
        }"#,
    );
    let config = MissionConfig::load(file.path()).unwrap();
    assert_eq!(config.step_size_m, 5.0);

    let area = MissionArea::new(2, 3).unwrap();
    let mut mission = MissionController::new(SimulatedVehicle::from_config(&config), area, config);
    let report = mission.run().await.unwrap();

    assert_eq!(report.outcome, MissionOutcome::Completed);
    assert_eq!(report.coverage(), 1.0);

    let log = NamedTempFile::new().unwrap();
    report.save_csv(log.path()).unwrap();

    let text = std::fs::read_to_string(log.path()).unwrap();
    assert!(text.starts_with("# Statistics"));
    assert!(text.contains("# Outcome: full coverage completed"));
    assert!(text.contains("# Waypoints visited: 6/6"));

    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_path(log.path())
        .unwrap();
    let rows: Vec<WaypointReport> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();

    assert_eq!(rows.len(), 6);
    assert_eq!(rows, report.waypoints);
    assert_eq!((rows[3].row, rows[3].column), (1, 2));
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_follow_the_state_machine() {
    let config = MissionConfig {
        sim_home: Coordinate::new(0.0, 0.0),
        ..MissionConfig::default()
    };
    let area = MissionArea::new(2, 2).unwrap();
    let mut mission = MissionController::new(SimulatedVehicle::from_config(&config), area, config);
    let mut snapshots = mission.subscribe();

    let watcher = tokio::spawn(async move {
        let mut seen = vec![snapshots.borrow_and_update().state];
        while snapshots.changed().await.is_ok() {
            let state = snapshots.borrow_and_update().state;
            if seen.last() != Some(&state) {
                seen.push(state);
            }
        }
        seen
    });

    mission.run().await.unwrap();
    drop(mission);

    // Consecutive transitions without a suspension point in between may
    // coalesce; the settle and dwell pauses are always observable.
    let seen = watcher.await.unwrap();
    assert_eq!(seen.first(), Some(&MissionState::Idle));
    assert_eq!(seen.last(), Some(&MissionState::Complete));
    assert!(seen.contains(&MissionState::TakingOff));
    assert!(seen.contains(&MissionState::Scanning));

    let order: Vec<usize> = seen.iter().map(|s| *s as usize).collect();
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", seen);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_arm_fails_before_flight() {
    let config = MissionConfig::default();
    let vehicle = SimulatedVehicle::from_config(&config).inject_always(Operation::Arm, Fault::Reject);
    let area = MissionArea::new(3, 3).unwrap();
    let mut mission = MissionController::new(vehicle, area, config);
    let mut snapshots = mission.subscribe();

    let err = mission.run().await.unwrap_err();
    assert!(matches!(err, Error::CommandRejected { command: "arm", .. }));
    assert_eq!(mission.state(), MissionState::Failed);

    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.state, MissionState::Failed);
    assert!(snapshot.failure.is_some());

    // One retry, then give up without taking off
    assert_eq!(mission.vehicle().call_count(Operation::Arm), 2);
    assert!(!mission.vehicle().commands().contains(&VehicleCommand::Takeoff));
    assert!(!mission.vehicle().commands().contains(&VehicleCommand::ReturnToLaunch));
}

#[tokio::test(start_paused = true)]
async fn test_transient_goto_rejection_is_retried() {
    let config = MissionConfig {
        sim_home: Coordinate::new(0.0, 0.0),
        ..MissionConfig::default()
    };
    let vehicle = SimulatedVehicle::from_config(&config).inject(Operation::Goto, 2, Fault::Reject);
    let area = MissionArea::new(2, 2).unwrap();
    let mut mission = MissionController::new(vehicle, area, config);

    let report = mission.run().await.unwrap();
    assert_eq!(report.outcome, MissionOutcome::Completed);
    assert_eq!(report.waypoints_visited(), 4);
    assert_eq!(mission.vehicle().call_count(Operation::Goto), 5);
}

#[tokio::test(start_paused = true)]
async fn test_drained_battery_aborts_after_first_far_waypoint() {
    let config = MissionConfig {
        sim_home: Coordinate::new(0.0, 0.0),
        sim_battery_percent: 1.0,
        ..MissionConfig::default()
    };
    let area = MissionArea::new(4, 4).unwrap();
    let mut mission = MissionController::new(SimulatedVehicle::from_config(&config), area, config);

    let report = mission.run().await.unwrap();

    // The first waypoint is home itself; the second is 3 m out
    assert_eq!(report.outcome, MissionOutcome::Aborted(AbortReason::LowBattery));
    assert_eq!(report.waypoints_visited(), 2);
    assert_eq!(report.outcome.to_string(), "aborted early for battery safety");
    assert_eq!(mission.vehicle().commands().last(), Some(&VehicleCommand::ReturnToLaunch));
}
