//! Property-based tests for planning, geodesy and the battery abort rule

use std::collections::HashSet;

use proptest::prelude::*;
use seed_sweep::geo::distance;
use seed_sweep::*;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

#[cfg(test)]
mod geometry_properties {
    use super::*;

    proptest! {
        #[test]
        fn distance_to_self_is_zero(lat in -89.0_f64..89.0, lon in -179.0_f64..179.0) {
            let a = Coordinate::new(lat, lon);
            prop_assert_eq!(distance(a, a), 0.0);
        }

        #[test]
        fn distance_is_symmetric(
            lat1 in -89.0_f64..89.0,
            lon1 in -179.0_f64..179.0,
            lat2 in -89.0_f64..89.0,
            lon2 in -179.0_f64..179.0,
        ) {
            let a = Coordinate::new(lat1, lon1);
            let b = Coordinate::new(lat2, lon2);

            let ab = distance(a, b);
            let ba = distance(b, a);
            prop_assert!(ab >= 0.0 && ab.is_finite());
            prop_assert!((ab - ba).abs() < 1e-6, "d(a,b) = {} != {} = d(b,a)", ab, ba);
        }

        #[test]
        fn offset_distance_matches_north_displacement(lat in -60.0_f64..60.0, lon in -170.0_f64..170.0, meters in 0.0_f64..500.0) {
            let origin = Coordinate::new(lat, lon);
            let moved = origin.offset(meters, 0.0);

            // 111,320 m per degree is within 0.5% of the haversine meridian length
            let d = distance(origin, moved);
            prop_assert!((d - meters).abs() <= meters * 0.005 + 1e-9);
        }
    }
}

#[cfg(test)]
mod planner_properties {
    use super::*;

    proptest! {
        #[test]
        fn grid_covers_every_cell_once(width in 1u32..25, height in 1u32..25) {
            let area = MissionArea::new(width, height).unwrap();
            let planner = GridPlanner::new(Coordinate::new(10.0, 20.0), area, 3.0, 50.0);

            let cells: Vec<GridCell> = planner.generate().map(|w| w.cell).collect();
            prop_assert_eq!(cells.len() as u64, area.cell_count());

            let unique: HashSet<GridCell> = cells.iter().copied().collect();
            prop_assert_eq!(unique.len(), cells.len());
            prop_assert!(cells.iter().all(|c| c.row < width && c.column < height));
        }

        #[test]
        fn consecutive_waypoints_are_neighbours(width in 1u32..15, height in 1u32..15) {
            let area = MissionArea::new(width, height).unwrap();
            let planner = GridPlanner::new(Coordinate::new(0.0, 0.0), area, 3.0, 10.0);
            let cells: Vec<GridCell> = planner.generate().map(|w| w.cell).collect();

            for pair in cells.windows(2) {
                let dr = pair[0].row.abs_diff(pair[1].row);
                let dc = pair[0].column.abs_diff(pair[1].column);
                prop_assert_eq!(dr + dc, 1, "{:?} -> {:?}", pair[0], pair[1]);
            }
        }

        #[test]
        fn generation_is_repeatable(width in 1u32..20, height in 1u32..20, step in 0.5_f64..20.0) {
            let area = MissionArea::new(width, height).unwrap();
            let planner = GridPlanner::new(Coordinate::new(-33.9, 151.2), area, step, 30.0);

            let first: Vec<Waypoint> = planner.generate().collect();
            let second: Vec<Waypoint> = planner.generate().collect();
            prop_assert_eq!(first, second);
        }
    }
}

#[cfg(test)]
mod mission_properties {
    use super::*;

    fn fast_config() -> MissionConfig {
        MissionConfig {
            sim_home: Coordinate::new(0.0, 0.0),
            takeoff_settle_ms: 0,
            waypoint_dwell_ms: 0,
            ..MissionConfig::default()
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn low_battery_abort_never_flies_past_the_failing_waypoint(
            width in 1u32..6,
            height in 1u32..6,
            battery in 0.0_f64..60.0,
        ) {
            let config = fast_config();
            let area = MissionArea::new(width, height).unwrap();
            let vehicle = SimulatedVehicle::new(Position::new(config.sim_home, 0.0), battery);
            let mut mission = MissionController::new(vehicle, area, config);

            let report = paused_runtime().block_on(mission.run()).unwrap();
            let visited = &report.waypoints;

            prop_assert_eq!(mission.vehicle().goto_targets().len(), visited.len());
            prop_assert_eq!(mission.state(), MissionState::Complete);

            match report.outcome {
                MissionOutcome::Completed => {
                    prop_assert_eq!(visited.len() as u64, area.cell_count());
                    prop_assert!(visited.iter().all(|w| w.remaining_percent >= w.required_to_return_percent));
                }
                MissionOutcome::Aborted(AbortReason::LowBattery) => {
                    let (last, earlier) = visited.split_last().unwrap();
                    prop_assert!(last.remaining_percent < last.required_to_return_percent);
                    prop_assert!(earlier.iter().all(|w| w.remaining_percent >= w.required_to_return_percent));
                }
                other => prop_assert!(false, "unexpected outcome {:?}", other),
            }
        }
    }
}
