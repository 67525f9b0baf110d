use serde::Serialize;

use crate::energy::EnergyModel;
use crate::geo::{self, Coordinate};
use crate::types::{GridCell, MissionArea, Waypoint};

/// Serpentine (boustrophedon) waypoint planner over a rectangular area
///
/// Rows run along the latitude axis, one per unit of `area.width`. Each row
/// visits `area.height` columns along the longitude axis, forward on even rows
/// and reversed on odd rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPlanner {
    home: Coordinate,
    area: MissionArea,
    step_size_m: f64,
    altitude_m: f64,
}

impl GridPlanner {
    /// Creates a planner anchored at `home`
    ///
    /// # Arguments
    /// * `home` - Coordinate of cell (0, 0)
    /// * `area` - Grid size in cells
    /// * `step_size_m` - Distance between neighbouring cells
    /// * `altitude_m` - Absolute altitude for every waypoint
    pub fn new(home: Coordinate, area: MissionArea, step_size_m: f64, altitude_m: f64) -> Self {
        Self {
            home,
            area,
            step_size_m,
            altitude_m,
        }
    }

    pub fn home(&self) -> Coordinate {
        self.home
    }

    pub fn area(&self) -> MissionArea {
        self.area
    }

    /// Returns a fresh iterator over the waypoints. Every call yields the same sequence.
    pub fn generate(&self) -> GridIter {
        GridIter {
            planner: *self,
            next: 0,
            len: self.area.cell_count(),
        }
    }

    /// Cell visited at position `index` of the serpentine order, or `None`
    /// past the end of the grid
    pub fn cell_at(&self, index: u64) -> Option<GridCell> {
        if index >= self.area.cell_count() {
            return None;
        }

        let height = self.area.height as u64;
        let row = (index / height) as u32;
        let step = (index % height) as u32;
        let column = if row % 2 == 0 {
            step
        } else {
            self.area.height - 1 - step
        };

        Some(GridCell { row, column })
    }

    /// Builds the waypoint for a grid cell
    pub fn waypoint(&self, cell: GridCell) -> Waypoint {
        let lat_offset = cell.row as f64 * self.step_size_m;
        let lon_offset = cell.column as f64 * self.step_size_m;

        Waypoint {
            target: geo::offset_to_coordinate(self.home, lat_offset, lon_offset),
            altitude_m: self.altitude_m,
            cell,
        }
    }

    /// Estimates distance and battery needed to cover the whole area and fly home
    ///
    /// Runs in constant time. Every leg of the sweep is one step along a single
    /// axis, so the path is the row legs plus the column legs, each measured
    /// once at the home latitude.
    pub fn estimate(&self, model: &EnergyModel) -> PlanEstimate {
        let waypoint_count = self.area.cell_count();

        let (path_distance_m, return_distance_m) = match waypoint_count.checked_sub(1).and_then(|i| self.cell_at(i)) {
            Some(last) => {
                let row_leg_m = geo::distance(self.home, self.home.offset(0.0, self.step_size_m));
                let column_leg_m = geo::distance(self.home, self.home.offset(self.step_size_m, 0.0));

                let row_legs = self.area.width as f64 * (self.area.height as f64 - 1.0);
                let column_legs = self.area.width as f64 - 1.0;

                (
                    row_legs * row_leg_m + column_legs * column_leg_m,
                    geo::distance(self.waypoint(last).target, self.home),
                )
            }
            None => (0.0, 0.0),
        };

        PlanEstimate {
            waypoint_count,
            path_distance_m,
            return_distance_m,
            required_percent: model.consume_for_distance(path_distance_m + return_distance_m),
        }
    }
}

/// Lazy iterator over a [`GridPlanner`]'s waypoints
#[derive(Debug, Clone)]
pub struct GridIter {
    planner: GridPlanner,
    next: u64,
    len: u64,
}

impl Iterator for GridIter {
    type Item = Waypoint;

    fn next(&mut self) -> Option<Waypoint> {
        if self.next >= self.len {
            return None;
        }

        let cell = self.planner.cell_at(self.next)?;
        self.next += 1;
        Some(self.planner.waypoint(cell))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridIter {}

/// Waypoints for a serpentine sweep of `area` starting at `home`
pub fn generate(home: Coordinate, area: MissionArea, step_size_m: f64, altitude_m: f64) -> GridIter {
    GridPlanner::new(home, area, step_size_m, altitude_m).generate()
}

/// Pre-flight cost of a full sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanEstimate {
    pub waypoint_count: u64,
    /// Home to first waypoint plus every leg between waypoints
    pub path_distance_m: f64,
    /// Last waypoint back to home
    pub return_distance_m: f64,
    /// Battery percent for path plus return
    pub required_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn meters_from_home(home: Coordinate, wp: &Waypoint) -> (f64, f64) {
        (
            ((wp.target.latitude_deg - home.latitude_deg) * geo::METERS_PER_DEGREE * 1e6).round() / 1e6,
            ((wp.target.longitude_deg - home.longitude_deg) * geo::METERS_PER_DEGREE * 1e6).round() / 1e6,
        )
    }

    #[test]
    fn test_three_by_two_serpentine_order() {
        let home = Coordinate::new(0.0, 0.0);
        let area = MissionArea::new(3, 2).unwrap();
        let waypoints: Vec<_> = generate(home, area, 3.0, 4.0).collect();

        let offsets: Vec<_> = waypoints.iter().map(|wp| meters_from_home(home, wp)).collect();
        assert_eq!(
            offsets,
            vec![(0.0, 0.0), (0.0, 3.0), (3.0, 3.0), (3.0, 0.0), (6.0, 0.0), (6.0, 3.0)]
        );

        let cells: Vec<_> = waypoints.iter().map(|wp| (wp.cell.row, wp.cell.column)).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 1), (1, 0), (2, 0), (2, 1)]);
    }

    #[test]
    fn test_first_waypoint_is_home() {
        let home = Coordinate::new(47.397742, 8.545594);
        let area = MissionArea::new(4, 4).unwrap();
        let first = generate(home, area, 3.0, 492.0).next().unwrap();
        assert_eq!(first.target, home);
        assert_eq!(first.altitude_m, 492.0);
    }

    #[test]
    fn test_count_and_unique_cells() {
        let home = Coordinate::new(10.0, 10.0);
        for (w, h) in [(1, 1), (1, 7), (5, 1), (4, 3), (6, 6)] {
            let area = MissionArea::new(w, h).unwrap();
            let iter = generate(home, area, 2.0, 0.0);
            assert_eq!(iter.len(), (w * h) as usize);

            let cells: HashSet<_> = iter.map(|wp| wp.cell).collect();
            assert_eq!(cells.len(), (w * h) as usize);
        }
    }

    #[test]
    fn test_same_coordinates_as_row_major_scan() {
        let home = Coordinate::new(-33.0, 151.0);
        let area = MissionArea::new(5, 4).unwrap();
        let planner = GridPlanner::new(home, area, 3.0, 0.0);

        let mut serpentine: Vec<_> = planner
            .generate()
            .map(|wp| (wp.target.latitude_deg.to_bits(), wp.target.longitude_deg.to_bits()))
            .collect();
        let mut row_major: Vec<_> = (0..area.width)
            .flat_map(|row| (0..area.height).map(move |column| GridCell { row, column }))
            .map(|cell| planner.waypoint(cell))
            .map(|wp| (wp.target.latitude_deg.to_bits(), wp.target.longitude_deg.to_bits()))
            .collect();

        serpentine.sort_unstable();
        row_major.sort_unstable();
        assert_eq!(serpentine, row_major);
    }

    #[test]
    fn test_generate_is_restartable() {
        let planner = GridPlanner::new(Coordinate::new(1.0, 2.0), MissionArea::new(3, 3).unwrap(), 3.0, 10.0);
        let first: Vec<_> = planner.generate().collect();
        let second: Vec<_> = planner.generate().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_sized_area_is_empty() {
        let home = Coordinate::new(0.0, 0.0);
        assert_eq!(generate(home, MissionArea { width: 0, height: 3 }, 3.0, 0.0).count(), 0);
        assert_eq!(generate(home, MissionArea { width: 3, height: 0 }, 3.0, 0.0).count(), 0);
    }

    #[test]
    fn test_consecutive_waypoints_are_one_step_apart() {
        let home = Coordinate::new(0.0, 0.0);
        let waypoints: Vec<_> = generate(home, MissionArea::new(4, 5).unwrap(), 3.0, 0.0).collect();
        for pair in waypoints.windows(2) {
            let d = geo::distance(pair[0].target, pair[1].target);
            assert!((d - 3.0).abs() < 0.01, "leg of {} m", d);
        }
    }

    #[test]
    fn test_estimate() {
        let home = Coordinate::new(0.0, 0.0);
        let planner = GridPlanner::new(home, MissionArea::new(3, 2).unwrap(), 3.0, 0.0);
        let estimate = planner.estimate(&EnergyModel::default());

        assert_eq!(estimate.waypoint_count, 6);
        // Five 3 m legs; the first waypoint is home itself
        assert!((estimate.path_distance_m - 15.0).abs() < 0.05);
        let last = home.offset(6.0, 3.0);
        assert!((estimate.return_distance_m - geo::distance(last, home)).abs() < 1e-9);
        assert!(
            (estimate.required_percent - (estimate.path_distance_m + estimate.return_distance_m)).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_estimate_of_empty_area() {
        let planner = GridPlanner::new(Coordinate::new(0.0, 0.0), MissionArea { width: 0, height: 0 }, 3.0, 0.0);
        let estimate = planner.estimate(&EnergyModel::default());
        assert_eq!(estimate.waypoint_count, 0);
        assert_eq!(estimate.path_distance_m, 0.0);
        assert_eq!(estimate.required_percent, 0.0);

        let flat = GridPlanner::new(Coordinate::new(0.0, 0.0), MissionArea { width: 0, height: 4 }, 3.0, 0.0);
        assert_eq!(flat.estimate(&EnergyModel::default()).path_distance_m, 0.0);
    }

    #[test]
    fn test_cell_at_past_the_end() {
        let planner = GridPlanner::new(Coordinate::new(0.0, 0.0), MissionArea::new(3, 2).unwrap(), 3.0, 0.0);
        assert_eq!(planner.cell_at(5), Some(GridCell { row: 2, column: 1 }));
        assert_eq!(planner.cell_at(6), None);

        let flat = GridPlanner::new(Coordinate::new(0.0, 0.0), MissionArea { width: 3, height: 0 }, 3.0, 0.0);
        assert_eq!(flat.cell_at(0), None);
    }

    #[test]
    fn test_estimate_matches_walked_path() {
        let home = Coordinate::new(47.397742, 8.545594);
        for (w, h) in [(1, 1), (1, 6), (6, 1), (4, 5), (7, 3)] {
            let planner = GridPlanner::new(home, MissionArea::new(w, h).unwrap(), 3.0, 0.0);
            let estimate = planner.estimate(&EnergyModel::default());

            let mut previous = home;
            let mut walked = 0.0;
            for waypoint in planner.generate() {
                walked += geo::distance(previous, waypoint.target);
                previous = waypoint.target;
            }

            assert_eq!(estimate.waypoint_count, (w * h) as u64);
            assert!((estimate.path_distance_m - walked).abs() < 1e-3, "{}x{}: {} vs {}", w, h, estimate.path_distance_m, walked);
            assert!((estimate.return_distance_m - geo::distance(previous, home)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_estimate_of_huge_area_is_immediate() {
        let planner = GridPlanner::new(
            Coordinate::new(0.0, 0.0),
            MissionArea::new(u32::MAX, u32::MAX).unwrap(),
            3.0,
            0.0,
        );

        let started = std::time::Instant::now();
        let estimate = planner.estimate(&EnergyModel::default());

        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(estimate.waypoint_count, u32::MAX as u64 * u32::MAX as u64);
        assert!(estimate.path_distance_m.is_finite() && estimate.path_distance_m > 0.0);
    }
}
