//! Coverage planning

pub mod grid;

pub use grid::{generate, GridIter, GridPlanner, PlanEstimate};
