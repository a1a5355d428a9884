pub mod engine;
pub mod tables;

pub use engine::{interpolate, progressive_fee, solve_management_fee, FixedPoint};
pub use tables::{
    Bracket, Breakpoint, FeeTables, FlatRates, InterpolationTable, ProgressiveSchedule,
};
