pub mod error;
pub mod fee_schedule;
pub mod types;

#[cfg(feature = "estimate")]
pub mod estimate;

#[cfg(feature = "indicators")]
pub mod indicators;

pub use error::EstimateError;
pub use types::*;

/// Standard result type for all estimation operations
pub type EstimateResult<T> = Result<T, EstimateError>;
