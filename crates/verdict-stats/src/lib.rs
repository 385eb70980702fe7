//! Round statistics: telemetry points and the daily public aggregates.

pub mod committees;
pub mod percentile;
pub mod point;
pub mod public;
pub mod retrieval;

pub use committees::record_committee_sizes;
pub use percentile::{mean, percentile};
pub use point::{FieldValue, StatsPoint};
pub use public::*;
pub use retrieval::build_retrieval_stats;
