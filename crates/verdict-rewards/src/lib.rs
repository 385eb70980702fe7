//! Turns a round's accepted measurements into integer scores that sum to a
//! fixed budget.

pub mod allocator;

pub use allocator::*;
