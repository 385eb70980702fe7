//! Per-task committees and majority consensus over their measurements.

pub mod committee;
pub mod majority;

pub use committee::*;
pub use majority::*;
