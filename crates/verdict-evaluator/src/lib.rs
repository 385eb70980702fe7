//! Round evaluation entry point: fraud detection, scoring, and the
//! collaborators results are handed to.

pub mod config;
pub mod evaluate;
pub mod pipeline;
pub mod retry;
pub mod traits;

pub use config::*;
pub use evaluate::*;
pub use pipeline::*;
pub use retry::with_retry;
pub use traits::*;
