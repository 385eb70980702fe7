pub mod codes;
pub mod error;
pub mod evaluation;
pub mod measurement;
pub mod round;
pub mod score;

pub use error::*;
pub use evaluation::*;
pub use measurement::*;
pub use round::*;
pub use score::*;
