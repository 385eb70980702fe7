pub mod allocator;
pub mod arbiter;
pub mod summary;
pub mod validator;

pub use allocator::*;
pub use arbiter::*;
pub use summary::*;
pub use validator::*;
