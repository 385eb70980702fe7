pub mod allocate;
pub mod evaluate;
