pub mod error;
pub mod market;
pub mod solution;
