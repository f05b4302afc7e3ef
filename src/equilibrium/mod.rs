pub mod objective;
pub mod pricing;
pub mod report;
pub mod residual;
