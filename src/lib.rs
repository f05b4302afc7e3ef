//! # partial-equilibrium
//!
//! Partial-equilibrium pricing for nested markets.
//!
//! A model is a tree of markets. Leaf prices are chosen by an optimizer,
//! aggregate prices follow from CES aggregation over sub-markets, tariffs
//! ("shocks") drive a wedge between consumer and producer prices, and each
//! market contributes a clearing residual. The solvers search for the leaf
//! prices that drive the aggregated residual to zero.
//!
//! ## Architecture
//!
//! - **core** — Market parameters and nodes, solutions, errors
//! - **model** — The market tree, nested definitions and model files
//! - **equilibrium** — Price propagation, residuals, the objective adapter, reports
//! - **optimization** — Nelder-Mead simplex, particle swarm, parallel restarts
//! - **simulation** — Random market trees and benchmark objectives

pub mod core;
pub mod equilibrium;
pub mod model;
pub mod optimization;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::error::{Error, ModelError, OptimizationError};
    pub use crate::core::market::{MarketParameters, NodeId};
    pub use crate::core::solution::Solution;
    pub use crate::equilibrium::objective::{EquilibriumObjective, EvaluationConfig};
    pub use crate::equilibrium::pricing::VariablePricing;
    pub use crate::equilibrium::report::EquilibriumReport;
    pub use crate::equilibrium::residual::{Aggregation, PriceIndexSource};
    pub use crate::model::file::ModelFile;
    pub use crate::model::structure::MarketDefinition;
    pub use crate::model::tree::MarketTree;
    pub use crate::optimization::parallel::minimize_parallel;
    pub use crate::optimization::simplex::{Simplex, SimplexConfig};
    pub use crate::optimization::swarm::{Swarm, SwarmConfig};
    pub use crate::optimization::{Method, OptimizationResult, Termination};
}
