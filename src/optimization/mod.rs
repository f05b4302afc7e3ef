pub mod bounds;
pub mod parallel;
pub(crate) mod progress;
pub mod simplex;
pub mod swarm;

use crate::core::error::OptimizationError;
use crate::core::solution::Solution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use simplex::{Simplex, SimplexConfig};
use std::io::Write;
use swarm::{Swarm, SwarmConfig};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    IterationBudget,
    Tolerance,
    TimeLimit,
}

/// Outcome of one optimizer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub best: Solution,
    /// Completed iterations.
    pub iterations: usize,
    /// Objective evaluations, initial population included.
    pub evaluations: usize,
    pub termination: Termination,
}

/// The optimizer to run, with its configuration.
///
/// Serialized with an inline tag so model files can pick the method:
///
/// ```json
/// { "method": "simplex", "lowerBound": 0.0, "upperBound": 5.0, "iterations": 2000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    Simplex(SimplexConfig),
    Swarm(SwarmConfig),
}

impl Default for Method {
    fn default() -> Self {
        Method::Simplex(SimplexConfig::default())
    }
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Simplex(_) => "simplex",
            Method::Swarm(_) => "swarm",
        }
    }

    pub fn seed(&self) -> Option<u64> {
        match self {
            Method::Simplex(c) => c.seed,
            Method::Swarm(c) => c.seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        match &mut self {
            Method::Simplex(c) => c.seed = Some(seed),
            Method::Swarm(c) => c.seed = Some(seed),
        }
        self
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Method::Simplex(c) => c.dimensions,
            Method::Swarm(c) => c.dimensions,
        }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        match &mut self {
            Method::Simplex(c) => c.dimensions = dimensions,
            Method::Swarm(c) => c.dimensions = dimensions,
        }
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        match &mut self {
            Method::Simplex(c) => c.iterations = iterations,
            Method::Swarm(c) => c.iterations = iterations,
        }
        self
    }

    pub fn validate(&self) -> Result<(), OptimizationError> {
        match self {
            Method::Simplex(c) => c.validate().map(|_| ()),
            Method::Swarm(c) => c.validate().map(|_| ()),
        }
    }

    pub fn minimize<F>(&self, objective: F) -> Result<OptimizationResult, OptimizationError>
    where
        F: FnMut(&[f64]) -> f64,
    {
        self.minimize_with_progress(objective, None)
    }

    /// Run the configured optimizer, optionally writing progress lines to `sink`.
    pub fn minimize_with_progress<F>(
        &self,
        objective: F,
        sink: Option<Box<dyn Write + Send>>,
    ) -> Result<OptimizationResult, OptimizationError>
    where
        F: FnMut(&[f64]) -> f64,
    {
        Ok(match self {
            Method::Simplex(config) => {
                let simplex = Simplex::new(config.clone(), objective)?;
                match sink {
                    Some(sink) => simplex.with_progress(sink).minimize(),
                    None => simplex.minimize(),
                }
            }
            Method::Swarm(config) => {
                let swarm = Swarm::new(config.clone(), objective)?;
                match sink {
                    Some(sink) => swarm.with_progress(sink).minimize(),
                    None => swarm.minimize(),
                }
            }
        })
    }
}

/// A generator seeded from `seed`, or from system entropy when absent.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
