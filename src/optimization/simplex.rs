//! Nelder-Mead downhill simplex.
//!
//! The simplex holds `number_of_solutions` vertices (at least
//! `dimensions + 1`), kept sorted best-first. Each iteration replaces the
//! worst vertex by a reflected, expanded or contracted trial point, or
//! shrinks every vertex toward the best one when no trial point helps.
//!
//! Trial coordinates that leave the search box are brought back under the
//! configured [`BoundsPolicy`]. Non-finite objective values rank worst and
//! never become the best vertex while any finite vertex exists.

use crate::core::error::OptimizationError;
use crate::core::solution::Solution;
use crate::optimization::bounds::{Bounds, BoundsPolicy};
use crate::optimization::progress::Progress;
use crate::optimization::{seeded_rng, OptimizationResult, Termination};
use log::{info, warn};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::{Duration, Instant};

/// Reflection coefficient (α).
pub const REFLECTION: f64 = 1.0;
/// Expansion coefficient (γ).
pub const EXPANSION: f64 = 2.0;
/// Contraction coefficient (β).
pub const CONTRACTION: f64 = 0.5;
/// Factor by which non-best vertices move toward the best on a shrink.
pub const SHRINK: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimplexConfig {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub dimensions: usize,
    /// Fixed iteration budget.
    pub iterations: usize,
    /// `None` seeds from system entropy.
    pub seed: Option<u64>,
    /// Vertex count; defaults to `dimensions + 1`.
    pub number_of_solutions: Option<usize>,
    pub bounds_policy: BoundsPolicy,
    /// Stop once the best and worst vertex values differ by at most this.
    pub tolerance: Option<f64>,
    /// Wall-clock limit, checked between iterations.
    pub time_limit_ms: Option<u64>,
    pub report_every: usize,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: 10.0,
            dimensions: 1,
            iterations: 1000,
            seed: None,
            number_of_solutions: None,
            bounds_policy: BoundsPolicy::default(),
            tolerance: None,
            time_limit_ms: None,
            report_every: 10,
        }
    }
}

impl SimplexConfig {
    pub fn new(dimensions: usize, lower_bound: f64, upper_bound: f64, iterations: usize) -> Self {
        Self {
            lower_bound,
            upper_bound,
            dimensions,
            iterations,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_number_of_solutions(mut self, solutions: usize) -> Self {
        self.number_of_solutions = Some(solutions);
        self
    }

    pub fn with_bounds_policy(mut self, policy: BoundsPolicy) -> Self {
        self.bounds_policy = policy;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = Some(limit.as_millis() as u64);
        self
    }

    pub fn with_report_every(mut self, every: usize) -> Self {
        self.report_every = every;
        self
    }

    /// Number of vertices the simplex will hold.
    pub fn solutions(&self) -> usize {
        self.number_of_solutions.unwrap_or(self.dimensions + 1)
    }

    /// Check the configuration and return the search box.
    pub fn validate(&self) -> Result<Bounds, OptimizationError> {
        let bounds = Bounds::new(self.lower_bound, self.upper_bound)?;
        if self.dimensions == 0 {
            return Err(OptimizationError::NoDimensions);
        }
        if self.iterations == 0 {
            return Err(OptimizationError::NoIterations);
        }
        let required = self.dimensions + 1;
        if self.solutions() < required {
            return Err(OptimizationError::TooFewSolutions {
                solutions: self.solutions(),
                required,
            });
        }
        self.bounds_policy.validate()?;
        if let Some(tolerance) = self.tolerance {
            if !(tolerance >= 0.0) {
                return Err(OptimizationError::InvalidParameter {
                    name: "tolerance",
                    value: tolerance,
                });
            }
        }
        Ok(bounds)
    }
}

/// A Nelder-Mead simplex over an objective `F`.
///
/// # Examples
///
/// ```
/// use partial_equilibrium::optimization::simplex::{Simplex, SimplexConfig};
///
/// let config = SimplexConfig::new(2, -5.0, 5.0, 500).with_seed(7);
/// let sphere = |x: &[f64]| x.iter().map(|v| (v - 1.0) * (v - 1.0)).sum::<f64>();
/// let result = Simplex::new(config, sphere).unwrap().minimize();
/// assert!(result.best.value() < 1e-8);
/// ```
pub struct Simplex<F> {
    config: SimplexConfig,
    bounds: Bounds,
    objective: F,
    rng: StdRng,
    vertices: Vec<Solution>,
    evaluations: usize,
    progress: Progress,
}

impl<F> Simplex<F>
where
    F: FnMut(&[f64]) -> f64,
{
    /// Validate `config` and evaluate the initial, uniformly drawn vertices.
    pub fn new(config: SimplexConfig, objective: F) -> Result<Self, OptimizationError> {
        let bounds = config.validate()?;
        let mut simplex = Simplex {
            bounds,
            objective,
            rng: seeded_rng(config.seed),
            vertices: Vec::with_capacity(config.solutions()),
            evaluations: 0,
            progress: Progress::new(None, config.report_every),
            config,
        };
        for _ in 0..simplex.config.solutions() {
            let vector = simplex
                .bounds
                .sample_vector(&mut simplex.rng, simplex.config.dimensions);
            let vertex = simplex.evaluate(vector);
            simplex.vertices.push(vertex);
        }
        simplex.vertices.sort();
        Ok(simplex)
    }

    /// Attach a text sink that receives periodic progress lines.
    pub fn with_progress(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.progress = Progress::new(Some(sink), self.config.report_every);
        self
    }

    pub fn config(&self) -> &SimplexConfig {
        &self.config
    }

    /// Vertices, best first.
    pub fn vertices(&self) -> &[Solution] {
        &self.vertices
    }

    pub fn best(&self) -> &Solution {
        &self.vertices[0]
    }

    /// Objective evaluations so far, initial vertices included.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn evaluate(&mut self, vector: Vec<f64>) -> Solution {
        self.evaluations += 1;
        Solution::evaluate(&mut self.objective, vector)
    }

    fn bounded(&mut self, mut vector: Vec<f64>) -> Solution {
        self.bounds
            .enforce(self.config.bounds_policy, &mut vector, &mut self.rng);
        self.evaluate(vector)
    }

    /// Mean of every vertex except the worst.
    fn centroid(&self) -> Vec<f64> {
        let kept = &self.vertices[..self.vertices.len() - 1];
        let mut centroid = vec![0.0; self.config.dimensions];
        for vertex in kept {
            for (c, x) in centroid.iter_mut().zip(vertex.vector()) {
                *c += x;
            }
        }
        let count = kept.len() as f64;
        centroid.iter_mut().for_each(|c| *c /= count);
        centroid
    }

    /// `from + coefficient · (to − from)`, coordinate-wise.
    fn towards(from: &[f64], to: &[f64], coefficient: f64) -> Vec<f64> {
        from.iter()
            .zip(to)
            .map(|(f, t)| f + coefficient * (t - f))
            .collect()
    }

    /// One reflect / expand / contract / shrink round.
    pub fn step(&mut self) {
        let last = self.vertices.len() - 1;
        let centroid = self.centroid();

        // centroid + α (centroid − worst)
        let reflected = Self::towards(&centroid, self.vertices[last].vector(), -REFLECTION);
        let reflected = self.bounded(reflected);

        if reflected.is_better_than(&self.vertices[0]) {
            let expanded = Self::towards(&centroid, reflected.vector(), EXPANSION);
            let expanded = self.bounded(expanded);
            self.vertices[last] = if expanded.is_better_than(&reflected) {
                expanded
            } else {
                reflected
            };
        } else if reflected.is_better_than(&self.vertices[last - 1]) {
            self.vertices[last] = reflected;
        } else {
            let contracted = Self::towards(&centroid, self.vertices[last].vector(), CONTRACTION);
            let contracted = self.bounded(contracted);
            if contracted.is_better_than(&self.vertices[last]) {
                self.vertices[last] = contracted;
            } else {
                self.shrink();
            }
        }
        self.vertices.sort();
    }

    fn shrink(&mut self) {
        let best = self.vertices[0].vector().to_vec();
        for j in 1..self.vertices.len() {
            let moved = Self::towards(&best, self.vertices[j].vector(), SHRINK);
            self.vertices[j] = self.bounded(moved);
        }
    }

    /// Difference between the worst and best vertex values.
    pub fn spread(&self) -> f64 {
        self.vertices[self.vertices.len() - 1].score() - self.vertices[0].score()
    }

    /// Run until the iteration budget, the tolerance or the time limit is
    /// reached and return the best vertex.
    pub fn minimize(mut self) -> OptimizationResult {
        let start = Instant::now();
        let time_limit = self.config.time_limit_ms.map(Duration::from_millis);
        let mut termination = Termination::IterationBudget;
        let mut iterations = 0;

        info!(
            "simplex: {} dimensions, {} vertices, {} iterations",
            self.config.dimensions,
            self.vertices.len(),
            self.config.iterations
        );

        for i in 0..self.config.iterations {
            self.progress.report(i, &self.vertices[0]);
            if time_limit.is_some_and(|limit| start.elapsed() >= limit) {
                termination = Termination::TimeLimit;
                break;
            }

            self.step();
            iterations = i + 1;

            if self.config.tolerance.is_some_and(|tol| self.spread() <= tol) {
                termination = Termination::Tolerance;
                break;
            }
        }
        self.progress.finish();

        let best = self.vertices.swap_remove(0);
        if !best.is_finite() {
            warn!("simplex: every vertex evaluated to a non-finite value");
        }
        info!(
            "simplex finished after {} iterations ({} evaluations, {:?}): {}",
            iterations,
            self.evaluations,
            termination,
            best.value()
        );
        OptimizationResult {
            best,
            iterations,
            evaluations: self.evaluations,
            termination,
        }
    }
}
