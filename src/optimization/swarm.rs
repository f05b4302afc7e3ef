//! Particle swarm optimization with stochastic restarts and a line search
//! toward the global best.

use crate::core::error::OptimizationError;
use crate::core::solution::Solution;
use crate::optimization::bounds::Bounds;
use crate::optimization::progress::Progress;
use crate::optimization::{seeded_rng, OptimizationResult, Termination};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwarmConfig {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub dimensions: usize,
    pub iterations: usize,
    pub seed: Option<u64>,
    /// Swarm size; defaults to `max(10, 2 · dimensions)`.
    pub particles: Option<usize>,
    pub inertia: f64,
    pub local_weight: f64,
    pub global_weight: f64,
    /// A particle whose survival roll falls below this is re-randomized.
    pub restart_probability: f64,
    /// Factor applied to the velocity of a re-randomized particle.
    pub velocity_damping: f64,
    /// Initial velocity as a fraction of the initial position.
    pub initial_velocity_scale: f64,
    pub line_search: bool,
    /// Minimum decrease that counts as an improvement.
    pub tolerance: f64,
    pub time_limit_ms: Option<u64>,
    pub report_every: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: 10.0,
            dimensions: 1,
            iterations: 1000,
            seed: None,
            particles: None,
            inertia: 0.1,
            local_weight: 1.0,
            global_weight: 1.0,
            restart_probability: 0.05,
            velocity_damping: 0.05,
            initial_velocity_scale: 1e-5,
            line_search: true,
            tolerance: 1e-15,
            time_limit_ms: None,
            report_every: 10,
        }
    }
}

impl SwarmConfig {
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

    pub fn with_particles(mut self, particles: usize) -> Self {
        self.particles = Some(particles);
        self
    }

    pub fn with_restart_probability(mut self, probability: f64) -> Self {
        self.restart_probability = probability;
        self
    }

    pub fn with_line_search(mut self, enabled: bool) -> Self {
        self.line_search = enabled;
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

    pub fn particle_count(&self) -> usize {
        self.particles.unwrap_or_else(|| (2 * self.dimensions).max(10))
    }

    pub fn validate(&self) -> Result<Bounds, OptimizationError> {
        let bounds = Bounds::new(self.lower_bound, self.upper_bound)?;
        if self.dimensions == 0 {
            return Err(OptimizationError::NoDimensions);
        }
        if self.iterations == 0 {
            return Err(OptimizationError::NoIterations);
        }
        if self.particle_count() == 0 {
            return Err(OptimizationError::TooFewParticles);
        }
        for (name, value) in [
            ("inertia", self.inertia),
            ("localWeight", self.local_weight),
            ("globalWeight", self.global_weight),
            ("velocityDamping", self.velocity_damping),
            ("initialVelocityScale", self.initial_velocity_scale),
        ] {
            if !value.is_finite() {
                return Err(OptimizationError::InvalidParameter { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.restart_probability) {
            return Err(OptimizationError::InvalidParameter {
                name: "restartProbability",
                value: self.restart_probability,
            });
        }
        if !(self.tolerance >= 0.0) {
            return Err(OptimizationError::InvalidParameter {
                name: "tolerance",
                value: self.tolerance,
            });
        }
        Ok(bounds)
    }
}

/// One member of the swarm.
#[derive(Debug, Clone)]
pub struct Particle {
    current: Solution,
    best: Solution,
    velocity: Vec<f64>,
}

impl Particle {
    fn new(current: Solution, velocity: Vec<f64>) -> Self {
        Self {
            best: current.clone(),
            current,
            velocity,
        }
    }

    pub fn current(&self) -> &Solution {
        &self.current
    }

    pub fn best(&self) -> &Solution {
        &self.best
    }

    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    /// Move to `position`, keeping the personal best unless it improved.
    fn update(&mut self, position: Solution, tolerance: f64) {
        if improves(&position, &self.best, tolerance) {
            self.best = position.clone();
        }
        self.current = position;
    }
}

fn improves(candidate: &Solution, incumbent: &Solution, tolerance: f64) -> bool {
    incumbent.score() - candidate.score() > tolerance
}

/// A particle swarm over an objective `F`.
///
/// ```
/// use partial_equilibrium::optimization::swarm::{Swarm, SwarmConfig};
///
/// let config = SwarmConfig::new(2, -5.0, 5.0, 200).with_seed(3);
/// let f = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
/// let result = Swarm::new(config, f).unwrap().minimize();
/// assert!(result.best.value() < 1e-3);
/// ```
pub struct Swarm<F> {
    config: SwarmConfig,
    bounds: Bounds,
    objective: F,
    rng: StdRng,
    particles: Vec<Particle>,
    global_best: Solution,
    evaluations: usize,
    progress: Progress,
}

impl<F> Swarm<F>
where
    F: FnMut(&[f64]) -> f64,
{
    pub fn new(config: SwarmConfig, objective: F) -> Result<Self, OptimizationError> {
        let bounds = config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let mut objective = objective;
        let mut particles = Vec::with_capacity(config.particle_count());
        for _ in 0..config.particle_count() {
            let position = bounds.sample_vector(&mut rng, config.dimensions);
            let velocity = position
                .iter()
                .map(|x| x * config.initial_velocity_scale)
                .collect();
            particles.push(Particle::new(
                Solution::evaluate(&mut objective, position),
                velocity,
            ));
        }
        let global_best = particles
            .iter()
            .map(|p| p.best())
            .min()
            .cloned()
            .ok_or(OptimizationError::TooFewParticles)?;

        Ok(Swarm {
            evaluations: particles.len(),
            progress: Progress::new(None, config.report_every),
            config,
            bounds,
            objective,
            rng,
            particles,
            global_best,
        })
    }

    /// Attach a text sink that receives periodic progress lines.
    pub fn with_progress(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.progress = Progress::new(Some(sink), self.config.report_every);
        self
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn global_best(&self) -> &Solution {
        &self.global_best
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn evaluate(&mut self, vector: Vec<f64>) -> Solution {
        self.evaluations += 1;
        Solution::evaluate(&mut self.objective, vector)
    }

    fn offer_global(&mut self, candidate: &Solution) {
        if improves(candidate, &self.global_best, self.config.tolerance) {
            self.global_best = candidate.clone();
        }
    }

    /// Advance every particle once, then run the line search.
    pub fn step(&mut self) {
        let tolerance = self.config.tolerance;
        for i in 0..self.particles.len() {
            let survival: f64 = self.rng.gen();
            let global = self.global_best.vector().to_vec();

            let particle = &mut self.particles[i];
            let mut position = particle.current.vector().to_vec();
            for j in 0..position.len() {
                let r1: f64 = self.rng.gen();
                let r2: f64 = self.rng.gen();
                let x = position[j];
                particle.velocity[j] = self.config.inertia * particle.velocity[j]
                    + self.config.local_weight * r1 * (particle.best.vector()[j] - x)
                    + self.config.global_weight * r2 * (global[j] - x);
                position[j] = x + particle.velocity[j];
            }
            let clamped = self.bounds.clamp(&mut position);

            let moved = self.evaluate(position);
            self.particles[i].update(moved, tolerance);
            let best = self.particles[i].best.clone();
            self.offer_global(&best);

            if clamped || survival < self.config.restart_probability {
                let position = self
                    .bounds
                    .sample_vector(&mut self.rng, self.config.dimensions);
                let damping = self.config.velocity_damping;
                self.particles[i]
                    .velocity
                    .iter_mut()
                    .for_each(|v| *v *= damping);
                let restarted = self.evaluate(position);
                self.particles[i].update(restarted, tolerance);
                let best = self.particles[i].best.clone();
                self.offer_global(&best);
            }
        }

        if self.config.line_search {
            self.line_search();
        }
    }

    /// Sample `dimensions` evenly spaced points between each particle and
    /// the global best; adopt the best one if it beats the global best.
    fn line_search(&mut self) {
        let dimensions = self.config.dimensions;
        let global = self.global_best.vector().to_vec();
        let mut virtual_best: Option<Solution> = None;

        for i in 0..self.particles.len() {
            let origin = self.particles[i].current.vector().to_vec();
            for k in 0..dimensions {
                let fraction = (k + 1) as f64 / (dimensions + 1) as f64;
                let mut point: Vec<f64> = origin
                    .iter()
                    .zip(&global)
                    .map(|(x, g)| x + (g - x) * fraction)
                    .collect();
                self.bounds.clamp(&mut point);
                let candidate = self.evaluate(point);
                let better = match &virtual_best {
                    Some(best) => improves(&candidate, best, self.config.tolerance),
                    None => candidate.is_finite(),
                };
                if better {
                    virtual_best = Some(candidate);
                }
            }
        }

        if let Some(candidate) = virtual_best {
            self.offer_global(&candidate);
        }
    }

    pub fn minimize(mut self) -> OptimizationResult {
        let start = Instant::now();
        let time_limit = self.config.time_limit_ms.map(Duration::from_millis);
        let mut termination = Termination::IterationBudget;
        let mut iterations = 0;

        info!(
            "swarm: {} dimensions, {} particles, {} iterations",
            self.config.dimensions,
            self.particles.len(),
            self.config.iterations
        );

        for i in 0..self.config.iterations {
            self.progress.report(i, &self.global_best);
            if time_limit.is_some_and(|limit| start.elapsed() >= limit) {
                termination = Termination::TimeLimit;
                break;
            }
            self.step();
            iterations = i + 1;
        }
        self.progress.finish();

        if !self.global_best.is_finite() {
            warn!("swarm: no particle reached a finite objective value");
        }
        info!(
            "swarm finished after {} iterations ({} evaluations, {:?}): {}",
            iterations,
            self.evaluations,
            termination,
            self.global_best.value()
        );
        OptimizationResult {
            best: self.global_best,
            iterations,
            evaluations: self.evaluations,
            termination,
        }
    }
}
