use crate::core::error::OptimizationError;
use crate::optimization::{Method, OptimizationResult};
use log::{debug, info};
use rayon::prelude::*;

/// Run `restarts` independent copies of `method` on the rayon pool and keep
/// the best result.
///
/// Each run gets its own objective from `make_objective` and its own
/// generator: run `i` is seeded with `seed + i` when the method carries a
/// seed, and from system entropy otherwise. Ties go to the lowest run index,
/// so seeded parallel solves are reproducible.
pub fn minimize_parallel<F, M>(
    method: &Method,
    restarts: usize,
    make_objective: M,
) -> Result<OptimizationResult, OptimizationError>
where
    M: Fn() -> F + Sync,
    F: FnMut(&[f64]) -> f64,
{
    if restarts == 0 {
        return Err(OptimizationError::NoRestarts);
    }
    method.validate()?;

    let base_seed = method.seed();
    let runs: Vec<OptimizationResult> = (0..restarts)
        .into_par_iter()
        .map(|i| -> Result<OptimizationResult, OptimizationError> {
            let run = match base_seed {
                Some(seed) => method.clone().with_seed(seed.wrapping_add(i as u64)),
                None => method.clone(),
            };
            let result = run.minimize(make_objective())?;
            debug!("restart {}: {}", i, result.best);
            Ok(result)
        })
        .collect::<Result<_, OptimizationError>>()?;

    let evaluations: usize = runs.iter().map(|r| r.evaluations).sum();
    let best = runs
        .into_iter()
        .reduce(|best, run| if run.best < best.best { run } else { best })
        .ok_or(OptimizationError::NoRestarts)?;
    info!(
        "{} restarts of {} ({} evaluations in total): {}",
        restarts,
        method.name(),
        evaluations,
        best.best.value()
    );
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::simplex::SimplexConfig;
    use crate::optimization::swarm::SwarmConfig;
    use crate::simulation::test_functions::{rastrigin, rosenbrock};

    #[test]
    fn test_zero_restarts_rejected() {
        let method = Method::Simplex(SimplexConfig::new(2, -5.0, 5.0, 10).with_seed(1));
        assert_eq!(
            minimize_parallel(&method, 0, || rosenbrock).unwrap_err(),
            OptimizationError::NoRestarts
        );
    }

    #[test]
    fn test_best_of_runs_is_no_worse_than_first_run() {
        let method = Method::Simplex(SimplexConfig::new(2, -5.0, 5.0, 200).with_seed(10));
        let single = method.minimize(rosenbrock).unwrap();
        let parallel = minimize_parallel(&method, 6, || rosenbrock).unwrap();
        assert!(parallel.best <= single.best);
    }

    #[test]
    fn test_seeded_parallel_runs_are_reproducible() {
        let method = Method::Swarm(SwarmConfig::new(3, -5.12, 5.12, 40).with_seed(77));
        let a = minimize_parallel(&method, 4, || rastrigin).unwrap();
        let b = minimize_parallel(&method, 4, || rastrigin).unwrap();
        assert_eq!(a.best.vector(), b.best.vector());
        assert_eq!(a.best.value(), b.best.value());
    }

    #[test]
    fn test_configuration_error_fails_before_running() {
        let method = Method::Swarm(SwarmConfig::new(2, 1.0, -1.0, 10));
        assert!(matches!(
            minimize_parallel(&method, 2, || rastrigin),
            Err(OptimizationError::InvalidBounds { .. })
        ));
    }
}
