//! A randomly generated three-level supply chain solved with parallel
//! simplex restarts.

use partial_equilibrium::prelude::*;
use partial_equilibrium::simulation::random_tree::{generate_random_definition, TreeConfig};

fn main() -> Result<(), Error> {
    env_logger::init();

    println!("╔═══════════════════════════════════════════════════╗");
    println!("║  partial-equilibrium: Nested Supply Chain Example ║");
    println!("╚═══════════════════════════════════════════════════╝\n");

    let config = TreeConfig {
        depth: 2,
        branching: 3,
        max_shock: 0.15,
        seed: Some(7),
        ..Default::default()
    };
    let model = generate_random_definition(&config);
    println!(
        "Generated {} markets with {} variable leaves\n",
        config.market_count(),
        config.leaf_count()
    );

    let objective = EquilibriumObjective::new(model.build()?, EvaluationConfig::default())?;
    let baseline = objective
        .clone()
        .evaluate(&vec![1.0; objective.dimensions()]);
    println!("Baseline objective: {:.6e}\n", baseline);

    let method = Method::Simplex(
        SimplexConfig::new(objective.dimensions(), 0.1, 5.0, 3000)
            .with_seed(7)
            .with_tolerance(1e-18),
    );

    for restarts in [1, 4, 16] {
        let result = minimize_parallel(&method, restarts, || {
            let mut run = objective.clone();
            move |x: &[f64]| run.evaluate(x)
        })?;
        println!(
            "{:>2} restart(s): objective {:.6e} after {} iterations ({:?})",
            restarts,
            result.best.value(),
            result.iterations,
            result.termination
        );
    }

    let best = minimize_parallel(&method, 16, || {
        let mut run = objective.clone();
        move |x: &[f64]| run.evaluate(x)
    })?
    .best;
    let mut solved = objective.clone();
    solved.apply(&best)?;
    println!(
        "\n{}",
        EquilibriumReport::from_tree(solved.tree(), Aggregation::SumOfSquares).with_solution(best)
    );
    Ok(())
}
