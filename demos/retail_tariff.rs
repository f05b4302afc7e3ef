//! A retail market supplied by two firms, one of which faces a 5% tariff.
//!
//! Solves for the supplier prices that clear all three markets and prints
//! the resulting equilibrium.

use partial_equilibrium::prelude::*;

fn main() -> Result<(), Error> {
    println!("╔════════════════════════════════════════════╗");
    println!("║  partial-equilibrium: Retail Tariff Example ║");
    println!("╚════════════════════════════════════════════╝\n");

    let half = MarketParameters::default().with_initial_market_share(0.5);
    let model = MarketDefinition::new("Retail", MarketParameters::default())
        .with_market(MarketDefinition::new("Supplier1", half).variable())
        .with_market(MarketDefinition::new("Supplier2", half.with_shock(0.05)).variable());

    let mut objective = EquilibriumObjective::new(model.build()?, EvaluationConfig::default())?;

    // --- Baseline: every market at its initial price ---
    println!("━━━ Baseline ━━━\n");
    objective.evaluate(&[1.0, 1.0]);
    println!(
        "{}",
        EquilibriumReport::from_tree(objective.tree(), Aggregation::SumOfSquares)
    );

    // --- Nelder-Mead ---
    println!("━━━ Simplex ━━━\n");
    let simplex = Method::Simplex(SimplexConfig::new(2, 0.5, 2.0, 2000).with_seed(2024));
    let mut run = objective.clone();
    let result = simplex.minimize(|x: &[f64]| run.evaluate(x))?;
    println!(
        "Best after {} iterations ({} evaluations): {}\n",
        result.iterations, result.evaluations, result.best
    );

    // --- Particle swarm, for comparison ---
    println!("━━━ Particle Swarm ━━━\n");
    let swarm = Method::Swarm(SwarmConfig::new(2, 0.5, 2.0, 200).with_seed(2024));
    let mut run = objective.clone();
    let swarm_result = swarm.minimize(|x: &[f64]| run.evaluate(x))?;
    println!(
        "Best after {} iterations ({} evaluations): {}\n",
        swarm_result.iterations, swarm_result.evaluations, swarm_result.best
    );

    let best = if swarm_result.best < result.best {
        swarm_result.best
    } else {
        result.best
    };
    objective.apply(&best)?;
    let report = EquilibriumReport::from_tree(objective.tree(), Aggregation::SumOfSquares)
        .with_solution(best);
    println!("{}", report);

    if let (Some(s1), Some(s2)) = (report.market("Supplier1"), report.market("Supplier2")) {
        println!(
            "Tariff pass-through: Supplier2 consumer price is {:.2}% above Supplier1",
            (s2.consumer_price / s1.consumer_price - 1.0) * 100.0
        );
    }
    Ok(())
}
