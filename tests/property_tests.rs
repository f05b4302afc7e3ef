use partial_equilibrium::core::market::MarketParameters;
use partial_equilibrium::equilibrium::objective::{EquilibriumObjective, EvaluationConfig};
use partial_equilibrium::model::structure::MarketDefinition;
use partial_equilibrium::optimization::bounds::BoundsPolicy;
use partial_equilibrium::optimization::simplex::{Simplex, SimplexConfig};
use partial_equilibrium::optimization::swarm::{Swarm, SwarmConfig};
use partial_equilibrium::optimization::Method;
use partial_equilibrium::simulation::random_tree::{generate_random_definition, TreeConfig};
use partial_equilibrium::simulation::test_functions::sphere;
use proptest::prelude::*;

/// Generate search bounds with a non-trivial range.
fn arb_bounds() -> impl Strategy<Value = (f64, f64)> {
    (-50.0f64..50.0, 0.5f64..40.0).prop_map(|(lower, width)| (lower, lower + width))
}

/// Generate a small balanced tree configuration.
fn arb_tree_config() -> impl Strategy<Value = TreeConfig> {
    (1usize..=3, 1usize..=3, 0.0f64..0.2, any::<u64>()).prop_map(
        |(depth, branching, max_shock, seed)| TreeConfig {
            depth,
            branching,
            max_shock,
            seed: Some(seed),
            ..Default::default()
        },
    )
}

/// Generate a positive consumer price.
fn arb_price() -> impl Strategy<Value = f64> {
    0.1f64..5.0
}

/// A point beyond the box on one side, so searches press against a bound.
fn outside(lower: f64, upper: f64, above: bool) -> f64 {
    if above {
        upper + (upper - lower)
    } else {
        lower - (upper - lower)
    }
}

fn pulled_toward(x: &[f64], target: f64) -> f64 {
    x.iter().map(|v| (v - target).powi(2)).sum()
}

fn in_box(v: &[f64], lower: f64, upper: f64) -> bool {
    v.iter().all(|&x| x >= lower && x <= upper)
}

fn objective_for(config: &TreeConfig) -> EquilibriumObjective {
    let tree = generate_random_definition(config).build().unwrap();
    EquilibriumObjective::new(tree, EvaluationConfig::default()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // ===================================================================
    // INVARIANT 1: Simplex vertices never leave the search box.
    //
    // Under both bounds policies, every vertex the simplex holds lies
    // inside [lower, upper] after every step, even while the objective
    // pulls toward a minimum outside the box.
    // ===================================================================
    #[test]
    fn simplex_stays_in_bounds(
        (lower, upper) in arb_bounds(),
        dims in 1usize..5,
        seed in any::<u64>(),
        resample in any::<bool>(),
        above in any::<bool>(),
    ) {
        let policy = if resample { BoundsPolicy::Resample } else { BoundsPolicy::default() };
        let config = SimplexConfig::new(dims, lower, upper, 1)
            .with_seed(seed)
            .with_bounds_policy(policy);
        let target = outside(lower, upper, above);
        let mut simplex = Simplex::new(config, move |x: &[f64]| pulled_toward(x, target)).unwrap();
        for v in simplex.vertices() {
            prop_assert!(in_box(v.vector(), lower, upper));
        }
        for _ in 0..40 {
            simplex.step();
            for v in simplex.vertices() {
                prop_assert!(
                    in_box(v.vector(), lower, upper),
                    "{:?} outside [{}, {}]", v.vector(), lower, upper
                );
            }
        }
    }

    // ===================================================================
    // INVARIANT 2: Swarm positions never leave the search box.
    //
    // Every particle's current and personal-best position, and the global
    // best, lie inside [lower, upper] after every step.
    // ===================================================================
    #[test]
    fn swarm_stays_in_bounds(
        (lower, upper) in arb_bounds(),
        dims in 1usize..4,
        seed in any::<u64>(),
        above in any::<bool>(),
    ) {
        let config = SwarmConfig::new(dims, lower, upper, 1).with_seed(seed);
        let target = outside(lower, upper, above);
        let mut swarm = Swarm::new(config, move |x: &[f64]| pulled_toward(x, target)).unwrap();
        for _ in 0..15 {
            swarm.step();
            for p in swarm.particles() {
                prop_assert!(
                    in_box(p.current().vector(), lower, upper),
                    "{:?} outside [{}, {}]", p.current().vector(), lower, upper
                );
                prop_assert!(in_box(p.best().vector(), lower, upper));
            }
            prop_assert!(in_box(swarm.global_best().vector(), lower, upper));
        }
    }

    // ===================================================================
    // INVARIANT 3: Sibling market shares sum to one.
    //
    // After any evaluation with finite positive prices, the shares among
    // the children of every aggregate are a partition of unity.
    // ===================================================================
    #[test]
    fn sibling_shares_sum_to_one(
        config in arb_tree_config(),
        prices in prop::collection::vec(arb_price(), 27),
    ) {
        let mut objective = objective_for(&config);
        let dims = objective.dimensions();
        objective.evaluate(&prices[..dims]);

        let tree = objective.tree();
        for &id in tree.document_order() {
            if tree[id].is_leaf() {
                continue;
            }
            let total: f64 = tree.children(id).map(|m| m.market_share()).sum();
            prop_assert!((total - 1.0).abs() < 1e-9, "shares sum to {}", total);
        }
        prop_assert!((tree[tree.root()].market_share() - 1.0).abs() < 1e-12);
    }

    // ===================================================================
    // INVARIANT 4: Evaluation is a pure function of the price vector.
    //
    // Evaluating at x, then elsewhere, then at x again reproduces the
    // first value exactly; no state leaks between calls.
    // ===================================================================
    #[test]
    fn evaluation_is_idempotent(
        config in arb_tree_config(),
        first in prop::collection::vec(arb_price(), 27),
        second in prop::collection::vec(arb_price(), 27),
    ) {
        let mut objective = objective_for(&config);
        let dims = objective.dimensions();
        let a = objective.evaluate(&first[..dims]);
        objective.evaluate(&second[..dims]);
        let b = objective.evaluate(&first[..dims]);
        prop_assert_eq!(a.to_bits(), b.to_bits());
    }

    // ===================================================================
    // INVARIANT 5: An unshocked model is in equilibrium at its baseline.
    //
    // With no tariffs anywhere, unit prices clear every market.
    // ===================================================================
    #[test]
    fn unshocked_baseline_clears(config in arb_tree_config()) {
        let config = TreeConfig { max_shock: 0.0, ..config };
        let mut objective = objective_for(&config);
        let value = objective.evaluate(&vec![1.0; objective.dimensions()]);
        prop_assert!(value.abs() < 1e-20, "baseline objective {}", value);
    }

    // ===================================================================
    // INVARIANT 6: Seeded runs are reproducible.
    // ===================================================================
    #[test]
    fn seeded_runs_repeat(seed in any::<u64>(), swarm in any::<bool>()) {
        let method = if swarm {
            Method::Swarm(SwarmConfig::new(3, -5.0, 5.0, 20).with_seed(seed))
        } else {
            Method::Simplex(SimplexConfig::new(3, -5.0, 5.0, 100).with_seed(seed))
        };
        let a = method.minimize(sphere).unwrap();
        let b = method.minimize(sphere).unwrap();
        prop_assert_eq!(a.best.value().to_bits(), b.best.value().to_bits());
        prop_assert_eq!(a.best.vector(), b.best.vector());
        prop_assert_eq!(a.evaluations, b.evaluations);
    }

    // ===================================================================
    // INVARIANT 7: Tariffs only lower producer prices.
    //
    // For a non-negative shock the producer price never exceeds the
    // consumer price.
    // ===================================================================
    #[test]
    fn producer_price_below_consumer_price(
        shock in 0.0f64..1.0,
        price in arb_price(),
    ) {
        let definition = MarketDefinition::new("Retail", MarketParameters::default())
            .with_market(
                MarketDefinition::new(
                    "Supplier",
                    MarketParameters::default().with_shock(shock),
                )
                .variable(),
            );
        let mut objective =
            EquilibriumObjective::new(definition.build().unwrap(), EvaluationConfig::default())
                .unwrap();
        objective.evaluate(&[price]);
        let tree = objective.tree();
        for market in tree.iter() {
            prop_assert!(market.producer_price() <= market.consumer_price());
        }
    }
}
