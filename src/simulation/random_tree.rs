//! Random market-tree generation for stress tests and benchmarks.
//!
//! Trees are balanced: every aggregate has the same number of sub-markets,
//! each with an equal initial share. Leaves draw a random tariff and are
//! optionally marked variable.

use crate::core::market::MarketParameters;
use crate::model::structure::MarketDefinition;
use crate::optimization::seeded_rng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for generating a random market tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    /// Levels below the root.
    pub depth: usize,
    /// Sub-markets per aggregate.
    pub branching: usize,
    /// Leaf tariffs are drawn from `[0, max_shock)`.
    pub max_shock: f64,
    /// Elasticities of substitution are drawn from this range.
    pub substitution_range: (f64, f64),
    pub elasticity_of_supply: f64,
    pub elasticity_of_demand: f64,
    /// Mark every leaf as variable.
    pub variable_leaves: bool,
    pub seed: Option<u64>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: 2,
            branching: 3,
            max_shock: 0.1,
            substitution_range: (2.0, 6.0),
            elasticity_of_supply: 5.0,
            elasticity_of_demand: -1.0,
            variable_leaves: true,
            seed: None,
        }
    }
}

impl TreeConfig {
    /// Total markets in the generated tree, root included.
    pub fn market_count(&self) -> usize {
        (0..=self.depth).map(|level| self.branching.pow(level as u32)).sum()
    }

    /// Number of leaves in the generated tree.
    pub fn leaf_count(&self) -> usize {
        if self.branching == 0 {
            1
        } else {
            self.branching.pow(self.depth as u32)
        }
    }
}

/// Generate a random balanced market definition.
pub fn generate_random_definition(config: &TreeConfig) -> MarketDefinition {
    let mut rng = seeded_rng(config.seed);
    let root = MarketParameters::default().with_elasticities(
        draw_substitution(&mut rng, config),
        config.elasticity_of_supply,
        config.elasticity_of_demand,
    );
    let mut definition = MarketDefinition::new("M", root);
    populate(&mut definition, config, 1, &mut rng);
    definition
}

fn populate<R: Rng>(parent: &mut MarketDefinition, config: &TreeConfig, level: usize, rng: &mut R) {
    if level > config.depth || config.branching == 0 {
        if config.variable_leaves && level > 1 {
            parent.variable = true;
        }
        return;
    }
    let share = 1.0 / config.branching as f64;
    for i in 0..config.branching {
        let leaf = level == config.depth;
        let shock = if leaf && config.max_shock > 0.0 {
            rng.gen_range(0.0..config.max_shock)
        } else {
            0.0
        };
        let parameters = MarketParameters::default()
            .with_elasticities(
                draw_substitution(rng, config),
                config.elasticity_of_supply,
                config.elasticity_of_demand,
            )
            .with_initial_market_share(share)
            .with_shock(shock);
        let mut child = MarketDefinition::new(format!("{}-{}", parent.name, i), parameters);
        populate(&mut child, config, level + 1, rng);
        parent.markets.push(child);
    }
}

fn draw_substitution<R: Rng>(rng: &mut R, config: &TreeConfig) -> f64 {
    let (low, high) = config.substitution_range;
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}
