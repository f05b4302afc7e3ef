use crate::core::error::{Error, ModelError, OptimizationError};
use crate::core::market::NodeId;
use crate::core::solution::Solution;
use crate::equilibrium::pricing::{
    calculate_market_shares, compute_consumer_prices, shock_producer_prices, VariablePricing,
};
use crate::equilibrium::residual::{
    aggregate, calculate_market_equilibrium, Aggregation, PriceIndexSource,
};
use crate::model::tree::MarketTree;
use log::warn;
use serde::{Deserialize, Serialize};

/// Policies that shape one evaluation of the market tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluationConfig {
    pub variable_pricing: VariablePricing,
    pub price_index: PriceIndexSource,
    pub aggregation: Aggregation,
    /// Recompute market shares from the new consumer prices on every call.
    pub update_market_shares: bool,
    /// Price index the root market's residual is measured against.
    pub root_price_index: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            variable_pricing: VariablePricing::LeavesOnly,
            price_index: PriceIndexSource::Parent,
            aggregation: Aggregation::SumOfSquares,
            update_market_shares: true,
            root_price_index: 1.0,
        }
    }
}

impl EvaluationConfig {
    fn validate(&self) -> Result<(), OptimizationError> {
        if let VariablePricing::Blended { weight } = self.variable_pricing {
            if !(0.0..=1.0).contains(&weight) {
                return Err(OptimizationError::InvalidParameter {
                    name: "weight",
                    value: weight,
                });
            }
        }
        if let Aggregation::DepthWeightedPower { exponent } = self.aggregation {
            if !exponent.is_finite() || exponent <= 0.0 {
                return Err(OptimizationError::InvalidParameter {
                    name: "exponent",
                    value: exponent,
                });
            }
        }
        if !self.root_price_index.is_finite() {
            return Err(OptimizationError::InvalidParameter {
                name: "rootPriceIndex",
                value: self.root_price_index,
            });
        }
        Ok(())
    }
}

/// Binds an optimizer vector to the variable markets of a tree and reduces
/// one full pricing pass to a scalar.
///
/// Each vector entry is written into the consumer price of one variable,
/// non-exogenous market in document order. Under
/// [`VariablePricing::LeavesOnly`] only leaves take entries; under
/// [`VariablePricing::Blended`] variable aggregates do as well.
///
/// Evaluation mutates the tree's transient prices but is repeatable: the
/// same vector always yields the same value. Clone the objective to give
/// each concurrent optimizer run its own tree.
///
/// # Examples
///
/// ```
/// use partial_equilibrium::core::market::MarketParameters;
/// use partial_equilibrium::equilibrium::objective::{EquilibriumObjective, EvaluationConfig};
/// use partial_equilibrium::model::tree::MarketTree;
///
/// let half = MarketParameters::default().with_initial_market_share(0.5);
/// let mut tree = MarketTree::new("Retail", MarketParameters::default());
/// let root = tree.root();
/// tree.add_market(root, "Supplier1", half).unwrap();
/// tree.add_market(root, "Supplier2", half).unwrap();
/// tree.set_variables(&["Supplier1", "Supplier2"]).unwrap();
///
/// let mut objective = EquilibriumObjective::new(tree, EvaluationConfig::default()).unwrap();
/// assert_eq!(objective.dimensions(), 2);
/// assert!(objective.evaluate(&[1.0, 1.0]).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct EquilibriumObjective {
    tree: MarketTree,
    config: EvaluationConfig,
    targets: Vec<NodeId>,
}

impl EquilibriumObjective {
    /// Validate the tree and the configuration and fix the vector layout.
    pub fn new(tree: MarketTree, config: EvaluationConfig) -> Result<Self, Error> {
        tree.validate()?;
        config.validate()?;
        let targets = tree.variable_markets(config.variable_pricing.includes_aggregates());
        Ok(Self {
            tree,
            config,
            targets,
        })
    }

    /// Length of the vectors this objective accepts.
    pub fn dimensions(&self) -> usize {
        self.targets.len()
    }

    /// Markets that receive vector entries, in vector order.
    pub fn variable_markets(&self) -> &[NodeId] {
        &self.targets
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn tree(&self) -> &MarketTree {
        &self.tree
    }

    pub fn into_tree(self) -> MarketTree {
        self.tree
    }

    /// Run one pricing pass at `prices` and return the aggregated residual.
    pub fn try_evaluate(&mut self, prices: &[f64]) -> Result<f64, ModelError> {
        if prices.len() != self.targets.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.targets.len(),
                actual: prices.len(),
            });
        }
        for (&id, &price) in self.targets.iter().zip(prices) {
            self.tree.node_mut(id).consumer_price = price;
        }

        compute_consumer_prices(&mut self.tree, self.config.variable_pricing);
        shock_producer_prices(&mut self.tree);
        if self.config.update_market_shares {
            calculate_market_shares(&mut self.tree);
        }
        calculate_market_equilibrium(
            &mut self.tree,
            self.config.price_index,
            self.config.root_price_index,
        );
        Ok(aggregate(&self.tree, self.config.aggregation))
    }

    /// Like [`try_evaluate`](Self::try_evaluate), but a malformed vector
    /// yields `NaN`, which every optimizer ranks as worst.
    pub fn evaluate(&mut self, prices: &[f64]) -> f64 {
        match self.try_evaluate(prices) {
            Ok(value) => value,
            Err(e) => {
                warn!("objective evaluation rejected: {}", e);
                f64::NAN
            }
        }
    }

    /// Re-evaluate the tree at a solution's vector so its state can be reported.
    pub fn apply(&mut self, solution: &Solution) -> Result<f64, ModelError> {
        self.try_evaluate(solution.vector())
    }
}
