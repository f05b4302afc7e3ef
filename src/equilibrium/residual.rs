//! Market-clearing residuals and their aggregation into one objective value.

use crate::model::tree::MarketTree;
use serde::{Deserialize, Serialize};

/// Which price index a market's residual is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceIndexSource {
    /// The consumer price of the parent market (the CES index over this
    /// market and its siblings). The root uses the configured root index.
    #[default]
    Parent,
    /// The market's own consumer price.
    Own,
}

/// How per-market residuals fold into the scalar the optimizer minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregation {
    /// `Σ r_i²` over every market, root included.
    #[default]
    SumOfSquares,
    /// `Σ |r_i| · depth_i`, root depth 1.
    DepthWeightedAbsolute,
    /// `Σ |r_i|^exponent · depth_i`.
    DepthWeightedPower { exponent: f64 },
}

/// Residual of the clearing condition for one market:
///
/// `producer^εs − index^(σ + εd) / consumer^σ`
pub fn residual(
    producer_price: f64,
    consumer_price: f64,
    price_index: f64,
    elasticity_of_substitution: f64,
    elasticity_of_supply: f64,
    elasticity_of_demand: f64,
) -> f64 {
    producer_price.powf(elasticity_of_supply)
        - price_index.powf(elasticity_of_substitution + elasticity_of_demand)
            / consumer_price.powf(elasticity_of_substitution)
}

/// Write the market-equilibrium residual of every market.
///
/// Reads only consumer and producer prices, so it must run after the
/// pricing passes.
pub fn calculate_market_equilibrium(
    tree: &mut MarketTree,
    source: PriceIndexSource,
    root_price_index: f64,
) {
    let order: Vec<_> = tree.reverse_document_order().collect();
    for id in order {
        let node = &tree[id];
        let price_index = match source {
            PriceIndexSource::Parent => tree
                .parent(id)
                .map(|p| p.consumer_price())
                .unwrap_or(root_price_index),
            PriceIndexSource::Own => node.consumer_price(),
        };
        let value = residual(
            node.producer_price(),
            node.consumer_price(),
            price_index,
            node.elasticity_of_substitution(),
            node.elasticity_of_supply(),
            node.elasticity_of_demand(),
        );
        tree.node_mut(id).market_equilibrium = value;
    }
}

/// Fold the stored residuals into one value.
pub fn aggregate(tree: &MarketTree, aggregation: Aggregation) -> f64 {
    tree.iter()
        .map(|m| {
            let r = m.market_equilibrium();
            match aggregation {
                Aggregation::SumOfSquares => r * r,
                Aggregation::DepthWeightedAbsolute => r.abs() * m.depth() as f64,
                Aggregation::DepthWeightedPower { exponent } => {
                    r.abs().powf(exponent) * m.depth() as f64
                }
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equilibrium::pricing::{
        compute_consumer_prices, shock_producer_prices, VariablePricing,
    };
    use crate::model::tree::tests::{nested_tree, two_supplier_tree};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn evaluate(tree: &mut MarketTree) {
        compute_consumer_prices(tree, VariablePricing::LeavesOnly);
        shock_producer_prices(tree);
        calculate_market_equilibrium(tree, PriceIndexSource::Parent, 1.0);
    }

    #[test]
    fn test_residual_formula() {
        // 2^5 - 1^(4 - 1) / 2^4 = 32 - 1/16
        assert_relative_eq!(residual(2.0, 2.0, 1.0, 4.0, 5.0, -1.0), 31.9375);
    }

    #[test]
    fn test_unshocked_baseline_is_in_equilibrium() {
        let mut tree = nested_tree();
        for id in tree.document_order().to_vec() {
            let params = tree[id].parameters().with_shock(0.0);
            tree.node_mut(id).redefine(params);
        }
        evaluate(&mut tree);
        for market in tree.iter() {
            assert_abs_diff_eq!(market.market_equilibrium(), 0.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(aggregate(&tree, Aggregation::SumOfSquares), 0.0, epsilon = 1e-24);
    }

    #[test]
    fn test_tariff_creates_excess_demand() {
        let mut tree = two_supplier_tree();
        evaluate(&mut tree);
        let s2 = tree.find("Supplier2").unwrap();
        // (1/1.05)^5 - 1 < 0
        assert_relative_eq!(
            tree[s2].market_equilibrium(),
            (1.0f64 / 1.05).powi(5) - 1.0,
            epsilon = 1e-12
        );
        assert!(aggregate(&tree, Aggregation::SumOfSquares) > 0.0);
    }

    #[test]
    fn test_own_price_index() {
        let mut tree = two_supplier_tree();
        tree.set_variables(&["Supplier1", "Supplier2"]).unwrap();
        tree.set_consumer_prices(&[2.0, 1.0]).unwrap();
        compute_consumer_prices(&mut tree, VariablePricing::LeavesOnly);
        shock_producer_prices(&mut tree);
        calculate_market_equilibrium(&mut tree, PriceIndexSource::Own, 1.0);

        let s1 = tree.find("Supplier1").unwrap();
        // 2^5 - 2^3 / 2^4
        assert_relative_eq!(tree[s1].market_equilibrium(), 31.5, epsilon = 1e-12);
    }

    #[test]
    fn test_root_price_index_normalisation() {
        let mut tree = two_supplier_tree();
        compute_consumer_prices(&mut tree, VariablePricing::LeavesOnly);
        shock_producer_prices(&mut tree);
        calculate_market_equilibrium(&mut tree, PriceIndexSource::Parent, 2.0);
        let root = tree.root();
        // 1^5 - 2^3 / 1^4
        assert_relative_eq!(tree[root].market_equilibrium(), -7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_depth_weighted_aggregations() {
        let mut tree = nested_tree();
        let residuals = [0.5, -1.0, 2.0, -0.25, 0.1];
        for (id, r) in tree.document_order().to_vec().into_iter().zip(residuals) {
            tree.node_mut(id).market_equilibrium = r;
        }
        // depths: 1, 2, 2, 3, 3
        let absolute = 0.5 + 2.0 + 4.0 + 0.75 + 0.3;
        assert_relative_eq!(
            aggregate(&tree, Aggregation::DepthWeightedAbsolute),
            absolute,
            epsilon = 1e-12
        );
        let squares = 0.25 + 1.0 + 4.0 + 0.0625 + 0.01;
        assert_relative_eq!(
            aggregate(&tree, Aggregation::SumOfSquares),
            squares,
            epsilon = 1e-12
        );
        let power = 0.25 + 2.0 * 1.0 + 2.0 * 4.0 + 3.0 * 0.0625 + 3.0 * 0.01;
        assert_relative_eq!(
            aggregate(&tree, Aggregation::DepthWeightedPower { exponent: 2.0 }),
            power,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_nan_residual_propagates() {
        let mut tree = two_supplier_tree();
        tree.set_variables(&["Supplier1", "Supplier2"]).unwrap();
        tree.set_consumer_prices(&[-1.0, 1.0]).unwrap();
        evaluate(&mut tree);
        assert!(!aggregate(&tree, Aggregation::SumOfSquares).is_finite());
    }
}
