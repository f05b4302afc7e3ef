//! Price propagation over the market tree.
//!
//! Consumer prices are resolved bottom-up: variable and exogenous leaves keep
//! the price already written to them, aggregate markets take the CES price
//! index of their sub-markets and every other leaf falls back to its initial
//! price. Producer prices and market shares are then derived per market.
//!
//! Non-finite results (e.g. from a zero price raised to a negative exponent)
//! are propagated as-is; the optimizer ranks them as worst.

use crate::model::tree::MarketTree;
use serde::{Deserialize, Serialize};

/// How optimizer values reach aggregate markets marked as variable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VariablePricing {
    /// Only variable leaves take vector entries; aggregates are always the
    /// CES index of their sub-markets.
    #[default]
    LeavesOnly,
    /// Variable aggregates also take a vector entry `x`, blended with the
    /// CES index as `weight · x + (1 − weight) · index`.
    Blended { weight: f64 },
}

impl VariablePricing {
    /// Whether variable aggregate markets consume optimizer vector entries.
    pub fn includes_aggregates(&self) -> bool {
        matches!(self, VariablePricing::Blended { .. })
    }
}

/// CES price index of the sub-markets of an aggregate with elasticity `sigma`:
/// `(Σ share_i · price_i^(1 − σ))^(1 / (1 − σ))`.
pub fn ces_price_index<I>(sigma: f64, components: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let exponent = 1.0 - sigma;
    let sum: f64 = components
        .into_iter()
        .map(|(share, price)| share * price.powf(exponent))
        .sum();
    sum.powf(1.0 / exponent)
}

/// Resolve every consumer price bottom-up.
///
/// Each market is visited after all of its sub-markets, so an aggregate only
/// ever reads finalized child prices.
pub fn compute_consumer_prices(tree: &mut MarketTree, pricing: VariablePricing) {
    let order: Vec<_> = tree.reverse_document_order().collect();
    for id in order {
        let node = &tree[id];
        let price = if node.is_leaf() {
            if node.is_variable() || node.is_exogenous() {
                continue;
            }
            node.initial_price()
        } else {
            let index = ces_price_index(
                node.elasticity_of_substitution(),
                tree.children(id)
                    .map(|c| (c.initial_market_share(), c.consumer_price())),
            );
            match pricing {
                VariablePricing::Blended { weight } if node.is_variable() && !node.is_exogenous() => {
                    weight * node.consumer_price() + (1.0 - weight) * index
                }
                _ => index,
            }
        };
        tree.node_mut(id).consumer_price = price;
    }
}

/// Set `producer_price = consumer_price / (1 + shock)` on every market.
pub fn shock_producer_prices(tree: &mut MarketTree) {
    let ids = tree.document_order().to_vec();
    for id in ids {
        let node = tree.node_mut(id);
        node.producer_price = node.consumer_price / (1.0 + node.shock());
    }
}

/// Recompute each market's expenditure share among its siblings.
///
/// `share_i = γ_i · p_i^(1 − σ_i) / Σ_j γ_j · p_j^(1 − σ_j)` over the
/// sub-markets of the same parent. The root normalises against itself.
pub fn calculate_market_shares(tree: &mut MarketTree) {
    let order: Vec<_> = tree.reverse_document_order().collect();
    for id in order {
        let node = &tree[id];
        let expenditure = node.expenditure();
        let total = match node.parent() {
            Some(parent) => tree.children(parent).map(|s| s.expenditure()).sum(),
            None => expenditure,
        };
        tree.node_mut(id).market_share = expenditure / total;
    }
}
