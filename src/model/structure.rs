//! Nested market definitions, the serialisable form of a [`MarketTree`].
//!
//! A definition mirrors the tree structure directly: every market names its
//! parameters and lists its sub-markets in document order.
//!
//! ```json
//! {
//!   "name": "Retail",
//!   "elasticityOfSubstitution": 4, "elasticityOfSupply": 5, "elasticityOfDemand": -1,
//!   "initialPrice": 1.0, "initialMarketShare": 1.0, "shock": 0.0,
//!   "markets": [
//!     { "name": "Supplier1", "variable": true, "...": "..." }
//!   ]
//! }
//! ```

use crate::core::error::{Error, ModelError};
use crate::core::market::{MarketParameters, NodeId};
use crate::model::tree::MarketTree;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One market and its sub-markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDefinition {
    pub name: String,
    #[serde(flatten)]
    pub parameters: MarketParameters,
    #[serde(default, skip_serializing_if = "is_false")]
    pub variable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exogenous: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markets: Vec<MarketDefinition>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl MarketDefinition {
    pub fn new(name: impl Into<String>, parameters: MarketParameters) -> Self {
        Self {
            name: name.into(),
            parameters,
            variable: false,
            exogenous: false,
            markets: Vec::new(),
        }
    }

    pub fn variable(mut self) -> Self {
        self.variable = true;
        self
    }

    pub fn exogenous(mut self) -> Self {
        self.exogenous = true;
        self
    }

    pub fn with_market(mut self, market: MarketDefinition) -> Self {
        self.markets.push(market);
        self
    }

    /// Total number of markets in this definition, self included.
    pub fn count(&self) -> usize {
        1 + self.markets.iter().map(|m| m.count()).sum::<usize>()
    }

    /// Build the tree. Parameters are validated before the tree is returned.
    pub fn build(&self) -> Result<MarketTree, ModelError> {
        let mut tree = MarketTree::new(&self.name, self.parameters);
        let root = tree.root();
        tree.set_flags(root, self.variable, self.exogenous);

        let mut pending: Vec<(NodeId, &MarketDefinition)> =
            self.markets.iter().rev().map(|m| (root, m)).collect();
        while let Some((parent, definition)) = pending.pop() {
            let id = tree.add_market(parent, &definition.name, definition.parameters)?;
            tree.set_flags(id, definition.variable, definition.exogenous);
            pending.extend(definition.markets.iter().rev().map(|m| (id, m)));
        }

        tree.validate()?;
        Ok(tree)
    }

    /// Snapshot a tree's structure, parameters and flags.
    pub fn from_tree(tree: &MarketTree) -> Self {
        fn collect(tree: &MarketTree, id: NodeId) -> MarketDefinition {
            let node = &tree[id];
            MarketDefinition {
                name: node.name().to_string(),
                parameters: *node.parameters(),
                variable: node.is_variable(),
                exogenous: node.is_exogenous(),
                markets: node.children().iter().map(|&c| collect(tree, c)).collect(),
            }
        }
        collect(tree, tree.root())
    }
}

/// A structure-only outline: names and nesting, no parameters.
///
/// Paired with a parameter table keyed by document order, this is the
/// structure-file plus data-table way of describing a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOutline {
    pub name: String,
    #[serde(default)]
    pub markets: Vec<MarketOutline>,
}

impl MarketOutline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markets: Vec::new(),
        }
    }

    pub fn with_market(mut self, market: MarketOutline) -> Self {
        self.markets.push(market);
        self
    }

    /// Build a tree from the outline and a parameter table in document order.
    pub fn build(&self, rows: &[MarketParameters]) -> Result<MarketTree, ModelError> {
        let mut tree = MarketTree::new(&self.name, MarketParameters::default());
        let mut pending: Vec<(NodeId, &MarketOutline)> = self
            .markets
            .iter()
            .rev()
            .map(|m| (tree.root(), m))
            .collect();
        while let Some((parent, outline)) = pending.pop() {
            let id = tree.add_market(parent, &outline.name, MarketParameters::default())?;
            pending.extend(outline.markets.iter().rev().map(|m| (id, m)));
        }
        tree.define_parameters(rows)?;
        tree.validate()?;
        Ok(tree)
    }
}

/// Load a [`MarketDefinition`] from a JSON file.
pub fn load_definition(path: impl AsRef<Path>) -> Result<MarketDefinition, Error> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
