use crate::core::error::ModelError;
use crate::core::market::{MarketNode, MarketParameters, NodeId};
use log::debug;
use std::ops::Index;
use std::sync::OnceLock;

/// A single-rooted, ordered tree of markets.
///
/// Markets live in an arena owned by the tree; each market owns the list of
/// its sub-market ids and keeps a non-owning parent id for upward lookups.
/// Markets are only ever added, never removed, so ids stay valid for the
/// lifetime of the tree.
///
/// Document order is the pre-order traversal from the root, children in
/// insertion order. Optimizer vectors map onto variable markets in this order.
///
/// # Examples
///
/// ```
/// use partial_equilibrium::core::market::MarketParameters;
/// use partial_equilibrium::model::tree::MarketTree;
///
/// let mut tree = MarketTree::new("Retail", MarketParameters::default());
/// let root = tree.root();
/// let half = MarketParameters::default().with_initial_market_share(0.5);
/// tree.add_market(root, "Supplier1", half).unwrap();
/// tree.add_market(root, "Supplier2", half.with_shock(0.05)).unwrap();
///
/// assert_eq!(tree.len(), 3);
/// let names: Vec<&str> = tree.iter().map(|m| m.name()).collect();
/// assert_eq!(names, ["Retail", "Supplier1", "Supplier2"]);
/// ```
#[derive(Debug, Clone)]
pub struct MarketTree {
    nodes: Vec<MarketNode>,
    /// Pre-order traversal, computed on first use after a structural change.
    order: OnceLock<Vec<NodeId>>,
}

impl MarketTree {
    /// Create a tree holding only the root market.
    pub fn new(name: impl Into<String>, parameters: MarketParameters) -> Self {
        let root = MarketNode::new(name, parameters, None, 1);
        Self {
            nodes: vec![root],
            order: OnceLock::new(),
        }
    }

    /// Append a sub-market as the last child of `parent`.
    pub fn add_market(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        parameters: MarketParameters,
    ) -> Result<NodeId, ModelError> {
        let depth = self.checked(parent)?.depth + 1;
        let id = NodeId::new(self.nodes.len());
        self.nodes
            .push(MarketNode::new(name, parameters, Some(parent), depth));
        self.nodes[parent.index()].children.push(id);
        self.order.take();
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    /// Number of markets, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&MarketNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut MarketNode {
        &mut self.nodes[id.index()]
    }

    fn checked(&self, id: NodeId) -> Result<&MarketNode, ModelError> {
        self.nodes
            .get(id.index())
            .ok_or(ModelError::PositionOutOfRange {
                position: id.index(),
                len: self.nodes.len(),
            })
    }

    // --- Traversal ---

    /// All market ids in document (pre-) order, root first.
    pub fn document_order(&self) -> &[NodeId] {
        self.order.get_or_init(|| self.pre_order())
    }

    /// Reverse document order: every market is visited after all of its
    /// descendants, so bottom-up passes read finalized child values.
    pub fn reverse_document_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.document_order().iter().rev().copied()
    }

    /// Post-order traversal: children left to right, then the parent.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                result.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.nodes[id.index()].children.iter().rev() {
                stack.push((child, false));
            }
        }
        result
    }

    fn pre_order(&self) -> Vec<NodeId> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            result.push(id);
            for &child in self.nodes[id.index()].children.iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Markets in document order.
    pub fn iter(&self) -> impl Iterator<Item = &MarketNode> + '_ {
        self.document_order()
            .iter()
            .map(move |id| &self.nodes[id.index()])
    }

    /// Sub-markets of `id`, in order. Empty for an id this tree never issued.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &MarketNode> + '_ {
        self.nodes
            .get(id.index())
            .into_iter()
            .flat_map(|node| node.children.iter())
            .map(move |c| &self.nodes[c.index()])
    }

    /// Parent of `id`; `None` for the root and for an id this tree never issued.
    pub fn parent(&self, id: NodeId) -> Option<&MarketNode> {
        self.nodes
            .get(id.index())?
            .parent
            .and_then(|p| self.nodes.get(p.index()))
    }

    // --- Lookup ---

    /// First market with `name` in document order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.document_order()
            .iter()
            .copied()
            .find(|id| self.nodes[id.index()].name() == name)
    }

    /// Id of the market at `position` in document order.
    pub fn at_position(&self, position: usize) -> Result<NodeId, ModelError> {
        self.document_order()
            .get(position)
            .copied()
            .ok_or(ModelError::PositionOutOfRange {
                position,
                len: self.nodes.len(),
            })
    }

    /// Position of `id` in document order.
    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.document_order().iter().position(|&other| other == id)
    }

    // --- Flags ---

    /// Mark exactly the markets whose names appear in `names` as variable.
    ///
    /// Names may repeat in a model; every market carrying a listed name is
    /// marked. Unknown names are rejected and leave the flags untouched.
    pub fn set_variables<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ModelError> {
        let marked = self.resolve_names(names)?;
        for node in &mut self.nodes {
            node.is_variable = marked.contains(&node.name().to_string());
        }
        Ok(())
    }

    /// Mark exactly the markets at the given document-order positions as variable.
    pub fn set_variable_positions(&mut self, positions: &[usize]) -> Result<(), ModelError> {
        let ids = self.resolve_positions(positions)?;
        for node in &mut self.nodes {
            node.is_variable = false;
        }
        for id in ids {
            self.nodes[id.index()].is_variable = true;
        }
        Ok(())
    }

    /// Mark exactly the markets whose names appear in `names` as exogenous.
    pub fn set_exogenous<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ModelError> {
        let marked = self.resolve_names(names)?;
        for node in &mut self.nodes {
            node.is_exogenous = marked.contains(&node.name().to_string());
        }
        Ok(())
    }

    /// Mark exactly the markets at the given document-order positions as exogenous.
    pub fn set_exogenous_positions(&mut self, positions: &[usize]) -> Result<(), ModelError> {
        let ids = self.resolve_positions(positions)?;
        for node in &mut self.nodes {
            node.is_exogenous = false;
        }
        for id in ids {
            self.nodes[id.index()].is_exogenous = true;
        }
        Ok(())
    }

    pub(crate) fn set_flags(&mut self, id: NodeId, variable: bool, exogenous: bool) {
        let node = &mut self.nodes[id.index()];
        node.is_variable = variable;
        node.is_exogenous = exogenous;
    }

    fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, ModelError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                match self.find(name) {
                    Some(_) => Ok(name.to_string()),
                    None => Err(ModelError::UnknownMarket(name.to_string())),
                }
            })
            .collect()
    }

    fn resolve_positions(&self, positions: &[usize]) -> Result<Vec<NodeId>, ModelError> {
        positions.iter().map(|&p| self.at_position(p)).collect()
    }

    /// Variable, non-exogenous markets in document order.
    ///
    /// With `include_aggregates == false` only leaves qualify; these are the
    /// markets whose consumer price an optimizer vector sets directly.
    pub fn variable_markets(&self, include_aggregates: bool) -> Vec<NodeId> {
        self.document_order()
            .iter()
            .copied()
            .filter(|id| {
                let node = &self.nodes[id.index()];
                node.is_variable && !node.is_exogenous && (include_aggregates || node.is_leaf())
            })
            .collect()
    }

    // --- Attribute mutation ---

    /// Write `values` into the consumer prices of the variable leaves, in
    /// document order.
    pub fn set_consumer_prices(&mut self, values: &[f64]) -> Result<(), ModelError> {
        let targets = self.variable_markets(false);
        if targets.len() != values.len() {
            return Err(ModelError::DimensionMismatch {
                expected: targets.len(),
                actual: values.len(),
            });
        }
        for (id, &value) in targets.into_iter().zip(values) {
            self.nodes[id.index()].consumer_price = value;
        }
        Ok(())
    }

    /// Set one market's consumer price, e.g. to fix an exogenous price.
    pub fn set_consumer_price(&mut self, id: NodeId, value: f64) -> Result<(), ModelError> {
        self.checked(id)?;
        self.nodes[id.index()].consumer_price = value;
        Ok(())
    }

    /// Assign parameters from a table keyed by document order, one row per market.
    pub fn define_parameters(&mut self, rows: &[MarketParameters]) -> Result<(), ModelError> {
        if rows.len() != self.nodes.len() {
            return Err(ModelError::ParameterCount {
                expected: self.nodes.len(),
                actual: rows.len(),
            });
        }
        for (id, row) in self.document_order().to_vec().into_iter().zip(rows) {
            self.nodes[id.index()].redefine(*row);
        }
        Ok(())
    }

    /// Restore every market's transient state to its baseline.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
    }

    /// Check that the tree can be evaluated without a configuration error.
    ///
    /// Rejects non-finite parameters, a shock of exactly −1 (infinite producer
    /// price) and σ = 1 on any market that aggregates sub-markets.
    pub fn validate(&self) -> Result<(), ModelError> {
        for node in self.iter() {
            if let Some((name, value)) = node.parameters().first_non_finite() {
                return Err(ModelError::InvalidParameter {
                    market: node.name().to_string(),
                    name,
                    value,
                });
            }
            if node.shock() == -1.0 {
                return Err(ModelError::InvalidParameter {
                    market: node.name().to_string(),
                    name: "shock",
                    value: node.shock(),
                });
            }
            if !node.is_leaf() && node.elasticity_of_substitution() == 1.0 {
                return Err(ModelError::NumericSingularity {
                    market: node.name().to_string(),
                });
            }
        }
        debug!("validated market tree with {} markets", self.len());
        Ok(())
    }
}

/// # Panics
///
/// Panics if `id` was not issued by this tree; use [`MarketTree::get`] for a
/// checked lookup.
impl Index<NodeId> for MarketTree {
    type Output = MarketNode;

    fn index(&self, id: NodeId) -> &MarketNode {
        &self.nodes[id.index()]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Retail over two suppliers, the second under a 5% tariff.
    pub(crate) fn two_supplier_tree() -> MarketTree {
        let half = MarketParameters::default().with_initial_market_share(0.5);
        let mut tree = MarketTree::new("Retail", MarketParameters::default());
        let root = tree.root();
        tree.add_market(root, "Supplier1", half).unwrap();
        tree.add_market(root, "Supplier2", half.with_shock(0.05))
            .unwrap();
        tree
    }

    /// Retail > [Supplier1, Supplier2 > [Input1, Input2]], inputs under a 5% tariff.
    pub(crate) fn nested_tree() -> MarketTree {
        let half = MarketParameters::default().with_initial_market_share(0.5);
        let mut tree = MarketTree::new("Retail", MarketParameters::default());
        let root = tree.root();
        tree.add_market(root, "Supplier1", half).unwrap();
        let s2 = tree.add_market(root, "Supplier2", half).unwrap();
        tree.add_market(s2, "Input1", half.with_shock(0.05)).unwrap();
        tree.add_market(s2, "Input2", half.with_shock(0.05)).unwrap();
        tree
    }

    fn names(tree: &MarketTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| tree[id].name().to_string()).collect()
    }

    #[test]
    fn test_document_order() {
        let tree = nested_tree();
        assert_eq!(
            names(&tree, tree.document_order()),
            ["Retail", "Supplier1", "Supplier2", "Input1", "Input2"]
        );
    }

    #[test]
    fn test_document_order_with_out_of_order_insertion() {
        let mut tree = MarketTree::new("A", MarketParameters::default());
        let a = tree.root();
        let b = tree.add_market(a, "B", MarketParameters::default()).unwrap();
        tree.add_market(a, "C", MarketParameters::default()).unwrap();
        tree.add_market(b, "B1", MarketParameters::default()).unwrap();
        assert_eq!(names(&tree, tree.document_order()), ["A", "B", "B1", "C"]);
    }

    #[test]
    fn test_reverse_document_order_visits_children_first() {
        let tree = nested_tree();
        let order: Vec<NodeId> = tree.reverse_document_order().collect();
        for (i, &id) in order.iter().enumerate() {
            for &child in tree[id].children() {
                let child_pos = order.iter().position(|&c| c == child).unwrap();
                assert!(child_pos < i);
            }
        }
        assert_eq!(tree[*order.last().unwrap()].name(), "Retail");
    }

    #[test]
    fn test_post_order() {
        let tree = nested_tree();
        assert_eq!(
            names(&tree, &tree.post_order()),
            ["Supplier1", "Input1", "Input2", "Supplier2", "Retail"]
        );
    }

    #[test]
    fn test_depth_and_parent() {
        let tree = nested_tree();
        let input = tree.find("Input1").unwrap();
        assert_eq!(tree[input].depth(), 3);
        assert_eq!(tree.parent(input).unwrap().name(), "Supplier2");
        assert!(tree.parent(tree.root()).is_none());
    }

    #[test]
    fn test_set_variables_by_name() {
        let mut tree = two_supplier_tree();
        tree.set_variables(&["Supplier1", "Supplier2"]).unwrap();
        tree.set_consumer_prices(&[2.5, 3.0]).unwrap();

        let s1 = tree.find("Supplier1").unwrap();
        let s2 = tree.find("Supplier2").unwrap();
        assert_eq!(tree[s1].consumer_price(), 2.5);
        assert_eq!(tree[s2].consumer_price(), 3.0);
        assert!(!tree[tree.root()].is_variable());
    }

    #[test]
    fn test_set_variables_replaces_previous_marks() {
        let mut tree = two_supplier_tree();
        tree.set_variables(&["Supplier1", "Supplier2"]).unwrap();
        tree.set_variables(&["Supplier2"]).unwrap();
        assert_eq!(names(&tree, &tree.variable_markets(false)), ["Supplier2"]);
    }

    #[test]
    fn test_set_variables_unknown_name() {
        let mut tree = two_supplier_tree();
        let err = tree.set_variables(&["Supplier9"]).unwrap_err();
        assert_eq!(err, ModelError::UnknownMarket("Supplier9".into()));
    }

    #[test]
    fn test_set_variable_positions() {
        let mut tree = nested_tree();
        tree.set_variable_positions(&[1, 3, 4]).unwrap();
        assert_eq!(
            names(&tree, &tree.variable_markets(false)),
            ["Supplier1", "Input1", "Input2"]
        );
        assert!(tree.set_variable_positions(&[5]).is_err());
    }

    #[test]
    fn test_variable_markets_skip_aggregates_and_exogenous() {
        let mut tree = nested_tree();
        tree.set_variables(&["Supplier1", "Supplier2", "Input1", "Input2"])
            .unwrap();
        tree.set_exogenous(&["Input2"]).unwrap();

        assert_eq!(
            names(&tree, &tree.variable_markets(false)),
            ["Supplier1", "Input1"]
        );
        assert_eq!(
            names(&tree, &tree.variable_markets(true)),
            ["Supplier1", "Supplier2", "Input1"]
        );
    }

    #[test]
    fn test_set_consumer_prices_dimension_mismatch() {
        let mut tree = two_supplier_tree();
        tree.set_variables(&["Supplier1"]).unwrap();
        let err = tree.set_consumer_prices(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            ModelError::DimensionMismatch {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_define_parameters_in_document_order() {
        let mut tree = nested_tree();
        let rows: Vec<MarketParameters> = (0..5)
            .map(|i| MarketParameters::default().with_initial_price(1.0 + i as f64))
            .collect();
        tree.define_parameters(&rows).unwrap();

        let prices: Vec<f64> = tree.iter().map(|m| m.initial_price()).collect();
        assert_eq!(prices, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(tree.iter().nth(3).unwrap().consumer_price(), 4.0);

        let err = tree.define_parameters(&rows[..2]).unwrap_err();
        assert_eq!(
            err,
            ModelError::ParameterCount {
                expected: 5,
                actual: 2
            }
        );
    }

    #[test]
    fn test_validate_rejects_unit_elasticity_on_aggregate() {
        let mut tree = MarketTree::new(
            "Retail",
            MarketParameters::default().with_elasticities(1.0, 5.0, -1.0),
        );
        assert!(tree.validate().is_ok());

        let root = tree.root();
        tree.add_market(root, "Supplier1", MarketParameters::default())
            .unwrap();
        assert_eq!(
            tree.validate().unwrap_err(),
            ModelError::NumericSingularity {
                market: "Retail".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_shock_of_minus_one() {
        let mut tree = two_supplier_tree();
        let s1 = tree.find("Supplier1").unwrap();
        tree.node_mut(s1)
            .redefine(MarketParameters::default().with_shock(-1.0));
        assert!(matches!(
            tree.validate(),
            Err(ModelError::InvalidParameter { name: "shock", .. })
        ));
    }

    #[test]
    fn test_add_market_to_foreign_id() {
        let mut tree = two_supplier_tree();
        let foreign = NodeId::new(42);
        assert!(tree
            .add_market(foreign, "Orphan", MarketParameters::default())
            .is_err());
    }

    #[test]
    fn test_foreign_id_lookups_do_not_panic() {
        let tree = two_supplier_tree();
        let foreign = NodeId::new(42);
        assert!(tree.get(foreign).is_none());
        assert_eq!(tree.children(foreign).count(), 0);
        assert!(tree.parent(foreign).is_none());
        assert!(tree.position_of(foreign).is_none());
    }

    #[test]
    fn test_order_refreshes_after_insertion() {
        let mut tree = two_supplier_tree();
        assert_eq!(tree.document_order().len(), 3);

        let s1 = tree.find("Supplier1").unwrap();
        tree.add_market(s1, "Input1", MarketParameters::default())
            .unwrap();
        assert_eq!(
            names(&tree, tree.document_order()),
            ["Retail", "Supplier1", "Input1", "Supplier2"]
        );
        assert_eq!(tree.at_position(3).unwrap(), tree.find("Supplier2").unwrap());
    }

    #[test]
    fn test_wide_tree_builds_in_document_order() {
        let mut tree = MarketTree::new("M", MarketParameters::default());
        let mut frontier = vec![tree.root()];
        for _ in 0..4 {
            let mut next = Vec::new();
            for parent in frontier {
                for i in 0..10 {
                    next.push(
                        tree.add_market(parent, format!("m{}", i), MarketParameters::default())
                            .unwrap(),
                    );
                }
            }
            frontier = next;
        }
        assert_eq!(tree.len(), 11_111);
        let order = tree.document_order();
        assert_eq!(order.len(), 11_111);
        assert_eq!(order[0], tree.root());
        // The first leaf is reached by always taking the first child.
        assert_eq!(tree[order[4]].depth(), 5);
        assert!(tree[order[4]].is_leaf());
    }

    #[test]
    fn test_position_of_matches_at_position() {
        let tree = nested_tree();
        for position in 0..tree.len() {
            let id = tree.at_position(position).unwrap();
            assert_eq!(tree.position_of(id), Some(position));
        }
    }

    #[test]
    fn test_set_exogenous_positions() {
        let mut tree = nested_tree();
        tree.set_variable_positions(&[1, 3, 4]).unwrap();
        tree.set_exogenous_positions(&[4]).unwrap();
        assert_eq!(
            names(&tree, &tree.variable_markets(false)),
            ["Supplier1", "Input1"]
        );
        assert!(tree[tree.find("Input2").unwrap()].is_exogenous());

        tree.set_exogenous_positions(&[1]).unwrap();
        assert!(!tree[tree.find("Input2").unwrap()].is_exogenous());
        assert_eq!(
            names(&tree, &tree.variable_markets(false)),
            ["Input1", "Input2"]
        );
        assert_eq!(
            tree.set_exogenous_positions(&[9]).unwrap_err(),
            ModelError::PositionOutOfRange {
                position: 9,
                len: 5
            }
        );
    }
}
