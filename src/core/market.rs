use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a market inside the [`MarketTree`](crate::model::tree::MarketTree) arena.
///
/// Ids are only meaningful for the tree that issued them. They are stable
/// for the lifetime of that tree since markets are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the market in the arena (insertion order).
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Economic parameters of a market, supplied once when the model is built.
///
/// Field names follow the column headers of the parameter tables used to
/// describe models: `ElasticityOfSubstitution, ElasticityOfSupply,
/// ElasticityOfDemand, InitialPrice, InitialMarketShare, Shock`.
///
/// # Examples
///
/// ```
/// use partial_equilibrium::core::market::MarketParameters;
///
/// let supplier = MarketParameters::default().with_shock(0.05);
/// assert_eq!(supplier.elasticity_of_substitution, 4.0);
/// assert_eq!(supplier.shock, 0.05);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketParameters {
    /// CES curvature (σ) among this market's sub-markets. Must not be 1
    /// for a market with sub-markets.
    pub elasticity_of_substitution: f64,
    /// Exponent applied to the producer price in the residual.
    pub elasticity_of_supply: f64,
    /// Added to σ in the exponent applied to the price index in the residual.
    pub elasticity_of_demand: f64,
    /// Baseline price.
    pub initial_price: f64,
    /// Baseline expenditure share among siblings.
    pub initial_market_share: f64,
    /// Fractional tariff wedge between consumer and producer price.
    #[serde(default, alias = "tariff")]
    pub shock: f64,
}

impl MarketParameters {
    pub fn new(
        elasticity_of_substitution: f64,
        elasticity_of_supply: f64,
        elasticity_of_demand: f64,
        initial_price: f64,
        initial_market_share: f64,
        shock: f64,
    ) -> Self {
        Self {
            elasticity_of_substitution,
            elasticity_of_supply,
            elasticity_of_demand,
            initial_price,
            initial_market_share,
            shock,
        }
    }

    pub fn with_initial_market_share(mut self, share: f64) -> Self {
        self.initial_market_share = share;
        self
    }

    pub fn with_initial_price(mut self, price: f64) -> Self {
        self.initial_price = price;
        self
    }

    pub fn with_shock(mut self, shock: f64) -> Self {
        self.shock = shock;
        self
    }

    pub fn with_elasticities(mut self, substitution: f64, supply: f64, demand: f64) -> Self {
        self.elasticity_of_substitution = substitution;
        self.elasticity_of_supply = supply;
        self.elasticity_of_demand = demand;
        self
    }

    /// Returns the name of the first non-finite parameter, if any.
    pub(crate) fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        [
            ("elasticityOfSubstitution", self.elasticity_of_substitution),
            ("elasticityOfSupply", self.elasticity_of_supply),
            ("elasticityOfDemand", self.elasticity_of_demand),
            ("initialPrice", self.initial_price),
            ("initialMarketShare", self.initial_market_share),
            ("shock", self.shock),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    }
}

impl Default for MarketParameters {
    /// σ = 4, supply elasticity 5, demand elasticity −1, unit price, full share, no shock.
    fn default() -> Self {
        Self::new(4.0, 5.0, -1.0, 1.0, 1.0, 0.0)
    }
}

/// One market in the nesting hierarchy.
///
/// Holds the immutable [`MarketParameters`] plus the transient state that
/// every evaluation pass rewrites: consumer price, producer price, market
/// share and the equilibrium residual.
///
/// Children are owned by the tree; `parent` is a plain index used only for
/// upward lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketNode {
    name: String,
    parameters: MarketParameters,
    pub(crate) consumer_price: f64,
    pub(crate) producer_price: f64,
    pub(crate) market_share: f64,
    pub(crate) market_equilibrium: f64,
    pub(crate) is_variable: bool,
    pub(crate) is_exogenous: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) depth: usize,
}

impl MarketNode {
    pub(crate) fn new(
        name: impl Into<String>,
        parameters: MarketParameters,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            consumer_price: parameters.initial_price,
            producer_price: parameters.initial_price,
            market_share: parameters.initial_market_share,
            market_equilibrium: 0.0,
            is_variable: false,
            is_exogenous: false,
            parent,
            children: Vec::new(),
            depth,
        }
    }

    /// Replace the parameters and reset derived state to the new baseline.
    pub(crate) fn redefine(&mut self, parameters: MarketParameters) {
        self.parameters = parameters;
        self.reset();
    }

    /// Restore transient state to the baseline implied by the parameters.
    pub(crate) fn reset(&mut self) {
        self.consumer_price = self.parameters.initial_price;
        self.producer_price = self.parameters.initial_price;
        self.market_share = self.parameters.initial_market_share;
        self.market_equilibrium = 0.0;
    }

    // --- Accessors ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &MarketParameters {
        &self.parameters
    }

    pub fn elasticity_of_substitution(&self) -> f64 {
        self.parameters.elasticity_of_substitution
    }

    pub fn elasticity_of_supply(&self) -> f64 {
        self.parameters.elasticity_of_supply
    }

    pub fn elasticity_of_demand(&self) -> f64 {
        self.parameters.elasticity_of_demand
    }

    pub fn initial_price(&self) -> f64 {
        self.parameters.initial_price
    }

    pub fn initial_market_share(&self) -> f64 {
        self.parameters.initial_market_share
    }

    pub fn shock(&self) -> f64 {
        self.parameters.shock
    }

    /// Price paid by the immediate downstream buyer.
    pub fn consumer_price(&self) -> f64 {
        self.consumer_price
    }

    /// Consumer price net of the tariff: `consumer_price / (1 + shock)`.
    pub fn producer_price(&self) -> f64 {
        self.producer_price
    }

    /// Current expenditure share among siblings.
    pub fn market_share(&self) -> f64 {
        self.market_share
    }

    /// Residual of the market-clearing condition; zero at equilibrium.
    pub fn market_equilibrium(&self) -> f64 {
        self.market_equilibrium
    }

    pub fn is_variable(&self) -> bool {
        self.is_variable
    }

    pub fn is_exogenous(&self) -> bool {
        self.is_exogenous
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of markets from the root to this market, inclusive (root = 1).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// CES expenditure term `initialMarketShare · consumerPrice^(1 − σ)`.
    pub fn expenditure(&self) -> f64 {
        self.initial_market_share()
            * self
                .consumer_price
                .powf(1.0 - self.elasticity_of_substitution())
    }
}

impl fmt::Display for MarketNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
