use crate::core::error::Error;
use crate::equilibrium::objective::EvaluationConfig;
use crate::model::structure::MarketDefinition;
use crate::optimization::Method;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A complete solve request: the market model plus how to evaluate and
/// solve it.
///
/// ```json
/// {
///   "model": { "name": "Retail", "...": "..." },
///   "evaluation": { "aggregation": { "kind": "sum_of_squares" } },
///   "solver": { "method": "simplex", "lowerBound": 0.0, "upperBound": 5.0, "iterations": 2000 },
///   "restarts": 4
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub model: MarketDefinition,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<Method>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarts: Option<usize>,
}

impl ModelFile {
    pub fn new(model: MarketDefinition) -> Self {
        Self {
            model,
            evaluation: EvaluationConfig::default(),
            solver: None,
            restarts: None,
        }
    }

    pub fn with_solver(mut self, solver: Method) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
