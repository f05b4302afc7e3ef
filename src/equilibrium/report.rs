use crate::core::solution::Solution;
use crate::equilibrium::residual::{aggregate, Aggregation};
use crate::model::tree::MarketTree;
use serde::{Deserialize, Serialize};

/// Evaluated state of one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub name: String,
    pub depth: usize,
    pub variable: bool,
    pub exogenous: bool,
    pub consumer_price: f64,
    pub producer_price: f64,
    pub market_share: f64,
    pub market_equilibrium: f64,
}

/// Snapshot of a tree after its final evaluation, in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumReport {
    /// Aggregated residual over the snapshot.
    pub objective: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
    pub markets: Vec<MarketSnapshot>,
}

impl EquilibriumReport {
    pub fn from_tree(tree: &MarketTree, aggregation: Aggregation) -> Self {
        let markets = tree
            .iter()
            .map(|m| MarketSnapshot {
                name: m.name().to_string(),
                depth: m.depth(),
                variable: m.is_variable(),
                exogenous: m.is_exogenous(),
                consumer_price: m.consumer_price(),
                producer_price: m.producer_price(),
                market_share: m.market_share(),
                market_equilibrium: m.market_equilibrium(),
            })
            .collect();
        EquilibriumReport {
            objective: aggregate(tree, aggregation),
            solution: None,
            markets,
        }
    }

    pub fn with_solution(mut self, solution: Solution) -> Self {
        self.solution = Some(solution);
        self
    }

    pub fn market(&self, name: &str) -> Option<&MarketSnapshot> {
        self.markets.iter().find(|m| m.name == name)
    }

    /// Largest absolute residual across all markets.
    pub fn max_residual(&self) -> f64 {
        self.markets
            .iter()
            .map(|m| m.market_equilibrium.abs())
            .fold(0.0, f64::max)
    }
}

impl std::fmt::Display for EquilibriumReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Equilibrium Report ===")?;
        writeln!(f, "Objective:    {:.6e}", self.objective)?;
        writeln!(f, "Max Residual: {:.6e}", self.max_residual())?;
        if let Some(solution) = &self.solution {
            writeln!(f, "Solution:     {}", solution)?;
        }

        writeln!(f, "\nMarkets:")?;
        for m in &self.markets {
            let marker = if m.exogenous {
                " (exogenous)"
            } else if m.variable {
                " (variable)"
            } else {
                ""
            };
            writeln!(
                f,
                "  {:indent$}{}{}: consumer {:.6}, producer {:.6}, share {:.4}, residual {:.3e}",
                "",
                m.name,
                marker,
                m.consumer_price,
                m.producer_price,
                m.market_share,
                m.market_equilibrium,
                indent = 2 * m.depth.saturating_sub(1),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equilibrium::objective::{EquilibriumObjective, EvaluationConfig};
    use crate::model::tree::tests::nested_tree;

    fn evaluated() -> EquilibriumObjective {
        let mut tree = nested_tree();
        tree.set_variables(&["Supplier1", "Input1", "Input2"]).unwrap();
        let mut objective = EquilibriumObjective::new(tree, EvaluationConfig::default()).unwrap();
        objective.evaluate(&[1.0, 1.0, 1.0]);
        objective
    }

    #[test]
    fn test_snapshot_in_document_order() {
        let objective = evaluated();
        let report = EquilibriumReport::from_tree(objective.tree(), Aggregation::SumOfSquares);
        let names: Vec<&str> = report.markets.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Retail", "Supplier1", "Supplier2", "Input1", "Input2"]);
        assert_eq!(report.market("Input1").unwrap().depth, 3);
        assert!(report.market("Input1").unwrap().variable);
        assert!(report.objective > 0.0);
        assert!(report.max_residual() > 0.0);
    }

    #[test]
    fn test_display() {
        let objective = evaluated();
        let report = EquilibriumReport::from_tree(objective.tree(), Aggregation::SumOfSquares)
            .with_solution(Solution::new(0.5, vec![1.0, 1.0, 1.0]));
        let text = report.to_string();
        assert!(text.starts_with("=== Equilibrium Report ==="));
        assert!(text.contains("Solution:     [ 1, 1, 1 ] = 0.5"));
        assert!(text.contains("    Input1 (variable): consumer 1.000000"));
    }

    #[test]
    fn test_serializes_to_json() {
        let objective = evaluated();
        let report = EquilibriumReport::from_tree(objective.tree(), Aggregation::SumOfSquares);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["markets"][0]["name"], "Retail");
        assert!(json["markets"][1]["consumerPrice"].is_number());
        assert!(json.get("solution").is_none());
    }
}
