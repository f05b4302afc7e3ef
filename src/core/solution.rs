use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An objective value paired with the argument vector that produced it.
///
/// Solutions are ordered by value, ascending. Non-finite values (`NaN`,
/// `±Infinity`) rank after every finite value so that a numerically broken
/// trial point can never displace a finite one.
///
/// # Examples
///
/// ```
/// use partial_equilibrium::core::solution::Solution;
///
/// let good = Solution::new(0.5, vec![1.0, 2.0]);
/// let broken = Solution::new(f64::NAN, vec![0.0, 0.0]);
/// assert!(good < broken);
/// assert_eq!(good.to_string(), "[ 1, 2 ] = 0.5");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    value: f64,
    vector: Vec<f64>,
}

impl Solution {
    pub fn new(value: f64, vector: Vec<f64>) -> Self {
        Self { value, vector }
    }

    /// Evaluate `objective` at `vector` and wrap the result.
    pub fn evaluate<F>(objective: &mut F, vector: Vec<f64>) -> Self
    where
        F: FnMut(&[f64]) -> f64,
    {
        let value = objective(&vector);
        Self { value, vector }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn vector(&self) -> &[f64] {
        &self.vector
    }

    pub fn into_vector(self) -> Vec<f64> {
        self.vector
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// True when the value is finite and may be accepted as a best.
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }

    /// The value used for ranking: non-finite values map to `+Infinity`.
    pub fn score(&self) -> f64 {
        if self.value.is_finite() {
            self.value
        } else {
            f64::INFINITY
        }
    }

    /// Strictly better than `other` under the ranking order.
    pub fn is_better_than(&self, other: &Solution) -> bool {
        self.score() < other.score()
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Solution {}

impl PartialOrd for Solution {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Solution {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score().total_cmp(&other.score())
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.vector.iter().map(|v| v.to_string()).collect();
        write!(f, "[ {} ] = {}", values.join(", "), self.value)
    }
}
