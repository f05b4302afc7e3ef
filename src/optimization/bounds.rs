use crate::core::error::OptimizationError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A search box `[lower, upper]`, uniform across dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Result<Self, OptimizationError> {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(OptimizationError::InvalidBounds { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn range(&self) -> f64 {
        self.upper - self.lower
    }

    /// False for values outside the box and for `NaN`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Draw one coordinate uniformly from `[lower, upper)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.lower + self.range() * rng.gen::<f64>()
    }

    pub fn sample_vector<R: Rng + ?Sized>(&self, rng: &mut R, dimensions: usize) -> Vec<f64> {
        (0..dimensions).map(|_| self.sample(rng)).collect()
    }

    /// Clamp every coordinate onto the box. Returns whether any moved.
    pub fn clamp(&self, vector: &mut [f64]) -> bool {
        let mut clamped = false;
        for x in vector.iter_mut() {
            if *x > self.upper {
                *x = self.upper;
                clamped = true;
            } else if !(*x >= self.lower) {
                *x = self.lower;
                clamped = true;
            }
        }
        clamped
    }

    /// Bring every out-of-box coordinate back inside under `policy`.
    /// Returns whether any coordinate was out of bounds.
    pub fn enforce<R: Rng + ?Sized>(
        &self,
        policy: BoundsPolicy,
        vector: &mut [f64],
        rng: &mut R,
    ) -> bool {
        let mut enforced = false;
        for x in vector.iter_mut() {
            if self.contains(*x) {
                continue;
            }
            enforced = true;
            *x = match policy {
                BoundsPolicy::Clamp { epsilon } => {
                    if *x > self.upper {
                        self.upper - epsilon * self.range()
                    } else {
                        self.lower + epsilon * self.range()
                    }
                }
                BoundsPolicy::Resample => self.sample(rng),
            };
        }
        enforced
    }
}

/// What happens to a trial coordinate that leaves the search box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Pull back to `bound ∓ epsilon · range`, just inside the violated bound.
    Clamp { epsilon: f64 },
    /// Replace with a uniform draw from the box.
    Resample,
}

impl Default for BoundsPolicy {
    fn default() -> Self {
        BoundsPolicy::Clamp { epsilon: 1e-6 }
    }
}

impl BoundsPolicy {
    pub(crate) fn validate(&self) -> Result<(), OptimizationError> {
        match *self {
            BoundsPolicy::Clamp { epsilon } if !(0.0..=0.5).contains(&epsilon) => {
                Err(OptimizationError::InvalidParameter {
                    name: "epsilon",
                    value: epsilon,
                })
            }
            _ => Ok(()),
        }
    }
}
