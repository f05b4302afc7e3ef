use thiserror::Error;

/// Errors raised while building, validating or mutating a market tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model contains no markets")]
    Empty,
    #[error("no market named '{0}' in the model")]
    UnknownMarket(String),
    #[error("market position {position} is out of range for a model with {len} markets")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("market '{market}' aggregates sub-markets with an elasticity of substitution of 1")]
    NumericSingularity { market: String },
    #[error("expected {expected} prices for the variable markets, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("expected {expected} parameter rows (one per market), got {actual}")]
    ParameterCount { expected: usize, actual: usize },
    #[error("market '{market}' has invalid {name} = {value}")]
    InvalidParameter {
        market: String,
        name: &'static str,
        value: f64,
    },
}

/// Errors raised when an optimizer is configured.
///
/// All of these are detected at construction, before the objective is
/// evaluated even once.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizationError {
    #[error("invalid search bounds: lower {lower} must be finite and not exceed upper {upper}")]
    InvalidBounds { lower: f64, upper: f64 },
    #[error("search space must have at least one dimension")]
    NoDimensions,
    #[error("iteration budget must be at least 1")]
    NoIterations,
    #[error("simplex needs at least {required} solutions, got {solutions}")]
    TooFewSolutions { solutions: usize, required: usize },
    #[error("swarm needs at least one particle")]
    TooFewParticles,
    #[error("restart count must be at least 1")]
    NoRestarts,
    #[error("invalid optimizer parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Crate-level error used by loaders and the command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Optimization(#[from] OptimizationError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model file: {0}")]
    Json(#[from] serde_json::Error),
}
