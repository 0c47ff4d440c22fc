//! Error types for lti_mpc

use thiserror::Error;

/// Main error type for the MPC engine
#[derive(Debug, Error)]
pub enum MpcError {
    /// Horizon lengths violate `1 <= Hu <= Hp`
    #[error("Invalid horizon: prediction={prediction}, control={control} (need 1 <= control <= prediction)")]
    InvalidHorizon { prediction: usize, control: usize },

    /// A lifted matrix would not fit into the configured maximum dimension
    #[error("Dimension exceeded: {name}={size} is larger than the maximum matrix dimension {max}")]
    DimensionExceeded {
        name: &'static str,
        size: usize,
        max: usize,
    },

    /// Weight is negative or not finite
    #[error("Invalid weight {name}: {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    /// Zero threshold is negative or not finite
    #[error("Invalid zero threshold: {value}")]
    InvalidThreshold { value: f64 },

    /// Runtime vector does not match the configured dimensions
    #[error("Dimension mismatch for {name}: expected {expected}, found {found}")]
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    /// Inversion hit a pivot below the zero threshold
    #[error("Numerical error: {0} is singular")]
    SingularMatrix(&'static str),

    /// QR decomposition produced a (numerically) zero diagonal in R
    #[error("Numerical error: {0} is rank deficient")]
    RankDeficient(&'static str),

    /// Controller lost its offline factorization and needs a reinit
    #[error("Controller is degraded, reinitialize with a different model or weights")]
    Degraded,

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Plot could not be rendered
    #[error("Visualization error: {0}")]
    Visualization(String),
}

impl MpcError {
    /// Structural errors are raised at configuration time and are fatal.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MpcError::InvalidHorizon { .. }
                | MpcError::DimensionExceeded { .. }
                | MpcError::InvalidWeight { .. }
                | MpcError::InvalidThreshold { .. }
        )
    }

    /// Numerical failures are handled with the zero-increment fail-safe.
    pub fn is_numerical(&self) -> bool {
        matches!(self, MpcError::SingularMatrix(_) | MpcError::RankDeficient(_))
    }
}

impl From<toml::de::Error> for MpcError {
    fn from(e: toml::de::Error) -> Self {
        MpcError::Config(e.to_string())
    }
}

/// Result type alias for MPC operations
pub type MpcResult<T> = Result<T, MpcError>;
