//! Error types shared by the numerical core.

use thiserror::Error;

/// Result type for the simulation core.
pub type PgResult<T> = Result<T, PgError>;

/// Errors raised while setting up or querying the simulation core.
///
/// Both variants are setup failures: once a [`Simulation`](crate::sim::Simulation)
/// has been built, sampling and reconstruction do not fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PgError {
    /// Lookup requested outside the tabulated depth range.
    #[error("depth {depth} mm is outside the tabulated range [{min}, {max}] mm")]
    Domain { depth: f64, min: f64, max: f64 },

    /// Invalid or inconsistent configuration / input table.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PgError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Returns a configuration error unless `cond` holds.
macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::PgError::Configuration(format!($($arg)+)));
        }
    };
}

pub(crate) use ensure_config;
