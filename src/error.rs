//! Errors in the library.

use thiserror::Error;

/// Errors raised during model construction and solving.
#[derive(Error, Debug)]
pub enum FleetError {
    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A transition matrix column does not sum to 1. Indicates a
    /// composition-order or truncation bug in model construction.
    #[error(
        "transition matrix for transfer {transfer} is not column-stochastic: \
         column {state} sums to {sum}"
    )]
    NotStochastic { transfer: i32, state: usize, sum: f64 },

    /// A fixed-point sweep loop hit its iteration cap before reaching the
    /// convergence threshold.
    #[error("no convergence after {sweeps} sweeps: delta {delta:e} above threshold {theta:e}")]
    NonConvergence { sweeps: usize, delta: f64, theta: f64 },

    /// Policy iteration kept producing a different policy at every
    /// improvement round up to the round cap.
    #[error("policy did not stabilize after {rounds} improvement rounds")]
    PolicyUnstable { rounds: usize },
}
