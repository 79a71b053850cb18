//! Problem configuration.
//!
//! All model parameters live in [`FleetConfig`]. The defaults are the
//! canonical two-depot rental problem: Poisson demand rates (3, 4) and
//! return rates (3, 2), capacity 20 per depot, at most 5 cars moved per
//! night, $10 income per rental, $2 per car moved.

use serde::Deserialize;

use crate::error::FleetError;

/// Parameters of the two-depot rebalancing problem.
///
/// Deserializable from a TOML file; every field falls back to its
/// default when omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Maximum number of cars that can be held at either depot.
    pub capacity: usize,
    /// Maximum number of cars that can be moved overnight.
    pub transfer_max: usize,
    /// Expected daily rental demand at depot A.
    pub demand_rate_a: f64,
    /// Expected daily rental demand at depot B.
    pub demand_rate_b: f64,
    /// Expected daily returns at depot A.
    pub return_rate_a: f64,
    /// Expected daily returns at depot B.
    pub return_rate_b: f64,
    /// Income per car rented out.
    pub rental_income: f64,
    /// Cost per car in the requested nightly transfer.
    pub transfer_cost: f64,
    /// Discount factor.
    pub gamma: f64,
    /// Convergence threshold for the solver sweeps.
    pub theta: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        FleetConfig {
            capacity: 20,
            transfer_max: 5,
            demand_rate_a: 3.0,
            demand_rate_b: 4.0,
            return_rate_a: 3.0,
            return_rate_b: 2.0,
            rental_income: 10.0,
            transfer_cost: 2.0,
            gamma: 0.9,
            theta: 1e-8,
        }
    }
}

impl FleetConfig {
    /// Number of joint states, `(capacity + 1)^2`.
    pub fn n_states(&self) -> usize {
        (self.capacity + 1) * (self.capacity + 1)
    }

    /// Number of actions, one per net transfer in `[-transfer_max, transfer_max]`.
    pub fn n_actions(&self) -> usize {
        2 * self.transfer_max + 1
    }

    /// Reject configurations the model cannot be built from.
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.capacity == 0 {
            return Err(FleetError::InvalidConfig(
                "capacity must be at least 1".into(),
            ));
        }
        if self.transfer_max == 0 {
            return Err(FleetError::InvalidConfig(
                "transfer_max must be at least 1".into(),
            ));
        }
        for (name, rate) in [
            ("demand_rate_a", self.demand_rate_a),
            ("demand_rate_b", self.demand_rate_b),
            ("return_rate_a", self.return_rate_a),
            ("return_rate_b", self.return_rate_b),
        ] {
            if !(rate > 0.0) || !rate.is_finite() {
                return Err(FleetError::InvalidConfig(format!(
                    "{name} must be a positive finite rate, got {rate}"
                )));
            }
        }
        if self.rental_income < 0.0 {
            return Err(FleetError::InvalidConfig(format!(
                "rental_income must be non-negative, got {}",
                self.rental_income
            )));
        }
        if self.transfer_cost < 0.0 {
            return Err(FleetError::InvalidConfig(format!(
                "transfer_cost must be non-negative, got {}",
                self.transfer_cost
            )));
        }
        if !(self.gamma >= 0.0 && self.gamma < 1.0) {
            return Err(FleetError::InvalidConfig(format!(
                "gamma must be in [0, 1), got {}",
                self.gamma
            )));
        }
        if !(self.theta > 0.0) {
            return Err(FleetError::InvalidConfig(format!(
                "theta must be positive, got {}",
                self.theta
            )));
        }
        Ok(())
    }
}
