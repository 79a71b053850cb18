//! Expected-reward model.
//!
//! `R[state, action]` is the expected immediate reward, not a sampled
//! one: income on the expected number of satisfied rentals at both
//! depots after the nightly transfer, minus the transfer cost. The cost
//! is charged on the requested net transfer even when fewer cars can
//! actually move.

use ndarray::Array2;

use crate::config::FleetConfig;
use crate::error::FleetError;
use crate::poisson::truncated_pmf;
use crate::state::state_index;
use crate::transition::{action_transfer, clamp_level, realized_transfer};

/// Expected number of rentals served by a depot holding `on_hand` cars.
///
/// Demand at or beyond `on_hand` rents out the whole depot, so this is
/// the mean of the demand distribution folded at `on_hand`, the same
/// truncation the demand transition operator uses.
pub fn expected_satisfied_demand(rate: f64, on_hand: usize) -> Result<f64, FleetError> {
    let pmf = truncated_pmf(rate, on_hand)?;
    Ok(pmf
        .iter()
        .enumerate()
        .map(|(rented, p)| rented as f64 * p)
        .sum())
}

/// The expected-reward tensor `R[state, action]`.
pub struct RewardModel {
    tensor: Array2<f64>,
}

impl RewardModel {
    pub fn build(config: &FleetConfig) -> Result<RewardModel, FleetError> {
        config.validate()?;
        let k = config.capacity;

        // Expected satisfied demand per post-transfer inventory level.
        let mut satisfied_a = Vec::with_capacity(k + 1);
        let mut satisfied_b = Vec::with_capacity(k + 1);
        for level in 0..=k {
            satisfied_a.push(expected_satisfied_demand(config.demand_rate_a, level)?);
            satisfied_b.push(expected_satisfied_demand(config.demand_rate_b, level)?);
        }

        let mut tensor = Array2::zeros((config.n_states(), config.n_actions()));
        for a in 0..=k {
            for b in 0..=k {
                let state = state_index(a, b, k);
                for index in 0..config.n_actions() {
                    let transfer = action_transfer(index, config.transfer_max);
                    let moved = realized_transfer(a, b, transfer);
                    let post_a = clamp_level(a as i32 - moved, k);
                    let post_b = clamp_level(b as i32 + moved, k);
                    tensor[[state, index]] = (satisfied_a[post_a] + satisfied_b[post_b])
                        * config.rental_income
                        - f64::from(transfer.abs()) * config.transfer_cost;
                }
            }
        }
        Ok(RewardModel { tensor })
    }

    /// `R(state, action)`.
    pub fn reward(&self, state: usize, action: usize) -> f64 {
        self.tensor[[state, action]]
    }

    pub fn tensor(&self) -> &Array2<f64> {
        &self.tensor
    }

    pub fn into_tensor(self) -> Array2<f64> {
        self.tensor
    }
}
