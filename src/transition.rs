//! Transition model construction.
//!
//! All operators are to-from matrices: `T[to, from]` is the probability
//! of ending a step in `to` given it started in `from`, so every column
//! sums to 1 and applying an operator to a state-distribution vector is
//! a left multiplication. A day decomposes into three steps in temporal
//! order (nightly transfer, then rental demand, then returns), which as
//! matrix products compose in the reverse order:
//! `P(a) = returns . demand . transfer(a)`.

use log::debug;
use ndarray::{s, Array2, Array3};

use crate::config::FleetConfig;
use crate::error::FleetError;
use crate::poisson::truncated_pmf;
use crate::state::state_index;

/// Tolerance for the column-stochasticity check on the composed tensor.
pub const COLUMN_SUM_TOL: f64 = 1e-8;

/// Net transfer encoded by an action index, in `[-transfer_max, transfer_max]`.
pub fn action_transfer(index: usize, transfer_max: usize) -> i32 {
    index as i32 - transfer_max as i32
}

/// Action index for a net transfer.
pub fn action_index(transfer: i32, transfer_max: usize) -> usize {
    debug_assert!(transfer.unsigned_abs() as usize <= transfer_max);
    (transfer + transfer_max as i32) as usize
}

/// Cars actually moved overnight: the requested net transfer clipped to
/// the source depot's inventory. Positive means A to B.
pub(crate) fn realized_transfer(a_cars: usize, b_cars: usize, transfer: i32) -> i32 {
    if transfer > 0 {
        transfer.min(a_cars as i32)
    } else {
        transfer.max(-(b_cars as i32))
    }
}

pub(crate) fn clamp_level(level: i32, capacity: usize) -> usize {
    level.clamp(0, capacity as i32) as usize
}

/// Demand operator for one depot.
///
/// From a depot holding `from` cars, a demand draw `d` leaves
/// `from - min(d, from)` cars: the mass of all draws at or above `from`
/// folds into the sold-out outcome `to = 0`.
pub fn demand_operator(rate: f64, capacity: usize) -> Result<Array2<f64>, FleetError> {
    let dim = capacity + 1;
    let mut op = Array2::zeros((dim, dim));
    for from in 0..dim {
        let pmf = truncated_pmf(rate, from)?;
        for d in 0..=from {
            op[[from - d, from]] = pmf[d];
        }
    }
    Ok(op)
}

/// Return operator for one depot, the mirror construction at the
/// capacity boundary: returns beyond `capacity - from` fold into the
/// full outcome `to = capacity`.
pub fn return_operator(rate: f64, capacity: usize) -> Result<Array2<f64>, FleetError> {
    let dim = capacity + 1;
    let mut op = Array2::zeros((dim, dim));
    for from in 0..dim {
        let room = capacity - from;
        let pmf = truncated_pmf(rate, room)?;
        for r in 0..=room {
            op[[from + r, from]] = pmf[r];
        }
    }
    Ok(op)
}

/// Embed a per-depot operator so it acts on depot A (the high digit of
/// the joint index) and leaves depot B untouched.
fn embed_depot_a(op: &Array2<f64>, capacity: usize) -> Array2<f64> {
    let block = capacity + 1;
    let n = block * block;
    let mut joint = Array2::zeros((n, n));
    for i in 0..block {
        joint.slice_mut(s![i..n;block, i..n;block]).assign(op);
    }
    joint
}

/// Embed a per-depot operator so it acts on depot B (the low digit of
/// the joint index) and leaves depot A untouched.
fn embed_depot_b(op: &Array2<f64>, capacity: usize) -> Array2<f64> {
    let block = capacity + 1;
    let n = block * block;
    let mut joint = Array2::zeros((n, n));
    for i in 0..block {
        let start = i * block;
        joint
            .slice_mut(s![start..start + block, start..start + block])
            .assign(op);
    }
    joint
}

/// Deterministic nightly-transfer operator for one action: a 0/1 matrix
/// mapping each pre-transfer state to its single post-transfer state.
pub fn transfer_operator(transfer: i32, capacity: usize) -> Array2<f64> {
    let block = capacity + 1;
    let n = block * block;
    let mut op = Array2::zeros((n, n));
    for a in 0..block {
        for b in 0..block {
            let moved = realized_transfer(a, b, transfer);
            let next_a = clamp_level(a as i32 - moved, capacity);
            let next_b = clamp_level(b as i32 + moved, capacity);
            op[[
                state_index(next_a, next_b, capacity),
                state_index(a, b, capacity),
            ]] = 1.0;
        }
    }
    op
}

fn check_column_stochastic(slice: &Array2<f64>, transfer: i32) -> Result<(), FleetError> {
    for (state, column) in slice.columns().into_iter().enumerate() {
        let sum = column.sum();
        if (sum - 1.0).abs() > COLUMN_SUM_TOL {
            return Err(FleetError::NotStochastic { transfer, state, sum });
        }
    }
    Ok(())
}

/// The full one-step transition tensor `P[next, state, action]`.
pub struct TransitionModel {
    tensor: Array3<f64>,
}

impl TransitionModel {
    /// Compose the per-depot stochastic operators and the per-action
    /// transfer operators into the full tensor.
    ///
    /// Fails if any composed column does not sum to 1 within
    /// [`COLUMN_SUM_TOL`]; that invariant is checked, not assumed, as it
    /// is the primary correctness check for the whole construction.
    pub fn build(config: &FleetConfig) -> Result<TransitionModel, FleetError> {
        config.validate()?;
        let k = config.capacity;

        let demand_a = embed_depot_a(&demand_operator(config.demand_rate_a, k)?, k);
        let demand_b = embed_depot_b(&demand_operator(config.demand_rate_b, k)?, k);
        // The two embeddings touch disjoint coordinates, so the product
        // order does not matter here.
        let demand = demand_a.dot(&demand_b);

        let return_a = embed_depot_a(&return_operator(config.return_rate_a, k)?, k);
        let return_b = embed_depot_b(&return_operator(config.return_rate_b, k)?, k);
        let returns = return_b.dot(&return_a);

        // Demand is drawn from the day's starting inventory, returns land
        // afterwards.
        let day = returns.dot(&demand);

        let n = config.n_states();
        let mut tensor = Array3::zeros((n, n, config.n_actions()));
        for index in 0..config.n_actions() {
            let transfer = action_transfer(index, config.transfer_max);
            let slice = day.dot(&transfer_operator(transfer, k));
            check_column_stochastic(&slice, transfer)?;
            tensor.slice_mut(s![.., .., index]).assign(&slice);
            debug!("built transition slice for transfer {transfer}");
        }
        Ok(TransitionModel { tensor })
    }

    /// `P(next | state, action)`.
    pub fn prob(&self, next: usize, state: usize, action: usize) -> f64 {
        self.tensor[[next, state, action]]
    }

    pub fn tensor(&self) -> &Array3<f64> {
        &self.tensor
    }

    pub fn into_tensor(self) -> Array3<f64> {
        self.tensor
    }
}
