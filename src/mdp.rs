//! The assembled Markov decision process.
//!
//! A passive, immutable aggregate of the transition and reward tensors.
//! The solvers consume only this interface and know nothing about
//! depots or transfers.

use ndarray::{Array1, Array2, Array3};

use crate::config::FleetConfig;
use crate::error::FleetError;
use crate::reward::RewardModel;
use crate::transition::TransitionModel;

/// One row of the per-(state, action) outcome list handed to an
/// environment wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub prob: f64,
    pub next_state: usize,
    pub reward: f64,
    /// Always false: the process is continuing, not episodic.
    pub done: bool,
}

/// A finite MDP: state and action counts, `P[next, state, action]`,
/// `R[state, action]`, and an initial-state distribution.
pub struct Mdp {
    n_states: usize,
    n_actions: usize,
    transition: Array3<f64>,
    reward: Array2<f64>,
    initial_dist: Array1<f64>,
}

impl Mdp {
    /// Build the MDP for a depot configuration.
    pub fn from_config(config: &FleetConfig) -> Result<Mdp, FleetError> {
        config.validate()?;
        let transition = TransitionModel::build(config)?;
        let reward = RewardModel::build(config)?;
        Mdp::new(transition.into_tensor(), reward.into_tensor())
    }

    /// Wrap raw tensors. The initial-state distribution is uniform; the
    /// solvers never read it, it exists for episode-resetting wrappers.
    pub fn new(transition: Array3<f64>, reward: Array2<f64>) -> Result<Mdp, FleetError> {
        let (next, n_states, n_actions) = transition.dim();
        if next != n_states {
            return Err(FleetError::InvalidConfig(format!(
                "transition tensor must be square over states, got {next}x{n_states}"
            )));
        }
        if reward.dim() != (n_states, n_actions) {
            return Err(FleetError::InvalidConfig(format!(
                "reward tensor shape {:?} does not match transition tensor ({n_states} states, {n_actions} actions)",
                reward.dim()
            )));
        }
        let initial_dist = Array1::from_elem(n_states, 1.0 / n_states as f64);
        Ok(Mdp {
            n_states,
            n_actions,
            transition,
            reward,
            initial_dist,
        })
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// `P(next | state, action)`.
    pub fn prob(&self, next: usize, state: usize, action: usize) -> f64 {
        self.transition[[next, state, action]]
    }

    /// `R(state, action)`.
    pub fn reward(&self, state: usize, action: usize) -> f64 {
        self.reward[[state, action]]
    }

    /// Ordered outcome list for `(state, action)`, one row per next
    /// state.
    pub fn transitions(&self, state: usize, action: usize) -> Vec<Transition> {
        let reward = self.reward(state, action);
        (0..self.n_states)
            .map(|next_state| Transition {
                prob: self.prob(next_state, state, action),
                next_state,
                reward,
                done: false,
            })
            .collect()
    }

    pub fn transition_tensor(&self) -> &Array3<f64> {
        &self.transition
    }

    pub fn reward_tensor(&self) -> &Array2<f64> {
        &self.reward
    }

    pub fn initial_dist(&self) -> &Array1<f64> {
        &self.initial_dist
    }
}
