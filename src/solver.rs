//! Generic dynamic-programming solvers.
//!
//! Everything here consumes the [`Mdp`] interface only; no knowledge of
//! depots or transfers. Policies are row-stochastic matrices over
//! `(state, action)`, value functions are one scalar per state.
//!
//! The sweep loops default to asynchronous in-place updates: later
//! states within a sweep see already-updated values for earlier states
//! (Gauss-Seidel style). A synchronous double-buffered variant is
//! available through [`SolverOptions::sweep`]; both converge to the same
//! fixed point but along different trajectories.

use log::{debug, info};
use ndarray::{Array1, Array2};

use crate::error::FleetError;
use crate::mdp::Mdp;

/// Update order within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sweep {
    /// Update each state in place; later states in the same sweep see
    /// the new values of earlier states.
    #[default]
    InPlace,
    /// Compute the whole sweep from the previous iterate.
    DoubleBuffered,
}

/// Knobs shared by the iterative solvers.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub sweep: Sweep,
    /// Cap on evaluation/value-iteration sweeps and on improvement
    /// rounds. Exceeding it surfaces a convergence error instead of
    /// looping forever.
    pub max_sweeps: usize,
    /// When set, policy iteration stops once consecutive policies agree
    /// entry-wise within this tolerance. When unset, the policies must
    /// be exactly identical.
    pub stability_tol: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            sweep: Sweep::InPlace,
            max_sweeps: 10_000,
            stability_tol: None,
        }
    }
}

/// Action values for one state under a value function:
/// `q(a) = sum_next P(next | s, a) * (R(s, a) + gamma * V(next))`.
pub fn q_from_v(mdp: &Mdp, v: &Array1<f64>, state: usize, gamma: f64) -> Array1<f64> {
    let mut q = Array1::zeros(mdp.n_actions());
    for action in 0..mdp.n_actions() {
        let reward = mdp.reward(state, action);
        let mut total = 0.0;
        for next in 0..mdp.n_states() {
            total += mdp.prob(next, state, action) * (reward + gamma * v[next]);
        }
        q[action] = total;
    }
    q
}

fn max_q(q: &Array1<f64>) -> f64 {
    q.fold(f64::NEG_INFINITY, |best, &value| best.max(value))
}

fn expected_update(
    mdp: &Mdp,
    v: &Array1<f64>,
    policy: &Array2<f64>,
    state: usize,
    gamma: f64,
) -> f64 {
    policy.row(state).dot(&q_from_v(mdp, v, state, gamma))
}

/// Iterative solve of the Bellman expectation equation for a fixed
/// policy. Returns `V` once the largest per-state change in a sweep
/// drops to `theta` or below.
pub fn policy_evaluation(
    mdp: &Mdp,
    policy: &Array2<f64>,
    gamma: f64,
    theta: f64,
    opts: &SolverOptions,
) -> Result<Array1<f64>, FleetError> {
    let mut v = Array1::zeros(mdp.n_states());
    let mut delta = f64::INFINITY;
    for sweep in 0..opts.max_sweeps {
        delta = match opts.sweep {
            Sweep::InPlace => {
                let mut delta = 0.0f64;
                for state in 0..mdp.n_states() {
                    let updated = expected_update(mdp, &v, policy, state, gamma);
                    delta = delta.max((v[state] - updated).abs());
                    v[state] = updated;
                }
                delta
            }
            Sweep::DoubleBuffered => {
                let previous = v.clone();
                for state in 0..mdp.n_states() {
                    v[state] = expected_update(mdp, &previous, policy, state, gamma);
                }
                (&v - &previous).fold(0.0f64, |best, d| best.max(d.abs()))
            }
        };
        debug!("evaluation sweep {sweep}: delta {delta:e}");
        if delta <= theta {
            return Ok(v);
        }
    }
    Err(FleetError::NonConvergence {
        sweeps: opts.max_sweeps,
        delta,
        theta,
    })
}

/// Greedy policy for a value function. Every action attaining the row
/// maximum of `q` gets equal probability; ties are spread uniformly, not
/// broken arbitrarily.
pub fn policy_improvement(mdp: &Mdp, v: &Array1<f64>, gamma: f64) -> Array2<f64> {
    let mut policy = Array2::zeros((mdp.n_states(), mdp.n_actions()));
    for state in 0..mdp.n_states() {
        let q = q_from_v(mdp, v, state, gamma);
        let best = max_q(&q);
        let maximizers: Vec<usize> = q
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value == best)
            .map(|(action, _)| action)
            .collect();
        let share = 1.0 / maximizers.len() as f64;
        for action in maximizers {
            policy[[state, action]] = share;
        }
    }
    policy
}

fn policy_stable(current: &Array2<f64>, improved: &Array2<f64>, tol: Option<f64>) -> bool {
    match tol {
        None => current == improved,
        Some(tol) => current
            .iter()
            .zip(improved.iter())
            .all(|(a, b)| (a - b).abs() <= tol),
    }
}

/// Alternate evaluation and improvement from the uniform policy until
/// the improved policy stops changing.
pub fn policy_iteration(
    mdp: &Mdp,
    gamma: f64,
    theta: f64,
    opts: &SolverOptions,
) -> Result<(Array2<f64>, Array1<f64>), FleetError> {
    let uniform = 1.0 / mdp.n_actions() as f64;
    let mut policy = Array2::from_elem((mdp.n_states(), mdp.n_actions()), uniform);
    for round in 0..opts.max_sweeps {
        let v = policy_evaluation(mdp, &policy, gamma, theta, opts)?;
        let improved = policy_improvement(mdp, &v, gamma);
        if policy_stable(&policy, &improved, opts.stability_tol) {
            info!("policy stable after {} improvement rounds", round + 1);
            return Ok((improved, v));
        }
        policy = improved;
    }
    Err(FleetError::PolicyUnstable {
        rounds: opts.max_sweeps,
    })
}

/// Repeated Bellman-optimality sweeps `V(s) <- max_a q(s, a)`; the
/// greedy policy is extracted once the value function has converged.
pub fn value_iteration(
    mdp: &Mdp,
    gamma: f64,
    theta: f64,
    opts: &SolverOptions,
) -> Result<(Array2<f64>, Array1<f64>), FleetError> {
    let mut v = Array1::zeros(mdp.n_states());
    let mut delta = f64::INFINITY;
    for sweep in 0..opts.max_sweeps {
        delta = match opts.sweep {
            Sweep::InPlace => {
                let mut delta = 0.0f64;
                for state in 0..mdp.n_states() {
                    let best = max_q(&q_from_v(mdp, &v, state, gamma));
                    delta = delta.max((v[state] - best).abs());
                    v[state] = best;
                }
                delta
            }
            Sweep::DoubleBuffered => {
                let previous = v.clone();
                for state in 0..mdp.n_states() {
                    v[state] = max_q(&q_from_v(mdp, &previous, state, gamma));
                }
                (&v - &previous).fold(0.0f64, |best, d| best.max(d.abs()))
            }
        };
        debug!("value iteration sweep {sweep}: delta {delta:e}");
        if delta <= theta {
            info!("value iteration converged after {} sweeps", sweep + 1);
            return Ok((policy_improvement(mdp, &v, gamma), v));
        }
    }
    Err(FleetError::NonConvergence {
        sweeps: opts.max_sweeps,
        delta,
        theta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;
    use crate::transition::action_index;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    const GAMMA: f64 = 0.9;
    const THETA: f64 = 1e-8;

    // Asymmetric rates keep the greedy maximizer unique at every state,
    // so the tie-break convention never enters the cross-method checks.
    fn toy_config() -> FleetConfig {
        FleetConfig {
            capacity: 2,
            transfer_max: 1,
            demand_rate_a: 1.0,
            demand_rate_b: 1.5,
            return_rate_a: 1.0,
            return_rate_b: 0.5,
            ..FleetConfig::default()
        }
    }

    fn toy_mdp() -> Mdp {
        Mdp::from_config(&toy_config()).unwrap()
    }

    /// Solve `m x = b` by Gaussian elimination with partial pivoting.
    fn solve_linear(mut m: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
        let n = b.len();
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&i, &j| m[i][col].abs().partial_cmp(&m[j][col].abs()).unwrap())
                .unwrap();
            m.swap(col, pivot);
            b.swap(col, pivot);
            for row in (col + 1)..n {
                let factor = m[row][col] / m[col][col];
                for k in col..n {
                    m[row][k] -= factor * m[col][k];
                }
                b[row] -= factor * b[col];
            }
        }
        let mut x = vec![0.0; n];
        for row in (0..n).rev() {
            let tail: f64 = ((row + 1)..n).map(|k| m[row][k] * x[k]).sum();
            x[row] = (b[row] - tail) / m[row][row];
        }
        x
    }

    #[test]
    fn evaluation_matches_direct_linear_solve() {
        // Arrange: the never-transfer policy on a symmetric toy model.
        let config = FleetConfig {
            capacity: 2,
            transfer_max: 1,
            demand_rate_a: 1.0,
            demand_rate_b: 1.0,
            return_rate_a: 1.0,
            return_rate_b: 1.0,
            ..FleetConfig::default()
        };
        let mdp = Mdp::from_config(&config).unwrap();
        let idle = action_index(0, config.transfer_max);
        let mut policy = Array2::zeros((mdp.n_states(), mdp.n_actions()));
        for state in 0..mdp.n_states() {
            policy[[state, idle]] = 1.0;
        }

        // Act
        let v = policy_evaluation(&mdp, &policy, GAMMA, THETA, &SolverOptions::default()).unwrap();

        // Assert against (I - gamma * P) v = r solved directly.
        let n = mdp.n_states();
        let mut m = vec![vec![0.0; n]; n];
        let mut b = vec![0.0; n];
        for state in 0..n {
            b[state] = mdp.reward(state, idle);
            for next in 0..n {
                m[state][next] = -GAMMA * mdp.prob(next, state, idle);
            }
            m[state][state] += 1.0;
        }
        let exact = solve_linear(m, b);
        for state in 0..n {
            assert_abs_diff_eq!(v[state], exact[state], epsilon = 1e-6);
        }
    }

    #[test]
    fn value_iteration_fixed_point_satisfies_bellman_optimality() {
        let mdp = toy_mdp();
        let (_, v) = value_iteration(&mdp, GAMMA, THETA, &SolverOptions::default()).unwrap();
        for state in 0..mdp.n_states() {
            let q = q_from_v(&mdp, &v, state, GAMMA);
            assert_abs_diff_eq!(max_q(&q), v[state], epsilon = THETA * 10.0);
        }
    }

    #[test]
    fn value_iteration_is_deterministic() {
        let mdp = toy_mdp();
        let opts = SolverOptions::default();
        let (policy_1, v_1) = value_iteration(&mdp, GAMMA, THETA, &opts).unwrap();
        let (policy_2, v_2) = value_iteration(&mdp, GAMMA, THETA, &opts).unwrap();
        assert_eq!(policy_1, policy_2);
        assert_eq!(v_1, v_2);
    }

    #[test]
    fn policy_iteration_agrees_with_value_iteration() {
        let mdp = toy_mdp();
        let opts = SolverOptions::default();
        let (pi_policy, pi_v) = policy_iteration(&mdp, GAMMA, THETA, &opts).unwrap();
        let (vi_policy, vi_v) = value_iteration(&mdp, GAMMA, THETA, &opts).unwrap();
        for state in 0..mdp.n_states() {
            assert_abs_diff_eq!(pi_v[state], vi_v[state], epsilon = 1e-5);
            // Same greedy action sets, allowing the uniform tie-break.
            for action in 0..mdp.n_actions() {
                let pi_greedy = pi_policy[[state, action]] > 0.0;
                let vi_greedy = vi_policy[[state, action]] > 0.0;
                assert_eq!(pi_greedy, vi_greedy);
            }
        }
    }

    #[test]
    fn sweep_variants_agree_at_the_fixed_point() {
        let mdp = toy_mdp();
        let in_place = SolverOptions::default();
        let buffered = SolverOptions {
            sweep: Sweep::DoubleBuffered,
            ..SolverOptions::default()
        };
        let (_, v_in_place) = value_iteration(&mdp, GAMMA, THETA, &in_place).unwrap();
        let (_, v_buffered) = value_iteration(&mdp, GAMMA, THETA, &buffered).unwrap();
        for state in 0..mdp.n_states() {
            assert_abs_diff_eq!(v_in_place[state], v_buffered[state], epsilon = 1e-6);
        }
    }

    #[test]
    fn improved_policies_are_row_stochastic() {
        let mdp = toy_mdp();
        let (policy, _) = policy_iteration(&mdp, GAMMA, THETA, &SolverOptions::default()).unwrap();
        for state in 0..mdp.n_states() {
            assert_abs_diff_eq!(policy.row(state).sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn ties_are_spread_uniformly() {
        // Two indistinguishable actions on a single self-looping state.
        let mut transition = Array3::zeros((1, 1, 2));
        transition[[0, 0, 0]] = 1.0;
        transition[[0, 0, 1]] = 1.0;
        let reward = Array2::zeros((1, 2));
        let mdp = Mdp::new(transition, reward).unwrap();

        let policy = policy_improvement(&mdp, &Array1::zeros(1), GAMMA);
        assert_eq!(policy[[0, 0]], 0.5);
        assert_eq!(policy[[0, 1]], 0.5);
    }

    #[test]
    fn sweep_cap_surfaces_non_convergence() {
        let mdp = toy_mdp();
        let opts = SolverOptions {
            max_sweeps: 2,
            ..SolverOptions::default()
        };
        let result = value_iteration(&mdp, GAMMA, THETA, &opts);
        assert!(matches!(
            result,
            Err(FleetError::NonConvergence { sweeps: 2, .. })
        ));
    }

    #[test]
    fn tolerant_stability_check_matches_exact_default() {
        let mdp = toy_mdp();
        let opts = SolverOptions {
            stability_tol: Some(1e-12),
            ..SolverOptions::default()
        };
        let (policy, v) = policy_iteration(&mdp, GAMMA, THETA, &opts).unwrap();
        let (exact_policy, exact_v) =
            policy_iteration(&mdp, GAMMA, THETA, &SolverOptions::default()).unwrap();
        assert_eq!(policy, exact_policy);
        for state in 0..mdp.n_states() {
            assert_abs_diff_eq!(v[state], exact_v[state], epsilon = 1e-8);
        }
    }
}
