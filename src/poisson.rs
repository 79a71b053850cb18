//! Truncated Poisson probabilities.
//!
//! Both the transition operators and the reward model are built from the
//! same bounded probability vector: the Poisson pmf up to a bound, with
//! all mass at or beyond the bound folded into the last bucket. Keeping
//! this in one place keeps the two tensors consistent with each other.

use ndarray::Array1;
use statrs::distribution::{Discrete, DiscreteCDF, Poisson};

use crate::error::FleetError;

/// Probability vector `p[0..=bound]` for a Poisson count with the upper
/// tail folded into the last bucket.
///
/// `p[i] = Pr(X = i)` for `i < bound` and `p[bound] = Pr(X >= bound)`,
/// so the vector sums to 1 exactly (within 1e-12). A `bound` of 0 yields
/// the point mass `[1.0]`.
pub fn truncated_pmf(rate: f64, bound: usize) -> Result<Array1<f64>, FleetError> {
    let dist = Poisson::new(rate).map_err(|_| {
        FleetError::InvalidConfig(format!("Poisson rate must be positive and finite, got {rate}"))
    })?;
    let mut pmf = Array1::zeros(bound + 1);
    for i in 0..bound {
        pmf[i] = dist.pmf(i as u64);
    }
    // Using 1 - CDF for the folded bucket ensures the vector sums to 1.
    pmf[bound] = if bound == 0 {
        1.0
    } else {
        1.0 - dist.cdf(bound as u64 - 1)
    };
    Ok(pmf)
}
