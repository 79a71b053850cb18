//! Joint state encoding.
//!
//! A state is the pair of car counts `(a, b)` at the two depots, each in
//! `[0, capacity]`. For tensor indexing it is flattened to
//! `a * (capacity + 1) + b`, a bijection between pairs and
//! `0..(capacity + 1)^2`.

use ndarray::Array1;

/// Flat index of the joint state `(a, b)`.
pub fn state_index(a: usize, b: usize, capacity: usize) -> usize {
    debug_assert!(a <= capacity && b <= capacity);
    a * (capacity + 1) + b
}

/// Depot pair `(a, b)` for a flat state index.
pub fn state_pair(index: usize, capacity: usize) -> (usize, usize) {
    let block = capacity + 1;
    (index / block, index % block)
}

/// One-hot state-distribution vector concentrated on `(a, b)`.
pub fn state_vector(a: usize, b: usize, capacity: usize) -> Array1<f64> {
    let block = capacity + 1;
    let mut v = Array1::zeros(block * block);
    v[state_index(a, b, capacity)] = 1.0;
    v
}

/// Depot pair holding the most probability mass in a state distribution.
pub fn most_probable_state(dist: &Array1<f64>, capacity: usize) -> (usize, usize) {
    let mut best = 0;
    for (i, &p) in dist.iter().enumerate() {
        if p > dist[best] {
            best = i;
        }
    }
    state_pair(best, capacity)
}
