//! Strategic agent resolver.
//!
//! A strategic agent leans toward a fixed target while staying socially
//! plausible: its next opinion is a weighted combination of its neighbors'
//! opinions plus the target itself, where neighbors closer to the target weigh
//! more. `theta` sharpens the weighting.
//!
//! # Weighting
//! ```text
//! d_j      = max(‖x_j − target‖, 1e-10)          for each neighbor j
//! d_target = min_j d_j / 2                         (virtual neighbor)
//! w        = normalize(1 / d)  clamped to [0, 1]
//! w        = w ^ min(theta, 50)                    only when theta > 0
//! result   = normalize(w) · [x_neighbors; target]
//! ```

use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// Distance floor; prevents division by zero for neighbors sitting on the target.
pub const MIN_DISTANCE: f64 = 1e-10;

/// Cap on the sharpening exponent.
pub const MAX_THETA: f64 = 50.0;

/// Next opinion of a strategic agent.
///
/// # Arguments
/// * `edges` - The agent's adjacency row (1 = neighbor)
/// * `x` - Current opinion matrix
/// * `target` - The agent's steering target
/// * `theta` - Sharpening exponent
/// * `fallback` - Returned unchanged when the agent has no neighbors
///   (the mean opinion of the non-strategic population)
pub fn strategic_opinion(
    edges: &[u8],
    x: &DMatrix<f64>,
    target: &DVector<f64>,
    theta: f64,
    fallback: &DVector<f64>,
) -> DVector<f64> {
    let neighbors: Vec<usize> = edges
        .iter()
        .enumerate()
        .filter(|(_, &e)| e == 1)
        .map(|(j, _)| j)
        .collect();

    if neighbors.is_empty() {
        return fallback.clone();
    }

    let distances: Vec<f64> = neighbors
        .iter()
        .map(|&j| (x.row(j).transpose() - target).norm().max(MIN_DISTANCE))
        .collect();
    let closest = distances.iter().copied().fold(f64::INFINITY, f64::min);

    // The target is a virtual neighbor at half the closest real distance.
    // Weights are closeness (1/d), not raw distance: raw distance would hand
    // the largest share to the neighbor farthest from the target.
    let mut weights: Vec<f64> = distances
        .iter()
        .chain(std::iter::once(&(closest / 2.0)))
        .map(|d| 1.0 / d)
        .collect();

    if !normalize(&mut weights) {
        return target.clone();
    }
    for w in weights.iter_mut() {
        *w = w.clamp(0.0, 1.0);
    }

    if theta > 0.0 {
        let exponent = theta.min(MAX_THETA);
        for w in weights.iter_mut() {
            *w = w.powf(exponent);
        }
    } else {
        // Non-positive theta leaves the closeness weights unsharpened. Whether
        // it should instead invert or flatten the weighting is undecided.
        trace!(theta, "strategic theta <= 0, weights left unsharpened");
    }

    if !normalize(&mut weights) {
        return target.clone();
    }

    let (target_weight, neighbor_weights) = match weights.split_last() {
        Some(split) => split,
        None => return target.clone(),
    };

    let mut result = target * *target_weight;
    for (&j, &w) in neighbors.iter().zip(neighbor_weights) {
        result += x.row(j).transpose() * w;
    }
    result
}

/// Divides by the sum in place; false when the sum is zero or not finite.
fn normalize(weights: &mut [f64]) -> bool {
    let sum: f64 = weights.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return false;
    }
    for w in weights.iter_mut() {
        *w /= sum;
    }
    true
}
