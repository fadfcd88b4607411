//! Connectivity builder.
//!
//! Produces the symmetric 0/1 adjacency matrix (zero diagonal) from the current
//! opinions. The graph is rebuilt from scratch after every update, so social
//! structure follows opinion clusters as they form.

use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::ops::Range;

use crate::config::ConnectivityStrategy;
use crate::error::NetworkError;
use crate::roles::RoleLayout;
use crate::similarity::{opinion_distance, row_scaled, similarity_matrix};

/// Strategy parameters resolved into ready-to-sample form.
#[derive(Debug, Clone)]
enum Plan {
    Hybrid {
        max_distance: f64,
        similarity_ratio: f64,
        degree_dist: Normal<f64>,
    },
    Threshold(f64),
    RandomWithFloor {
        edge_probability: f64,
        min_degree: usize,
        user_hub_degree: Option<usize>,
    },
    Sampled {
        theta: f64,
        min_prob: f64,
    },
}

/// Prepared connectivity strategy.
///
/// Validation and distribution setup happen once in [`ConnectivityBuilder::new`],
/// so rebuilding the graph each step cannot fail.
#[derive(Debug, Clone)]
pub struct ConnectivityBuilder {
    strategy: ConnectivityStrategy,
    plan: Plan,
    users: Range<usize>,
}

impl ConnectivityBuilder {
    pub fn new(strategy: ConnectivityStrategy, roles: RoleLayout) -> Result<Self, NetworkError> {
        strategy.validate(&roles)?;

        let plan = match strategy {
            ConnectivityStrategy::Hybrid {
                max_distance,
                similarity_ratio,
                mean_degree,
                std_degree,
            } => Plan::Hybrid {
                max_distance,
                similarity_ratio,
                degree_dist: Normal::new(mean_degree, std_degree).map_err(|e| {
                    NetworkError::config(format!("invalid degree distribution: {}", e))
                })?,
            },
            ConnectivityStrategy::SimilarityThreshold { threshold } => Plan::Threshold(threshold),
            ConnectivityStrategy::RandomWithFloor {
                edge_probability,
                min_degree,
                user_hub_degree,
            } => Plan::RandomWithFloor {
                edge_probability,
                min_degree,
                user_hub_degree,
            },
            ConnectivityStrategy::SimilaritySampled { theta, min_prob } => {
                Plan::Sampled { theta, min_prob }
            }
        };

        Ok(Self {
            strategy,
            plan,
            users: roles.user_range(),
        })
    }

    pub fn strategy(&self) -> &ConnectivityStrategy {
        &self.strategy
    }

    /// Builds a fresh adjacency matrix for the opinions `x`.
    pub fn build<R: Rng + ?Sized>(&self, x: &DMatrix<f64>, rng: &mut R) -> DMatrix<u8> {
        match &self.plan {
            Plan::Hybrid {
                max_distance,
                similarity_ratio,
                degree_dist,
            } => hybrid(x, *max_distance, *similarity_ratio, degree_dist, rng),
            Plan::Threshold(threshold) => similarity_threshold(x, *threshold),
            Plan::RandomWithFloor {
                edge_probability,
                min_degree,
                user_hub_degree,
            } => random_with_floor(
                x.nrows(),
                *edge_probability,
                *min_degree,
                *user_hub_degree,
                self.users.clone(),
                rng,
            ),
            Plan::Sampled { theta, min_prob } => similarity_sampled(x, *theta, *min_prob, rng),
        }
    }
}

fn connect(a: &mut DMatrix<u8>, i: usize, j: usize) {
    if i != j {
        a[(i, j)] = 1;
        a[(j, i)] = 1;
    }
}

fn degree(a: &DMatrix<u8>, i: usize) -> usize {
    a.row(i).iter().filter(|&&v| v != 0).count()
}

/// Similarity-biased plus random edges with a normally distributed degree.
pub fn hybrid<R: Rng + ?Sized>(
    x: &DMatrix<f64>,
    max_distance: f64,
    similarity_ratio: f64,
    degree_dist: &Normal<f64>,
    rng: &mut R,
) -> DMatrix<u8> {
    let n = x.nrows();
    let mut a = DMatrix::zeros(n, n);
    if n < 2 {
        return a;
    }

    for i in 0..n {
        let target = degree_dist.sample(rng).clamp(0.0, (n - 1) as f64) as usize;
        if target == 0 {
            continue;
        }

        // Closest opinions first; ties keep index order.
        let mut by_distance: Vec<(usize, f64)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, opinion_distance(x, i, j)))
            .collect();
        by_distance.sort_by(|l, r| l.1.total_cmp(&r.1));

        let num_similar = (target as f64 * similarity_ratio) as usize;
        let num_random = target - num_similar;

        let similar: Vec<usize> = by_distance
            .iter()
            .filter(|(_, d)| *d <= max_distance)
            .map(|(j, _)| *j)
            .take(num_similar)
            .collect();

        let remaining: Vec<usize> = by_distance
            .iter()
            .map(|(j, _)| *j)
            .filter(|j| !similar.contains(j))
            .collect();

        for &j in &similar {
            connect(&mut a, i, j);
        }
        for &j in remaining.choose_multiple(rng, num_random.min(remaining.len())) {
            connect(&mut a, i, j);
        }
    }

    a
}

/// Edge between every pair whose opinion distance is at most `threshold`.
pub fn similarity_threshold(x: &DMatrix<f64>, threshold: f64) -> DMatrix<u8> {
    let n = x.nrows();
    let mut a = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            if opinion_distance(x, i, j) <= threshold {
                connect(&mut a, i, j);
            }
        }
    }
    a
}

/// Bernoulli graph with an optional user hub and a minimum-degree floor.
pub fn random_with_floor<R: Rng + ?Sized>(
    n: usize,
    edge_probability: f64,
    min_degree: usize,
    user_hub_degree: Option<usize>,
    users: Range<usize>,
    rng: &mut R,
) -> DMatrix<u8> {
    let mut a = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            if rng.gen::<f64>() < edge_probability {
                connect(&mut a, i, j);
            }
        }
    }

    let hub_users = if user_hub_degree.is_some() { users } else { 0..0 };

    if let Some(hub_degree) = user_hub_degree {
        for u in hub_users.clone() {
            for j in 0..n {
                a[(u, j)] = 0;
                a[(j, u)] = 0;
            }
            let candidates: Vec<usize> = (0..n).filter(|j| !hub_users.contains(j)).collect();
            for &j in candidates.choose_multiple(rng, hub_degree.min(candidates.len())) {
                connect(&mut a, u, j);
            }
        }
    }

    for i in (0..n).filter(|i| !hub_users.contains(i)) {
        let current = degree(&a, i);
        if current >= min_degree {
            continue;
        }
        let available: Vec<usize> = (0..n)
            .filter(|&j| j != i && a[(i, j)] == 0 && !hub_users.contains(&j))
            .collect();
        let needed = (min_degree - current).min(available.len());
        for &j in available.choose_multiple(rng, needed) {
            connect(&mut a, i, j);
        }
    }

    a
}

/// Edges sampled with probability `max(row_scaled(S)^theta, min_prob)`.
pub fn similarity_sampled<R: Rng + ?Sized>(
    x: &DMatrix<f64>,
    theta: f64,
    min_prob: f64,
    rng: &mut R,
) -> DMatrix<u8> {
    let n = x.nrows();
    let s_hat = row_scaled(&similarity_matrix(x)).map(|v| v.powf(theta).max(min_prob));

    let mut a = DMatrix::zeros(n, n);
    // Only the strictly lower triangle is sampled; symmetry comes from connect().
    for i in 0..n {
        for j in 0..i {
            if s_hat[(i, j)] - rng.gen::<f64>() > 0.0 {
                connect(&mut a, i, j);
            }
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn assert_valid_adjacency(a: &DMatrix<u8>) {
        assert_eq!(a, &a.transpose(), "adjacency must be symmetric");
        for i in 0..a.nrows() {
            assert_eq!(a[(i, i)], 0, "no self-loops");
            for j in 0..a.ncols() {
                assert!(a[(i, j)] <= 1);
            }
        }
    }

    fn random_opinions(n: usize, k: usize, seed: u64) -> DMatrix<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        DMatrix::from_fn(n, k, |_, _| rng.gen::<f64>())
    }

    #[test]
    fn test_threshold_connects_close_pairs_only() {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 0.1, 0.5, 0.55]);
        let a = similarity_threshold(&x, 0.15);
        assert_valid_adjacency(&a);
        assert_eq!(a[(0, 1)], 1);
        assert_eq!(a[(2, 3)], 1);
        assert_eq!(a[(1, 2)], 0);
        assert_eq!(a[(0, 3)], 0);
    }

    #[test]
    fn test_hybrid_degree_bounded() {
        let x = random_opinions(30, 2, 7);
        let roles = RoleLayout::new(30, 0, 0).unwrap();
        let builder = ConnectivityBuilder::new(ConnectivityStrategy::hybrid(), roles).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let a = builder.build(&x, &mut rng);
        assert_valid_adjacency(&a);
        let total: usize = (0..30).map(|i| degree(&a, i)).sum();
        assert!(total > 0);
    }

    #[test]
    fn test_hybrid_single_agent() {
        let x = DMatrix::from_element(1, 1, 0.5);
        let normal = Normal::new(8.0, 3.0).unwrap();
        let a = hybrid(&x, 0.3, 0.2, &normal, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(a, DMatrix::zeros(1, 1));
    }

    #[test]
    fn test_hybrid_similarity_edges_prefer_close_agents() {
        // With ratio 1 every edge is a similarity edge.
        let x = DMatrix::from_row_slice(5, 1, &[0.0, 0.05, 0.9, 0.95, 1.0]);
        let normal = Normal::new(1.0, 0.0).unwrap();
        let a = hybrid(&x, 0.3, 1.0, &normal, &mut ChaCha8Rng::seed_from_u64(9));
        assert_valid_adjacency(&a);
        assert_eq!(a[(0, 1)], 1);
        assert_eq!(a[(0, 2)], 0);
        assert_eq!(a[(0, 4)], 0);
    }

    #[test]
    fn test_random_with_floor_min_degree() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let a = random_with_floor(20, 0.0, 3, None, 0..0, &mut rng);
        assert_valid_adjacency(&a);
        for i in 0..20 {
            assert!(degree(&a, i) >= 3);
        }
    }

    #[test]
    fn test_random_with_floor_user_hub() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a = random_with_floor(21, 0.1, 2, Some(5), 0..1, &mut rng);
        assert_valid_adjacency(&a);
        assert_eq!(degree(&a, 0), 5);
        for i in 1..21 {
            assert!(degree(&a, i) >= 2);
        }
    }

    #[test]
    fn test_random_with_floor_small_population() {
        // Floor larger than the population: every agent connects to all others.
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let a = random_with_floor(3, 0.0, 5, None, 0..0, &mut rng);
        for i in 0..3 {
            assert_eq!(degree(&a, i), 2);
        }
    }

    #[test]
    fn test_sampled_min_prob_one_is_complete() {
        let x = random_opinions(6, 1, 4);
        let a = similarity_sampled(&x, 1.0, 1.0, &mut ChaCha8Rng::seed_from_u64(0));
        assert_valid_adjacency(&a);
        for i in 0..6 {
            assert_eq!(degree(&a, i), 5);
        }
    }

    #[test]
    fn test_builder_is_deterministic_for_seed() {
        let x = random_opinions(15, 3, 21);
        let roles = RoleLayout::new(15, 0, 0).unwrap();
        let builder = ConnectivityBuilder::new(ConnectivityStrategy::hybrid(), roles).unwrap();

        let a1 = builder.build(&x, &mut ChaCha8Rng::seed_from_u64(42));
        let a2 = builder.build(&x, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a1, a2);
    }

    proptest! {
        #[test]
        fn prop_every_strategy_symmetric(seed in any::<u64>(), n in 1usize..16) {
            let x = random_opinions(n, 2, seed);
            let roles = RoleLayout::new(n, usize::from(n > 1), 0).unwrap();
            let strategies = vec![
                ConnectivityStrategy::hybrid(),
                ConnectivityStrategy::threshold(0.4),
                ConnectivityStrategy::RandomWithFloor {
                    edge_probability: 0.2,
                    min_degree: 2,
                    user_hub_degree: Some(1.min(n - 1)),
                },
                ConnectivityStrategy::sampled(1.0, 0.01),
            ];

            for strategy in strategies {
                let builder = ConnectivityBuilder::new(strategy, roles).unwrap();
                let a = builder.build(&x, &mut ChaCha8Rng::seed_from_u64(seed));
                prop_assert_eq!(&a, &a.transpose());
                for i in 0..n {
                    prop_assert_eq!(a[(i, i)], 0);
                }
            }
        }
    }
}
