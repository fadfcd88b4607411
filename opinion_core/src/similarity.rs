//! Distance and similarity transforms.
//!
//! Turns the opinion matrix X (agents × axes) into:
//! - the pairwise Euclidean distance matrix D,
//! - its row-normalized form D_norm,
//! - the similarity matrix S = r(1 − (I + D_norm)),
//! - the per-row relative ranking used to sharpen similarity contrasts.
//!
//! ```text
//! X ──► D ──► D_norm ──► 1 − (I + D_norm) ──► S
//!                                             │
//!                                             └──► row_scaled(S)
//! ```

use nalgebra::DMatrix;

/// Additive guard in every row-normalization denominator.
pub const EPSILON: f64 = 1e-10;

/// Euclidean distance between the opinion vectors of agents `i` and `j`.
pub fn opinion_distance(x: &DMatrix<f64>, i: usize, j: usize) -> f64 {
    (x.row(i) - x.row(j)).norm()
}

/// Pairwise distance matrix D (symmetric, zero diagonal).
pub fn pairwise_distances(x: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    DMatrix::from_fn(n, n, |i, j| if i == j { 0.0 } else { opinion_distance(x, i, j) })
}

/// Divides every entry by its row sum plus [`EPSILON`].
///
/// An all-zero row stays all-zero instead of producing NaN.
pub fn row_normalize(m: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = m.clone();
    for i in 0..m.nrows() {
        let denom = m.row(i).sum() + EPSILON;
        for j in 0..m.ncols() {
            out[(i, j)] = m[(i, j)] / denom;
        }
    }
    out
}

/// Row-normalized distance matrix D_norm.
pub fn normalized_distances(x: &DMatrix<f64>) -> DMatrix<f64> {
    row_normalize(&pairwise_distances(x))
}

/// Similarity matrix S = r(1 − (I + D_norm)).
///
/// The identity removes the diagonal's contribution, so S[i][i] comes out as
/// zero for ordinary inputs, but callers must not rely on it.
///
/// Rows sum to 1 only when `1 − (I + D_norm)` has a row sum well above
/// [`EPSILON`], which holds from three agents on. With exactly two
/// agents at distance d > 0 that row sum is about ε/d, the ε guard dominates and
/// each S row sums to 1/(1 + d). [`influence_matrix`](crate::weights::influence_matrix)
/// puts the missing mass back on the diagonal, so W stays row-stochastic; with
/// α = 1 the two agents jump past each other every step.
pub fn similarity_matrix(x: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let d_norm = normalized_distances(x);
    let closeness = DMatrix::from_fn(n, n, |i, j| {
        let identity = if i == j { 1.0 } else { 0.0 };
        1.0 - (identity + d_norm[(i, j)])
    });
    row_normalize(&closeness)
}

/// Per-row min/max scaling over off-diagonal entries.
///
/// Off-diagonal entries map to `(v - min) / (max - min)`; a constant row uses a
/// divisor of 1 and collapses to zero. The diagonal is forced to 0.
pub fn row_scaled(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    let mut out = DMatrix::zeros(n, m.ncols());

    for i in 0..n {
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for j in (0..m.ncols()).filter(|&j| j != i) {
            min = min.min(m[(i, j)]);
            max = max.max(m[(i, j)]);
        }
        if !min.is_finite() {
            // No off-diagonal entries in this row.
            continue;
        }

        let diff = max - min;
        let divisor = if diff == 0.0 { 1.0 } else { diff };
        for j in (0..m.ncols()).filter(|&j| j != i) {
            out[(i, j)] = (m[(i, j)] - min) / divisor;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::influence_matrix;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn three_agents() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 1, &[0.0, 0.5, 1.0])
    }

    #[test]
    fn test_pairwise_distances_symmetric() {
        let d = pairwise_distances(&three_agents());
        assert_eq!(d, d.transpose());
        assert_relative_eq!(d[(0, 2)], 1.0);
        assert_relative_eq!(d[(0, 1)], 0.5);
        for i in 0..3 {
            assert_eq!(d[(i, i)], 0.0);
        }
    }

    #[test]
    fn test_euclidean_not_l1() {
        let x = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.3, 0.4]);
        assert_relative_eq!(opinion_distance(&x, 0, 1), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_normalized_distances_row_stochastic() {
        let d_norm = normalized_distances(&three_agents());
        for i in 0..3 {
            assert_relative_eq!(d_norm.row(i).sum(), 1.0, epsilon = 1e-9);
        }
        assert_relative_eq!(d_norm[(0, 1)], 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(d_norm[(1, 0)], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_similarity_three_agents() {
        let s = similarity_matrix(&three_agents());
        for i in 0..3 {
            assert_relative_eq!(s.row(i).sum(), 1.0, epsilon = 1e-9);
        }
        // Closer agents are more similar.
        assert!(s[(0, 1)] > s[(0, 2)]);
        assert_relative_eq!(s[(0, 1)], 2.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(s[(1, 0)], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_row_normalize_zero_row_stays_zero() {
        let m = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 3.0]);
        let r = row_normalize(&m);
        assert_eq!(r[(0, 0)], 0.0);
        assert_eq!(r[(0, 1)], 0.0);
        assert_relative_eq!(r[(1, 1)], 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_identical_opinions_give_uniform_similarity() {
        let x = DMatrix::from_element(4, 2, 0.3);
        let s = similarity_matrix(&x);
        for i in 0..4 {
            assert_relative_eq!(s.row(i).sum(), 1.0, epsilon = 1e-9);
            for j in 0..4 {
                if i != j {
                    assert_relative_eq!(s[(i, j)], 1.0 / 3.0, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_row_scaled_ranges_and_diagonal() {
        let m = DMatrix::from_row_slice(3, 3, &[
            9.0, 0.2, 0.6,
            0.1, 9.0, 0.1,
            0.5, 0.3, 9.0,
        ]);
        let scaled = row_scaled(&m);

        for i in 0..3 {
            assert_eq!(scaled[(i, i)], 0.0);
        }
        assert_relative_eq!(scaled[(0, 1)], 0.0);
        assert_relative_eq!(scaled[(0, 2)], 1.0);
        // Constant row collapses to zero.
        assert_eq!(scaled[(1, 0)], 0.0);
        assert_eq!(scaled[(1, 2)], 0.0);
    }

    #[test]
    fn test_row_scaled_single_agent() {
        let m = DMatrix::from_element(1, 1, 0.7);
        assert_eq!(row_scaled(&m)[(0, 0)], 0.0);
    }

    #[test]
    fn test_two_agents_rows_fall_short_of_one() {
        let x = DMatrix::from_row_slice(2, 1, &[0.2, 0.7]);
        let s = similarity_matrix(&x);

        // d = 0.5, each row sums to 1 / (1 + d)
        for i in 0..2 {
            assert_eq!(s[(i, i)], 0.0);
            assert_relative_eq!(s.row(i).sum(), 2.0 / 3.0, epsilon = 1e-9);
        }

        let w = influence_matrix(&s, &DMatrix::from_row_slice(2, 2, &[0, 1, 1, 0]));
        for i in 0..2 {
            assert_relative_eq!(w.row(i).sum(), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(w[(0, 0)], 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(w[(0, 1)], 2.0 / 3.0, epsilon = 1e-9);

        // With alpha = 1 the pair crosses over.
        let next = &w * &x;
        assert_relative_eq!(next[(0, 0)], 0.2 / 3.0 + 1.4 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(next[(1, 0)], 0.4 / 3.0 + 0.7 / 3.0, epsilon = 1e-9);
        assert!(next[(0, 0)] > next[(1, 0)]);
    }

    proptest! {
        #[test]
        fn prop_similarity_rows_sum_to_one(
            values in prop::collection::vec(0.0f64..=1.0, 12)
        ) {
            // 6 agents, 2 axes
            let x = DMatrix::from_row_slice(6, 2, &values);
            let s = similarity_matrix(&x);
            for i in 0..6 {
                prop_assert!((s.row(i).sum() - 1.0).abs() < 1e-9);
                for j in 0..6 {
                    prop_assert!(s[(i, j)] >= 0.0);
                }
            }
        }

        #[test]
        fn prop_row_scaled_in_unit_interval(
            values in prop::collection::vec(0.0f64..=1.0, 25)
        ) {
            let m = DMatrix::from_row_slice(5, 5, &values);
            let scaled = row_scaled(&m);
            for v in scaled.iter() {
                prop_assert!((0.0..=1.0 + 1e-12).contains(v));
            }
        }
    }
}
