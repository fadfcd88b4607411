//! Role partitions over agent indices.
//!
//! ```text
//! index:  0 ........ n_user ................ n_agents - n_strategic ..... n_agents
//!         [  users  )[        regular        )[        strategic         )
//! ```
//!
//! All role-dependent slicing goes through the explicit ranges returned here.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::NetworkError;

/// Role of a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Opinion supplied externally and pinned every step
    User,
    /// Ordinary agent driven by propagation
    Regular,
    /// Agent steered toward a fixed target
    Strategic,
}

/// Fixed assignment of roles to contiguous index ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLayout {
    n_agents: usize,
    n_user: usize,
    n_strategic: usize,
}

impl RoleLayout {
    /// Creates a layout, rejecting role counts that exceed the population.
    pub fn new(n_agents: usize, n_user: usize, n_strategic: usize) -> Result<Self, NetworkError> {
        if n_user + n_strategic > n_agents {
            return Err(NetworkError::config(format!(
                "{} user + {} strategic agents exceed population of {}",
                n_user, n_strategic, n_agents
            )));
        }
        Ok(Self { n_agents, n_user, n_strategic })
    }

    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    pub fn n_user(&self) -> usize {
        self.n_user
    }

    pub fn n_strategic(&self) -> usize {
        self.n_strategic
    }

    /// Indices of user agents: `[0, n_user)`.
    pub fn user_range(&self) -> Range<usize> {
        0..self.n_user
    }

    /// Indices of strategic agents: `[n_agents - n_strategic, n_agents)`.
    pub fn strategic_range(&self) -> Range<usize> {
        self.n_agents - self.n_strategic..self.n_agents
    }

    /// Indices of regular agents, between the two privileged ranges.
    pub fn regular_range(&self) -> Range<usize> {
        self.n_user..self.n_agents - self.n_strategic
    }

    pub fn role_of(&self, index: usize) -> AgentRole {
        if self.user_range().contains(&index) {
            AgentRole::User
        } else if self.strategic_range().contains(&index) {
            AgentRole::Strategic
        } else {
            AgentRole::Regular
        }
    }

    pub fn is_user(&self, index: usize) -> bool {
        self.user_range().contains(&index)
    }

    pub fn is_strategic(&self, index: usize) -> bool {
        self.strategic_range().contains(&index)
    }
}

/// Copies row `k` of `source` into row `rows.start + k` of `target`.
pub fn overwrite_rows(target: &mut DMatrix<f64>, rows: Range<usize>, source: &DMatrix<f64>) {
    debug_assert_eq!(rows.len(), source.nrows());
    for (offset, row) in rows.enumerate() {
        target.row_mut(row).copy_from(&source.row(offset));
    }
}

/// Applies `f(index, offset)` to every index of `rows`, where `offset` counts from 0.
pub fn for_each_in_range<F>(rows: Range<usize>, mut f: F)
where
    F: FnMut(usize, usize),
{
    for (offset, index) in rows.enumerate() {
        f(index, offset);
    }
}

/// Zeroes both the rows and the columns of `rows` in an adjacency matrix.
pub fn isolate_rows(adjacency: &mut DMatrix<u8>, rows: Range<usize>) {
    let n = adjacency.nrows();
    for i in rows {
        for j in 0..n {
            adjacency[(i, j)] = 0;
            adjacency[(j, i)] = 0;
        }
    }
}

/// Mean opinion of every agent outside `excluded`.
///
/// Falls back to the mean over all agents when nothing remains.
pub fn mean_excluding(x: &DMatrix<f64>, excluded: Range<usize>) -> DVector<f64> {
    let mut sum = DVector::zeros(x.ncols());
    let mut count = 0usize;
    for i in (0..x.nrows()).filter(|i| !excluded.contains(i)) {
        sum += x.row(i).transpose();
        count += 1;
    }

    if count == 0 {
        return x.row_mean().transpose();
    }
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout_ranges() {
        let roles = RoleLayout::new(10, 2, 3).unwrap();
        assert_eq!(roles.user_range(), 0..2);
        assert_eq!(roles.regular_range(), 2..7);
        assert_eq!(roles.strategic_range(), 7..10);
        assert_eq!(roles.role_of(0), AgentRole::User);
        assert_eq!(roles.role_of(5), AgentRole::Regular);
        assert_eq!(roles.role_of(9), AgentRole::Strategic);
    }

    #[test]
    fn test_layout_rejects_overflow() {
        let err = RoleLayout::new(4, 3, 2).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_layout_all_privileged() {
        let roles = RoleLayout::new(3, 1, 2).unwrap();
        assert!(roles.regular_range().is_empty());
        assert!(roles.is_user(0));
        assert!(roles.is_strategic(1));
    }

    #[test]
    fn test_overwrite_rows() {
        let mut x = DMatrix::from_element(4, 2, 0.0);
        let src = DMatrix::from_row_slice(2, 2, &[0.1, 0.2, 0.3, 0.4]);
        overwrite_rows(&mut x, 2..4, &src);
        assert_eq!(x[(2, 1)], 0.2);
        assert_eq!(x[(3, 0)], 0.3);
        assert_eq!(x[(0, 0)], 0.0);
    }

    #[test]
    fn test_isolate_rows_keeps_symmetry() {
        let mut a = DMatrix::from_fn(4, 4, |i, j| if i == j { 0u8 } else { 1u8 });
        isolate_rows(&mut a, 0..1);
        assert_eq!(a, a.transpose());
        assert_eq!(a.row(0).iter().map(|&v| v as u32).sum::<u32>(), 0);
        assert_eq!(a[(1, 2)], 1);
    }

    #[test]
    fn test_mean_excluding() {
        let x = DMatrix::from_row_slice(4, 1, &[0.0, 0.2, 0.4, 1.0]);
        let mean = mean_excluding(&x, 3..4);
        assert_relative_eq!(mean[0], 0.2, epsilon = 1e-12);

        let all = mean_excluding(&x, 0..4);
        assert_relative_eq!(all[0], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_for_each_in_range_offsets() {
        let mut seen = Vec::new();
        for_each_in_range(5..8, |index, offset| seen.push((index, offset)));
        assert_eq!(seen, vec![(5, 0), (6, 1), (7, 2)]);
    }
}
