//! Invariant Validation
//! ====================
//!
//! Checks the engine's structural guarantees on a live network:
//! - adjacency symmetric, binary, zero diagonal
//! - influence matrix row-stochastic and non-negative
//! - every opinion inside [0, 1]
//! - user rows equal to their smoothed targets
//!
//! Usage:
//! ```ignore
//! use opinion_core::validation::InvariantReport;
//!
//! network.update_network(true);
//! let report = InvariantReport::check(&network);
//! assert!(report.passes(), "{}", report);
//! ```

use std::fmt;

use nalgebra::DMatrix;

use crate::network::Network;
use crate::roles::RoleLayout;

/// Tolerance for row sums of the influence matrix.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

// =============================================================================
// INDIVIDUAL CHECKS
// =============================================================================

/// Symmetric 0/1 matrix with zero diagonal.
pub fn validate_adjacency(a: &DMatrix<u8>) -> Result<(), String> {
    if !a.is_square() {
        return Err(format!("adjacency is {}x{}", a.nrows(), a.ncols()));
    }
    for i in 0..a.nrows() {
        if a[(i, i)] != 0 {
            return Err(format!("self-loop at agent {}", i));
        }
        for j in (i + 1)..a.ncols() {
            if a[(i, j)] > 1 {
                return Err(format!("non-binary entry {} at ({}, {})", a[(i, j)], i, j));
            }
            if a[(i, j)] != a[(j, i)] {
                return Err(format!("asymmetric entry at ({}, {})", i, j));
            }
        }
    }
    Ok(())
}

/// Non-negative rows summing to 1 within [`ROW_SUM_TOLERANCE`].
pub fn validate_row_stochastic(w: &DMatrix<f64>) -> Result<(), String> {
    for (i, row) in w.row_iter().enumerate() {
        if let Some(v) = row.iter().find(|v| **v < 0.0) {
            return Err(format!("negative weight {} in row {}", v, i));
        }
        let sum = row.sum();
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(format!("row {} sums to {}", i, sum));
        }
    }
    Ok(())
}

pub fn validate_opinion_bounds(x: &DMatrix<f64>) -> Result<(), String> {
    for i in 0..x.nrows() {
        for j in 0..x.ncols() {
            let v = x[(i, j)];
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("opinion ({}, {}) = {} outside [0, 1]", i, j, v));
            }
        }
    }
    Ok(())
}

/// User rows of `x` equal the smoothed targets exactly.
pub fn validate_user_pins(x: &DMatrix<f64>, targets: &DMatrix<f64>, roles: &RoleLayout) -> Result<(), String> {
    for (offset, i) in roles.user_range().enumerate() {
        if x.row(i) != targets.row(offset) {
            return Err(format!("user {} drifted from its target", i));
        }
    }
    Ok(())
}

// =============================================================================
// AGGREGATE REPORT
// =============================================================================

/// Result of every invariant check on one network.
#[derive(Debug, Clone, Default)]
pub struct InvariantReport {
    pub time_step: u64,
    pub violations: Vec<String>,
}

impl InvariantReport {
    pub fn check(network: &Network) -> Self {
        let checks = [
            ("adjacency", validate_adjacency(network.adjacency())),
            ("influence", validate_row_stochastic(network.last_influence())),
            ("bounds", validate_opinion_bounds(network.opinions())),
            (
                "user pins",
                validate_user_pins(network.opinions(), network.user_targets(), network.roles()),
            ),
        ];

        let violations = checks
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| format!("{}: {}", name, e)))
            .collect();

        Self {
            time_step: network.time_step(),
            violations,
        }
    }

    pub fn passes(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for InvariantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passes() {
            return write!(f, "step {}: all invariants hold", self.time_step);
        }
        writeln!(f, "step {}: {} violation(s)", self.time_step, self.violations.len())?;
        for v in &self.violations {
            writeln!(f, "  - {}", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSeed, NetworkConfig};

    #[test]
    fn test_adjacency_checks() {
        let mut a = DMatrix::<u8>::zeros(3, 3);
        assert!(validate_adjacency(&a).is_ok());
        a[(0, 1)] = 1;
        assert!(validate_adjacency(&a).unwrap_err().contains("asymmetric"));
        a[(1, 0)] = 1;
        a[(2, 2)] = 1;
        assert!(validate_adjacency(&a).unwrap_err().contains("self-loop"));
    }

    #[test]
    fn test_row_stochastic_checks() {
        assert!(validate_row_stochastic(&DMatrix::identity(3, 3)).is_ok());
        let bad = DMatrix::from_row_slice(2, 2, &[0.5, 0.4, 0.0, 1.0]);
        assert!(validate_row_stochastic(&bad).is_err());
        let negative = DMatrix::from_row_slice(1, 2, &[1.5, -0.5]);
        assert!(validate_row_stochastic(&negative).unwrap_err().contains("negative"));
    }

    #[test]
    fn test_bounds_check() {
        let x = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.3, 1.2]);
        let err = validate_opinion_bounds(&x).unwrap_err();
        assert!(err.contains("(1, 1)"));
    }

    #[test]
    fn test_report_on_live_network() {
        let config = NetworkConfig::new(15, 2)
            .with_users(vec![AgentSeed::with_opinion(vec![0.3, 0.7])], 0.8)
            .with_strategic(vec![AgentSeed::with_opinion(vec![1.0, 1.0])], 7.0);
        let mut network = Network::new(config, 99).unwrap();
        network.add_user_opinion(&[0.9, 0.1], 0).unwrap();

        for step in 0..10 {
            network.update_network(step % 2 == 0);
            let report = InvariantReport::check(&network);
            assert!(report.passes(), "{}", report);
        }
    }

    #[test]
    fn test_report_flags_drifted_user() {
        let config = NetworkConfig::new(5, 1).with_users(vec![AgentSeed::with_opinion(vec![0.5])], 0.5);
        let mut network = Network::new(config, 1).unwrap();
        network.set_agent_opinion(0, &[0.9]).unwrap();

        let report = InvariantReport::check(&network);
        assert!(!report.passes());
        assert!(report.violations[0].starts_with("user pins"));
    }
}
