//! Opinion Metrics
//! ===============
//!
//! Summary statistics over a network snapshot:
//! - **Spread**: per-axis mean and standard deviation
//! - **Extremeness**: share of agents outside the neutral band
//! - **Structure**: mean degree, isolated agents, cross-camp edges
//!
//! Plus the colour-scale parameters a renderer needs to map the primary
//! opinion axis onto a gradient.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::influence::{same_side_of_center, CENTER};
use crate::roles::RoleLayout;

/// Half-width of the neutral band around 0.5.
pub const NEUTRAL_BAND: f64 = 0.05;

// =============================================================================
// OPINION STATISTICS
// =============================================================================

/// Statistics of one network snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpinionStats {
    /// Mean opinion per axis
    pub mean: Vec<f64>,
    /// Population standard deviation per axis
    pub std_dev: Vec<f64>,
    /// Smallest primary-axis opinion
    pub primary_min: f64,
    /// Largest primary-axis opinion
    pub primary_max: f64,
    /// Fraction of agents whose primary opinion lies outside [0.45, 0.55]
    pub extreme_fraction: f64,
    /// Average number of neighbors
    pub mean_degree: f64,
    /// Agents without any neighbor
    pub isolated_agents: usize,
    /// Fraction of edges joining agents on opposite sides of 0.5
    pub cross_camp_fraction: f64,
}

impl OpinionStats {
    /// Computes statistics from an opinion matrix and its adjacency.
    pub fn compute(opinions: &DMatrix<f64>, adjacency: &DMatrix<u8>) -> Self {
        let n = opinions.nrows();
        if n == 0 || opinions.ncols() == 0 {
            return Self::default();
        }
        let count = n as f64;

        let mean: Vec<f64> = opinions.column_iter().map(|c| c.sum() / count).collect();
        let std_dev: Vec<f64> = opinions
            .column_iter()
            .zip(&mean)
            .map(|(c, m)| (c.iter().map(|v| (v - m).powi(2)).sum::<f64>() / count).sqrt())
            .collect();

        let primary = opinions.column(0);
        let extreme = primary
            .iter()
            .filter(|v| (*v - CENTER).abs() > NEUTRAL_BAND)
            .count();

        let degrees: Vec<usize> = (0..n)
            .map(|i| adjacency.row(i).iter().filter(|&&v| v != 0).count())
            .collect();

        let mut edges = 0usize;
        let mut cross = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                if adjacency[(i, j)] != 0 {
                    edges += 1;
                    if !same_side_of_center(primary[i], primary[j]) {
                        cross += 1;
                    }
                }
            }
        }

        Self {
            mean,
            std_dev,
            primary_min: primary.min(),
            primary_max: primary.max(),
            extreme_fraction: extreme as f64 / count,
            mean_degree: degrees.iter().sum::<usize>() as f64 / count,
            isolated_agents: degrees.iter().filter(|&&d| d == 0).count(),
            cross_camp_fraction: if edges == 0 { 0.0 } else { cross as f64 / edges as f64 },
        }
    }
}

// =============================================================================
// COLOUR SCALE
// =============================================================================

/// Primary-axis range used to stretch the colour gradient.
///
/// User agents are excluded so a pinned user does not flatten everyone else's
/// colours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl Default for ColorScale {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ColorScale {
    pub fn compute(opinions: &DMatrix<f64>, roles: &RoleLayout) -> Self {
        if opinions.nrows() < 2 || opinions.ncols() == 0 {
            return Self::default();
        }

        let values: Vec<f64> = (0..opinions.nrows())
            .filter(|&i| !roles.is_user(i))
            .map(|i| opinions[(i, 0)])
            .collect();
        if values.is_empty() {
            return Self::default();
        }

        Self {
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Position of `value` inside the scale, in [0, 1].
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}
