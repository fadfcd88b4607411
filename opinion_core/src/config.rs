//! Network configuration.
//!
//! Every tunable of the engine lives here. The structs deserialize from TOML or
//! JSON with `#[serde(default)]`, so a config file only has to name what it changes:
//!
//! ```toml
//! n_agents = 21
//! n_opinions = 1
//! alpha_filter = 0.9
//!
//! [connectivity]
//! kind = "random_with_floor"
//! edge_probability = 0.1
//! min_degree = 2
//! user_hub_degree = 5
//!
//! [[roles.users]]
//! opinion = [0.5]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::roles::RoleLayout;

/// How the adjacency matrix is (re)built from opinions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectivityStrategy {
    /// Per-agent degree drawn from a normal distribution, split between the
    /// closest agents within `max_distance` and uniformly random agents.
    Hybrid {
        max_distance: f64,
        similarity_ratio: f64,
        mean_degree: f64,
        std_degree: f64,
    },

    /// Connect every pair whose opinion distance is at most `threshold`.
    SimilarityThreshold { threshold: f64 },

    /// Bernoulli edges, an optional fixed-degree hub per user agent, then a
    /// top-up so every other agent reaches `min_degree`.
    RandomWithFloor {
        edge_probability: f64,
        min_degree: usize,
        user_hub_degree: Option<usize>,
    },

    /// Edge probability from the row-scaled similarity raised to `theta`,
    /// floored at `min_prob`.
    SimilaritySampled { theta: f64, min_prob: f64 },
}

impl ConnectivityStrategy {
    /// Hybrid strategy: mean degree 8, std 3, 20% similarity edges within 0.3.
    pub fn hybrid() -> Self {
        ConnectivityStrategy::Hybrid {
            max_distance: 0.3,
            similarity_ratio: 0.2,
            mean_degree: 8.0,
            std_degree: 3.0,
        }
    }

    pub fn threshold(threshold: f64) -> Self {
        ConnectivityStrategy::SimilarityThreshold { threshold }
    }

    pub fn random_with_floor(edge_probability: f64, min_degree: usize) -> Self {
        ConnectivityStrategy::RandomWithFloor {
            edge_probability,
            min_degree,
            user_hub_degree: None,
        }
    }

    pub fn sampled(theta: f64, min_prob: f64) -> Self {
        ConnectivityStrategy::SimilaritySampled { theta, min_prob }
    }

    /// Strategy name as used in config files and logs.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectivityStrategy::Hybrid { .. } => "hybrid",
            ConnectivityStrategy::SimilarityThreshold { .. } => "similarity_threshold",
            ConnectivityStrategy::RandomWithFloor { .. } => "random_with_floor",
            ConnectivityStrategy::SimilaritySampled { .. } => "similarity_sampled",
        }
    }

    /// Checks the strategy parameters against the role layout.
    pub fn validate(&self, roles: &RoleLayout) -> Result<(), NetworkError> {
        match *self {
            ConnectivityStrategy::Hybrid {
                max_distance,
                similarity_ratio,
                mean_degree,
                std_degree,
            } => {
                check(max_distance.is_finite() && max_distance >= 0.0, "max_distance must be >= 0")?;
                check(
                    (0.0..=1.0).contains(&similarity_ratio),
                    "similarity_ratio must lie in [0, 1]",
                )?;
                check(mean_degree.is_finite() && mean_degree >= 0.0, "mean_degree must be >= 0")?;
                check(std_degree.is_finite() && std_degree >= 0.0, "std_degree must be >= 0")
            }
            ConnectivityStrategy::SimilarityThreshold { threshold } => {
                check(threshold.is_finite() && threshold >= 0.0, "threshold must be >= 0")
            }
            ConnectivityStrategy::RandomWithFloor {
                edge_probability,
                user_hub_degree,
                ..
            } => {
                check(
                    (0.0..=1.0).contains(&edge_probability),
                    "edge_probability must lie in [0, 1]",
                )?;
                if let Some(hub) = user_hub_degree {
                    let available = roles.n_agents() - roles.n_user();
                    if roles.n_user() > 0 && hub > available {
                        return Err(NetworkError::config(format!(
                            "user_hub_degree {} exceeds the {} non-user agents available",
                            hub, available
                        )));
                    }
                }
                Ok(())
            }
            ConnectivityStrategy::SimilaritySampled { theta, min_prob } => {
                check(theta.is_finite() && theta >= 0.0, "theta must be >= 0")?;
                check((0.0..=1.0).contains(&min_prob), "min_prob must lie in [0, 1]")
            }
        }
    }
}

impl Default for ConnectivityStrategy {
    fn default() -> Self {
        Self::hybrid()
    }
}

/// Initial opinion (or steering target) of a privileged agent.
///
/// `None` inherits the agent's row of the initial opinion matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub opinion: Option<Vec<f64>>,
}

impl AgentSeed {
    pub fn inherit() -> Self {
        Self { opinion: None }
    }

    pub fn with_opinion(opinion: Vec<f64>) -> Self {
        Self { opinion: Some(opinion) }
    }
}

/// Privileged agents. Users take the leading indices, strategic agents the trailing ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub users: Vec<AgentSeed>,
    pub strategic: Vec<AgentSeed>,
}

/// Configuration for a [`Network`](crate::Network).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Population size
    pub n_agents: usize,

    /// Opinion axes per agent
    pub n_opinions: usize,

    /// Exponential smoothing toward the propagated opinions, in (0, 1]
    pub alpha_filter: f64,

    /// Exponential smoothing of user targets, in (0, 1]
    pub user_alpha: f64,

    /// Sharpening exponent of the strategic resolver
    pub strategic_theta: f64,

    /// Optional cap on the per-step change of any single opinion entry
    pub max_opinion_change: Option<f64>,

    /// Graph construction rule
    pub connectivity: ConnectivityStrategy,

    /// User and strategic agents
    pub roles: RoleConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            n_agents: 50,
            n_opinions: 3,
            alpha_filter: 0.5,
            user_alpha: 0.5,
            strategic_theta: 7.0,
            max_opinion_change: None,
            connectivity: ConnectivityStrategy::default(),
            roles: RoleConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Convenience constructor with default tunables.
    pub fn new(n_agents: usize, n_opinions: usize) -> Self {
        Self {
            n_agents,
            n_opinions,
            ..Default::default()
        }
    }

    pub fn with_connectivity(mut self, connectivity: ConnectivityStrategy) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_alpha_filter(mut self, alpha_filter: f64) -> Self {
        self.alpha_filter = alpha_filter;
        self
    }

    pub fn with_users(mut self, users: Vec<AgentSeed>, user_alpha: f64) -> Self {
        self.roles.users = users;
        self.user_alpha = user_alpha;
        self
    }

    pub fn with_strategic(mut self, strategic: Vec<AgentSeed>, theta: f64) -> Self {
        self.roles.strategic = strategic;
        self.strategic_theta = theta;
        self
    }

    /// Validates every tunable and returns the resulting role layout.
    pub fn validate(&self) -> Result<RoleLayout, NetworkError> {
        check(self.n_agents > 0, "n_agents must be > 0")?;
        check(self.n_opinions > 0, "n_opinions must be > 0")?;
        check(
            self.alpha_filter > 0.0 && self.alpha_filter <= 1.0,
            "alpha_filter must lie in (0, 1]",
        )?;
        check(
            self.user_alpha > 0.0 && self.user_alpha <= 1.0,
            "user_alpha must lie in (0, 1]",
        )?;
        check(!self.strategic_theta.is_nan(), "strategic_theta must be a number")?;
        if let Some(max_change) = self.max_opinion_change {
            check(max_change > 0.0, "max_opinion_change must be > 0")?;
        }

        let roles = RoleLayout::new(
            self.n_agents,
            self.roles.users.len(),
            self.roles.strategic.len(),
        )?;

        for seed in self.roles.users.iter().chain(self.roles.strategic.iter()) {
            if let Some(opinion) = &seed.opinion {
                if opinion.len() != self.n_opinions {
                    return Err(NetworkError::config(format!(
                        "role opinion has {} axes, expected {}",
                        opinion.len(),
                        self.n_opinions
                    )));
                }
                check(
                    opinion.iter().all(|v| (0.0..=1.0).contains(v)),
                    "role opinions must lie in [0, 1]",
                )?;
            }
        }

        self.connectivity.validate(&roles)?;
        Ok(roles)
    }
}

fn check(condition: bool, msg: &str) -> Result<(), NetworkError> {
    if condition {
        Ok(())
    } else {
        Err(NetworkError::config(msg))
    }
}
