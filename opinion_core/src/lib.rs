//! Opinion Core - Opinion propagation on an evolving social graph
//!
//! A population of agents holds continuous opinion vectors in [0, 1]^k. Each
//! step, agents average toward similar neighbors, the graph is rebuilt from the
//! new opinions, and two privileged classes bend the dynamics:
//! 1. **User agents**: opinions supplied from outside, smoothed and pinned every step
//! 2. **Strategic agents**: steered toward a fixed target while blending in with neighbors
//!
//! ```ignore
//! use opinion_core::{Network, NetworkConfig};
//!
//! let mut network = Network::new(NetworkConfig::new(50, 3), 42)?;
//! let state = network.update_network(true);
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod influence;
pub mod metrics;
pub mod network;
pub mod roles;
pub mod similarity;
pub mod strategic;
pub mod validation;
pub mod weights;

// Re-export key types for convenience
pub use config::{AgentSeed, ConnectivityStrategy, NetworkConfig, RoleConfig};
pub use connectivity::ConnectivityBuilder;
pub use error::{ErrorKind, NetworkError};
pub use metrics::{ColorScale, OpinionStats};
pub use network::{Network, NetworkBuilder, NetworkState};
pub use roles::{AgentRole, RoleLayout};
pub use validation::InvariantReport;
