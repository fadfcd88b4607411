//! The network entity: owns every piece of engine state.
//!
//! A [`Network`] is constructed once, advanced by [`Network::update_network`],
//! and edited between steps through the injection calls. Callers serialize
//! access; [`Network::get_state`] hands out owned copies.

use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::connectivity::ConnectivityBuilder;
use crate::error::NetworkError;
use crate::influence::post_influenced_value;
use crate::roles::{for_each_in_range, isolate_rows, mean_excluding, overwrite_rows, RoleLayout};
use crate::similarity::similarity_matrix;
use crate::strategic::strategic_opinion;
use crate::weights::{edge_weights, influence_matrix};

/// Snapshot of the observable network state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    /// n_agents × n_opinions, entries in [0, 1]
    pub opinions: DMatrix<f64>,
    /// n_agents × n_agents, symmetric 0/1, zero diagonal
    pub adjacency: DMatrix<u8>,
    /// Number of completed updates
    pub time_step: u64,
    /// 1 on the diagonal, 1 / (1 + distance) elsewhere
    pub edge_weights: DMatrix<f64>,
}

/// Builder for [`Network`].
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    config: NetworkConfig,
    opinions: Option<DMatrix<f64>>,
    adjacency: Option<DMatrix<u8>>,
    rng: Option<ChaCha8Rng>,
}

impl NetworkBuilder {
    /// Initial opinion matrix. Sampled uniformly from the RNG when omitted.
    pub fn with_opinions(mut self, opinions: DMatrix<f64>) -> Self {
        self.opinions = Some(opinions);
        self
    }

    /// Initial adjacency. Built by the configured strategy when omitted.
    pub fn with_adjacency(mut self, adjacency: DMatrix<u8>) -> Self {
        self.adjacency = Some(adjacency);
        self
    }

    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Validates everything and assembles the network.
    pub fn build(self) -> Result<Network, NetworkError> {
        let config = self.config;
        let roles = config.validate()?;
        let connectivity = ConnectivityBuilder::new(config.connectivity.clone(), roles)?;
        let mut rng = self.rng.unwrap_or_else(ChaCha8Rng::from_entropy);

        let n = config.n_agents;
        let k = config.n_opinions;

        let mut x = match self.opinions {
            Some(opinions) => {
                validate_opinions(&opinions, n, k)?;
                opinions
            }
            None => DMatrix::from_fn(n, k, |_, _| rng.gen::<f64>()),
        };

        // User seeds overwrite their X rows; targets start from X either way.
        for (i, seed) in config.roles.users.iter().enumerate() {
            if let Some(opinion) = &seed.opinion {
                x.row_mut(i).copy_from_slice(opinion);
            }
        }
        let user_targets = x.rows(0, roles.n_user()).into_owned();

        let strategic = roles.strategic_range();
        let mut strategic_targets = DMatrix::zeros(roles.n_strategic(), k);
        for_each_in_range(strategic.clone(), |index, offset| {
            match &config.roles.strategic[offset].opinion {
                Some(target) => strategic_targets.row_mut(offset).copy_from_slice(target),
                None => strategic_targets.row_mut(offset).copy_from(&x.row(index)),
            }
        });

        if roles.n_strategic() > 0 {
            let mean = mean_excluding(&x, strategic.clone()).transpose();
            for index in strategic {
                x.row_mut(index).copy_from(&mean);
            }
        }

        let adjacency = match self.adjacency {
            Some(adjacency) => {
                validate_adjacency(&adjacency, n)?;
                adjacency
            }
            None => connectivity.build(&x, &mut rng),
        };

        debug!(
            n_agents = n,
            n_opinions = k,
            n_user = roles.n_user(),
            n_strategic = roles.n_strategic(),
            connectivity = config.connectivity.name(),
            "network constructed"
        );

        Ok(Network {
            edge_weights: edge_weights(&x),
            last_influence: DMatrix::identity(n, n),
            config,
            roles,
            connectivity,
            x,
            adjacency,
            user_targets,
            strategic_targets,
            time_step: 0,
            rng,
        })
    }
}

/// Opinion propagation network.
#[derive(Debug, Clone)]
pub struct Network {
    config: NetworkConfig,
    roles: RoleLayout,
    connectivity: ConnectivityBuilder,
    x: DMatrix<f64>,
    adjacency: DMatrix<u8>,
    edge_weights: DMatrix<f64>,
    user_targets: DMatrix<f64>,
    strategic_targets: DMatrix<f64>,
    last_influence: DMatrix<f64>,
    time_step: u64,
    rng: ChaCha8Rng,
}

impl Network {
    pub fn builder(config: NetworkConfig) -> NetworkBuilder {
        NetworkBuilder {
            config,
            opinions: None,
            adjacency: None,
            rng: None,
        }
    }

    /// Random initial opinions and graph from a seeded RNG.
    pub fn new(config: NetworkConfig, seed: u64) -> Result<Self, NetworkError> {
        Self::builder(config).with_seed(seed).build()
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn roles(&self) -> &RoleLayout {
        &self.roles
    }

    pub fn n_agents(&self) -> usize {
        self.roles.n_agents()
    }

    pub fn n_opinions(&self) -> usize {
        self.config.n_opinions
    }

    pub fn opinions(&self) -> &DMatrix<f64> {
        &self.x
    }

    pub fn adjacency(&self) -> &DMatrix<u8> {
        &self.adjacency
    }

    pub fn edge_weights(&self) -> &DMatrix<f64> {
        &self.edge_weights
    }

    pub fn time_step(&self) -> u64 {
        self.time_step
    }

    /// Influence matrix W used by the most recent update (identity before the first).
    pub fn last_influence(&self) -> &DMatrix<f64> {
        &self.last_influence
    }

    pub fn user_targets(&self) -> &DMatrix<f64> {
        &self.user_targets
    }

    pub fn strategic_targets(&self) -> &DMatrix<f64> {
        &self.strategic_targets
    }

    /// Smoothed target of user `user_index`.
    pub fn user_target(&self, user_index: usize) -> Option<DVector<f64>> {
        (user_index < self.roles.n_user()).then(|| self.user_targets.row(user_index).transpose())
    }

    /// Owned snapshot of the observable state.
    pub fn get_state(&self) -> NetworkState {
        NetworkState {
            opinions: self.x.clone(),
            adjacency: self.adjacency.clone(),
            time_step: self.time_step,
            edge_weights: self.edge_weights.clone(),
        }
    }

    /// Advances the network by one step.
    ///
    /// With `include_user_opinions == false` user agents neither influence nor
    /// are influenced during this step.
    pub fn update_network(&mut self, include_user_opinions: bool) -> NetworkState {
        let similarity = similarity_matrix(&self.x);

        let mut adjacency = self.adjacency.clone();
        if !include_user_opinions {
            isolate_rows(&mut adjacency, self.roles.user_range());
        }

        let w = influence_matrix(&similarity, &adjacency);
        let mut propagated = &w * &self.x;

        let strategic = self.roles.strategic_range();
        if !strategic.is_empty() {
            let fallback = mean_excluding(&self.x, strategic.clone());
            let theta = self.config.strategic_theta;
            for_each_in_range(strategic, |index, offset| {
                let edges: Vec<u8> = adjacency.row(index).iter().copied().collect();
                let target = self.strategic_targets.row(offset).transpose();
                let resolved = strategic_opinion(&edges, &self.x, &target, theta, &fallback);
                propagated.row_mut(index).copy_from(&resolved.transpose());
            });
        }

        let alpha = self.config.alpha_filter;
        let mut next = propagated * alpha + &self.x * (1.0 - alpha);

        if let Some(max_change) = self.config.max_opinion_change {
            next.zip_apply(&self.x, |new, old| {
                *new = old + (*new - old).clamp(-max_change, max_change);
            });
        }
        next.apply(|v| *v = v.clamp(0.0, 1.0));
        self.x = next;

        self.adjacency = self.connectivity.build(&self.x, &mut self.rng);
        self.edge_weights = edge_weights(&self.x);
        self.time_step += 1;

        overwrite_rows(&mut self.x, self.roles.user_range(), &self.user_targets);
        self.last_influence = w;

        debug!(
            time_step = self.time_step,
            include_user_opinions,
            edges = self.adjacency.iter().filter(|&&v| v != 0).count() / 2,
            "network updated"
        );

        self.get_state()
    }

    /// Smooths a new opinion into user `user_index`'s target and pins it into X.
    pub fn add_user_opinion(&mut self, opinion: &[f64], user_index: usize) -> Result<(), NetworkError> {
        if user_index >= self.roles.n_user() {
            return Err(NetworkError::IndexOutOfBounds {
                index: user_index,
                limit: self.roles.n_user(),
            });
        }
        let opinion = self.checked_opinion(opinion)?.transpose();

        let u = self.config.user_alpha;
        let target = opinion * u + self.user_targets.row(user_index) * (1.0 - u);
        self.user_targets.row_mut(user_index).copy_from(&target);
        self.x.row_mut(user_index).copy_from(&target);
        Ok(())
    }

    /// Overwrites agent `agent_index`'s opinion row.
    pub fn set_agent_opinion(&mut self, agent_index: usize, opinion: &[f64]) -> Result<(), NetworkError> {
        if agent_index >= self.n_agents() {
            return Err(NetworkError::IndexOutOfBounds {
                index: agent_index,
                limit: self.n_agents(),
            });
        }
        let opinion = self.checked_opinion(opinion)?.transpose();
        self.x.row_mut(agent_index).copy_from(&opinion);
        Ok(())
    }

    /// Lets a post by `poster` sway its direct neighbors.
    ///
    /// Returns the number of neighbors influenced. User rows stay pinned.
    pub fn apply_post_influence(
        &mut self,
        poster: usize,
        opinion: &[f64],
        strength: f64,
    ) -> Result<usize, NetworkError> {
        if poster >= self.n_agents() {
            return Err(NetworkError::IndexOutOfBounds {
                index: poster,
                limit: self.n_agents(),
            });
        }
        if !(strength > 0.0 && strength <= 1.0) {
            return Err(NetworkError::InvalidOpinion(format!(
                "influence strength {} outside (0, 1]",
                strength
            )));
        }
        let post = self.checked_opinion(opinion)?;

        let neighbors: Vec<usize> = (0..self.n_agents())
            .filter(|&j| self.adjacency[(poster, j)] == 1)
            .collect();

        for &j in &neighbors {
            for (d, &value) in post.iter().enumerate() {
                self.x[(j, d)] = post_influenced_value(self.x[(j, d)], value, strength);
            }
        }
        overwrite_rows(&mut self.x, self.roles.user_range(), &self.user_targets);

        debug!(poster, neighbors = neighbors.len(), strength, "post influence applied");
        Ok(neighbors.len())
    }

    /// Checks length and finiteness, clamping finite values into [0, 1].
    fn checked_opinion(&self, opinion: &[f64]) -> Result<DVector<f64>, NetworkError> {
        if opinion.len() != self.n_opinions() {
            return Err(NetworkError::DimensionMismatch {
                expected: self.n_opinions(),
                actual: opinion.len(),
            });
        }
        if let Some(bad) = opinion.iter().find(|v| !v.is_finite()) {
            return Err(NetworkError::InvalidOpinion(format!("non-finite value {}", bad)));
        }

        let mut vector = DVector::from_column_slice(opinion);
        if vector.iter().any(|v| !(0.0..=1.0).contains(v)) {
            warn!(?opinion, "opinion outside [0, 1], clamping");
            vector.apply(|v| *v = v.clamp(0.0, 1.0));
        }
        Ok(vector)
    }
}

fn validate_opinions(x: &DMatrix<f64>, n: usize, k: usize) -> Result<(), NetworkError> {
    if x.shape() != (n, k) {
        return Err(NetworkError::config(format!(
            "opinion matrix is {}x{}, expected {}x{}",
            x.nrows(),
            x.ncols(),
            n,
            k
        )));
    }
    if x.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err(NetworkError::config("initial opinions must lie in [0, 1]"));
    }
    Ok(())
}

fn validate_adjacency(a: &DMatrix<u8>, n: usize) -> Result<(), NetworkError> {
    if a.shape() != (n, n) {
        return Err(NetworkError::config(format!(
            "adjacency is {}x{}, expected {}x{}",
            a.nrows(),
            a.ncols(),
            n,
            n
        )));
    }
    for i in 0..n {
        if a[(i, i)] != 0 {
            return Err(NetworkError::config(format!("adjacency has a self-loop at {}", i)));
        }
        for j in (i + 1)..n {
            if a[(i, j)] > 1 || a[(i, j)] != a[(j, i)] {
                return Err(NetworkError::config(format!(
                    "adjacency must be symmetric 0/1, entry ({}, {}) is invalid",
                    i, j
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSeed, ConnectivityStrategy};
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn fully_connected(n: usize) -> DMatrix<u8> {
        DMatrix::from_fn(n, n, |i, j| u8::from(i != j))
    }

    fn column(values: &[f64]) -> DMatrix<f64> {
        DMatrix::from_row_slice(values.len(), 1, values)
    }

    fn user_network(n: usize, user_alpha: f64) -> Network {
        let config = NetworkConfig::new(n, 1)
            .with_alpha_filter(0.9)
            .with_connectivity(ConnectivityStrategy::random_with_floor(0.3, 1))
            .with_users(vec![AgentSeed::with_opinion(vec![0.5])], user_alpha);
        Network::new(config, 42).unwrap()
    }

    #[test]
    fn test_three_agent_full_graph() {
        let config = NetworkConfig::new(3, 1)
            .with_alpha_filter(1.0)
            .with_connectivity(ConnectivityStrategy::threshold(1.0));
        let mut network = Network::builder(config)
            .with_opinions(column(&[0.0, 0.5, 1.0]))
            .with_adjacency(fully_connected(3))
            .with_seed(1)
            .build()
            .unwrap();

        let state = network.update_network(true);
        assert_relative_eq!(state.opinions[(0, 0)], 2.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(state.opinions[(1, 0)], 0.5, epsilon = 1e-9);
        assert_relative_eq!(state.opinions[(2, 0)], 1.0 / 3.0, epsilon = 1e-9);
        assert_eq!(state.time_step, 1);
    }

    #[test]
    fn test_user_alpha_one_pins_exact_value() {
        let mut network = user_network(5, 1.0);
        network.add_user_opinion(&[0.9], 0).unwrap();
        let state = network.update_network(true);
        assert_eq!(state.opinions[(0, 0)], 0.9);
    }

    #[test]
    fn test_user_pinned_under_both_flags() {
        let mut network = user_network(12, 0.5);
        network.add_user_opinion(&[0.2], 0).unwrap();
        let target = network.user_target(0).unwrap();

        for flag in [true, false, true, false] {
            let state = network.update_network(flag);
            assert_eq!(state.opinions[(0, 0)], target[0]);
        }
    }

    #[test]
    fn test_masking_isolates_users() {
        let config = NetworkConfig::new(4, 1)
            .with_alpha_filter(1.0)
            .with_users(vec![AgentSeed::inherit()], 0.5);
        let mut network = Network::builder(config)
            .with_opinions(column(&[0.1, 0.3, 0.6, 0.9]))
            .with_adjacency(fully_connected(4))
            .with_seed(3)
            .build()
            .unwrap();

        network.update_network(false);
        let w = network.last_influence();
        assert_eq!(w[(0, 0)], 1.0);
        for i in 1..4 {
            assert_eq!(w[(i, 0)], 0.0);
            assert_eq!(w[(0, i)], 0.0);
        }
    }

    #[test]
    fn test_strategic_without_neighbors_takes_population_mean() {
        let config = NetworkConfig::new(4, 1)
            .with_alpha_filter(1.0)
            .with_connectivity(ConnectivityStrategy::threshold(0.0))
            .with_strategic(vec![AgentSeed::with_opinion(vec![1.0])], 7.0);
        let mut network = Network::builder(config)
            .with_opinions(column(&[0.1, 0.2, 0.6, 0.9]))
            .with_adjacency(DMatrix::zeros(4, 4))
            .with_seed(5)
            .build()
            .unwrap();

        // Construction already moved the strategic row to the mean of the others.
        assert_relative_eq!(network.opinions()[(3, 0)], 0.3, epsilon = 1e-12);
        assert_eq!(network.strategic_targets()[(0, 0)], 1.0);

        let state = network.update_network(true);
        assert_relative_eq!(state.opinions[(3, 0)], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_strategic_target_inherits_initial_row() {
        let config = NetworkConfig::new(3, 1).with_strategic(vec![AgentSeed::inherit()], 7.0);
        let network = Network::builder(config)
            .with_opinions(column(&[0.2, 0.4, 0.9]))
            .with_seed(9)
            .build()
            .unwrap();
        assert_eq!(network.strategic_targets()[(0, 0)], 0.9);
        assert_relative_eq!(network.opinions()[(2, 0)], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_bounds_errors() {
        let mut network = user_network(5, 0.5);

        let err = network.add_user_opinion(&[0.5], 1).unwrap_err();
        assert_eq!(err, NetworkError::IndexOutOfBounds { index: 1, limit: 1 });
        assert_eq!(err.kind(), ErrorKind::Bounds);

        let err = network.set_agent_opinion(5, &[0.5]).unwrap_err();
        assert_eq!(err, NetworkError::IndexOutOfBounds { index: 5, limit: 5 });

        let err = network.set_agent_opinion(2, &[0.5, 0.5]).unwrap_err();
        assert_eq!(err, NetworkError::DimensionMismatch { expected: 1, actual: 2 });

        let err = network.set_agent_opinion(2, &[f64::NAN]).unwrap_err();
        assert!(matches!(err, NetworkError::InvalidOpinion(_)));
    }

    #[test]
    fn test_set_agent_opinion_clamps() {
        let mut network = user_network(5, 0.5);
        network.set_agent_opinion(3, &[1.7]).unwrap();
        assert_eq!(network.opinions()[(3, 0)], 1.0);
        network.set_agent_opinion(3, &[-0.2]).unwrap();
        assert_eq!(network.opinions()[(3, 0)], 0.0);
    }

    #[test]
    fn test_construction_errors() {
        let config = NetworkConfig::new(3, 1);
        let err = Network::builder(config.clone())
            .with_opinions(column(&[0.1, 0.2]))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let mut asymmetric = DMatrix::<u8>::zeros(3, 3);
        asymmetric[(0, 1)] = 1;
        assert!(Network::builder(config.clone()).with_adjacency(asymmetric).build().is_err());

        let mut looped = DMatrix::<u8>::zeros(3, 3);
        looped[(1, 1)] = 1;
        assert!(Network::builder(config).with_adjacency(looped).build().is_err());
    }

    #[test]
    fn test_time_step_increments_once_per_update() {
        let mut network = Network::new(NetworkConfig::new(10, 2), 7).unwrap();
        assert_eq!(network.time_step(), 0);
        for expected in 1..=5 {
            assert_eq!(network.update_network(true).time_step, expected);
        }
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let config = NetworkConfig::new(20, 2);
        let mut a = Network::new(config.clone(), 11).unwrap();
        let mut b = Network::new(config, 11).unwrap();
        for _ in 0..5 {
            assert_eq!(a.update_network(true), b.update_network(true));
        }
    }

    #[test]
    fn test_max_opinion_change_limits_step() {
        let mut config = NetworkConfig::new(3, 1)
            .with_alpha_filter(1.0)
            .with_connectivity(ConnectivityStrategy::threshold(1.0));
        config.max_opinion_change = Some(0.05);
        let mut network = Network::builder(config)
            .with_opinions(column(&[0.0, 0.5, 1.0]))
            .with_adjacency(fully_connected(3))
            .with_seed(1)
            .build()
            .unwrap();

        let state = network.update_network(true);
        assert_relative_eq!(state.opinions[(0, 0)], 0.05, epsilon = 1e-12);
        assert_relative_eq!(state.opinions[(2, 0)], 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_post_influence_reaches_only_neighbors() {
        let config = NetworkConfig::new(4, 1).with_users(vec![AgentSeed::with_opinion(vec![0.5])], 0.5);
        let mut adjacency = DMatrix::<u8>::zeros(4, 4);
        for j in [0, 2] {
            adjacency[(1, j)] = 1;
            adjacency[(j, 1)] = 1;
        }
        let mut network = Network::builder(config)
            .with_opinions(column(&[0.5, 0.9, 0.6, 0.3]))
            .with_adjacency(adjacency)
            .with_seed(2)
            .build()
            .unwrap();

        let touched = network.apply_post_influence(1, &[0.9], 0.5).unwrap();
        assert_eq!(touched, 2);
        // User stays pinned, neighbor 2 polarizes, agent 3 is untouched.
        assert_eq!(network.opinions()[(0, 0)], 0.5);
        assert_relative_eq!(network.opinions()[(2, 0)], 0.75, epsilon = 1e-12);
        assert_eq!(network.opinions()[(3, 0)], 0.3);

        assert!(network.apply_post_influence(1, &[0.9], 0.0).is_err());
        assert!(network.apply_post_influence(4, &[0.9], 0.5).is_err());
    }

    #[test]
    fn test_state_is_a_copy() {
        let mut network = Network::new(NetworkConfig::new(5, 1), 3).unwrap();
        let before = network.get_state();
        network.set_agent_opinion(2, &[0.123]).unwrap();
        assert_ne!(before.opinions, network.get_state().opinions);
    }

    proptest! {
        #[test]
        fn prop_user_target_approaches_monotonically(
            start in 0.0f64..=1.0,
            input in 0.0f64..=1.0,
            user_alpha in 0.01f64..=1.0,
        ) {
            let config = NetworkConfig::new(6, 1)
                .with_users(vec![AgentSeed::with_opinion(vec![start])], user_alpha);
            let mut network = Network::new(config, 17).unwrap();

            let mut gap = (input - start).abs();
            for _ in 0..10 {
                network.add_user_opinion(&[input], 0).unwrap();
                let target = network.user_target(0).unwrap()[0];
                let new_gap = (input - target).abs();
                prop_assert!(new_gap <= gap + 1e-12);
                // No overshoot: the target stays on the starting side of the input.
                prop_assert!((target - input) * (start - input) >= -1e-12);
                gap = new_gap;
            }
        }

        #[test]
        fn prop_update_keeps_invariants(seed in any::<u64>(), flag in any::<bool>()) {
            let config = NetworkConfig::new(12, 2)
                .with_users(vec![AgentSeed::inherit()], 0.7)
                .with_strategic(vec![AgentSeed::with_opinion(vec![1.0, 0.0])], 7.0);
            let mut network = Network::new(config, seed).unwrap();

            for _ in 0..3 {
                let state = network.update_network(flag);
                prop_assert!(state.opinions.iter().all(|v| (0.0..=1.0).contains(v)));
                prop_assert_eq!(&state.adjacency, &state.adjacency.transpose());
                prop_assert!((0..12).all(|i| state.adjacency[(i, i)] == 0));
                prop_assert_eq!(
                    state.opinions.row(0).into_owned(),
                    network.user_targets().row(0).into_owned()
                );
            }
        }
    }
}
