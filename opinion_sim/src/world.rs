//! SimWorld - one simulated social feed around a single engine instance.

use std::path::Path;
use std::time::Duration;

use nalgebra::DMatrix;
use opinion_core::{
    AgentRole, AgentSeed, ColorScale, ConnectivityStrategy, Network, NetworkConfig, NetworkState,
    OpinionStats, RoleConfig,
};
use opinion_env::{normalize_opinion_vector, OpinionAxis, PostCatalog, RetryPolicy};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{SimContext, ID_STREAM, INITIAL_STREAM, NETWORK_STREAM, SCHEDULER_STREAM};
use crate::error::SimError;

/// Valid range of the bot loop interval, in seconds.
pub const LOOP_SLEEP_RANGE: std::ops::RangeInclusive<f64> = 0.1..=10.0;

/// Index of the user agent that receives user posts.
pub const USER_AGENT_INDEX: usize = 0;

/// How the initial opinion matrix is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitialDistribution {
    Uniform,
    /// Beta(a, b) per entry; Beta(2, 2) clusters around 0.5
    Beta { a: f64, b: f64 },
}

impl Default for InitialDistribution {
    fn default() -> Self {
        InitialDistribution::Beta { a: 2.0, b: 2.0 }
    }
}

impl InitialDistribution {
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, k: usize, rng: &mut R) -> Result<DMatrix<f64>, SimError> {
        match *self {
            InitialDistribution::Uniform => Ok(DMatrix::from_fn(n, k, |_, _| rng.gen::<f64>())),
            InitialDistribution::Beta { a, b } => {
                let beta = Beta::new(a, b)
                    .map_err(|e| SimError::config(format!("invalid beta distribution: {}", e)))?;
                Ok(DMatrix::from_fn(n, k, |_, _| beta.sample(rng)))
            }
        }
    }
}

/// Configuration for a simulated world.
///
/// Loaded from TOML; omitted keys keep their defaults. A `[network]` table is
/// read as a whole [`NetworkConfig`], so its own omitted keys fall back to the
/// engine defaults rather than the world defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Engine configuration
    pub network: NetworkConfig,

    /// Meaning of each opinion column
    pub axes: Vec<OpinionAxis>,

    /// Bots posting per cycle
    pub bots_per_cycle: usize,

    /// Virtual seconds between bot cycles
    pub loop_sleep_secs: f64,

    /// Initial opinion sampling
    pub initial_distribution: InitialDistribution,

    /// User opinion used when analysis of a user post fails
    pub default_user_opinion: Vec<f64>,

    /// Strength of local post influence on the poster's neighbors (off when absent)
    pub post_influence: Option<f64>,

    /// Analyzer attempts per user post
    pub analyzer_attempts: u32,

    /// Analyzer timeout per attempt, in seconds
    pub analyzer_timeout_secs: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            network: Self::default_network(),
            axes: vec![OpinionAxis::default()],
            bots_per_cycle: 1,
            loop_sleep_secs: 5.0,
            initial_distribution: InitialDistribution::default(),
            default_user_opinion: vec![0.5],
            post_influence: None,
            analyzer_attempts: 5,
            analyzer_timeout_secs: 30.0,
        }
    }
}

impl SimConfig {
    /// 21 agents on one axis, one user at 0.5 wired to 5 neighbors.
    pub fn default_network() -> NetworkConfig {
        NetworkConfig {
            n_agents: 21,
            n_opinions: 1,
            alpha_filter: 0.9,
            user_alpha: 0.95,
            connectivity: ConnectivityStrategy::RandomWithFloor {
                edge_probability: 0.1,
                min_degree: 2,
                user_hub_degree: Some(5),
            },
            roles: RoleConfig {
                users: vec![AgentSeed::with_opinion(vec![0.5])],
                strategic: Vec::new(),
            },
            ..NetworkConfig::default()
        }
    }

    /// Loads and validates a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_str(content: &str) -> Result<Self, SimError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_agents(mut self, n_agents: usize) -> Self {
        self.network.n_agents = n_agents;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.network.validate()?;
        let k = self.network.n_opinions;

        if !LOOP_SLEEP_RANGE.contains(&self.loop_sleep_secs) {
            return Err(SimError::config(format!(
                "loop_sleep_secs {} outside [0.1, 10]",
                self.loop_sleep_secs
            )));
        }
        if self.axes.len() != k {
            return Err(SimError::config(format!("{} axes for {} opinion columns", self.axes.len(), k)));
        }
        if self.default_user_opinion.len() != k
            || self.default_user_opinion.iter().any(|v| !(0.0..=1.0).contains(v))
        {
            return Err(SimError::config("default_user_opinion must have one value in [0, 1] per axis"));
        }
        if let Some(strength) = self.post_influence {
            if !(strength > 0.0 && strength <= 1.0) {
                return Err(SimError::config("post_influence must lie in (0, 1]"));
            }
        }
        if self.analyzer_attempts == 0 {
            return Err(SimError::config("analyzer_attempts must be >= 1"));
        }
        if !(self.analyzer_timeout_secs > 0.0) {
            return Err(SimError::config("analyzer_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn loop_sleep(&self) -> Duration {
        Duration::from_secs_f64(self.loop_sleep_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.analyzer_attempts,
            timeout: Duration::from_secs_f64(self.analyzer_timeout_secs),
        }
    }
}

/// One post in the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub author: usize,
    pub author_role: AgentRole,
    pub text: String,
    /// Opinion the post was taken to express
    pub opinion: Vec<f64>,
    /// True when analysis failed and the default user opinion stood in
    pub fallback: bool,
    /// Engine time step at which the post was made
    pub time_step: u64,
    pub time_sec: f64,
}

/// Everything a front end needs to draw the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub state: NetworkState,
    pub axes: Vec<OpinionAxis>,
    pub user_agent_indices: Vec<usize>,
    pub color_scale: ColorScale,
    pub stats: OpinionStats,
    pub time_sec: f64,
}

/// The simulated world.
pub struct SimWorld {
    config: SimConfig,
    context: SimContext,
    network: Network,
    catalog: PostCatalog,
    scheduler: ChaCha8Rng,
    ids: ChaCha8Rng,
    posts: Vec<PostRecord>,
    user_has_posted: bool,
    generation: u64,
    cycles: u64,
}

impl SimWorld {
    /// Creates a world with the embedded post catalog.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Self::with_catalog(config, PostCatalog::embedded()?)
    }

    pub fn with_catalog(config: SimConfig, catalog: PostCatalog) -> Result<Self, SimError> {
        config.validate()?;
        let context = SimContext::new(config.seed);
        let network = Self::build_network(&config, &context, 0)?;

        info!(
            seed = config.seed,
            n_agents = config.network.n_agents,
            connectivity = config.network.connectivity.name(),
            "world created"
        );

        Ok(Self {
            scheduler: context.derive_rng(SCHEDULER_STREAM),
            ids: context.derive_rng(ID_STREAM),
            config,
            context,
            network,
            catalog,
            posts: Vec::new(),
            user_has_posted: false,
            generation: 0,
            cycles: 0,
        })
    }

    fn build_network(config: &SimConfig, context: &SimContext, generation: u64) -> Result<Network, SimError> {
        let stream = |base: u64| base + (generation << 8);
        let net = &config.network;
        let opinions = config.initial_distribution.sample(
            net.n_agents,
            net.n_opinions,
            &mut context.derive_rng(stream(INITIAL_STREAM)),
        )?;

        Ok(Network::builder(net.clone())
            .with_opinions(opinions)
            .with_rng(context.derive_rng(stream(NETWORK_STREAM)))
            .build()?)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn context(&self) -> &SimContext {
        &self.context
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn posts(&self) -> &[PostRecord] {
        &self.posts
    }

    pub fn user_has_posted(&self) -> bool {
        self.user_has_posted
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn time_sec(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    pub fn state(&self) -> NetworkState {
        self.network.get_state()
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let state = self.network.get_state();
        WorldSnapshot {
            color_scale: ColorScale::compute(&state.opinions, self.network.roles()),
            stats: OpinionStats::compute(&state.opinions, &state.adjacency),
            axes: self.config.axes.clone(),
            user_agent_indices: self.network.roles().user_range().collect(),
            time_sec: self.time_sec(),
            state,
        }
    }

    /// Changes the bot loop interval.
    pub fn set_loop_sleep(&mut self, secs: f64) -> Result<(), SimError> {
        if !LOOP_SLEEP_RANGE.contains(&secs) {
            return Err(SimError::config(format!("loop_sleep_secs {} outside [0.1, 10]", secs)));
        }
        self.config.loop_sleep_secs = secs;
        Ok(())
    }

    /// One bot cycle: chosen bots post from the catalog, the network updates
    /// after each post, and the virtual clock advances by the loop interval.
    /// A cycle without any post updates the network once.
    pub fn run_bot_cycle(&mut self) -> NetworkState {
        let eligible: Vec<usize> = (0..self.network.n_agents())
            .filter(|&i| !self.network.roles().is_user(i))
            .collect();
        let posters: Vec<usize> = eligible
            .choose_multiple(&mut self.scheduler, self.config.bots_per_cycle)
            .copied()
            .collect();

        let mut posted = 0usize;
        for poster in posters {
            let current = self.network.opinions()[(poster, 0)];
            let post = self.catalog.post_for_opinion(current, &mut self.scheduler).clone();

            let opinion = match normalize_opinion_vector(post.sentiment, self.network.n_opinions()) {
                Ok(opinion) => opinion,
                Err(e) => {
                    warn!(poster, error = %e, "catalog post has an unusable sentiment, skipped");
                    continue;
                }
            };
            if let Err(e) = self.network.set_agent_opinion(poster, &opinion) {
                warn!(poster, error = %e, "bot opinion rejected");
                continue;
            }
            self.influence_neighbors(poster, &opinion);
            self.record_post(poster, post.text, opinion, false);

            self.network.update_network(self.user_has_posted);
            posted += 1;
        }

        // A quiet cycle still propagates once.
        if posted == 0 {
            self.network.update_network(self.user_has_posted);
        }

        self.context.advance_time(self.config.loop_sleep());
        self.cycles += 1;
        debug!(cycle = self.cycles, time_step = self.network.time_step(), "bot cycle complete");
        self.network.get_state()
    }

    /// Feeds a user post into the engine.
    ///
    /// `analyzed` is the analyzer's verdict; `None` falls back to the
    /// configured default user opinion.
    pub fn apply_user_post(&mut self, text: &str, analyzed: Option<Vec<f64>>) -> Result<NetworkState, SimError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SimError::EmptyPost);
        }

        let fallback = analyzed.is_none();
        let opinion = analyzed.unwrap_or_else(|| self.config.default_user_opinion.clone());

        self.network.add_user_opinion(&opinion, USER_AGENT_INDEX)?;
        self.user_has_posted = true;
        self.influence_neighbors(USER_AGENT_INDEX, &opinion);
        self.record_post(USER_AGENT_INDEX, text.to_string(), opinion, fallback);

        Ok(self.network.update_network(true))
    }

    /// Replaces the world with a freshly sampled population.
    pub fn reset(&mut self) -> Result<NetworkState, SimError> {
        let generation = self.generation + 1;
        self.network = Self::build_network(&self.config, &self.context, generation)?;
        self.generation = generation;
        self.posts.clear();
        self.user_has_posted = false;
        self.cycles = 0;
        self.context.reset_time();
        info!(generation, "world reset");
        Ok(self.network.get_state())
    }

    fn influence_neighbors(&mut self, poster: usize, opinion: &[f64]) {
        if let Some(strength) = self.config.post_influence {
            if let Err(e) = self.network.apply_post_influence(poster, opinion, strength) {
                warn!(poster, error = %e, "post influence skipped");
            }
        }
    }

    fn record_post(&mut self, author: usize, text: String, opinion: Vec<f64>, fallback: bool) {
        let id = uuid::Builder::from_random_bytes(self.ids.gen()).into_uuid();
        self.posts.push(PostRecord {
            id,
            author,
            author_role: self.network.roles().role_of(author),
            text,
            opinion,
            fallback,
            time_step: self.network.time_step(),
            time_sec: self.time_sec(),
        });
    }
}
