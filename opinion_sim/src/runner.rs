//! Scenario runner - executes the named scenarios against a fresh world.
//!
//! Every step of every scenario checks all engine invariants
//! ([`InvariantReport`]) on top of the scenario's own assertions.

use opinion_core::{
    AgentSeed, ConnectivityStrategy, InvariantReport, NetworkConfig, OpinionStats, RoleConfig,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::exporter::{SimExport, SimFrame};
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld, USER_AGENT_INDEX};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Steps executed
    pub total_steps: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Invariant reports checked
    pub invariant_checks: u64,

    /// Posts made (bots and user)
    pub posts: usize,

    /// Primary-axis opinion range before the first step
    pub initial_range: f64,

    /// Statistics after the last step
    pub final_stats: OpinionStats,
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Number of agents
    num_agents: usize,

    /// Steps per scenario
    steps: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_agents: usize) -> Self {
        Self {
            seed,
            num_agents,
            steps: 50,
        }
    }

    /// Sets the number of steps.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None)
    }

    /// Runs a scenario and records one frame per step.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, Option<SimExport>) {
        let mut export = None;
        let result = self.execute(scenario, Some(&mut export));
        if let Some(export) = export.as_mut() {
            export.finalize(result.passed, result.failure_reason.clone());
        }
        (result, export)
    }

    /// World configuration for `scenario`.
    pub fn config_for(&self, scenario: ScenarioId) -> SimConfig {
        let n = self.num_agents;
        let base = NetworkConfig::new(n, 1);
        let one_user = vec![AgentSeed::with_opinion(vec![0.5])];

        let (network, bots_per_cycle) = match scenario {
            ScenarioId::Consensus => (base.with_alpha_filter(0.5), 0),
            ScenarioId::UserAnchor => (
                base.with_alpha_filter(0.9)
                    .with_connectivity(hub_floor(n))
                    .with_users(one_user, 1.0),
                0,
            ),
            ScenarioId::IsolatedUsers => (
                base.with_connectivity(ConnectivityStrategy::random_with_floor(0.2, 2))
                    .with_users(one_user, 0.95),
                0,
            ),
            ScenarioId::StrategicSteering => (
                base.with_alpha_filter(0.9)
                    .with_connectivity(ConnectivityStrategy::random_with_floor(0.1, 2))
                    .with_strategic(vec![AgentSeed::with_opinion(vec![1.0])], 7.0),
                0,
            ),
            ScenarioId::ThresholdGraph => (base.with_connectivity(ConnectivityStrategy::threshold(0.2)), 0),
            ScenarioId::RandomFloor => (
                base.with_alpha_filter(0.9)
                    .with_connectivity(hub_floor(n))
                    .with_users(one_user, 0.95),
                0,
            ),
            ScenarioId::SampledGraph => (base.with_connectivity(ConnectivityStrategy::sampled(1.0, 0.05)), 0),
            ScenarioId::BotChatter => (
                NetworkConfig {
                    n_agents: n,
                    ..SimConfig::default_network()
                },
                1,
            ),
        };

        SimConfig {
            seed: self.seed,
            network,
            bots_per_cycle,
            post_influence: scenario.uses_bots().then_some(0.1),
            ..SimConfig::default()
        }
    }

    fn execute(&self, scenario: ScenarioId, export: Option<&mut Option<SimExport>>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_steps: 0,
            final_time_secs: 0.0,
            failure_reason: None,
            metrics: ScenarioMetrics::default(),
        };

        let mut world = match SimWorld::new(self.config_for(scenario)) {
            Ok(world) => world,
            Err(e) => {
                result.failure_reason = Some(format!("setup failed: {}", e));
                return result;
            }
        };

        let mut export = export.map(|slot| slot.insert(SimExport::new(scenario.name(), self.seed, &world)));

        result.metrics.initial_range = primary_range(&world);
        if scenario == ScenarioId::UserAnchor {
            if let Err(e) = world.apply_user_post("pineapple belongs on pizza", Some(vec![0.9])) {
                result.failure_reason = Some(format!("user post failed: {}", e));
                return result;
            }
        }

        for step in 0..self.steps {
            if scenario == ScenarioId::BotChatter && step == self.steps / 2 {
                if let Err(e) = world.apply_user_post("honestly it's fine either way", Some(vec![0.5])) {
                    result.failure_reason = Some(format!("user post failed: {}", e));
                    break;
                }
            }

            world.run_bot_cycle();
            result.total_steps += 1;

            let report = InvariantReport::check(world.network());
            result.metrics.invariant_checks += 1;
            if !report.passes() {
                result.failure_reason = Some(report.to_string());
                break;
            }
            if let Err(reason) = check_step(scenario, &world) {
                result.failure_reason = Some(format!("step {}: {}", step, reason));
                break;
            }

            if let Some(export) = export.as_deref_mut() {
                let frame = SimFrame::capture(&world, export.exported_posts());
                export.add_frame(frame);
            }
            debug!(step, time_step = world.network().time_step(), "scenario step");
        }

        if result.failure_reason.is_none() {
            if let Err(reason) = self.check_final(scenario, &world, &result.metrics) {
                result.failure_reason = Some(reason);
            }
        }

        let state = world.state();
        result.metrics.posts = world.posts().len();
        result.metrics.final_stats = OpinionStats::compute(&state.opinions, &state.adjacency);
        result.final_time_secs = world.time_sec();
        result.passed = result.failure_reason.is_none();

        if !result.passed {
            warn!(
                "Scenario {} failed: {}",
                scenario.name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
        result
    }

    fn check_final(&self, scenario: ScenarioId, world: &SimWorld, metrics: &ScenarioMetrics) -> Result<(), String> {
        match scenario {
            ScenarioId::Consensus => {
                let range = primary_range(world);
                if range > metrics.initial_range + 1e-9 {
                    return Err(format!(
                        "opinion range widened from {:.4} to {:.4}",
                        metrics.initial_range, range
                    ));
                }
            }
            ScenarioId::StrategicSteering => {
                let roles = world.network().roles();
                let x = world.network().opinions();
                let strategic = roles.strategic_range().start;
                let others: Vec<f64> = (0..roles.n_agents())
                    .filter(|&i| !roles.is_strategic(i))
                    .map(|i| x[(i, 0)])
                    .collect();
                if others.is_empty() {
                    return Ok(());
                }
                let mean = others.iter().sum::<f64>() / others.len() as f64;
                if x[(strategic, 0)] <= mean {
                    return Err(format!(
                        "strategic agent at {:.3} not above population mean {:.3}",
                        x[(strategic, 0)],
                        mean
                    ));
                }
            }
            ScenarioId::BotChatter => {
                let expected = self.steps as usize * world.config().bots_per_cycle + 1;
                if world.posts().len() != expected {
                    return Err(format!("expected {} posts, found {}", expected, world.posts().len()));
                }
                let expected_time = self.steps as f64 * world.config().loop_sleep_secs;
                if (world.time_sec() - expected_time).abs() > 1e-6 {
                    return Err(format!("virtual clock at {}s, expected {}s", world.time_sec(), expected_time));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Random graph with floor 2 and a user hub of 5, shrunk for tiny populations.
fn hub_floor(n: usize) -> ConnectivityStrategy {
    ConnectivityStrategy::RandomWithFloor {
        edge_probability: 0.1,
        min_degree: 2,
        user_hub_degree: Some(5.min(n.saturating_sub(1))),
    }
}

fn primary_range(world: &SimWorld) -> f64 {
    let x = world.network().opinions();
    let column = x.column(0);
    column.max() - column.min()
}

fn check_step(scenario: ScenarioId, world: &SimWorld) -> Result<(), String> {
    let network = world.network();
    let x = network.opinions();
    let a = network.adjacency();
    let roles = network.roles();
    let n = network.n_agents();

    match scenario {
        ScenarioId::UserAnchor => {
            if x[(USER_AGENT_INDEX, 0)] != 0.9 {
                return Err(format!("user drifted to {}", x[(USER_AGENT_INDEX, 0)]));
            }
        }
        ScenarioId::IsolatedUsers => {
            let w = network.last_influence();
            for i in roles.user_range() {
                if w[(i, i)] != 1.0 {
                    return Err(format!("user {} was influenced", i));
                }
                if let Some(j) = (0..n).find(|&j| j != i && w[(j, i)] != 0.0) {
                    return Err(format!("user {} influenced agent {}", i, j));
                }
            }
        }
        ScenarioId::ThresholdGraph => {
            // The graph is built from the opinions of the same step.
            for i in 0..n {
                for j in (i + 1)..n {
                    if a[(i, j)] == 1 && (x[(i, 0)] - x[(j, 0)]).abs() > 0.2 + 1e-12 {
                        return Err(format!("edge ({}, {}) spans more than 0.2", i, j));
                    }
                }
            }
        }
        ScenarioId::RandomFloor => {
            let degree = |i: usize| a.row(i).iter().filter(|&&v| v != 0).count();
            let hub = 5.min(n.saturating_sub(1));
            for i in 0..n {
                if roles.is_user(i) {
                    if degree(i) != hub {
                        return Err(format!("user {} has degree {}, expected {}", i, degree(i), hub));
                    }
                } else if degree(i) < 2.min(n - 1) {
                    return Err(format!("agent {} has degree {}", i, degree(i)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42, 21).with_steps(20);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
            assert_eq!(result.total_steps, 20);
            assert_eq!(result.metrics.invariant_checks, 20);
        }
    }

    #[test]
    fn test_scenarios_pass_across_seeds() {
        for seed in 1..4 {
            let runner = ScenarioRunner::new(seed, 12).with_steps(10);
            for scenario in ScenarioId::all() {
                let result = runner.run(scenario);
                assert!(result.passed, "{} seed {} failed: {:?}", scenario, seed, result.failure_reason);
            }
        }
    }

    #[test]
    fn test_bot_chatter_metrics() {
        let result = ScenarioRunner::new(7, 21).with_steps(10).run(ScenarioId::BotChatter);
        assert!(result.passed);
        assert_eq!(result.metrics.posts, 11);
        assert_eq!(result.final_time_secs, 50.0);
    }

    #[test]
    fn test_export_has_one_frame_per_step() {
        let (result, export) = ScenarioRunner::new(3, 21).with_steps(5).run_with_export(ScenarioId::BotChatter);
        let export = export.unwrap();
        assert!(result.passed);
        assert!(export.passed);
        assert_eq!(export.frames.len(), 5);
        assert_eq!(export.exported_posts(), 6);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let a = ScenarioRunner::new(11, 15).with_steps(8).run(ScenarioId::SampledGraph);
        let b = ScenarioRunner::new(11, 15).with_steps(8).run(ScenarioId::SampledGraph);
        assert_eq!(a.metrics.final_stats, b.metrics.final_stats);
    }

    #[test]
    fn test_setup_failure_is_reported() {
        let result = ScenarioRunner::new(1, 0).run(ScenarioId::Consensus);
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("setup failed"));
    }
}
