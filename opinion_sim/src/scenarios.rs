//! Named simulation scenarios.

use serde::{Serialize, Serializer};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// OPN-001: plain averaging, opinion range must not widen
    Consensus,

    /// OPN-002: a user insisting on one opinion stays pinned to it
    UserAnchor,

    /// OPN-003: users neither influence nor get influenced before they post
    IsolatedUsers,

    /// OPN-004: a strategic agent pulls toward its target
    StrategicSteering,

    /// OPN-005: similarity-threshold graph only links close opinions
    ThresholdGraph,

    /// OPN-006: random graph with degree floor and user hub
    RandomFloor,

    /// OPN-007: similarity-sampled graph
    SampledGraph,

    /// OPN-008: full bot feed with a user joining halfway
    BotChatter,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Consensus,
            ScenarioId::UserAnchor,
            ScenarioId::IsolatedUsers,
            ScenarioId::StrategicSteering,
            ScenarioId::ThresholdGraph,
            ScenarioId::RandomFloor,
            ScenarioId::SampledGraph,
            ScenarioId::BotChatter,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Consensus => "consensus",
            ScenarioId::UserAnchor => "user_anchor",
            ScenarioId::IsolatedUsers => "isolated_users",
            ScenarioId::StrategicSteering => "strategic_steering",
            ScenarioId::ThresholdGraph => "threshold_graph",
            ScenarioId::RandomFloor => "random_floor",
            ScenarioId::SampledGraph => "sampled_graph",
            ScenarioId::BotChatter => "bot_chatter",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Consensus => "Hybrid graph, no privileged agents, opinion range never widens",
            ScenarioId::UserAnchor => "User posts 0.9 with user_alpha 1, stays exactly at 0.9",
            ScenarioId::IsolatedUsers => "No user post yet, user rows masked out of propagation",
            ScenarioId::StrategicSteering => "Strategic agent with target 1.0 ends above the population mean",
            ScenarioId::ThresholdGraph => "Every edge joins agents within distance 0.2",
            ScenarioId::RandomFloor => "Non-user degree >= 2, user hub degree exactly 5",
            ScenarioId::SampledGraph => "Edges sampled from scaled similarity, invariants hold",
            ScenarioId::BotChatter => "Bots post from the catalog, one user post halfway through",
        }
    }

    /// True when the scenario drives the network through bot posts.
    pub fn uses_bots(&self) -> bool {
        matches!(self, ScenarioId::BotChatter)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for ScenarioId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consensus" | "opn-001" => Ok(ScenarioId::Consensus),
            "user_anchor" | "useranchor" | "opn-002" => Ok(ScenarioId::UserAnchor),
            "isolated_users" | "isolatedusers" | "opn-003" => Ok(ScenarioId::IsolatedUsers),
            "strategic_steering" | "strategicsteering" | "opn-004" => Ok(ScenarioId::StrategicSteering),
            "threshold_graph" | "thresholdgraph" | "opn-005" => Ok(ScenarioId::ThresholdGraph),
            "random_floor" | "randomfloor" | "opn-006" => Ok(ScenarioId::RandomFloor),
            "sampled_graph" | "sampledgraph" | "opn-007" => Ok(ScenarioId::SampledGraph),
            "bot_chatter" | "botchatter" | "opn-008" => Ok(ScenarioId::BotChatter),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
