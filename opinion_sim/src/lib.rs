//! Opinion Simulation Harness
//!
//! A deterministic stand-in for the live application around the engine: a
//! seeded world, a bot posting loop, user posts through an async session, named
//! scenarios, and JSON frame export.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: a virtual clock advances by the loop interval per bot cycle
//! - **Randomness**: every subsystem draws from its own stream of one 64-bit seed
//! - **Oracles**: [`ScriptedAnalyzer`] replaces the language model offline
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Session                    │
//! │   analyzer (outside lock)   Mutex<SimWorld>  │
//! │                                  │           │
//! │        ┌─────────────────────────▼────────┐  │
//! │        │ SimWorld                         │  │
//! │        │  Network · PostCatalog · posts   │  │
//! │        │  SimContext (seed, clock)        │  │
//! │        └──────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use opinion_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 21).with_steps(50).run(ScenarioId::BotChatter);
//! assert!(result.passed);
//! ```

mod analyzer;
mod context;
mod error;
mod exporter;
mod runner;
mod session;
mod world;
pub mod scenarios;

pub use analyzer::{load_script, ScriptedAnalyzer, ScriptedPost};
pub use context::SimContext;
pub use error::SimError;
pub use exporter::{SimExport, SimFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use session::{Session, UserPostOutcome};
pub use world::{InitialDistribution, PostRecord, SimConfig, SimWorld, WorldSnapshot, USER_AGENT_INDEX};
