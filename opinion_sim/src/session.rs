//! Async facade over a [`SimWorld`].
//!
//! Every engine mutation goes through one `tokio::sync::Mutex`, so a user post
//! and a bot cycle never interleave inside the engine. Analysis of a user post
//! runs before the lock is taken.

use std::sync::Arc;

use opinion_core::NetworkState;
use opinion_env::{analyze_with_retry, OpinionAnalyzer};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::SimError;
use crate::world::{SimWorld, WorldSnapshot};

/// Result of a user post.
#[derive(Debug, Clone, Serialize)]
pub struct UserPostOutcome {
    /// Analyzer verdict; `None` when the default opinion stood in
    pub analyzed: Option<Vec<f64>>,
    pub state: NetworkState,
}

/// Shared handle to one world and its analyzer.
#[derive(Clone)]
pub struct Session {
    world: Arc<Mutex<SimWorld>>,
    analyzer: Arc<dyn OpinionAnalyzer>,
}

impl Session {
    pub fn new(world: SimWorld, analyzer: Arc<dyn OpinionAnalyzer>) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
            analyzer,
        }
    }

    /// Analyzes `text` and applies it as the user's post.
    pub async fn submit_user_post(&self, text: &str) -> Result<UserPostOutcome, SimError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SimError::EmptyPost);
        }

        let (n_axes, policy) = {
            let world = self.world.lock().await;
            (world.config().network.n_opinions, world.config().retry_policy())
        };

        let analyzed = match analyze_with_retry(self.analyzer.as_ref(), text, n_axes, policy).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "analysis failed, using the default user opinion");
                None
            }
        };

        let mut world = self.world.lock().await;
        let state = world.apply_user_post(text, analyzed.clone())?;
        Ok(UserPostOutcome { analyzed, state })
    }

    /// Runs one bot cycle.
    pub async fn tick(&self) -> NetworkState {
        self.world.lock().await.run_bot_cycle()
    }

    pub async fn snapshot(&self) -> WorldSnapshot {
        self.world.lock().await.snapshot()
    }

    pub async fn reset(&self) -> Result<NetworkState, SimError> {
        self.world.lock().await.reset()
    }

    pub async fn set_loop_sleep(&self, secs: f64) -> Result<(), SimError> {
        self.world.lock().await.set_loop_sleep(secs)
    }

    /// Runs `f` with exclusive access to the world.
    pub async fn with_world<T>(&self, f: impl FnOnce(&SimWorld) -> T) -> T {
        let world = self.world.lock().await;
        f(&world)
    }
}
