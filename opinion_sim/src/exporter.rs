//! JSON exporter for offline visualization.
//!
//! Exports world frames as JSON: opinions, graph, edge weights, colour scale
//! and the posts made since the previous frame.

use nalgebra::{DMatrix, Scalar};
use opinion_core::{ColorScale, OpinionStats};
use opinion_env::OpinionAxis;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;
use crate::world::{PostRecord, SimWorld};

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Virtual time in seconds
    pub time_sec: f64,

    /// Engine time step
    pub time_step: u64,

    /// Opinion rows, one per agent
    pub opinions: Vec<Vec<f64>>,

    /// Adjacency rows
    pub adjacency: Vec<Vec<u8>>,

    /// Edge weight rows
    pub edge_weights: Vec<Vec<f64>>,

    pub color_scale: ColorScale,

    pub stats: OpinionStats,

    /// Posts made since the previous frame
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub posts: Vec<PostRecord>,
}

impl SimFrame {
    /// Captures the world, including posts from index `posts_from` on.
    pub fn capture(world: &SimWorld, posts_from: usize) -> Self {
        let snapshot = world.snapshot();
        Self {
            time_sec: snapshot.time_sec,
            time_step: snapshot.state.time_step,
            opinions: rows(&snapshot.state.opinions),
            adjacency: rows(&snapshot.state.adjacency),
            edge_weights: rows(&snapshot.state.edge_weights),
            color_scale: snapshot.color_scale,
            stats: snapshot.stats,
            posts: world.posts().get(posts_from..).unwrap_or_default().to_vec(),
        }
    }
}

fn rows<T: Scalar + Copy>(m: &DMatrix<T>) -> Vec<Vec<T>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    pub axes: Vec<OpinionAxis>,

    pub user_agent_indices: Vec<usize>,

    /// Virtual duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, world: &SimWorld) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            axes: world.config().axes.clone(),
            user_agent_indices: world.network().roles().user_range().collect(),
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Number of posts already exported.
    pub fn exported_posts(&self) -> usize {
        self.frames.iter().map(|f| f.posts.len()).sum()
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
