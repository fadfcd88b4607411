//! Offline analyzer for deterministic runs.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use opinion_env::{EnvError, OpinionAnalyzer};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// A user post to replay, with the opinion the analyzer should report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedPost {
    pub text: String,
    /// Omitted: the analyzer fails on this post
    #[serde(default)]
    pub opinion: Option<Vec<f64>>,
}

/// Loads a JSON list of [`ScriptedPost`]s.
pub fn load_script(path: &Path) -> Result<Vec<ScriptedPost>, SimError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Answers from a fixed table keyed by trimmed post text.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAnalyzer {
    responses: HashMap<String, Vec<f64>>,
    default: Option<Vec<f64>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(posts: &[ScriptedPost]) -> Self {
        posts
            .iter()
            .filter_map(|p| p.opinion.clone().map(|o| (p.text.clone(), o)))
            .fold(Self::new(), |analyzer, (text, opinion)| analyzer.with_response(&text, opinion))
    }

    pub fn with_response(mut self, text: &str, opinion: Vec<f64>) -> Self {
        self.responses.insert(text.trim().to_string(), opinion);
        self
    }

    /// Answer for posts missing from the table.
    pub fn with_default(mut self, opinion: Vec<f64>) -> Self {
        self.default = Some(opinion);
        self
    }
}

#[async_trait]
impl OpinionAnalyzer for ScriptedAnalyzer {
    async fn analyze_post(&self, post: &str) -> Result<Vec<f64>, EnvError> {
        self.responses
            .get(post.trim())
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| EnvError::analysis(format!("no scripted response for {:?}", post)))
    }
}
