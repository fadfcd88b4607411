//! Opinion analyzer oracle.
//!
//! The analyzer turns free text into an opinion vector. The engine treats it as
//! opaque and untrusted: every result is validated, padded to the axis count,
//! and wrapped in a retry policy with a per-attempt timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::EnvError;

/// Value used to pad vectors that name fewer axes than configured.
pub const NEUTRAL_OPINION: f64 = 0.5;

/// Text → opinion vector oracle.
#[async_trait]
pub trait OpinionAnalyzer: Send + Sync {
    /// Opinion expressed by `post`, one value in [0, 1] per axis.
    async fn analyze_post(&self, post: &str) -> Result<Vec<f64>, EnvError>;
}

/// Retry policy applied by [`analyze_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Checks an oracle vector and fits it to `n_axes`.
///
/// Every value must be finite and in [0, 1]. Short vectors are padded with
/// 0.5, long ones truncated.
pub fn normalize_opinion_vector(mut values: Vec<f64>, n_axes: usize) -> Result<Vec<f64>, EnvError> {
    if let Some(bad) = values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
        return Err(EnvError::invalid(format!("value {} outside [0, 1]", bad)));
    }
    values.resize(n_axes, NEUTRAL_OPINION);
    Ok(values)
}

/// Parses raw oracle text such as `"[0.8, 0.2]"`.
///
/// Only a JSON list of numbers is accepted.
pub fn parse_opinion_vector(raw: &str, n_axes: usize) -> Result<Vec<f64>, EnvError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| EnvError::invalid(format!("not JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => return Err(EnvError::invalid(format!("expected a list, got {}", other))),
    };

    let values = items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| EnvError::invalid(format!("non-numeric entry {}", item)))
        })
        .collect::<Result<Vec<f64>, EnvError>>()?;

    normalize_opinion_vector(values, n_axes)
}

/// Calls the analyzer until it returns a valid vector or the policy runs out.
pub async fn analyze_with_retry(
    analyzer: &dyn OpinionAnalyzer,
    post: &str,
    n_axes: usize,
    policy: RetryPolicy,
) -> Result<Vec<f64>, EnvError> {
    let attempts = policy.attempts.max(1);
    let mut last = String::from("no attempt made");

    for attempt in 1..=attempts {
        let outcome = match tokio::time::timeout(policy.timeout, analyzer.analyze_post(post)).await {
            Ok(result) => result.and_then(|values| normalize_opinion_vector(values, n_axes)),
            Err(_) => Err(EnvError::Timeout(policy.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(vector) => {
                debug!(attempt, ?vector, "post analyzed");
                return Ok(vector);
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "analysis attempt failed");
                last = e.to_string();
            }
        }
    }

    Err(EnvError::RetriesExhausted { attempts, last })
}
