//! Post generation and the pre-authored fallback catalog.
//!
//! Bots post from a catalog of pre-written posts bucketed by opinion value,
//! each carrying a known sentiment vector, so bot activity never needs an
//! oracle round trip.

use std::path::Path;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::EnvError;

const EMBEDDED_CATALOG: &str = include_str!("../data/posts.json");

/// Opinion vector → post text oracle.
#[async_trait]
pub trait PostGenerator: Send + Sync {
    async fn generate_post(&self, opinion: &[f64]) -> Result<String, EnvError>;
}

/// A pre-written post and the opinion it expresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPost {
    pub text: String,
    pub sentiment: Vec<f64>,
}

/// Posts for opinions in `[min, max)`; the bucket ending at 1.0 also holds 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostBucket {
    pub min: f64,
    pub max: f64,
    pub posts: Vec<CatalogPost>,
}

impl PostBucket {
    pub fn contains(&self, value: f64) -> bool {
        (self.min <= value && value < self.max) || (self.max >= 1.0 && value == self.max)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    topic: String,
    buckets: Vec<PostBucket>,
}

/// Validated post catalog.
#[derive(Debug, Clone)]
pub struct PostCatalog {
    topic: String,
    buckets: Vec<PostBucket>,
    neutral: usize,
}

impl PostCatalog {
    /// The catalog shipped with the crate.
    pub fn embedded() -> Result<Self, EnvError> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_json(text: &str) -> Result<Self, EnvError> {
        let file: CatalogFile =
            serde_json::from_str(text).map_err(|e| EnvError::Catalog(e.to_string()))?;
        Self::new(file.topic, file.buckets)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EnvError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Validates the buckets. One of them must contain 0.5.
    pub fn new(topic: String, buckets: Vec<PostBucket>) -> Result<Self, EnvError> {
        for bucket in &buckets {
            if !(0.0 <= bucket.min && bucket.min < bucket.max && bucket.max <= 1.0) {
                return Err(EnvError::Catalog(format!(
                    "bucket [{}, {}) is not a range inside [0, 1]",
                    bucket.min, bucket.max
                )));
            }
            if bucket.posts.is_empty() {
                return Err(EnvError::Catalog(format!(
                    "bucket [{}, {}) has no posts",
                    bucket.min, bucket.max
                )));
            }
        }

        let neutral = buckets
            .iter()
            .position(|b| b.contains(0.5))
            .ok_or_else(|| EnvError::Catalog("no bucket covers the neutral opinion 0.5".into()))?;

        Ok(Self { topic, buckets, neutral })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn buckets(&self) -> &[PostBucket] {
        &self.buckets
    }

    /// Bucket holding `value`; the neutral bucket when none does.
    pub fn bucket_for(&self, value: f64) -> &PostBucket {
        self.buckets
            .iter()
            .find(|b| b.contains(value))
            .unwrap_or(&self.buckets[self.neutral])
    }

    /// Uniformly chosen post from the bucket holding `value`.
    pub fn post_for_opinion<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> &CatalogPost {
        let posts = &self.bucket_for(value).posts;
        &posts[rng.gen_range(0..posts.len())]
    }
}

/// [`PostGenerator`] that answers from a [`PostCatalog`] using the primary axis.
pub struct CatalogGenerator<R> {
    catalog: PostCatalog,
    rng: Mutex<R>,
}

impl<R: Rng + Send> CatalogGenerator<R> {
    pub fn new(catalog: PostCatalog, rng: R) -> Self {
        Self {
            catalog,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl<R: Rng + Send> PostGenerator for CatalogGenerator<R> {
    async fn generate_post(&self, opinion: &[f64]) -> Result<String, EnvError> {
        let value = opinion
            .first()
            .copied()
            .ok_or_else(|| EnvError::GenerationFailed("empty opinion vector".into()))?;
        let mut rng = self.rng.lock().await;
        Ok(self.catalog.post_for_opinion(value, &mut *rng).text.clone())
    }
}
