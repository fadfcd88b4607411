//! Opinion Environment Layer
//!
//! The engine never talks to language models or the outside world. This crate
//! holds the boundary it is driven through:
//! - **Oracles**: [`OpinionAnalyzer`] (text → opinion vector) and
//!   [`PostGenerator`] (opinion vector → text), both async traits
//! - **Validation**: oracle output is parsed and checked before it reaches the engine
//! - **Retry policy**: per-attempt timeouts and bounded retries
//! - **Fallback catalog**: pre-written posts bucketed by opinion value
//!
//! # Example
//!
//! ```ignore
//! use opinion_env::{analyze_with_retry, OpinionAnalyzer, RetryPolicy};
//!
//! async fn user_opinion(analyzer: &dyn OpinionAnalyzer, post: &str) -> Vec<f64> {
//!     analyze_with_retry(analyzer, post, 1, RetryPolicy::default())
//!         .await
//!         .unwrap_or_else(|_| vec![0.5])
//! }
//! ```

mod analyzer;
mod axes;
mod error;
mod posts;

pub use analyzer::{
    analyze_with_retry, normalize_opinion_vector, parse_opinion_vector, OpinionAnalyzer, RetryPolicy,
    NEUTRAL_OPINION,
};
pub use axes::OpinionAxis;
pub use error::EnvError;
pub use posts::{CatalogGenerator, CatalogPost, PostBucket, PostCatalog, PostGenerator};
