//! Release intelligence: search evidence gathering and LLM-backed analysis.
//!
//! The pipeline for one library is `SearchProvider` → `ReleaseOracle` →
//! [`normalize`], producing the typed [`Analysis`] the decision engine
//! consumes. Both collaborators are traits so a pass can run against
//! scripted fixtures in tests.
//!
//! [`normalize`]: normalize::normalize
//! [`Analysis`]: types::Analysis

pub mod client;
pub mod normalize;
pub mod search;
pub mod types;

pub use client::{HttpOracle, ReleaseOracle};
pub use search::{HttpSearchProvider, SearchProvider};
pub use types::{Analysis, SearchContext, SearchHit};
