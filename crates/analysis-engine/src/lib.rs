//! Position-evaluation pipeline and game review.
//!
//! Evaluations are resolved through a fallback chain (cache, cloud, local
//! engine) and turned into move classifications and per-side accuracy.

pub mod analysis;
pub mod cache;
pub mod cloud;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod resolver;
pub mod review;
pub mod service;
pub mod stockfish;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, CacheError, EngineError};
pub use evaluation::{AnalysisResult, Evaluation, Provenance, PvLine};
pub use resolver::Resolver;
pub use review::{GameReviewResult, MoveRecord};
pub use service::{AnalysisService, ServiceSettings};
