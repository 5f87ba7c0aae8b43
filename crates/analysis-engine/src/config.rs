//! Analysis configuration from environment variables.
//!
//! Nothing here is mandatory: a missing engine or cache store degrades the
//! fallback chain instead of failing startup.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

pub const DEFAULT_CLOUD_EVAL_URL: &str = "https://lichess.org/api/cloud-eval";

/// Seven days
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400 * 7;

/// Largest batch accepted by `analyze_batch`.
pub const MAX_BATCH_SIZE: usize = 100;

/// Where to look for Stockfish when `STOCKFISH_PATH` is not set.
const STOCKFISH_CANDIDATES: &[&str] = &[
    "engines/stockfish",
    "engines/stockfish.exe",
    "/usr/games/stockfish",
    "/usr/bin/stockfish",
    "/usr/local/bin/stockfish",
    "/opt/homebrew/bin/stockfish",
];

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    /// Path to Stockfish binary, if one was found
    pub stockfish_path: Option<PathBuf>,

    /// Cache store connection string (`postgres://...` or `memory`)
    pub cache_url: Option<String>,

    /// Cloud evaluation endpoint
    pub cloud_eval_url: String,

    /// Timeout for a single cloud request
    pub cloud_timeout: Duration,

    /// Wall-clock ceiling for one engine search
    pub engine_move_time: Duration,

    /// Engine hash table size in MB
    pub engine_hash_mb: u32,

    /// Default depth for single-position analysis
    pub analysis_depth: u32,

    /// Depth used for every position during game review
    pub review_depth: u32,

    /// Maximum in-flight evaluations in a batch
    pub batch_concurrency: usize,

    /// Lifetime of cache entries
    pub cache_ttl: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stockfish_path: None,
            cache_url: None,
            cloud_eval_url: DEFAULT_CLOUD_EVAL_URL.to_string(),
            cloud_timeout: Duration::from_secs(5),
            engine_move_time: Duration::from_millis(3000),
            engine_hash_mb: 16,
            analysis_depth: 15,
            review_depth: 15,
            batch_concurrency: 5,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let stockfish_path = match env::var("STOCKFISH_PATH") {
            Ok(path) if Path::new(&path).exists() => {
                info!(path = %path, "Using Stockfish from STOCKFISH_PATH");
                Some(PathBuf::from(path))
            }
            Ok(path) => {
                warn!(path = %path, "STOCKFISH_PATH does not exist, probing defaults");
                find_stockfish()
            }
            Err(_) => find_stockfish(),
        };

        let cache_url = env::var("CACHE_URL").ok().filter(|v| !v.trim().is_empty());

        let cloud_eval_url =
            env::var("CLOUD_EVAL_URL").unwrap_or_else(|_| DEFAULT_CLOUD_EVAL_URL.to_string());

        Self {
            stockfish_path,
            cache_url,
            cloud_eval_url,
            cloud_timeout: env_parse("CLOUD_EVAL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cloud_timeout),
            engine_move_time: env_parse("ENGINE_MOVE_TIME_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.engine_move_time),
            engine_hash_mb: env_parse("ENGINE_HASH_MB").unwrap_or(defaults.engine_hash_mb),
            analysis_depth: env_parse("ANALYSIS_DEPTH").unwrap_or(defaults.analysis_depth),
            review_depth: env_parse("REVIEW_DEPTH").unwrap_or(defaults.review_depth),
            batch_concurrency: env_parse::<usize>("BATCH_CONCURRENCY")
                .unwrap_or(defaults.batch_concurrency)
                .max(1),
            cache_ttl: env_parse("CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Probe well-known install locations, then every directory on `PATH`.
fn find_stockfish() -> Option<PathBuf> {
    let on_path = env::var_os("PATH")
        .map(|paths| {
            env::split_paths(&paths)
                .flat_map(|dir| [dir.join("stockfish"), dir.join("stockfish.exe")])
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let found = STOCKFISH_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .chain(on_path)
        .find(|p| p.is_file());

    match &found {
        Some(path) => info!(path = %path.display(), "Found Stockfish"),
        None => warn!("Stockfish not found; engine fallback disabled"),
    }
    found
}
