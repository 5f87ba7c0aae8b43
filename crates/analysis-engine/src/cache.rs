//! Content-addressed evaluation cache with TTL expiry.
//!
//! Keys are `analysis:` + hex SHA-256 of `"{position}:{multi_pv}"`, where the
//! position is the FEN without its move counters. The store is optional: when
//! absent or failing, reads miss and writes are dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chess_core::position::normalize_fen;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::evaluation::Evaluation;

const KEY_PREFIX: &str = "analysis:";

/// Raw key/value backend behind [`EvalCache`].
#[async_trait]
pub trait EvalStore: Send + Sync {
    /// Payload for `key`, unless missing or expired.
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, CacheError>;

    /// Replace the entry for `key` wholesale.
    async fn put(&self, key: &str, payload: &JsonValue, ttl: Duration) -> Result<(), CacheError>;

    async fn close(&self);
}

/// Positions that differ only in their half-move or full-move counters share a key.
pub fn cache_key(fen: &str, multi_pv: u32) -> String {
    let position = normalize_fen(fen);
    let digest = Sha256::digest(format!("{position}:{multi_pv}").as_bytes());
    format!("{KEY_PREFIX}{digest:x}")
}

// ---------------------------------------------------------------------------
// Postgres store
// ---------------------------------------------------------------------------

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS evaluation_cache (
    key         TEXT PRIMARY KEY,
    payload     JSONB NOT NULL,
    expires_at  TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evaluation_cache_expires_at
    ON evaluation_cache (expires_at);
"#;

pub struct PgEvalStore {
    pool: PgPool,
}

impl PgEvalStore {
    /// Connect, create the table if needed and drop already-expired rows.
    pub async fn connect(database_url: &str) -> Result<Self, CacheError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        let purged = sqlx::query("DELETE FROM evaluation_cache WHERE expires_at <= NOW()")
            .execute(&pool)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired cache rows");
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl EvalStore for PgEvalStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, CacheError> {
        let payload = sqlx::query_scalar::<_, JsonValue>(
            "SELECT payload FROM evaluation_cache WHERE key = $1 AND expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payload)
    }

    async fn put(&self, key: &str, payload: &JsonValue, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        sqlx::query(
            r#"INSERT INTO evaluation_cache (key, payload, expires_at)
               VALUES ($1, $2, $3)
               ON CONFLICT (key) DO UPDATE SET
                   payload = EXCLUDED.payload,
                   expires_at = EXCLUDED.expires_at"#,
        )
        .bind(key)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// In-process store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryEvalStore {
    entries: Mutex<HashMap<String, (JsonValue, Option<Instant>)>>,
}

impl MemoryEvalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl EvalStore for MemoryEvalStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, CacheError> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some((payload, expires_at)) if expires_at.map_or(true, |at| Instant::now() < at) => {
                return Ok(Some(payload.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, payload: &JsonValue, ttl: Duration) -> Result<(), CacheError> {
        // TTLs too large to represent never expire
        let expires_at = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (payload.clone(), expires_at));
        Ok(())
    }

    async fn close(&self) {
        self.entries.lock().await.clear();
    }
}

// ---------------------------------------------------------------------------
// Cache facade
// ---------------------------------------------------------------------------

/// Typed cache over an optional store. Never fails its caller.
#[derive(Clone)]
pub struct EvalCache {
    store: Option<Arc<dyn EvalStore>>,
    ttl: Duration,
}

impl EvalCache {
    pub fn new(store: Arc<dyn EvalStore>, ttl: Duration) -> Self {
        Self {
            store: Some(store),
            ttl,
        }
    }

    /// A cache that always misses.
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttl: Duration::ZERO,
        }
    }

    /// Open the store named by `url`: `memory`, a Postgres URL, or nothing.
    /// An unreachable store disables caching instead of failing.
    pub async fn connect(url: Option<&str>, ttl: Duration) -> Self {
        let Some(url) = url else {
            info!("No cache store configured; caching disabled");
            return Self::disabled();
        };

        if url.eq_ignore_ascii_case("memory") {
            info!("Using in-process evaluation cache");
            return Self::new(Arc::new(MemoryEvalStore::new()), ttl);
        }

        match PgEvalStore::connect(url).await {
            Ok(store) => {
                info!("Connected to Postgres evaluation cache");
                Self::new(Arc::new(store), ttl)
            }
            Err(e) => {
                warn!("Cache store unavailable, caching disabled: {e}");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn get(&self, fen: &str, multi_pv: u32) -> Option<Evaluation> {
        let store = self.store.as_ref()?;
        let key = cache_key(fen, multi_pv);

        let payload = match store.get(&key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(fen, "Cache read failed: {e}");
                return None;
            }
        };

        match serde_json::from_value::<Evaluation>(payload) {
            // The stored entry may come from the same position at other move counters
            Ok(eval) => Some(Evaluation {
                fen: fen.to_string(),
                ..eval
            }),
            Err(e) => {
                warn!(fen, "Discarding unreadable cache entry: {e}");
                None
            }
        }
    }

    pub async fn put(&self, fen: &str, multi_pv: u32, eval: &Evaluation) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let key = cache_key(fen, multi_pv);

        let result = match serde_json::to_value(eval) {
            Ok(payload) => store.put(&key, &payload, self.ttl).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(fen, "Cache write failed: {e}");
        }
    }

    pub async fn close(&self) {
        if let Some(store) = &self.store {
            store.close().await;
        }
    }
}
