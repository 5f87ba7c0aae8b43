//! Lichess cloud-eval client.
//!
//! Any failure (transport, timeout, non-2xx, empty or malformed body) is
//! reported as an absent evaluation so the resolver moves on to the engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::evaluation::Evaluation;

/// A remote source of precomputed evaluations.
#[async_trait]
pub trait CloudEvaluator: Send + Sync {
    /// `None` when the service has nothing usable for this position.
    async fn lookup(&self, fen: &str, multi_pv: u32) -> Option<Evaluation>;
}

pub struct LichessCloudClient {
    client: Client,
    url: String,
}

impl LichessCloudClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("GameReview/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CloudEvaluator for LichessCloudClient {
    async fn lookup(&self, fen: &str, multi_pv: u32) -> Option<Evaluation> {
        let resp = match self
            .client
            .get(&self.url)
            .query(&[("fen", fen.to_string()), ("multiPv", multi_pv.to_string())])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(fen, "Cloud eval request error: {e}");
                return None;
            }
        };

        if !resp.status().is_success() {
            // 404 is the normal "not in the cloud database" answer
            debug!(fen, status = %resp.status(), "Cloud eval miss");
            return None;
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(fen, "Cloud eval body read error: {e}");
                return None;
            }
        };

        parse_cloud_eval(fen, &body)
    }
}

/// Decode a cloud-eval body. The requested FEN is kept so cache keys and
/// results agree even if the service echoes different move counters.
pub fn parse_cloud_eval(fen: &str, body: &str) -> Option<Evaluation> {
    let mut eval: Evaluation = match serde_json::from_str(body) {
        Ok(eval) => eval,
        Err(e) => {
            warn!(fen, "Malformed cloud eval payload: {e}");
            return None;
        }
    };
    if eval.is_empty() {
        return None;
    }
    eval.fen = fen.to_string();
    Some(eval)
}
