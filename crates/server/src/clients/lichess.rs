use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde_json::Value;

const LICHESS_BASE_URL: &str = "https://lichess.org";

// lichess.org/<id>, optionally followed by a 4-char player suffix or /white|/black
static GAME_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?lichess\.org/([A-Za-z0-9]{8})(?:[A-Za-z0-9]{4})?(?:/(?:white|black))?/?(?:[?#].*)?$")
        .unwrap()
});
static BARE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9]{8})(?:[A-Za-z0-9]{4})?$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Not a Lichess game URL: {0}")]
    InvalidUrl(String),

    #[error("Lichess game not found. Please check the URL.")]
    NotFound,

    #[error("Error fetching game from Lichess: {0}")]
    Http(String),
}

pub struct LichessClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl LichessClient {
    pub fn new(token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("GameReview/1.0")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: LICHESS_BASE_URL.to_string(),
            token,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the PGN of a game given its URL (or bare id).
    pub async fn fetch_game_pgn(&self, url: &str) -> Result<String, FetchError> {
        let game_id = extract_game_id(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        let mut req = self
            .client
            .get(format!("{}/game/export/{game_id}", self.base_url))
            .query(&[("moves", "true"), ("pgnInJson", "true")])
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::Http(format!("Request error: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(FetchError::Http(format!("HTTP {}", resp.status())));
        }

        let game: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Http(format!("Body read error: {e}")))?;

        game.get("pgn")
            .and_then(|v| v.as_str())
            .filter(|pgn| !pgn.trim().is_empty())
            .map(String::from)
            .ok_or_else(|| FetchError::Http("Unable to fetch PGN from Lichess".to_string()))
    }
}

/// The 8-character game id from a Lichess game URL.
pub fn extract_game_id(url: &str) -> Option<String> {
    let url = url.trim();
    GAME_URL_RE
        .captures(url)
        .or_else(|| BARE_ID_RE.captures(url))
        .map(|cap| cap[1].to_string())
}
